//! Quality Measure Evaluation
//!
//! This crate turns per-subject criteria results into scored, stratified
//! measure reports. It never evaluates expressions itself; an external engine
//! supplies one [`CriteriaValue`](octofhir_measure_types::CriteriaValue) per
//! subject and expression through a [`ResultSource`](octofhir_measure_def::ResultSource).
//!
//! # Example
//!
//! ```
//! use octofhir_measure_def::{EvaluationResults, GroupDefBuilder, MeasureDefBuilder, MeasureScoring, PopulationType};
//! use octofhir_measure_eval::{EvaluationOptions, MeasureEvaluator};
//!
//! let measure = MeasureDefBuilder::new("example")
//!     .group(
//!         GroupDefBuilder::new("group-1")
//!             .scoring(MeasureScoring::Proportion)
//!             .population_of(PopulationType::InitialPopulation, "IP")
//!             .population_of(PopulationType::Denominator, "Den")
//!             .population_of(PopulationType::Numerator, "Num"),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let results = EvaluationResults::new()
//!     .with("Patient/p1", "IP", true).with("Patient/p1", "Den", true).with("Patient/p1", "Num", true)
//!     .with("Patient/p2", "IP", true).with("Patient/p2", "Den", true).with("Patient/p2", "Num", false);
//!
//! let report = MeasureEvaluator::new()
//!     .evaluate(&measure, &results, &EvaluationOptions::default())
//!     .unwrap();
//! assert_eq!(report.groups[0].score.unwrap().to_string(), "0.5");
//! ```
//!
//! # Architecture
//!
//! - `validator`: population basis checks applied before aggregation
//! - `aggregate`: per-subject population membership and stratifier rows
//! - `stratify`: partitioning rows into strata
//! - `scoring`: set-arithmetic scores and observation aggregates
//! - `report`: report types and the definition-ordered assembler
//! - `engine`: the `MeasureEvaluator` driving a single evaluation pass

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod observation;
pub mod options;
pub mod report;
pub mod scoring;
pub mod state;
pub mod stratify;
pub mod validator;

// Re-export main types
pub use engine::MeasureEvaluator;
pub use error::{MeasureError, MeasureResult};
pub use options::{EvaluationOptions, ReportType};
pub use report::{
    GroupReport, MeasureReport, PopulationReport, ReportAssembler, StratifierReport,
    StratumComponent, StratumReport, StratumValue, SupplementalDataReport, ValueCount,
};
pub use scoring::{GroupScore, ObservationSummary, Scorer};
pub use state::MeasureState;
pub use validator::{DefaultBasisValidator, PopulationBasisValidator};
