//! Quality measure evaluation for Rust
//!
//! This crate bundles the measure evaluation workspace:
//! - Criteria values and their normalization (`types`)
//! - Measure definitions, scoring tables and validation (`def`)
//! - Aggregation, stratification, scoring and reports (`eval`)
//! - FHIR R4/R5 `Measure` / `MeasureReport` JSON support (`fhir`)
//!
//! # Example
//!
//! ```ignore
//! use octofhir_measure::{EvaluationOptions, FhirMeasure, JsonResults, MeasureEvaluator};
//!
//! let measure = FhirMeasure::from_json(&std::fs::read_to_string("Measure.json")?)?;
//! let results = JsonResults::from_json(&std::fs::read_to_string("results.json")?)?;
//! let report = MeasureEvaluator::new().evaluate_source(&measure, &results, &EvaluationOptions::default())?;
//! ```

// Re-export all public APIs from internal crates
pub use octofhir_measure_def as def;
pub use octofhir_measure_eval as eval;
pub use octofhir_measure_fhir as fhir;
pub use octofhir_measure_types as types;

// Convenience re-exports
pub use octofhir_measure_def::{
    DefinitionError, EvaluationResults, GroupDefBuilder, MeasureDef, MeasureDefBuilder,
    MeasureScoring, MeasureSource, PopulationBasis, PopulationType, ResultSource,
};
pub use octofhir_measure_eval::{
    EvaluationOptions, MeasureError, MeasureEvaluator, MeasureReport, MeasureResult, ReportType,
};
pub use octofhir_measure_fhir::{FhirError, FhirMeasure, JsonResults, measure_report_to_fhir};
pub use octofhir_measure_types::{CriteriaValue, ResourceRef, ValueKey};

// CLI module (only available with cli feature)
#[cfg(feature = "cli")]
pub mod cli;
