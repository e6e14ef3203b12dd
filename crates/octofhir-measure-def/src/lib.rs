//! Quality measure definition model
//!
//! This crate describes *what* a measure counts:
//!
//! - **Groups** with a scoring method (proportion, ratio, continuous-variable, cohort)
//!   and a population basis (boolean or a resource type)
//! - **Populations** naming the expression that decides membership
//! - **Stratifiers** with one expression or several components
//! - **Supplemental data elements** collected alongside
//!
//! Definitions are validated against the per-scoring population table before any
//! results are read. The [`MeasureSource`] and [`ResultSource`] traits are the
//! seams through which adapters supply definitions and evaluated results.

pub mod builder;
pub mod error;
pub mod model;
pub mod scoring;
pub mod source;
pub mod validate;

pub use builder::{GroupDefBuilder, MeasureDefBuilder};
pub use error::{DefinitionError, DefinitionResult, ErrorCode};
pub use model::{
    AggregateMethod, GroupDef, IMPROVEMENT_NOTATION_SYSTEM, ImprovementNotation,
    MEASURE_POPULATION_SYSTEM, MEASURE_SCORING_SYSTEM, MeasureDef, MeasureScoring,
    PopulationBasis, PopulationDef, PopulationType, StratifierComponentDef, StratifierCriteria,
    StratifierDef, SupplementalDataDef,
};
pub use source::{EvaluationResults, MeasureSource, ResultSource};
