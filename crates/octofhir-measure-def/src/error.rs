//! Definition errors and error codes
//!
//! Error code ranges:
//! - MSR0100-MSR0199: Definition errors (measure configuration)
//! - MSR0200-MSR0299: Structural errors (definition vs. evaluated results)
//! - MSR0300-MSR0399: Input errors (requests, adapters)

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::{MeasureScoring, PopulationType};

/// Result type for definition operations
pub type DefinitionResult<T> = Result<T, DefinitionError>;

/// Error code identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode(u16);

impl ErrorCode {
    /// Create a new error code
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Get the numeric code
    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Check if this is a definition error (0100-0199)
    pub const fn is_definition_error(&self) -> bool {
        self.0 >= 100 && self.0 < 200
    }

    /// Check if this is a structural error (0200-0299)
    pub const fn is_structural_error(&self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Check if this is an input error (0300-0399)
    pub const fn is_input_error(&self) -> bool {
        self.0 >= 300 && self.0 < 400
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MSR{:04}", self.0)
    }
}

/// Errors in a measure definition, detected before any results are read
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// A population the scoring method requires is absent
    #[error("'{scoring}' measure {measure} group '{group}' is missing required population: {population_type}")]
    MissingRequiredPopulation {
        measure: String,
        group: String,
        scoring: MeasureScoring,
        population_type: PopulationType,
    },

    /// A population type outside the scoring method's allowed set
    #[error("Population type {population_type} in measure {measure} group '{group}' is not a member of allowed '{scoring}' populations")]
    UnsupportedPopulation {
        measure: String,
        group: String,
        scoring: MeasureScoring,
        population_type: PopulationType,
    },

    /// The same population type declared more than the scoring method permits
    #[error("Measure {measure} group '{group}' declares {count} populations of type {population_type}")]
    DuplicatePopulation {
        measure: String,
        group: String,
        population_type: PopulationType,
        count: usize,
    },

    /// Two populations or two stratifiers of one group share an id
    #[error("Measure {measure} group '{group}' has duplicate id '{id}'")]
    DuplicateId {
        measure: String,
        group: String,
        id: String,
    },

    /// Neither the group nor the measure declares a scoring method
    #[error("Measure {measure} group '{group}' has no scoring method at group or measure level")]
    MissingScoring { measure: String, group: String },

    /// Unknown scoring code
    #[error("Measure {measure} group '{group}' has invalid scoring '{code}'")]
    InvalidScoring {
        measure: String,
        group: String,
        code: String,
    },

    /// Improvement notation other than `increase`/`decrease`
    #[error("Measure {measure} group '{group}' has invalid improvement notation '{code}'")]
    InvalidImprovementNotation {
        measure: String,
        group: String,
        code: String,
    },

    /// Unknown aggregate method on a measure observation
    #[error("Measure observation '{population}' in measure {measure} has invalid aggregate method '{code}'")]
    InvalidAggregateMethod {
        measure: String,
        population: String,
        code: String,
    },

    /// A criteria reference that does not name a population of the same group
    #[error("Measure observation '{population}' in measure {measure} group '{group}' references unknown population '{reference}'")]
    InvalidCriteriaReference {
        measure: String,
        group: String,
        population: String,
        reference: String,
    },

    /// Wrong number of measure observations for the scoring method
    #[error("Measure {measure} group '{group}': {message}")]
    InvalidObservations {
        measure: String,
        group: String,
        message: String,
    },

    /// A stratifier with neither an expression nor components
    #[error("Stratifier '{stratifier}' in measure {measure} has no criteria")]
    InvalidStratifier { measure: String, stratifier: String },
}

impl DefinitionError {
    /// Stable code of this error
    pub fn code(&self) -> ErrorCode {
        ErrorCode::new(match self {
            Self::MissingRequiredPopulation { .. } => 101,
            Self::UnsupportedPopulation { .. } => 102,
            Self::DuplicatePopulation { .. } => 103,
            Self::DuplicateId { .. } => 104,
            Self::MissingScoring { .. } => 105,
            Self::InvalidScoring { .. } => 106,
            Self::InvalidImprovementNotation { .. } => 107,
            Self::InvalidAggregateMethod { .. } => 108,
            Self::InvalidCriteriaReference { .. } => 109,
            Self::InvalidObservations { .. } => 110,
            Self::InvalidStratifier { .. } => 111,
        })
    }

    /// Create a missing-scoring error
    pub fn missing_scoring(measure: impl Into<String>, group: impl Into<String>) -> Self {
        Self::MissingScoring {
            measure: measure.into(),
            group: group.into(),
        }
    }

    /// Create an invalid-scoring error
    pub fn invalid_scoring(
        measure: impl Into<String>,
        group: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self::InvalidScoring {
            measure: measure.into(),
            group: group.into(),
            code: code.into(),
        }
    }

    /// Create an invalid-improvement-notation error
    pub fn invalid_improvement_notation(
        measure: impl Into<String>,
        group: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self::InvalidImprovementNotation {
            measure: measure.into(),
            group: group.into(),
            code: code.into(),
        }
    }

    /// Create an invalid-aggregate-method error
    pub fn invalid_aggregate_method(
        measure: impl Into<String>,
        population: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self::InvalidAggregateMethod {
            measure: measure.into(),
            population: population.into(),
            code: code.into(),
        }
    }

    /// Create an invalid-observations error
    pub fn invalid_observations(
        measure: impl Into<String>,
        group: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidObservations {
            measure: measure.into(),
            group: group.into(),
            message: message.into(),
        }
    }
}
