//! Measure evaluation errors

use octofhir_measure_def::{DefinitionError, ErrorCode};
use std::convert::Infallible;
use thiserror::Error;

/// Result type for measure evaluation
pub type MeasureResult<T> = Result<T, MeasureError>;

/// Errors that can occur while evaluating a measure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeasureError {
    /// The definition violates its scoring method's population table
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// Definition shape does not match the computed results
    #[error("Structural mismatch in measure {measure} at '{id}': {message}")]
    StructuralMismatch {
        measure: String,
        id: String,
        message: String,
    },

    /// Expression results of a type incompatible with the group's basis
    #[error(
        "Expression '{expression}' for {element} '{id}' of measure {measure} returned [{}], which does not match population basis '{basis}'",
        .found.join(", ")
    )]
    BasisMismatch {
        measure: String,
        /// "population" or "stratifier"
        element: String,
        id: String,
        expression: String,
        basis: String,
        found: Vec<String>,
    },

    /// A measure observation that is not numeric
    #[error("Measure observation '{population}' of measure {measure} returned non-numeric {found} for subject {subject}")]
    InvalidObservation {
        measure: String,
        population: String,
        subject: String,
        found: String,
    },

    /// The evaluation request cannot be satisfied
    #[error("Invalid evaluation request: {message}")]
    InvalidRequest { message: String },

    /// A measure or result source failed
    #[error("Source error: {message}")]
    Source { message: String },
}

impl MeasureError {
    /// Stable code of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Definition(e) => e.code(),
            Self::StructuralMismatch { .. } => ErrorCode::new(201),
            Self::BasisMismatch { .. } => ErrorCode::new(202),
            Self::InvalidObservation { .. } => ErrorCode::new(203),
            Self::InvalidRequest { .. } => ErrorCode::new(301),
            Self::Source { .. } => ErrorCode::new(302),
        }
    }

    /// Definition and results disagree in shape or type
    pub fn is_structural(&self) -> bool {
        self.code().is_structural_error()
    }

    /// Create a structural mismatch error
    pub fn structural_mismatch(
        measure: impl Into<String>,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::StructuralMismatch {
            measure: measure.into(),
            id: id.into(),
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a source error
    pub fn source(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
        }
    }
}

impl From<Infallible> for MeasureError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}
