//! FHIR adapter errors

use octofhir_measure_def::{DefinitionError, ErrorCode};
use octofhir_measure_eval::MeasureError;
use thiserror::Error;

/// Result type for FHIR conversions
pub type FhirResult<T> = Result<T, FhirError>;

/// Errors reading or writing FHIR JSON
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FhirError {
    /// Input is not valid JSON
    #[error("Invalid JSON: {0}")]
    Json(String),

    /// A resource of another type was supplied
    #[error("Expected a {expected} resource, found '{found}'")]
    UnexpectedResource { expected: String, found: String },

    /// A required element is absent
    #[error("{resource} is missing required element '{path}'")]
    MissingElement { resource: String, path: String },

    /// An element is present but cannot be interpreted
    #[error("Invalid element '{path}' in {resource}: {message}")]
    InvalidElement {
        resource: String,
        path: String,
        message: String,
    },

    /// The converted definition is invalid
    #[error(transparent)]
    Definition(#[from] DefinitionError),
}

impl FhirError {
    /// Stable code of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Definition(e) => e.code(),
            Self::Json(_) => ErrorCode::new(303),
            Self::UnexpectedResource { .. } => ErrorCode::new(304),
            Self::MissingElement { .. } => ErrorCode::new(305),
            Self::InvalidElement { .. } => ErrorCode::new(306),
        }
    }

    pub fn missing(resource: impl Into<String>, path: impl Into<String>) -> Self {
        Self::MissingElement {
            resource: resource.into(),
            path: path.into(),
        }
    }

    pub fn invalid(
        resource: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidElement {
            resource: resource.into(),
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for FhirError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Definition errors stay typed; everything else is a source failure
impl From<FhirError> for MeasureError {
    fn from(err: FhirError) -> Self {
        match err {
            FhirError::Definition(e) => MeasureError::Definition(e),
            other => MeasureError::source(format!("[{}] {other}", other.code())),
        }
    }
}
