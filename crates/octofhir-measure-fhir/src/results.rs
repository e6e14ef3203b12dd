//! Per-subject results documents
//!
//! An external engine writes its expression results as:
//!
//! ```json
//! {
//!   "subjects": {
//!     "Patient/p1": { "Initial Population": true, "Gender": {"code": "male"} },
//!     "Patient/p2": { "Initial Population": false }
//!   }
//! }
//! ```
//!
//! Values are FHIR JSON, converted with [`criteria_value_from_json`].

use log::debug;
use octofhir_measure_def::{EvaluationResults, ResultSource};
use octofhir_measure_types::CriteriaValue;
use serde_json::Value;

use crate::error::{FhirError, FhirResult};
use crate::value::criteria_value_from_json;

/// Expression results read from a JSON document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonResults {
    results: EvaluationResults,
}

impl JsonResults {
    pub fn from_json(json: &str) -> FhirResult<Self> {
        Self::from_value(&serde_json::from_str(json)?)
    }

    pub fn from_value(document: &Value) -> FhirResult<Self> {
        let subjects = document
            .get("subjects")
            .ok_or_else(|| FhirError::missing("results", "subjects"))?
            .as_object()
            .ok_or_else(|| FhirError::invalid("results", "subjects", "expected an object"))?;

        let mut results = EvaluationResults::new();
        for (subject, expressions) in subjects {
            let expressions = expressions.as_object().ok_or_else(|| {
                FhirError::invalid("results", format!("subjects.{subject}"), "expected an object")
            })?;
            results.add_subject(subject.as_str());
            for (expression, value) in expressions {
                results.insert(subject.as_str(), expression.as_str(), criteria_value_from_json(value)?);
            }
        }
        debug!("read results for {} subjects", results.len());
        Ok(Self { results })
    }

    pub fn into_inner(self) -> EvaluationResults {
        self.results
    }
}

impl From<EvaluationResults> for JsonResults {
    fn from(results: EvaluationResults) -> Self {
        Self { results }
    }
}

impl ResultSource for JsonResults {
    fn subjects(&self) -> Vec<&str> {
        self.results.subjects()
    }

    fn result(&self, subject: &str, expression: &str) -> Option<&CriteriaValue> {
        self.results.result(subject, expression)
    }
}
