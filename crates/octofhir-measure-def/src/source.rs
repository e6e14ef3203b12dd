//! Sources of measure definitions and evaluated criteria results
//!
//! The evaluator is independent of any concrete resource format. Adapters
//! implement these traits to feed it definitions and per-subject results.

use indexmap::IndexMap;
use octofhir_measure_types::CriteriaValue;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use crate::model::MeasureDef;

/// Something that can describe a measure's groups and populations
pub trait MeasureSource {
    /// Error produced while reading the definition
    type Error: std::error::Error + Send + Sync + 'static;

    /// Build the definition of the measure
    fn measure_def(&self) -> Result<MeasureDef, Self::Error>;
}

impl MeasureSource for MeasureDef {
    type Error = Infallible;

    fn measure_def(&self) -> Result<MeasureDef, Self::Error> {
        Ok(self.clone())
    }
}

/// Per-subject expression results produced by an external evaluation engine
pub trait ResultSource {
    /// Subjects that were evaluated, in evaluation order
    fn subjects(&self) -> Vec<&str>;

    /// Result of `expression` for `subject`; `None` when it was not evaluated
    fn result(&self, subject: &str, expression: &str) -> Option<&CriteriaValue>;
}

/// In-memory evaluated results, keyed by subject then expression name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResults {
    subjects: IndexMap<String, IndexMap<String, CriteriaValue>>,
}

impl EvaluationResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result of one expression for one subject
    pub fn insert(
        &mut self,
        subject: impl Into<String>,
        expression: impl Into<String>,
        value: impl Into<CriteriaValue>,
    ) {
        self.subjects
            .entry(subject.into())
            .or_default()
            .insert(expression.into(), value.into());
    }

    /// Chainable form of [`insert`](Self::insert)
    pub fn with(
        mut self,
        subject: impl Into<String>,
        expression: impl Into<String>,
        value: impl Into<CriteriaValue>,
    ) -> Self {
        self.insert(subject, expression, value);
        self
    }

    /// Register a subject with no results yet
    pub fn add_subject(&mut self, subject: impl Into<String>) {
        self.subjects.entry(subject.into()).or_default();
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

impl ResultSource for EvaluationResults {
    fn subjects(&self) -> Vec<&str> {
        self.subjects.keys().map(String::as_str).collect()
    }

    fn result(&self, subject: &str, expression: &str) -> Option<&CriteriaValue> {
        self.subjects.get(subject)?.get(expression)
    }
}

impl<R: ResultSource + ?Sized> ResultSource for &R {
    fn subjects(&self) -> Vec<&str> {
        (**self).subjects()
    }

    fn result(&self, subject: &str, expression: &str) -> Option<&CriteriaValue> {
        (**self).result(subject, expression)
    }
}
