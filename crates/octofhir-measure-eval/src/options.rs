//! Evaluation options

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of report to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportType {
    /// Report for exactly one subject
    Individual,
    /// Summary with member lists
    SubjectList,
    /// Counts and scores only
    #[default]
    Summary,
}

impl ReportType {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::SubjectList => "subject-list",
            Self::Summary => "summary",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "individual" | "subject" => Ok(Self::Individual),
            "subject-list" | "subjectlist" => Ok(Self::SubjectList),
            "summary" | "population" => Ok(Self::Summary),
            other => Err(format!("unknown report type '{other}'")),
        }
    }
}

/// Options controlling one evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluationOptions {
    pub report_type: ReportType,
    /// Evaluate only this subject
    pub subject: Option<String>,
    /// Emit member lists; defaults to true for subject-list reports
    pub include_members: Option<bool>,
}

impl EvaluationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_report_type(mut self, report_type: ReportType) -> Self {
        self.report_type = report_type;
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_members(mut self, include: bool) -> Self {
        self.include_members = Some(include);
        self
    }

    /// Whether population reports list their members
    pub fn includes_members(&self) -> bool {
        self.include_members
            .unwrap_or(self.report_type == ReportType::SubjectList)
    }
}
