//! Evaluate command implementation

use super::output::{self, OutputFormat};
use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use octofhir_measure_def::ResultSource;
use octofhir_measure_eval::{EvaluationOptions, MeasureEvaluator, MeasureReport, ReportType};
use octofhir_measure_fhir::{FhirMeasure, JsonResults};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for evaluate command
#[derive(Debug, Clone, Default)]
pub struct EvaluateConfig {
    /// FHIR Measure resource (JSON)
    pub measure: PathBuf,
    /// Per-subject expression results (JSON)
    pub results: PathBuf,
    pub report_type: Option<String>,
    pub subject: Option<String>,
    pub verbose: bool,
    pub output_format: Option<String>,
    pub output_file: Option<PathBuf>,
}

/// Evaluate a measure and print the report
pub fn evaluate(config: EvaluateConfig) -> Result<()> {
    let format = match &config.output_format {
        Some(format) => format.parse::<OutputFormat>()?,
        None => OutputFormat::default(),
    };

    let report = run(&config)?;
    let rendered = output::format_report(&report, format)?;
    output::write_output(&rendered, config.output_file.as_deref())
}

/// Read the inputs and evaluate, without printing anything
pub fn run(config: &EvaluateConfig) -> Result<MeasureReport> {
    let measure = read_measure(&config.measure)?;
    let results = read_results(&config.results)?;
    let options = options(config)?;

    if config.verbose {
        eprintln!(
            "Evaluating {} ({:?}) against {} subject(s)",
            measure.identity(),
            measure.version(),
            results.subjects().len()
        );
    }
    info!(
        "evaluating {} as a {} report",
        measure.identity(),
        options.report_type
    );

    MeasureEvaluator::new()
        .evaluate_source(&measure, &results, &options)
        .map_err(|e| anyhow!("[{}] {e}", e.code()))
        .with_context(|| format!("Failed to evaluate {}", config.measure.display()))
}

fn options(config: &EvaluateConfig) -> Result<EvaluationOptions> {
    let mut options = EvaluationOptions::new();
    if let Some(report_type) = &config.report_type {
        let report_type = report_type
            .parse::<ReportType>()
            .map_err(|message| anyhow!(message))?;
        options = options.with_report_type(report_type);
    }
    if let Some(subject) = &config.subject {
        options = options.with_subject(subject.clone());
    }
    Ok(options)
}

pub(crate) fn read_measure(path: &Path) -> Result<FhirMeasure> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read measure file: {}", path.display()))?;
    debug!("read {} bytes from {}", content.len(), path.display());
    FhirMeasure::from_json(&content)
        .map_err(|e| anyhow!("[{}] {e}", e.code()))
        .with_context(|| format!("Failed to load measure: {}", path.display()))
}

fn read_results(path: &Path) -> Result<JsonResults> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read results file: {}", path.display()))?;
    JsonResults::from_json(&content)
        .map_err(|e| anyhow!("[{}] {e}", e.code()))
        .with_context(|| format!("Failed to load results: {}", path.display()))
}
