//! Validate command implementation

use super::{evaluate::read_measure, output};
use anyhow::{Result, bail};
use colored::Colorize;
use octofhir_measure_def::MeasureDef;
use octofhir_measure_fhir::FhirMeasure;
use std::path::{Path, PathBuf};

/// Configuration for validate command
#[derive(Debug, Clone, Default)]
pub struct ValidateConfig {
    pub files: Vec<PathBuf>,
    pub verbose: bool,
}

/// Validation result for a single file
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub file: PathBuf,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl ValidationResult {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// One problem found in a measure file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Stable error code, e.g. `MSR0105`
    pub code: Option<String>,
    pub message: String,
}

impl Diagnostic {
    fn new(code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Validate measure files
pub fn validate(config: ValidateConfig) -> Result<()> {
    if config.files.is_empty() {
        bail!("No files specified for validation");
    }

    let mut total_errors = 0;
    let mut total_warnings = 0;
    for file in &config.files {
        if config.verbose {
            eprintln!("Validating: {}", file.display());
        }
        let result = validate_file(file);
        total_errors += result.errors.len();
        total_warnings += result.warnings.len();
        print_validation_result(&result);
    }

    println!();
    if total_errors == 0 {
        let mut message = format!("All {} file(s) validated successfully", config.files.len());
        if total_warnings > 0 {
            message.push_str(&format!(" ({total_warnings} warning(s))"));
        }
        println!("{}", output::format_success(&message));
        Ok(())
    } else {
        bail!(
            "Validation failed: {} in {} file(s)",
            format!("{total_errors} error(s)").red(),
            config.files.len()
        )
    }
}

/// Validate a single measure file
pub fn validate_file(file: &Path) -> ValidationResult {
    let mut result = ValidationResult {
        file: file.to_path_buf(),
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    let measure = match read_measure(file) {
        Ok(measure) => measure,
        Err(e) => {
            result.errors.push(Diagnostic::new(None, format!("{e:#}")));
            return result;
        }
    };

    match measure_def(&measure) {
        Ok(def) => result.warnings = warnings(&def),
        Err((code, message)) => result.errors.push(Diagnostic::new(Some(code), message)),
    }
    result
}

fn measure_def(measure: &FhirMeasure) -> Result<MeasureDef, (String, String)> {
    let def = measure
        .to_measure_def()
        .map_err(|e| (e.code().to_string(), e.to_string()))?;
    def.validate()
        .map_err(|e| (e.code().to_string(), e.to_string()))?;
    Ok(def)
}

fn warnings(def: &MeasureDef) -> Vec<Diagnostic> {
    let mut warnings = Vec::new();
    if def.url.is_none() {
        warnings.push(Diagnostic::new(
            None,
            format!("Measure '{}' has no canonical url; reports will reference its id", def.id),
        ));
    }
    if def.groups.is_empty() {
        warnings.push(Diagnostic::new(
            None,
            format!("Measure '{}' has no groups; its report will be empty", def.id),
        ));
    }
    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.success() {
        println!("{} {}", "✓".green().bold(), result.file.display());
    } else {
        println!("{} {}", "✗".red().bold(), result.file.display());
    }

    for error in &result.errors {
        match &error.code {
            Some(code) => println!("  {} [{code}] {}", "error:".red().bold(), error.message),
            None => println!("  {} {}", "error:".red().bold(), error.message),
        }
    }
    for warning in &result.warnings {
        println!("  {} {}", "warning:".yellow().bold(), warning.message);
    }
}
