//! CLI command tests
//!
//! Drive the evaluate and validate commands through temporary files.

use octofhir_measure::cli::evaluate::{EvaluateConfig, run};
use octofhir_measure::cli::output::{OutputFormat, format_report, write_output};
use octofhir_measure::cli::validate::{ValidateConfig, validate, validate_file};
use octofhir_measure::{PopulationType, ReportType};
use pretty_assertions::assert_eq;
use rstest::rstest;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

fn measure() -> Value {
    json!({
        "resourceType": "Measure",
        "id": "screening",
        "url": "http://example.org/Measure/screening",
        "scoring": {"coding": [{"code": "proportion"}]},
        "group": [{
            "id": "group-1",
            "population": [
                {"id": "ip", "code": {"coding": [{"code": "initial-population"}]}, "criteria": {"expression": "IP"}},
                {"id": "den", "code": {"coding": [{"code": "denominator"}]}, "criteria": {"expression": "Den"}},
                {"id": "num", "code": {"coding": [{"code": "numerator"}]}, "criteria": {"expression": "Num"}}
            ]
        }]
    })
}

fn results() -> Value {
    json!({
        "subjects": {
            "Patient/a": {"IP": true, "Den": true, "Num": true},
            "Patient/b": {"IP": true, "Den": true, "Num": false},
            "Patient/c": {"IP": true, "Den": true, "Num": false},
            "Patient/d": {"IP": false, "Den": false, "Num": false}
        }
    })
}

fn write_json(dir: &TempDir, name: &str, value: &Value) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

fn config(dir: &TempDir) -> EvaluateConfig {
    EvaluateConfig {
        measure: write_json(dir, "measure.json", &measure()),
        results: write_json(dir, "results.json", &results()),
        ..EvaluateConfig::default()
    }
}

// ============================================================================
// Evaluate
// ============================================================================

#[test]
fn test_run_summary() {
    let dir = TempDir::new().unwrap();
    let report = run(&config(&dir)).unwrap();

    assert_eq!(report.measure, "http://example.org/Measure/screening");
    assert_eq!(report.report_type, ReportType::Summary);
    let group = &report.groups[0];
    assert_eq!(group.population(PopulationType::InitialPopulation).unwrap().count, 3);
    assert_eq!(group.score, Some("0.33333333333333333".parse::<Decimal>().unwrap()));
}

#[test]
fn test_run_individual() {
    let dir = TempDir::new().unwrap();
    let config = EvaluateConfig {
        report_type: Some("individual".to_string()),
        subject: Some("Patient/a".to_string()),
        ..config(&dir)
    };
    let report = run(&config).unwrap();
    assert_eq!(report.subject.as_deref(), Some("Patient/a"));
    assert_eq!(report.groups[0].score, Some(Decimal::ONE));
}

#[test]
fn test_run_rejects_unknown_report_type() {
    let dir = TempDir::new().unwrap();
    let config = EvaluateConfig {
        report_type: Some("weekly".to_string()),
        ..config(&dir)
    };
    let err = run(&config).unwrap_err();
    assert!(err.to_string().contains("weekly"), "{err}");
}

#[test]
fn test_run_reports_error_code_for_unknown_subject() {
    let dir = TempDir::new().unwrap();
    let config = EvaluateConfig {
        subject: Some("Patient/zz".to_string()),
        ..config(&dir)
    };
    let err = run(&config).unwrap_err();
    assert!(format!("{err:#}").contains("MSR0301"), "{err:#}");
}

#[test]
fn test_run_reports_definition_error_code() {
    let dir = TempDir::new().unwrap();
    let mut invalid = measure();
    invalid["group"][0]["population"].as_array_mut().unwrap().pop();
    let config = EvaluateConfig {
        measure: write_json(&dir, "invalid.json", &invalid),
        ..config(&dir)
    };
    let err = run(&config).unwrap_err();
    assert!(format!("{err:#}").contains("MSR0101"), "{err:#}");
}

#[test]
fn test_run_missing_measure_file() {
    let dir = TempDir::new().unwrap();
    let config = EvaluateConfig {
        measure: dir.path().join("absent.json"),
        ..config(&dir)
    };
    let err = run(&config).unwrap_err();
    assert!(err.to_string().contains("Failed to read measure file"), "{err}");
}

#[rstest]
#[case("json", OutputFormat::Json)]
#[case("pretty", OutputFormat::JsonPretty)]
#[case("FHIR", OutputFormat::Fhir)]
#[case("table", OutputFormat::Table)]
fn test_parse_output_format(#[case] input: &str, #[case] expected: OutputFormat) {
    assert_eq!(input.parse::<OutputFormat>().unwrap(), expected);
}

#[test]
fn test_render_formats() {
    let dir = TempDir::new().unwrap();
    let report = run(&config(&dir)).unwrap();

    let json: Value = serde_json::from_str(&format_report(&report, OutputFormat::Json).unwrap()).unwrap();
    assert_eq!(json["reportType"], "summary");
    assert_eq!(json["groups"][0]["populations"][1]["type"], "denominator");

    let fhir: Value = serde_json::from_str(&format_report(&report, OutputFormat::Fhir).unwrap()).unwrap();
    assert_eq!(fhir["resourceType"], "MeasureReport");
    assert_eq!(fhir["group"][0]["population"][2]["count"], 1);

    let table = format_report(&report, OutputFormat::Table).unwrap();
    assert!(table.contains("initial-population"), "{table}");
    assert!(table.contains("group-1"), "{table}");
}

#[test]
fn test_write_output_to_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.json");
    write_output("{}", Some(&path)).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
}

// ============================================================================
// Validate
// ============================================================================

#[test]
fn test_validate_valid_measure() {
    let dir = TempDir::new().unwrap();
    let path = write_json(&dir, "measure.json", &measure());
    let result = validate_file(&path);
    assert!(result.success(), "{:?}", result.errors);
    assert!(result.warnings.is_empty());
}

#[test]
fn test_validate_missing_numerator() {
    let dir = TempDir::new().unwrap();
    let mut invalid = measure();
    invalid["group"][0]["population"].as_array_mut().unwrap().pop();
    let path = write_json(&dir, "measure.json", &invalid);

    let result = validate_file(&path);
    assert!(!result.success());
    assert!(result.errors[0].message.contains("numerator"), "{:?}", result.errors);
    assert!(result.errors[0].code.as_deref().unwrap().starts_with("MSR01"));
}

#[test]
fn test_validate_warns_without_url() {
    let dir = TempDir::new().unwrap();
    let mut measure = measure();
    measure.as_object_mut().unwrap().remove("url");
    let path = write_json(&dir, "measure.json", &measure);

    let result = validate_file(&path);
    assert!(result.success());
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn test_validate_not_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();

    let result = validate_file(&path);
    assert!(!result.success());
}

#[test]
fn test_validate_command_fails_on_errors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "[]").unwrap();

    let config = ValidateConfig {
        files: vec![path],
        verbose: false,
    };
    assert!(validate(config).is_err());
    assert!(validate(ValidateConfig::default()).is_err());
}
