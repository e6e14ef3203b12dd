//! Output formatting utilities

use anyhow::{Context, Result, bail};
use colored::Colorize;
use octofhir_measure_eval::{MeasureReport, PopulationReport, StratumValue};
use rust_decimal::Decimal;
use serde_json::Value;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::measure_report_to_fhir;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Json,
    #[default]
    JsonPretty,
    /// FHIR MeasureReport resource, pretty-printed
    Fhir,
    Table,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "json-pretty" => Ok(Self::JsonPretty),
            "fhir" => Ok(Self::Fhir),
            "table" => Ok(Self::Table),
            other => bail!("Unknown output format '{other}' (expected json, pretty, fhir or table)"),
        }
    }
}

/// Set up color output based on user preference
pub fn setup_colors(mode: &str) {
    match mode.to_lowercase().as_str() {
        "always" => colored::control::set_override(true),
        "never" => colored::control::set_override(false),
        _ => colored::control::unset_override(),
    }
}

/// Format an error for display, including its causes
pub fn format_error(error: &anyhow::Error) -> String {
    format!("{} {:#}", "Error:".red().bold(), error)
}

/// Format a success message for display
pub fn format_success(message: &str) -> String {
    format!("{} {}", "Success:".green().bold(), message)
}

/// Write output to a file or stdout
pub fn write_output(content: &str, output_file: Option<&Path>) -> Result<()> {
    if let Some(path) = output_file {
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write to output file: {}", path.display()))?;
        eprintln!(
            "{}",
            format_success(&format!("Output written to {}", path.display()))
        );
    } else {
        println!("{content}");
    }
    Ok(())
}

/// Format JSON value for output
pub fn format_json(value: &Value, pretty: bool) -> Result<String> {
    if pretty {
        serde_json::to_string_pretty(value).context("Failed to serialize JSON")
    } else {
        serde_json::to_string(value).context("Failed to serialize JSON")
    }
}

/// Render a report in the requested format
pub fn format_report(report: &MeasureReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json | OutputFormat::JsonPretty => {
            let value = serde_json::to_value(report).context("Failed to serialize report")?;
            format_json(&value, format == OutputFormat::JsonPretty)
        }
        OutputFormat::Fhir => format_json(&measure_report_to_fhir(report), true),
        OutputFormat::Table => Ok(format_report_table(report)),
    }
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Stratum")]
    stratum: String,
    #[tabled(rename = "Population")]
    population: String,
    #[tabled(rename = "Count")]
    count: usize,
    #[tabled(rename = "Aggregate")]
    aggregate: String,
    #[tabled(rename = "Score")]
    score: String,
}

/// Format a report as a table of population counts, one block per group and stratum
pub fn format_report_table(report: &MeasureReport) -> String {
    let mut rows = Vec::new();
    for group in &report.groups {
        let score = display_decimal(group.score);
        push_rows(&mut rows, &group.id, "", &group.populations, &score);
        for stratifier in &group.stratifiers {
            for stratum in &stratifier.strata {
                let label = match &stratum.value {
                    StratumValue::Value(value) => format!("{}: {value}", stratifier.id),
                    StratumValue::Components(components) => components
                        .iter()
                        .map(|c| format!("{}: {}", c.id, c.value))
                        .collect::<Vec<_>>()
                        .join(", "),
                };
                let score = display_decimal(stratum.score);
                push_rows(&mut rows, &group.id, &label, &stratum.populations, &score);
            }
        }
    }

    if rows.is_empty() {
        return "(no groups)".to_string();
    }
    Table::new(rows).with(Style::modern()).to_string()
}

fn push_rows(
    rows: &mut Vec<Row>,
    group: &str,
    stratum: &str,
    populations: &[PopulationReport],
    score: &str,
) {
    for (index, population) in populations.iter().enumerate() {
        rows.push(Row {
            group: group.to_string(),
            stratum: stratum.to_string(),
            population: population.population_type.to_string(),
            count: population.count,
            aggregate: display_decimal(population.aggregate),
            // Score once per block
            score: if index == 0 { score.to_string() } else { String::new() },
        });
    }
}

fn display_decimal(value: Option<Decimal>) -> String {
    value.map(|d| d.normalize().to_string()).unwrap_or_default()
}
