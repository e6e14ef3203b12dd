//! Measure evaluation command-line interface

use clap::{Parser, Subcommand};
use octofhir_measure::cli::{evaluate, output, validate};
use std::path::PathBuf;

/// Quality measure command-line tool
#[derive(Parser)]
#[command(name = "measure")]
#[command(author, version, about = "Clinical quality measure evaluation", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (json, pretty, fhir, table)
    #[arg(short = 'f', long, global = true)]
    format: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    color: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a measure against per-subject expression results
    Evaluate {
        /// FHIR Measure resource (JSON)
        #[arg(short, long)]
        measure: PathBuf,

        /// Expression results document (JSON)
        #[arg(short, long)]
        results: PathBuf,

        /// Report type (summary, subject-list, individual)
        #[arg(short = 't', long = "report-type")]
        report_type: Option<String>,

        /// Evaluate a single subject, e.g. Patient/123
        #[arg(short, long)]
        subject: Option<String>,
    },

    /// Validate measure definitions
    Validate {
        /// Measure files to validate
        files: Vec<PathBuf>,
    },
}

fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    output::setup_colors(&cli.color);

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Commands::Evaluate {
            measure,
            results,
            report_type,
            subject,
        } => evaluate::evaluate(evaluate::EvaluateConfig {
            measure,
            results,
            report_type,
            subject,
            verbose: cli.verbose,
            output_format: cli.format.clone(),
            output_file: cli.output.clone(),
        }),

        Commands::Validate { files } => validate::validate(validate::ValidateConfig {
            files,
            verbose: cli.verbose,
        }),
    };

    if let Err(e) = result {
        eprintln!("{}", output::format_error(&e));
        std::process::exit(1);
    }
}
