//! ingot-load: load a JSON Lines file into relational tables
//!
//! Connection settings come from the environment (`DB_USER`, `DB_PASS`,
//! `DB_HOST`, `DB_PORT`, `DB_NAME`, optional `DB_DRIVER=mysql|sqlite`).
//! Variables left unset are read from `./.env`, or from `--env-file`.
//!
//! Usage:
//!   ingot-load --jsonl data/recovered_objects.jsonl --config fields.xlsx
//!
//!   # different root table, debug logging and summary as JSON
//!   ingot-load --jsonl listings.jsonl --config fields.tsv \
//!       --root-table listing -v --log-format json

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use ingot::config::read_env_file;
use ingot::logging::{init_logging, LogConfig, LogFormat};
use ingot::{DbSettings, LoadConfig, LoadJob, LoadSummary};
use std::collections::HashMap;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "ingot-load")]
#[command(about = "Load JSON Lines records into relational tables", long_about = None)]
struct Args {
    /// JSON Lines input file
    #[arg(long, value_name = "PATH")]
    jsonl: PathBuf,

    /// Field mapping with column name and target table headers
    /// (.xlsx/.xls/.ods workbook, .tsv, or CSV)
    #[arg(long, value_name = "PATH")]
    config: PathBuf,

    /// Dotenv file with connection settings [default: ./.env if present]
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Table every other table references
    #[arg(long, default_value = "property")]
    root_table: String,

    /// Leading input lines sampled for type inference
    #[arg(long, default_value_t = 201)]
    sample_lines: usize,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Don't show the record counter
    #[arg(long)]
    no_progress: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_config = LogConfig::from_verbosity(args.verbose)
        .with_format(args.log_format)
        .with_ansi(std::io::stderr().is_terminal());
    if let Err(e) = init_logging(&log_config) {
        eprintln!("warning: logging not initialized: {}", e);
    }

    let log_format = args.log_format;
    match run(args) {
        Ok(summary) => {
            match log_format {
                LogFormat::Json => print_summary_json(&summary),
                _ => print_summary(&summary),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "load failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<LoadSummary> {
    let env_file = load_env_file(args.env_file.as_deref())?;
    let settings =
        DbSettings::from_env_with_file(&env_file).context("Failed to resolve database settings")?;

    let mut config = LoadConfig::default().with_root_table(args.root_table);
    config.sample_lines = args.sample_lines;

    let job = LoadJob {
        jsonl: args.jsonl,
        mapping: args.config,
        config,
        show_progress: !args.no_progress,
    };

    ingot::run_load(&job, &settings)
        .with_context(|| format!("Failed to load {}", job.jsonl.display()))
}

/// An explicit `--env-file` must exist; the implicit `./.env` is optional
fn load_env_file(explicit: Option<&Path>) -> Result<HashMap<String, String>> {
    let path = match explicit {
        Some(path) => path,
        None if Path::new(".env").is_file() => Path::new(".env"),
        None => return Ok(HashMap::new()),
    };
    let values = read_env_file(path)?;
    tracing::debug!(path = %path.display(), variables = values.len(), "env file read");
    Ok(values)
}

fn print_summary_json(summary: &LoadSummary) {
    match serde_json::to_string(summary) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            tracing::warn!(error = %e, "summary not serializable");
            print_summary(summary);
        }
    }
}

fn print_summary(summary: &LoadSummary) {
    println!("ETL finished. Rows processed: {}", summary.records_processed);
    println!("  lines read:          {}", summary.lines_read);
    println!("  records committed:   {}", summary.records_committed);
    println!("  malformed lines:     {}", summary.malformed_lines);
    println!("  root failures:       {}", summary.root_failures);
    println!("  commit failures:     {}", summary.commit_failures);
    println!("  child rows written:  {}", summary.child_rows_written);
    println!("  child rows dropped:  {}", summary.child_rows_failed);
}
