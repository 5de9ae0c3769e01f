//! ingot-recover: salvage JSON objects from a damaged export
//!
//! Usage:
//!   ingot-recover data/fake_property_data_new.json data/recovered_objects.jsonl

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use ingot::logging::{init_logging, LogConfig};
use ingot::recover::recover_file;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ingot-recover")]
#[command(about = "Recover JSON objects from a damaged file into JSON Lines", long_about = None)]
struct Args {
    /// Damaged input file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// JSON Lines output file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&LogConfig::from_verbosity(args.verbose)).context("Failed to initialize logging")?;

    let report = recover_file(&args.input, &args.output)
        .with_context(|| format!("Failed to recover objects from {}", args.input.display()))?;

    println!("Found possible objects: {}", report.found);
    println!("Valid JSON objects recovered: {}", report.recovered);
    println!("Saved to {}", args.output.display());
    Ok(())
}
