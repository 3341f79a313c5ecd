//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the real entry point that:
//! - loads `.env` and parses CLI arguments
//! - sets up logging
//! - runs the configuration pipeline
//! - prints the run summary

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::data::Tempo2Loader;
use crate::error::AppError;
use crate::models::StandardModels;

pub mod pipeline;

/// Entry point for the `ewarp` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let catalogue = StandardModels::new();
    let output = pipeline::run_analysis(&cli.prfile, &cli.overrides(), cli.num, &catalogue, &Tempo2Loader)?;

    println!(
        "{}",
        crate::report::format_run_summary(&output.params, &output.pulsars, &output.models)
    );
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
