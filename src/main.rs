//! duscan - Streaming disk-usage analyser
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use duscan::config::{CliArgs, ServeConfig};
use duscan::scan::ScanEngine;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();

    setup_logging(args.verbose);

    let config = ServeConfig::from_args(args).context("Invalid configuration")?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    rt.block_on(async {
        let engine = ScanEngine::new();
        duscan::server::serve(engine, config).await
    })
    .context("Server error")?;

    Ok(())
}

fn setup_logging(verbose: bool) {
    let default_filter = if verbose {
        "duscan=debug,info"
    } else {
        "duscan=info,warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
