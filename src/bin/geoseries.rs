//! geoseries CLI Binary
//!
//! Command-line interface for the incremental raster time series backfill.

use clap::Parser;
use geoseries::cli::{Cli, RunContext};
use geoseries::config::ConfigLoader;
use geoseries::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("geoseries starting");

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            process::exit(1);
        }
    };

    let context = match RunContext::new(cli.workspace.clone(), cli.config.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Error initializing workspace: {}", e);
            eprintln!("{}", geoseries::cli::map_error(&e));
            process::exit(1);
        }
    };

    match runtime.block_on(context.execute(&cli.command)) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{}", geoseries::cli::map_error(&e));
            process::exit(1);
        }
    }
}

/// Logging settings for this invocation: the `[logging]` section of whichever config
/// the command will load, with CLI flags applied on top. `GEOSERIES_LOG*` environment
/// variables still win inside `init_logging`.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let loaded = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(&cli.workspace),
    };
    // A broken config is reported by RunContext after logging is up.
    let mut config = loaded.map(|c| c.logging).unwrap_or_default();

    let level = if cli.quiet {
        Some("off".to_string())
    } else if cli.verbose {
        Some("debug".to_string())
    } else {
        None
    };
    if let Some(level) = cli.log_level.clone().or(level) {
        config.level = level;
    }
    if let Some(format) = &cli.log_format {
        config.format = format.clone();
    }
    if let Some(output) = &cli.log_output {
        config.output = output.clone();
    }

    if let Some(file) = &cli.log_file {
        config.file = file.clone();
    } else if config.file.is_relative() {
        config.file = cli.workspace.join(&config.file);
    }
    config
}
