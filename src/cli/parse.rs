//! CLI parse: clap types for geoseries. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// geoseries - incremental per-subdivision raster time series
#[derive(Parser)]
#[command(name = "geoseries")]
#[command(about = "Backfill per-subdivision raster statistics into a cumulative table and publish it")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (replaces global and workspace config files)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Disable logging
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (used when output is "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Backfill, wait for the export, then publish the new table and the configured containers
    Update {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Backfill missing periods and submit the export
    Backfill {
        /// Return after submitting the export instead of waiting for it
        #[arg(long)]
        no_wait: bool,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Show available, processed and missing periods
    Gaps {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Make every resource in the given containers public
    Publish {
        /// Containers to publish (default: configured publish.containers)
        containers: Vec<String>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Show the status of an export job
    Job {
        job_id: String,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Print the effective configuration as TOML
    Config,
}
