//! Logging System
//!
//! Structured logging on top of `tracing`. Level, format and destination come from the
//! `[logging]` config section, overridden by `GEOSERIES_LOG*` environment variables.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

pub const ENV_FILTER: &str = "GEOSERIES_LOG";
pub const ENV_FORMAT: &str = "GEOSERIES_LOG_FORMAT";
pub const ENV_OUTPUT: &str = "GEOSERIES_LOG_OUTPUT";
pub const ENV_MODULES: &str = "GEOSERIES_LOG_MODULES";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path when output is "file"
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// Colored output (text format on a terminal stream only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from(".geoseries/geoseries.log")
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: default_log_file(),
            color: default_true(),
            modules: BTreeMap::new(),
        }
    }
}

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    File,
}

/// Line format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber.
///
/// `GEOSERIES_LOG*` environment variables win over the given config, which in turn
/// already carries any CLI flag overrides. `None` means defaults.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), ApiError> {
    let filter = build_env_filter(config)?;
    let output = determine_output(config)?;
    let writer = match output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::File => BoxMakeWriter::new(Arc::new(open_log_file(config)?)),
    };

    let layer: BoxedLayer = match determine_format(config)? {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(writer)
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(output != LogOutput::File && config.map_or(true, |c| c.color))
            .with_writer(writer)
            .boxed(),
    };

    Registry::default()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| ApiError::ConfigError(format!("Failed to install logger: {}", e)))
}

fn open_log_file(config: Option<&LoggingConfig>) -> Result<std::fs::File, ApiError> {
    let path = config.map_or_else(default_log_file, |c| c.file.clone());
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| {
            ApiError::ConfigError(format!("Cannot create log directory {}: {}", dir.display(), e))
        })?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| {
            ApiError::ConfigError(format!("Cannot open log file {}: {}", path.display(), e))
        })
}

/// `GEOSERIES_LOG` replaces everything; otherwise the configured level plus module
/// directives from the config and from `GEOSERIES_LOG_MODULES`.
fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, ApiError> {
    if let Ok(filter) = EnvFilter::try_from_env(ENV_FILTER) {
        return Ok(filter);
    }

    let level = config.map_or("info", |c| c.level.as_str());
    let filter = EnvFilter::new(level);
    if level == "off" {
        return Ok(filter);
    }

    let configured = config
        .map(|c| {
            c.modules
                .iter()
                .map(|(m, l)| (m.clone(), l.clone()))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let filter = add_directives(filter, configured, "config")?;

    match std::env::var(ENV_MODULES) {
        Ok(raw) => add_directives(filter, parse_module_directives(&raw), ENV_MODULES),
        Err(_) => Ok(filter),
    }
}

fn add_directives(
    mut filter: EnvFilter,
    directives: Vec<(String, String)>,
    source: &str,
) -> Result<EnvFilter, ApiError> {
    for (module, level) in directives {
        let raw = format!("{}={}", module, level);
        let directive = raw.parse().map_err(|e| {
            ApiError::ConfigError(format!("Invalid log directive '{}' in {}: {}", raw, source, e))
        })?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

/// Parse `module=level,module=level`, skipping malformed entries.
fn parse_module_directives(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|entry| {
            let (module, level) = entry.split_once('=')?;
            let (module, level) = (module.trim(), level.trim());
            if module.is_empty() || level.is_empty() {
                None
            } else {
                Some((module.to_string(), level.to_string()))
            }
        })
        .collect()
}

/// An unrecognised `GEOSERIES_LOG_FORMAT` is ignored; an unrecognised configured format is an error.
fn determine_format(config: Option<&LoggingConfig>) -> Result<LogFormat, ApiError> {
    if let Some(format) = std::env::var(ENV_FORMAT)
        .ok()
        .and_then(|raw| parse_format(&raw).ok())
    {
        return Ok(format);
    }
    parse_format(config.map_or("text", |c| c.format.as_str()))
}

pub fn parse_format(format: &str) -> Result<LogFormat, ApiError> {
    match format {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(ApiError::ConfigError(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            other
        ))),
    }
}

fn determine_output(config: Option<&LoggingConfig>) -> Result<LogOutput, ApiError> {
    match std::env::var(ENV_OUTPUT) {
        Ok(output) => parse_output(&output),
        Err(_) => parse_output(config.map_or("stderr", |c| c.output.as_str())),
    }
}

pub fn parse_output(output: &str) -> Result<LogOutput, ApiError> {
    match output {
        "stdout" => Ok(LogOutput::Stdout),
        "stderr" => Ok(LogOutput::Stderr),
        "file" => Ok(LogOutput::File),
        other => Err(ApiError::ConfigError(format!(
            "Invalid log output: {} (must be 'stdout', 'stderr' or 'file')",
            other
        ))),
    }
}
