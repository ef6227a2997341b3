//! Error types for the geoseries backfill pipeline.

use thiserror::Error;

/// Failures reported by a geospatial platform backend.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Wrong resource kind for {id}: expected {expected}")]
    WrongKind { id: String, expected: &'static str },

    #[error("Platform request failed: {0}")]
    Transient(String),

    #[error("Computation failed: {0}")]
    Computation(String),

    #[error("Invalid geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Malformed resource {id}: {message}")]
    Malformed { id: String, message: String },

    #[error("Platform I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PlatformError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PlatformError::NotFound(_))
    }
}

/// Geometry validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("geometry is missing")]
    Missing,

    #[error("geometry has no rings")]
    Empty,

    #[error("ring {ring} has {points} points (need at least 4)")]
    TooFewPoints { ring: usize, points: usize },

    #[error("ring {ring} is not closed")]
    Unclosed { ring: usize },

    #[error("ring {ring} contains a non-finite coordinate")]
    NonFinite { ring: usize },
}

/// Resource naming errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    #[error("Invalid period label '{0}' (expected YYYY-M)")]
    InvalidPeriod(String),

    #[error("Name '{name}' does not follow the source naming convention: {reason}")]
    Unparsable { name: String, reason: String },
}

/// Reasons a period could not be aggregated; the table is left unchanged
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("cannot derive period from asset id: {0}")]
    Period(#[from] NamingError),

    #[error("row {row} has no '{attribute}' code")]
    MissingCode { row: usize, attribute: String },

    #[error("no reference geometry for subdivision {0}")]
    UnknownSubdivision(String),

    #[error("no valid pixels over {0}")]
    NoData(String),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Pipeline-level failures that abort a run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Source asset not found for period {period}. Tried: {}", tried.join(" and "))]
    AssetNotFound { period: String, tried: Vec<String> },

    #[error("No metrics table found in {0}")]
    TableNotFound(String),

    #[error("Rows of {0} do not share the same period columns")]
    NonUniformTable(String),

    #[error("Run lease {lease_id} is held by {owner} since {acquired_at}")]
    LeaseHeld {
        lease_id: String,
        owner: String,
        acquired_at: String,
    },

    #[error("Naming error: {0}")]
    Naming(#[from] NamingError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

/// Errors surfaced at the command boundary
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Backfill run ended with status {status}: {message}")]
    RunFailed { status: String, message: String },

    #[error("Output error: {0}")]
    Output(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
