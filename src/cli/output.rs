//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::{ApiError, PipelineError};

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::Pipeline(PipelineError::LeaseHeld { .. }) => {
            format!("{}\nAnother backfill is running; retry once it finishes.", e)
        }
        ApiError::ConfigError(_) => format!("{}\nCheck config/config.toml or --config.", e),
        _ => e.to_string(),
    }
}
