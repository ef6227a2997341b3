//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
///
/// Later sources replace earlier values key by key; lists are replaced whole.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("platform.root", ".geoseries/platform")?
        .set_default("source.container", "HS")?
        .set_default("table.container", "MetricsHSTransposed")?
        .set_default("export.poll_interval_secs", 15)?
        .set_default("export.max_wait_secs", 1800)?
        .set_default("lease.enabled", true)
}
