//! CLI command-name contract for logging and routing.

use crate::cli::parse::Commands;

/// Command name string used in log fields (e.g. "backfill", "publish").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Update { .. } => "update",
        Commands::Backfill { .. } => "backfill",
        Commands::Gaps { .. } => "gaps",
        Commands::Publish { .. } => "publish",
        Commands::Job { .. } => "job",
        Commands::Config => "config",
    }
}
