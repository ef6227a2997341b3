//! CLI domain: parse, route, help, output, and presentation only.
//! No domain orchestration; single route table dispatches to domain services.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::map_error;
pub use parse::{Cli, Commands, OutputFormat};
pub use presentation::{
    format_backfill_json, format_backfill_text, format_config_toml, format_gaps_json,
    format_gaps_text, format_job_json, format_job_text, format_publish_json,
    format_publish_text, format_update_json, format_update_text,
};
pub use route::RunContext;
