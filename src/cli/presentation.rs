//! CLI presentation: text and json formatters per command family.

mod backfill;
mod publish;
mod shared;

pub use backfill::{
    format_backfill_json, format_backfill_text, format_gaps_json, format_gaps_text,
    format_job_json, format_job_text,
};
pub use publish::{format_publish_json, format_publish_text, format_update_json, format_update_text};
pub use shared::format_config_toml;
