//! Backfill, gaps and job presentation: text/json.

use super::shared::{join_periods, table, to_json};
use crate::error::ApiError;
use crate::export::JobOutcome;
use crate::pipeline::{BackfillResult, PeriodGaps};
use crate::platform::JobStatus;
use serde_json::json;

pub fn format_backfill_text(result: &BackfillResult, outcome: Option<&JobOutcome>) -> String {
    let mut output = format!("Status: {}\n", result.status.as_str());
    if let Some(source) = &result.source_table_id {
        output.push_str(&format!("Source table: {}\n", source));
    }
    output.push_str(&format!(
        "Periods processed ({}): {}\n",
        result.total_periods(),
        join_periods(&result.periods_processed)
    ));
    if !result.periods_skipped.is_empty() {
        let mut skipped = table();
        skipped.set_header(vec!["Skipped period", "Asset", "Reason"]);
        for s in &result.periods_skipped {
            skipped.add_row(vec![s.period.to_string(), s.asset_id.clone(), s.reason.clone()]);
        }
        output.push_str(&format!("{}\n", skipped));
    }
    if let Some(table_id) = &result.new_table_id {
        output.push_str(&format!("New table: {}\n", table_id));
    }
    if let Some(job) = &result.job {
        output.push_str(&format!("Export job: {} ({})\n", job.id, job.description));
    }
    if let Some(outcome) = outcome {
        output.push_str(&format!("Export outcome: {}\n", describe_outcome(outcome)));
    }
    if let Some(error) = &result.error {
        output.push_str(&format!("Error: {}\n", error));
    }
    output.push_str(&format!("Last run: {}", result.last_run));
    output
}

pub fn format_backfill_json(
    result: &BackfillResult,
    outcome: Option<&JobOutcome>,
) -> Result<String, ApiError> {
    to_json(&json!({ "backfill": result, "job_outcome": outcome }))
}

fn describe_outcome(outcome: &JobOutcome) -> String {
    match outcome {
        JobOutcome::Completed { elapsed_secs } => format!("COMPLETED in {}s", elapsed_secs),
        JobOutcome::Failed { message } => format!("FAILED: {}", message),
        JobOutcome::TimedOut {
            last_state: Some(state),
        } => format!("TIMED_OUT (last state {})", state),
        other => other.label().to_string(),
    }
}

pub fn format_gaps_text(gaps: &PeriodGaps) -> String {
    let mut t = table();
    t.set_header(vec!["Set", "Count", "Periods"]);
    t.add_row(vec![
        "available".to_string(),
        gaps.available.len().to_string(),
        join_periods(&gaps.available),
    ]);
    t.add_row(vec![
        "processed".to_string(),
        gaps.processed.len().to_string(),
        join_periods(&gaps.processed),
    ]);
    t.add_row(vec![
        "missing".to_string(),
        gaps.missing.len().to_string(),
        join_periods(&gaps.missing),
    ]);
    t.to_string()
}

pub fn format_gaps_json(gaps: &PeriodGaps) -> Result<String, ApiError> {
    to_json(gaps)
}

pub fn format_job_text(status: &JobStatus) -> String {
    let mut output = format!("Job: {}\nState: {}\n", status.id, status.state);
    output.push_str(&format!("Destination: {}\n", status.destination));
    if let Some(message) = &status.error_message {
        output.push_str(&format!("Error: {}\n", message));
    }
    output.push_str(&format!("Updated: {}", status.updated_at));
    output
}

pub fn format_job_json(status: &JobStatus) -> Result<String, ApiError> {
    to_json(status)
}
