//! Publish and update presentation: text/json.

use super::backfill::format_backfill_text;
use super::shared::{table, to_json};
use crate::error::ApiError;
use crate::update::{ContainerReport, TargetPublication, UpdateReport};

pub fn format_publish_text(reports: &[ContainerReport]) -> String {
    if reports.is_empty() {
        return "No containers to publish.".to_string();
    }
    let mut t = table();
    t.set_header(vec![
        "Container",
        "Listed",
        "Already public",
        "Made public",
        "Failed",
    ]);
    for report in reports {
        match (&report.summary, &report.error) {
            (Some(s), _) => t.add_row(vec![
                report.container.clone(),
                s.listed.to_string(),
                s.already_public.to_string(),
                s.made_public.to_string(),
                s.failed.to_string(),
            ]),
            (None, error) => t.add_row(vec![
                report.container.clone(),
                format!("error: {}", error.as_deref().unwrap_or("unknown")),
                "-".to_string(),
                "-".to_string(),
                "-".to_string(),
            ]),
        };
    }
    t.to_string()
}

pub fn format_publish_json(reports: &[ContainerReport]) -> Result<String, ApiError> {
    to_json(reports)
}

pub fn format_update_text(report: &UpdateReport) -> String {
    let mut output = String::from("STEP 1: PROCESSING\n");
    output.push_str(&format_backfill_text(
        &report.backfill,
        report.job_outcome.as_ref(),
    ));
    output.push('\n');
    if report.job_outcome.is_some() {
        let target = match &report.target {
            Some(TargetPublication::MadePublic) => "made public".to_string(),
            Some(TargetPublication::ContainerFallback {
                made_public,
                failed,
            }) => format!(
                "published with its container ({} made public, {} failed)",
                made_public, failed
            ),
            Some(TargetPublication::Failed { message }) => format!("not published: {}", message),
            None => "not published (export did not complete)".to_string(),
        };
        output.push_str(&format!("Publication: {}\n", target));
    }
    output.push_str("\nSTEP 2: PUBLISHING\n");
    output.push_str(&format_publish_text(&report.containers));
    output
}

pub fn format_update_json(report: &UpdateReport) -> Result<String, ApiError> {
    to_json(report)
}
