//! The full update: backfill, wait, publish.

use super::support::*;
use geoseries::export::{JobOutcome, PollSettings};
use geoseries::naming::NameVariant;
use geoseries::pipeline::{BackfillStatus, TableBuilder};
use geoseries::platform::{JobState, SharedPlatform};
use geoseries::publish::AccessPublisher;
use geoseries::update::{TargetPublication, UpdateTargets, Updater};
use std::sync::Arc;
use std::time::Duration;

fn targets() -> UpdateTargets {
    UpdateTargets {
        source_container: SOURCE.to_string(),
        table_container: TABLE.to_string(),
        publish_containers: vec![SOURCE.to_string(), TABLE.to_string()],
    }
}

fn poll() -> PollSettings {
    PollSettings {
        poll_interval: Duration::from_millis(5),
        max_wait: Duration::from_secs(5),
    }
}

fn updater(platform: SharedPlatform) -> Updater {
    Updater::new(
        platform.clone(),
        TableBuilder::new(platform, settings()),
        poll(),
    )
}

#[tokio::test]
async fn new_table_is_exported_and_published() {
    let fx = Fixture::new();
    fx.add_raster("2024-1", NameVariant::Compact, Some(1.0), Some(1.0));
    fx.add_raster("2024-2", NameVariant::Compact, Some(2.0), Some(2.0));
    fx.add_snapshot("2024_1", &["2024-1"]);
    let platform = fx.shared();

    let report = updater(platform.clone()).run(&targets()).await;

    assert_eq!(report.backfill.status, BackfillStatus::Completed);
    assert!(!report.is_failure());
    assert!(report.task_completed());
    assert_eq!(report.target, Some(TargetPublication::MadePublic));
    assert_eq!(report.containers.len(), 2);
    assert!(report.containers.iter().all(|c| c.succeeded()));

    let publisher = AccessPublisher::new(platform);
    assert!(publisher.is_public("MetricsHSTransposed/2024_2").await);
    assert!(publisher.is_public("MetricsHSTransposed/2024_1").await);
    assert!(publisher.is_public("HS/SM2024Valparaiso_GCOM_mes2").await);
}

#[tokio::test]
async fn up_to_date_table_still_publishes_containers() {
    let fx = Fixture::new();
    fx.add_raster("2024-1", NameVariant::Compact, Some(1.0), Some(1.0));
    fx.add_snapshot("2024_1", &["2024-1"]);

    let report = updater(fx.shared()).run(&targets()).await;

    assert_eq!(report.backfill.status, BackfillStatus::NoProcessingNeeded);
    assert!(report.job_outcome.is_none());
    assert!(report.target.is_none());
    assert!(!report.task_completed());
    assert_eq!(report.containers[1].summary.as_ref().unwrap().made_public, 1);
}

#[tokio::test]
async fn failed_export_leaves_new_table_unpublished() {
    let fx = Fixture::new();
    fx.add_raster("2024-1", NameVariant::Compact, Some(1.0), Some(1.0));
    fx.add_raster("2024-2", NameVariant::Compact, Some(2.0), Some(2.0));
    fx.add_snapshot("2024_1", &["2024-1"]);
    let scripted = Arc::new(ScriptedPlatform::new(fx.local.clone()).script_jobs(vec![
        Poll::State(JobState::Running, None),
        Poll::State(JobState::Failed, Some("quota exceeded".to_string())),
    ]));
    let platform: SharedPlatform = scripted.clone();

    let report = updater(platform).run(&targets()).await;

    assert_eq!(report.backfill.status, BackfillStatus::Completed);
    assert!(!report.is_failure());
    assert_eq!(
        report.job_outcome,
        Some(JobOutcome::Failed {
            message: "quota exceeded".to_string()
        })
    );
    assert!(report.target.is_none());
    assert!(!scripted
        .set_acl_calls
        .lock()
        .iter()
        .any(|id| id == "MetricsHSTransposed/2024_2"));
    // Containers are still published
    assert!(scripted
        .set_acl_calls
        .lock()
        .iter()
        .any(|id| id == "MetricsHSTransposed/2024_1"));
}

#[tokio::test]
async fn backfill_error_is_a_failure_but_containers_are_published() {
    let fx = Fixture::new();
    fx.add_raster("2024-2", NameVariant::Compact, Some(2.0), Some(2.0));
    fx.add_snapshot("2024_1", &["2024-1"]);
    let scripted = Arc::new(
        ScriptedPlatform::new(fx.local.clone()).hide_raster("HS/SM2024Valparaiso_GCOM_mes2"),
    );
    let platform: SharedPlatform = scripted.clone();

    let report = updater(platform).run(&targets()).await;

    assert_eq!(report.backfill.status, BackfillStatus::Error);
    assert!(report.is_failure());
    assert!(report.job_outcome.is_none());
    assert_eq!(report.containers.len(), 2);
    assert!(!scripted.set_acl_calls.lock().is_empty());
}
