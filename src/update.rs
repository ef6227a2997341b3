//! Full update: backfill, wait for the export, publish the new table and the containers.

use crate::export::{ExportController, JobOutcome, PollSettings};
use crate::pipeline::{BackfillResult, BackfillStatus, TableBuilder};
use crate::platform::SharedPlatform;
use crate::publish::{AccessPublisher, PublishSummary};
use serde::Serialize;
use tracing::{error, info, warn};

/// Where the update reads and publishes.
#[derive(Debug, Clone)]
pub struct UpdateTargets {
    pub source_container: String,
    pub table_container: String,
    /// Containers made public after the backfill, in order
    pub publish_containers: Vec<String>,
}

/// Outcome of publishing one container.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerReport {
    pub container: String,
    pub summary: Option<PublishSummary>,
    pub error: Option<String>,
}

impl ContainerReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// How the new table was published, when an export completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPublication {
    /// The table itself was flipped to public
    MadePublic,
    /// `make_public` reported no change; the table container was published instead
    ContainerFallback { made_public: usize, failed: usize },
    /// Fallback listing failed too
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub backfill: BackfillResult,
    pub job_outcome: Option<JobOutcome>,
    pub target: Option<TargetPublication>,
    pub containers: Vec<ContainerReport>,
}

impl UpdateReport {
    /// Only a backfill `ERROR` makes the update fail; publication problems are reported.
    pub fn is_failure(&self) -> bool {
        self.backfill.status == BackfillStatus::Error
    }

    pub fn task_completed(&self) -> bool {
        self.job_outcome
            .as_ref()
            .map(JobOutcome::is_success)
            .unwrap_or(false)
    }
}

pub struct Updater {
    platform: SharedPlatform,
    builder: TableBuilder,
    poll: PollSettings,
}

impl Updater {
    pub fn new(platform: SharedPlatform, builder: TableBuilder, poll: PollSettings) -> Self {
        Self {
            platform,
            builder,
            poll,
        }
    }

    pub async fn run(&self, targets: &UpdateTargets) -> UpdateReport {
        info!(
            source = %targets.source_container,
            table = %targets.table_container,
            "Processing new data"
        );
        let backfill = self
            .builder
            .run(&targets.source_container, &targets.table_container)
            .await;
        info!(status = backfill.status.as_str(), "Processing finished");

        let controller = ExportController::new(self.platform.clone());
        let publisher = AccessPublisher::new(self.platform.clone());

        let mut job_outcome = None;
        let mut target = None;
        if let (Some(job), Some(table_id)) = (&backfill.job, &backfill.new_table_id) {
            let outcome = controller
                .await_outcome(job, self.poll.poll_interval, self.poll.max_wait)
                .await;
            if outcome.is_success() {
                target = Some(
                    publish_target(&publisher, table_id, &targets.table_container).await,
                );
            } else {
                warn!(
                    job_id = %job.id,
                    outcome = outcome.label(),
                    "Export did not complete; new table not published"
                );
            }
            job_outcome = Some(outcome);
        }

        let containers = publish_containers(&publisher, &targets.publish_containers).await;

        UpdateReport {
            backfill,
            job_outcome,
            target,
            containers,
        }
    }
}

/// Publish each container in order. A failing container is reported and the rest still run.
pub async fn publish_containers(
    publisher: &AccessPublisher,
    containers: &[String],
) -> Vec<ContainerReport> {
    let mut reports = Vec::with_capacity(containers.len());
    for container in containers {
        info!(container = %container, "Publishing container");
        let report = match publisher.publish_container(container).await {
            Ok(summary) => ContainerReport {
                container: container.clone(),
                summary: Some(summary),
                error: None,
            },
            Err(e) => {
                error!(container = %container, error = %e, "Error making assets public");
                ContainerReport {
                    container: container.clone(),
                    summary: None,
                    error: Some(e.to_string()),
                }
            }
        };
        reports.push(report);
    }
    reports
}

async fn publish_target(
    publisher: &AccessPublisher,
    table_id: &str,
    table_container: &str,
) -> TargetPublication {
    if publisher.make_public(table_id).await {
        return TargetPublication::MadePublic;
    }
    info!(table_id, "Publishing the whole table container instead");
    match publisher.publish_container(table_container).await {
        Ok(summary) => TargetPublication::ContainerFallback {
            made_public: summary.made_public,
            failed: summary.failed,
        },
        Err(e) => TargetPublication::Failed {
            message: e.to_string(),
        },
    }
}
