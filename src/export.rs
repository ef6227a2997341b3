//! Export job control: submit a table export and poll it to a terminal state.

use crate::error::PlatformError;
use crate::platform::{JobHandle, JobState, SharedPlatform};
use crate::table::FeatureCollection;
use serde::Serialize;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

/// Polling cadence and budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            max_wait: Duration::from_secs(1800),
        }
    }
}

/// How waiting on a job ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed { elapsed_secs: u64 },
    Failed { message: String },
    Cancelled,
    /// Client-side only; the remote job may still finish.
    TimedOut { last_state: Option<JobState> },
    InvalidHandle,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Completed { .. } => "COMPLETED",
            JobOutcome::Failed { .. } => "FAILED",
            JobOutcome::Cancelled => "CANCELLED",
            JobOutcome::TimedOut { .. } => "TIMED_OUT",
            JobOutcome::InvalidHandle => "INVALID_HANDLE",
        }
    }
}

pub struct ExportController {
    platform: SharedPlatform,
}

impl ExportController {
    pub fn new(platform: SharedPlatform) -> Self {
        Self { platform }
    }

    /// Start writing `table` to `destination`. The job runs remotely.
    pub async fn submit(
        &self,
        table: &FeatureCollection,
        destination: &str,
        description: &str,
    ) -> Result<JobHandle, PlatformError> {
        let handle = self
            .platform
            .start_export(table, destination, description)
            .await?;
        info!(
            job_id = %handle.id,
            destination,
            description,
            rows = table.len(),
            "Export task started"
        );
        Ok(handle)
    }

    /// Poll until a terminal state or `max_wait`. Returns true only on `COMPLETED`.
    pub async fn await_completion(
        &self,
        handle: &JobHandle,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> bool {
        self.await_outcome(handle, poll_interval, max_wait)
            .await
            .is_success()
    }

    /// Poll a job and report how waiting ended.
    ///
    /// Status lines are logged on state transitions only. Errors while polling are
    /// retried after `poll_interval` within the same `max_wait` budget.
    pub async fn await_outcome(
        &self,
        handle: &JobHandle,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> JobOutcome {
        if handle.id.trim().is_empty() {
            error!("Task has no valid ID");
            return JobOutcome::InvalidHandle;
        }

        let started = Instant::now();
        let mut previous: Option<JobState> = None;
        info!(job_id = %handle.id, "Monitoring task");

        while started.elapsed() < max_wait {
            match self.platform.job_status(&handle.id).await {
                Ok(status) => {
                    if previous != Some(status.state) {
                        info!(job_id = %handle.id, state = %status.state, "Task status");
                        previous = Some(status.state);
                    }
                    match status.state {
                        JobState::Completed => {
                            let elapsed_secs = started.elapsed().as_secs();
                            info!(job_id = %handle.id, elapsed_secs, "Task completed successfully");
                            return JobOutcome::Completed { elapsed_secs };
                        }
                        JobState::Failed => {
                            let message = status
                                .error_message
                                .unwrap_or_else(|| "No error message".to_string());
                            error!(job_id = %handle.id, error = %message, "Task failed");
                            return JobOutcome::Failed { message };
                        }
                        JobState::Cancelled => {
                            error!(job_id = %handle.id, "Task was cancelled");
                            return JobOutcome::Cancelled;
                        }
                        JobState::Pending | JobState::Running => {}
                    }
                }
                Err(e) => {
                    warn!(job_id = %handle.id, error = %e, "Error checking task status");
                }
            }

            let remaining = max_wait.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break;
            }
            sleep(poll_interval.min(remaining)).await;
        }

        warn!(
            job_id = %handle.id,
            max_wait_secs = max_wait.as_secs(),
            "Timed out waiting for task"
        );
        JobOutcome::TimedOut {
            last_state: previous,
        }
    }
}
