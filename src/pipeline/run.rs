//! Single backfill entry point: lease, gaps, resolve, aggregate, repair, submit.
//! Callers (CLI, update orchestration) use [`TableBuilder::run`] only.

use crate::error::{PipelineError, PlatformError};
use crate::export::ExportController;
use crate::naming::{last_segment, SourceNaming};
use crate::period::PeriodLabel;
use crate::pipeline::aggregate::{Aggregation, AggregationSettings, SpatialAggregator};
use crate::pipeline::gaps::{processed_periods, GapResolver};
use crate::pipeline::lease::RunLease;
use crate::pipeline::repair::repair_geometries;
use crate::pipeline::resolve::AssetResolver;
use crate::platform::{JobHandle, ResourceKind, SharedPlatform};
use crate::table::FeatureCollection;
use crate::telemetry::{emit_event, new_run_id, now_rfc3339};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

/// Terminal status of a backfill run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackfillStatus {
    NoProcessingNeeded,
    Completed,
    /// Missing periods existed but none could be aggregated; nothing exported.
    NothingAggregated,
    Error,
}

impl BackfillStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BackfillStatus::NoProcessingNeeded => "NO_PROCESSING_NEEDED",
            BackfillStatus::Completed => "COMPLETED",
            BackfillStatus::NothingAggregated => "NOTHING_AGGREGATED",
            BackfillStatus::Error => "ERROR",
        }
    }
}

/// A missing period that stays missing for the next run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPeriod {
    pub period: PeriodLabel,
    pub asset_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackfillResult {
    pub status: BackfillStatus,
    pub periods_processed: Vec<PeriodLabel>,
    pub periods_skipped: Vec<SkippedPeriod>,
    pub source_table_id: Option<String>,
    pub new_table_id: Option<String>,
    pub job: Option<JobHandle>,
    pub last_run: String,
    pub error: Option<String>,
}

impl BackfillResult {
    fn empty(status: BackfillStatus) -> Self {
        Self {
            status,
            periods_processed: Vec::new(),
            periods_skipped: Vec::new(),
            source_table_id: None,
            new_table_id: None,
            job: None,
            last_run: now_rfc3339(),
            error: None,
        }
    }

    pub fn total_periods(&self) -> usize {
        self.periods_processed.len()
    }
}

/// Everything a run needs besides the two containers.
#[derive(Debug, Clone)]
pub struct BackfillSettings {
    pub naming: SourceNaming,
    pub subdivisions_id: String,
    pub aggregation: AggregationSettings,
    /// Prefix of the export task description, e.g. `HS_Update`
    pub description_prefix: String,
    /// `None` disables the run lease
    pub lease_stale_after: Option<Duration>,
}

pub struct TableBuilder {
    platform: SharedPlatform,
    settings: BackfillSettings,
}

impl TableBuilder {
    pub fn new(platform: SharedPlatform, settings: BackfillSettings) -> Self {
        Self { platform, settings }
    }

    /// Run one incremental backfill. Never returns `Err`; failures become status `ERROR`.
    pub async fn run(&self, source_container: &str, table_container: &str) -> BackfillResult {
        let lease = match self.settings.lease_stale_after {
            Some(stale_after) => {
                let lease_id = RunLease::lease_id_for(table_container);
                match RunLease::acquire(
                    self.platform.clone(),
                    &lease_id,
                    &new_run_id(),
                    stale_after,
                )
                .await
                {
                    Ok(lease) => Some(lease),
                    Err(e) => return self.failed(e),
                }
            }
            None => None,
        };

        let outcome = self.run_unleased(source_container, table_container).await;

        if let Some(lease) = lease {
            if let Err(e) = lease.release().await {
                warn!(error = %e, "Failed to release run lease");
            }
        }

        let result = match outcome {
            Ok(result) => result,
            Err(e) => self.failed(e),
        };
        emit_event("backfill_finished", &result);
        result
    }

    fn failed(&self, e: PipelineError) -> BackfillResult {
        error!(error = %e, "Error in backfill processing");
        let mut result = BackfillResult::empty(BackfillStatus::Error);
        result.error = Some(e.to_string());
        result
    }

    async fn run_unleased(
        &self,
        source_container: &str,
        table_container: &str,
    ) -> Result<BackfillResult, PipelineError> {
        let Snapshot {
            id: snapshot_id,
            table,
        } = latest_snapshot(&self.platform, table_container).await?;
        info!(table_id = %snapshot_id, "Latest metrics table");
        if !table.has_uniform_period_columns() {
            return Err(PipelineError::NonUniformTable(snapshot_id));
        }

        let gaps = GapResolver::new(self.platform.clone(), self.settings.naming.clone())
            .resolve(source_container, &table)
            .await?;
        let mut missing = gaps.missing.clone();
        missing.sort();
        info!(
            available = ?labels(&gaps.available),
            processed = ?labels(&gaps.processed),
            missing = ?labels(&missing),
            "Computed period gaps"
        );

        if missing.is_empty() {
            info!("No missing periods; nothing to export");
            let mut result = BackfillResult::empty(BackfillStatus::NoProcessingNeeded);
            result.source_table_id = Some(snapshot_id);
            return Ok(result);
        }

        let references = self
            .platform
            .read_table(&self.settings.subdivisions_id)
            .await?;
        let resolver = AssetResolver::new(
            self.platform.clone(),
            self.settings.naming.clone(),
            source_container,
        );
        let aggregator = SpatialAggregator::new(
            self.platform.clone(),
            self.settings.naming.clone(),
            &references,
            self.settings.aggregation.clone(),
        );

        info!(count = missing.len(), "Processing missing periods");
        let mut working = table;
        let mut processed = Vec::new();
        let mut skipped = Vec::new();
        for period in missing {
            info!(period = %period, "Processing period");
            let asset = resolver.resolve(period).await?;
            match aggregator.aggregate(&asset.id, working).await {
                Aggregation::Added {
                    period: added,
                    table,
                } if added == period => {
                    processed.push(period);
                    working = table;
                }
                Aggregation::Added { period: added, .. } => {
                    // The column was written under another label; discard it and keep the previous table.
                    return Err(PipelineError::Platform(PlatformError::Computation(format!(
                        "asset {} aggregated as {} instead of {}",
                        asset.id, added, period
                    ))));
                }
                Aggregation::Unchanged { table, reason } => {
                    warn!(period = %period, reason = %reason, "Period left for the next run");
                    skipped.push(SkippedPeriod {
                        period,
                        asset_id: asset.id,
                        reason,
                    });
                    working = table;
                }
            }
        }

        let mut result = BackfillResult::empty(BackfillStatus::NothingAggregated);
        result.source_table_id = Some(snapshot_id);
        result.periods_skipped = skipped;
        let Some(first) = processed.first().copied() else {
            warn!("No missing period could be aggregated; nothing exported");
            return Ok(result);
        };

        let repair = repair_geometries(
            working,
            &references,
            &self.settings.aggregation.id_attribute,
        );
        if !repair.unresolved.is_empty() {
            warn!(
                rows = repair.unresolved.len(),
                "Rows left without a valid geometry"
            );
        }

        let suffix = first.resource_suffix();
        let destination = format!("{}/{}", table_container.trim_end_matches('/'), suffix);
        if !repair.table.has_uniform_period_columns() {
            return Err(PipelineError::NonUniformTable(destination));
        }
        let description = format!("{}_{}", self.settings.description_prefix, suffix);
        let job = ExportController::new(self.platform.clone())
            .submit(&repair.table, &destination, &description)
            .await?;

        result.status = BackfillStatus::Completed;
        result.periods_processed = processed;
        result.new_table_id = Some(destination);
        result.job = Some(job);
        Ok(result)
    }
}

/// A table snapshot read from the table container.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: String,
    pub table: FeatureCollection,
}

/// The snapshot holding the most period columns.
///
/// Each export is the previous latest snapshot plus new columns, but it is named after
/// the earliest period it added, so a retried older period can produce a newer snapshot
/// with an older name. Ties go to the newest contained period, then the period in the
/// name, then the name. Unreadable tables are skipped.
pub async fn latest_snapshot(
    platform: &SharedPlatform,
    table_container: &str,
) -> Result<Snapshot, PipelineError> {
    let resources = platform
        .list_resources(table_container)
        .await
        .map_err(|e| match e {
            PlatformError::NotFound(_) => PipelineError::TableNotFound(table_container.to_string()),
            other => PipelineError::Platform(other),
        })?;

    let mut best: Option<(SnapshotKey, Snapshot)> = None;
    for resource in resources.into_iter().filter(|r| r.kind == ResourceKind::Table) {
        let table = match platform.read_table(&resource.id).await {
            Ok(table) => table,
            Err(e) => {
                warn!(table_id = %resource.id, error = %e, "Skipping unreadable snapshot");
                continue;
            }
        };
        let key = snapshot_key(&resource.name, &table);
        if best.as_ref().map_or(true, |(current, _)| key > *current) {
            best = Some((
                key,
                Snapshot {
                    id: resource.id,
                    table,
                },
            ));
        }
    }
    best.map(|(_, snapshot)| snapshot)
        .ok_or_else(|| PipelineError::TableNotFound(table_container.to_string()))
}

type SnapshotKey = (usize, Option<PeriodLabel>, Option<PeriodLabel>, String);

fn snapshot_key(name: &str, table: &FeatureCollection) -> SnapshotKey {
    let processed = processed_periods(table);
    let name = last_segment(name);
    (
        processed.len(),
        processed.iter().max().copied(),
        PeriodLabel::from_resource_suffix(name),
        name.to_string(),
    )
}

fn labels(periods: &[PeriodLabel]) -> Vec<String> {
    periods.iter().map(|p| p.to_string()).collect()
}
