//! End-to-end backfill runs against the local platform.

use super::support::*;
use geoseries::export::ExportController;
use geoseries::naming::NameVariant;
use geoseries::pipeline::{BackfillStatus, LeaseRecord, RunLease, TableBuilder};
use geoseries::platform::{GeoPlatform, ResourceKind, SharedPlatform};
use std::sync::Arc;
use std::time::Duration;

async fn wait_for(platform: &SharedPlatform, result: &geoseries::pipeline::BackfillResult) {
    let job = result.job.as_ref().expect("export job submitted");
    let done = ExportController::new(platform.clone())
        .await_completion(job, Duration::from_millis(5), Duration::from_secs(5))
        .await;
    assert!(done, "export should complete");
}

async fn table_count(platform: &SharedPlatform) -> usize {
    platform
        .list_resources(TABLE)
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.kind == ResourceKind::Table)
        .count()
}

#[tokio::test]
async fn missing_period_is_added_to_every_row() {
    let fx = Fixture::new();
    fx.add_raster("2024-1", NameVariant::Compact, Some(1.0), Some(1.0));
    fx.add_raster("2024-2", NameVariant::Compact, Some(2.0), Some(4.0));
    fx.add_snapshot("2024_1", &["2024-1"]);
    let platform = fx.shared();

    let builder = TableBuilder::new(platform.clone(), settings());
    let result = builder.run(SOURCE, TABLE).await;

    assert_eq!(result.status, BackfillStatus::Completed, "{:?}", result.error);
    assert_eq!(result.periods_processed, vec![period("2024-2")]);
    assert!(result.periods_skipped.is_empty());
    assert_eq!(result.new_table_id.as_deref(), Some("MetricsHSTransposed/2024_2"));
    assert_eq!(
        result.job.as_ref().map(|j| j.description.as_str()),
        Some("HS_Update_2024_2")
    );
    wait_for(&platform, &result).await;

    let table = platform
        .read_table("MetricsHSTransposed/2024_2")
        .await
        .unwrap();
    assert_eq!(table.len(), 3);
    assert!(table.has_uniform_period_columns());
    let value = |code: &str| {
        table.find_by("COD_SUBC", code).unwrap().properties["2024-2"].as_f64()
    };
    assert_eq!(value("0510"), Some(2.0));
    assert_eq!(value("0511"), Some(4.0));
    assert_eq!(value("Region"), Some(3.0));

    // Repaired from the references; the region row has none
    assert!(table.find_by("COD_SUBC", "0510").unwrap().geometry.is_some());
    assert!(table.find_by("COD_SUBC", "Region").unwrap().geometry.is_none());
}

#[tokio::test]
async fn rerun_after_export_needs_no_processing() {
    let fx = Fixture::new();
    fx.add_raster("2024-1", NameVariant::Compact, Some(1.0), Some(1.0));
    fx.add_raster("2024-2", NameVariant::Compact, Some(2.0), Some(2.0));
    fx.add_snapshot("2024_1", &["2024-1"]);
    let platform = fx.shared();
    let builder = TableBuilder::new(platform.clone(), settings());

    let first = builder.run(SOURCE, TABLE).await;
    wait_for(&platform, &first).await;

    let second = builder.run(SOURCE, TABLE).await;
    assert_eq!(second.status, BackfillStatus::NoProcessingNeeded);
    assert_eq!(second.source_table_id.as_deref(), Some("MetricsHSTransposed/2024_2"));
}

#[tokio::test]
async fn nothing_missing_submits_no_job() {
    let fx = Fixture::new();
    fx.add_raster("2024-1", NameVariant::Compact, Some(1.0), Some(1.0));
    fx.add_snapshot("2024_1", &["2024-1"]);
    let platform = fx.shared();

    let result = TableBuilder::new(platform.clone(), settings())
        .run(SOURCE, TABLE)
        .await;

    assert_eq!(result.status, BackfillStatus::NoProcessingNeeded);
    assert!(result.job.is_none());
    assert!(result.new_table_id.is_none());
    assert_eq!(table_count(&platform).await, 1);
}

#[tokio::test]
async fn unresolvable_asset_fails_the_run() {
    let fx = Fixture::new();
    fx.add_raster("2024-1", NameVariant::Compact, Some(1.0), Some(1.0));
    fx.add_raster("2024-2", NameVariant::Compact, Some(2.0), Some(2.0));
    fx.add_snapshot("2024_1", &["2024-1"]);
    let scripted = ScriptedPlatform::new(fx.local.clone())
        .hide_raster("HS/SM2024Valparaiso_GCOM_mes2");
    let platform: SharedPlatform = Arc::new(scripted);

    let result = TableBuilder::new(platform.clone(), settings())
        .run(SOURCE, TABLE)
        .await;

    assert_eq!(result.status, BackfillStatus::Error);
    assert!(result.job.is_none());
    let error = result.error.unwrap();
    assert!(error.contains("HS/SM2024Valparaiso_GCOM_mes2"), "{}", error);
    assert!(error.contains("HS/SM2024Valparaiso_GCOM_mes_2"), "{}", error);
    assert_eq!(table_count(&platform).await, 1);
    assert!(platform
        .read_marker(&RunLease::lease_id_for(TABLE))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn separated_name_variant_resolves() {
    let fx = Fixture::new();
    fx.add_raster("2024-3", NameVariant::Separated, Some(5.0), Some(5.0));
    fx.add_snapshot("2024_1", &["2024-1"]);
    let platform = fx.shared();

    let result = TableBuilder::new(platform.clone(), settings())
        .run(SOURCE, TABLE)
        .await;

    assert_eq!(result.status, BackfillStatus::Completed, "{:?}", result.error);
    assert_eq!(result.periods_processed, vec![period("2024-3")]);
}

#[tokio::test]
async fn failed_aggregation_leaves_period_missing() {
    let fx = Fixture::new();
    fx.add_raster("2024-1", NameVariant::Compact, Some(1.0), Some(1.0));
    fx.add_raster("2024-2", NameVariant::Compact, None, None);
    fx.add_snapshot("2024_1", &["2024-1"]);
    let platform = fx.shared();
    let builder = TableBuilder::new(platform.clone(), settings());

    let result = builder.run(SOURCE, TABLE).await;
    assert_eq!(result.status, BackfillStatus::NothingAggregated);
    assert!(result.job.is_none());
    assert_eq!(result.periods_skipped.len(), 1);
    assert_eq!(result.periods_skipped[0].period, period("2024-2"));
    assert_eq!(table_count(&platform).await, 1);

    // Data arrives later; the period is still picked up
    fx.add_raster("2024-2", NameVariant::Compact, Some(2.0), Some(2.0));
    let retry = builder.run(SOURCE, TABLE).await;
    assert_eq!(retry.status, BackfillStatus::Completed);
    assert_eq!(retry.periods_processed, vec![period("2024-2")]);
}

#[tokio::test]
async fn partial_failure_exports_only_aggregated_periods() {
    let fx = Fixture::new();
    fx.add_raster("2024-8", NameVariant::Compact, Some(1.0), Some(1.0));
    fx.add_raster("2024-9", NameVariant::Compact, None, None);
    fx.add_raster("2024-10", NameVariant::Compact, Some(3.0), Some(3.0));
    fx.add_snapshot("2024_8", &["2024-8"]);
    let platform = fx.shared();

    let result = TableBuilder::new(platform.clone(), settings())
        .run(SOURCE, TABLE)
        .await;

    assert_eq!(result.status, BackfillStatus::Completed);
    assert_eq!(result.periods_processed, vec![period("2024-10")]);
    assert_eq!(result.periods_skipped[0].period, period("2024-9"));
    assert_eq!(result.new_table_id.as_deref(), Some("MetricsHSTransposed/2024_10"));
    wait_for(&platform, &result).await;

    let table = platform
        .read_table("MetricsHSTransposed/2024_10")
        .await
        .unwrap();
    let columns = table.period_columns();
    assert!(columns.contains(&"2024-10".to_string()));
    assert!(!columns.contains(&"2024-9".to_string()));
}

#[tokio::test]
async fn retried_period_is_not_reprocessed_on_the_next_run() {
    let fx = Fixture::new();
    fx.add_raster("2024-8", NameVariant::Compact, Some(1.0), Some(1.0));
    fx.add_raster("2024-9", NameVariant::Compact, None, None);
    fx.add_raster("2024-10", NameVariant::Compact, Some(3.0), Some(3.0));
    fx.add_snapshot("2024_8", &["2024-8"]);
    let platform = fx.shared();
    let builder = TableBuilder::new(platform.clone(), settings());

    let first = builder.run(SOURCE, TABLE).await;
    assert_eq!(first.status, BackfillStatus::Completed, "{:?}", first.error);
    assert_eq!(first.new_table_id.as_deref(), Some("MetricsHSTransposed/2024_10"));
    wait_for(&platform, &first).await;

    // September arrives late; its export is named after it but holds every column
    fx.add_raster("2024-9", NameVariant::Compact, Some(2.0), Some(2.0));
    let second = builder.run(SOURCE, TABLE).await;
    assert_eq!(second.status, BackfillStatus::Completed, "{:?}", second.error);
    assert_eq!(second.source_table_id.as_deref(), Some("MetricsHSTransposed/2024_10"));
    assert_eq!(second.periods_processed, vec![period("2024-9")]);
    assert_eq!(second.new_table_id.as_deref(), Some("MetricsHSTransposed/2024_9"));
    wait_for(&platform, &second).await;

    let third = builder.run(SOURCE, TABLE).await;
    assert_eq!(third.status, BackfillStatus::NoProcessingNeeded, "{:?}", third.error);
    assert_eq!(third.source_table_id.as_deref(), Some("MetricsHSTransposed/2024_9"));
    assert!(third.job.is_none());
    assert_eq!(table_count(&platform).await, 3);
}

#[tokio::test]
async fn ragged_snapshot_is_rejected_before_processing() {
    let fx = Fixture::new();
    fx.add_raster("2024-2", NameVariant::Compact, Some(1.0), Some(1.0));
    let mut ragged = metrics_table(&["2024-1"]);
    ragged.features[1].properties.remove("2024-1");
    fx.local
        .put_table(&format!("{}/2024_1", TABLE), &ragged)
        .unwrap();
    let platform = fx.shared();

    let result = TableBuilder::new(platform.clone(), settings())
        .run(SOURCE, TABLE)
        .await;

    assert_eq!(result.status, BackfillStatus::Error);
    assert!(result.job.is_none());
    assert!(result.error.unwrap().contains("MetricsHSTransposed/2024_1"));
    assert_eq!(table_count(&platform).await, 1);
}

#[tokio::test]
async fn missing_periods_are_processed_chronologically() {
    let fx = Fixture::new();
    // Listing order is by name: mes10, mes11, mes9
    for label in ["2024-9", "2024-10", "2024-11"] {
        fx.add_raster(label, NameVariant::Compact, Some(1.0), Some(1.0));
    }
    fx.add_snapshot("2024_8", &["2024-8"]);
    let platform = fx.shared();

    let result = TableBuilder::new(platform.clone(), settings())
        .run(SOURCE, TABLE)
        .await;

    assert_eq!(
        result.periods_processed,
        vec![period("2024-9"), period("2024-10"), period("2024-11")]
    );
    assert_eq!(result.new_table_id.as_deref(), Some("MetricsHSTransposed/2024_9"));
}

#[tokio::test]
async fn latest_snapshot_is_chosen_by_period() {
    let fx = Fixture::new();
    fx.add_raster("2024-10", NameVariant::Compact, Some(1.0), Some(1.0));
    fx.add_raster("2024-11", NameVariant::Compact, Some(1.0), Some(1.0));
    fx.add_snapshot("2024_9", &["2024-9"]);
    fx.add_snapshot("2024_10", &["2024-9", "2024-10"]);
    let platform = fx.shared();

    let result = TableBuilder::new(platform.clone(), settings())
        .run(SOURCE, TABLE)
        .await;

    assert_eq!(result.source_table_id.as_deref(), Some("MetricsHSTransposed/2024_10"));
    assert_eq!(result.periods_processed, vec![period("2024-11")]);
}

#[tokio::test]
async fn empty_table_container_is_an_error() {
    let fx = Fixture::new();
    fx.add_raster("2024-1", NameVariant::Compact, Some(1.0), Some(1.0));
    let result = TableBuilder::new(fx.shared(), settings())
        .run(SOURCE, TABLE)
        .await;
    assert_eq!(result.status, BackfillStatus::Error);
    assert!(result.error.unwrap().contains(TABLE));
}

#[tokio::test]
async fn fresh_lease_blocks_a_second_run() {
    let fx = Fixture::new();
    fx.add_raster("2024-2", NameVariant::Compact, Some(2.0), Some(2.0));
    fx.add_snapshot("2024_1", &["2024-1"]);
    let platform = fx.shared();
    let lease_id = RunLease::lease_id_for(TABLE);
    let held = RunLease::acquire(platform.clone(), &lease_id, "other-run", Duration::from_secs(3600))
        .await
        .unwrap();

    let result = TableBuilder::new(platform.clone(), settings())
        .run(SOURCE, TABLE)
        .await;
    assert_eq!(result.status, BackfillStatus::Error);
    assert!(result.error.unwrap().contains("other-run"));
    assert!(result.job.is_none());

    held.release().await.unwrap();
    let result = TableBuilder::new(platform.clone(), settings())
        .run(SOURCE, TABLE)
        .await;
    assert_eq!(result.status, BackfillStatus::Completed);
    assert!(platform.read_marker(&lease_id).await.unwrap().is_none());
}

#[tokio::test]
async fn stale_lease_is_taken_over() {
    let fx = Fixture::new();
    fx.add_raster("2024-2", NameVariant::Compact, Some(2.0), Some(2.0));
    fx.add_snapshot("2024_1", &["2024-1"]);
    let platform = fx.shared();
    let stale = LeaseRecord {
        owner: "crashed-run".to_string(),
        acquired_at: "2020-01-01T00:00:00Z".to_string(),
        acquired_at_ms: 0,
    };
    platform
        .create_marker(
            &RunLease::lease_id_for(TABLE),
            &serde_json::to_value(&stale).unwrap(),
        )
        .await
        .unwrap();

    let result = TableBuilder::new(platform, settings())
        .run(SOURCE, TABLE)
        .await;
    assert_eq!(result.status, BackfillStatus::Completed, "{:?}", result.error);
}
