//! Command routing through `RunContext`.

use super::support::*;
use geoseries::cli::{Commands, OutputFormat, RunContext};
use geoseries::config::GeoseriesConfig;
use geoseries::error::ApiError;
use geoseries::naming::NameVariant;
use geoseries::platform::SharedPlatform;
use geoseries::publish::AccessPublisher;
use std::path::PathBuf;
use tempfile::TempDir;

fn config() -> GeoseriesConfig {
    let mut config = GeoseriesConfig::default();
    config.subdivisions.reference = SUBDIVISIONS.to_string();
    config.subdivisions.codes = CODES.iter().map(|c| c.to_string()).collect();
    config.export.poll_interval_secs = 1;
    config.export.max_wait_secs = 30;
    config
}

fn context(platform: SharedPlatform) -> RunContext {
    RunContext::with_platform(PathBuf::from("."), config(), platform)
}

#[tokio::test]
async fn gaps_json_lists_missing_periods() {
    let fx = Fixture::new();
    fx.add_raster("2024-1", NameVariant::Compact, Some(1.0), Some(1.0));
    fx.add_raster("2024-2", NameVariant::Separated, Some(1.0), Some(1.0));
    fx.add_snapshot("2024_1", &["2024-1"]);

    let output = context(fx.shared())
        .execute(&Commands::Gaps {
            format: OutputFormat::Json,
        })
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(value["available"], serde_json::json!(["2024-1", "2024-2"]));
    assert_eq!(value["processed"], serde_json::json!(["2024-1"]));
    assert_eq!(value["missing"], serde_json::json!(["2024-2"]));
}

#[tokio::test]
async fn gaps_text_renders_a_table() {
    let fx = Fixture::new();
    fx.add_raster("2024-1", NameVariant::Compact, Some(1.0), Some(1.0));
    fx.add_snapshot("2024_1", &["2024-1"]);

    let output = context(fx.shared())
        .execute(&Commands::Gaps {
            format: OutputFormat::Text,
        })
        .await
        .unwrap();
    assert!(output.contains("available"));
    assert!(output.contains("missing"));
}

#[tokio::test]
async fn publish_defaults_to_configured_containers() {
    let fx = Fixture::new();
    fx.add_raster("2024-1", NameVariant::Compact, Some(1.0), Some(1.0));
    fx.add_snapshot("2024_1", &["2024-1"]);
    let platform = fx.shared();

    let output = context(platform.clone())
        .execute(&Commands::Publish {
            containers: Vec::new(),
            format: OutputFormat::Text,
        })
        .await
        .unwrap();
    assert!(output.contains(SOURCE));
    assert!(output.contains(TABLE));

    let publisher = AccessPublisher::new(platform);
    assert!(publisher.is_public("HS/SM2024Valparaiso_GCOM_mes1").await);
    assert!(publisher.is_public("MetricsHSTransposed/2024_1").await);
}

#[tokio::test]
async fn backfill_without_waiting_reports_the_job() {
    let fx = Fixture::new();
    fx.add_raster("2024-1", NameVariant::Compact, Some(1.0), Some(1.0));
    fx.add_raster("2024-2", NameVariant::Compact, Some(2.0), Some(2.0));
    fx.add_snapshot("2024_1", &["2024-1"]);

    let output = context(fx.shared())
        .execute(&Commands::Backfill {
            no_wait: true,
            format: OutputFormat::Json,
        })
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(value["backfill"]["status"], "COMPLETED");
    assert_eq!(value["backfill"]["new_table_id"], "MetricsHSTransposed/2024_2");
    assert!(value["job_outcome"].is_null());
}

#[tokio::test]
async fn update_error_maps_to_run_failed() {
    let fx = Fixture::new();
    fx.add_raster("2024-1", NameVariant::Compact, Some(1.0), Some(1.0));

    let err = context(fx.shared())
        .execute(&Commands::Update {
            format: OutputFormat::Text,
        })
        .await
        .unwrap_err();
    match err {
        ApiError::RunFailed { status, message } => {
            assert_eq!(status, "ERROR");
            assert!(message.contains(TABLE));
        }
        other => panic!("expected RunFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn config_command_prints_effective_toml() {
    let fx = Fixture::new();
    let output = context(fx.shared()).execute(&Commands::Config).await.unwrap();
    let parsed: GeoseriesConfig = toml::from_str(&output).unwrap();
    assert_eq!(parsed, config());
}

#[tokio::test]
async fn context_from_config_file_opens_the_platform() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("platform");
    let config_file = temp.path().join("geoseries.toml");
    std::fs::write(
        &config_file,
        format!(
            "[platform]\nroot = {:?}\n\n[table]\ncontainer = \"Tables\"\n",
            root.to_str().unwrap()
        ),
    )
    .unwrap();

    let ctx = RunContext::new(temp.path().to_path_buf(), Some(config_file)).unwrap();
    assert_eq!(ctx.config().table.container, "Tables");
    assert!(root.is_dir());

    let err = ctx
        .execute(&Commands::Gaps {
            format: OutputFormat::Text,
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Tables"), "{}", err);
}

#[test]
fn invalid_config_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let config_file = temp.path().join("geoseries.toml");
    std::fs::write(&config_file, "[table]\ncontainer = \"HS\"\n").unwrap();

    let err = RunContext::new(temp.path().to_path_buf(), Some(config_file))
        .err()
        .unwrap();
    match err {
        ApiError::ConfigError(message) => assert!(message.contains("source.container")),
        other => panic!("expected ConfigError, got {:?}", other),
    }
}
