//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::cli::help::command_name;
use crate::cli::parse::{Commands, OutputFormat};
use crate::cli::presentation::{
    format_backfill_json, format_backfill_text, format_config_toml, format_gaps_json,
    format_gaps_text, format_job_json, format_job_text, format_publish_json, format_publish_text,
    format_update_json, format_update_text,
};
use crate::config::{ConfigLoader, GeoseriesConfig};
use crate::error::ApiError;
use crate::export::ExportController;
use crate::pipeline::{latest_snapshot, BackfillResult, BackfillStatus, GapResolver, TableBuilder};
use crate::platform::{LocalPlatform, SharedPlatform};
use crate::publish::AccessPublisher;
use crate::update::{publish_containers, Updater};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Runtime context for CLI execution: workspace, loaded config and the platform session.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    workspace_root: PathBuf,
    config: GeoseriesConfig,
    platform: SharedPlatform,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };

        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;

        let root = config.platform_root(&workspace_root);
        let platform: SharedPlatform = Arc::new(LocalPlatform::open(root)?);
        Ok(Self::with_platform(workspace_root, config, platform))
    }

    /// Context over an already opened platform session.
    pub fn with_platform(
        workspace_root: PathBuf,
        config: GeoseriesConfig,
        platform: SharedPlatform,
    ) -> Self {
        Self {
            workspace_root,
            config,
            platform,
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn config(&self) -> &GeoseriesConfig {
        &self.config
    }

    pub fn platform(&self) -> SharedPlatform {
        Arc::clone(&self.platform)
    }

    /// Execute a CLI command via the single route table.
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let started = Instant::now();
        let name = command_name(command);
        info!(command = name, "Command started");
        let result = self.execute_inner(command).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(command = name, elapsed_ms, "Command finished"),
            Err(e) => error!(command = name, elapsed_ms, error = %e, "Command failed"),
        }
        result
    }

    async fn execute_inner(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Update { format } => self.handle_update(*format).await,
            Commands::Backfill { no_wait, format } => self.handle_backfill(*no_wait, *format).await,
            Commands::Gaps { format } => self.handle_gaps(*format).await,
            Commands::Publish { containers, format } => {
                self.handle_publish(containers, *format).await
            }
            Commands::Job { job_id, format } => self.handle_job(job_id, *format).await,
            Commands::Config => format_config_toml(&self.config),
        }
    }

    fn builder(&self) -> TableBuilder {
        TableBuilder::new(self.platform(), self.config.backfill_settings())
    }

    async fn handle_update(&self, format: OutputFormat) -> Result<String, ApiError> {
        let updater = Updater::new(self.platform(), self.builder(), self.config.poll_settings());
        let report = updater.run(&self.config.update_targets()).await;
        if report.is_failure() {
            return Err(run_failed(&report.backfill));
        }
        match format {
            OutputFormat::Text => Ok(format_update_text(&report)),
            OutputFormat::Json => format_update_json(&report),
        }
    }

    async fn handle_backfill(&self, no_wait: bool, format: OutputFormat) -> Result<String, ApiError> {
        let result = self
            .builder()
            .run(&self.config.source.container, &self.config.table.container)
            .await;
        if result.status == BackfillStatus::Error {
            return Err(run_failed(&result));
        }

        let outcome = match (&result.job, no_wait) {
            (Some(job), false) => {
                let poll = self.config.poll_settings();
                Some(
                    ExportController::new(self.platform())
                        .await_outcome(job, poll.poll_interval, poll.max_wait)
                        .await,
                )
            }
            _ => None,
        };
        match format {
            OutputFormat::Text => Ok(format_backfill_text(&result, outcome.as_ref())),
            OutputFormat::Json => format_backfill_json(&result, outcome.as_ref()),
        }
    }

    async fn handle_gaps(&self, format: OutputFormat) -> Result<String, ApiError> {
        let snapshot = latest_snapshot(&self.platform, &self.config.table.container).await?;
        let table = snapshot.table;
        let gaps = GapResolver::new(self.platform(), self.config.source.naming())
            .resolve(&self.config.source.container, &table)
            .await?;
        match format {
            OutputFormat::Text => Ok(format_gaps_text(&gaps)),
            OutputFormat::Json => format_gaps_json(&gaps),
        }
    }

    async fn handle_publish(
        &self,
        containers: &[String],
        format: OutputFormat,
    ) -> Result<String, ApiError> {
        let containers = if containers.is_empty() {
            &self.config.publish.containers[..]
        } else {
            containers
        };
        let publisher = AccessPublisher::new(self.platform());
        let reports = publish_containers(&publisher, containers).await;
        match format {
            OutputFormat::Text => Ok(format_publish_text(&reports)),
            OutputFormat::Json => format_publish_json(&reports),
        }
    }

    async fn handle_job(&self, job_id: &str, format: OutputFormat) -> Result<String, ApiError> {
        let status = self.platform.job_status(job_id).await?;
        match format {
            OutputFormat::Text => Ok(format_job_text(&status)),
            OutputFormat::Json => format_job_json(&status),
        }
    }
}

fn run_failed(result: &BackfillResult) -> ApiError {
    ApiError::RunFailed {
        status: result.status.as_str().to_string(),
        message: result
            .error
            .clone()
            .unwrap_or_else(|| "no error message".to_string()),
    }
}
