//! Configuration System
//!
//! Layered configuration: built-in defaults, the global user file, workspace files and
//! `GEOSERIES__SECTION__KEY` environment overrides. Validation reports every problem at
//! once. Also converts the loaded sections into pipeline settings.

use crate::export::PollSettings;
use crate::logging::LoggingConfig;
use crate::naming::SourceNaming;
use crate::pipeline::{AggregationSettings, BackfillSettings};
use crate::platform::ReduceParams;
use crate::update::UpdateTargets;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Subdivision codes taking part in aggregation unless configured otherwise.
pub const DEFAULT_SUBDIVISION_CODES: [&str; 19] = [
    "0510", "0511", "0512", "0500", "0520", "0541", "0521", "0522", "0530", "0540", "0531",
    "0542", "0532", "0550", "0551", "0574", "0552", "0553", "0580",
];

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GeoseriesConfig {
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub table: TableConfig,
    #[serde(default)]
    pub subdivisions: SubdivisionConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub lease: LeaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Platform backend. Only the local directory backend exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Root directory of the local platform, relative to the workspace
    #[serde(default = "default_platform_root")]
    pub root: PathBuf,
}

fn default_platform_root() -> PathBuf {
    PathBuf::from(".geoseries/platform")
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            root: default_platform_root(),
        }
    }
}

/// Source raster container and its naming convention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_container")]
    pub container: String,
    #[serde(default = "default_source_prefix")]
    pub prefix: String,
    #[serde(default = "default_source_infix")]
    pub infix: String,
    /// Token placed before the month in the separated variant
    #[serde(default = "default_source_separator")]
    pub separator: String,
}

fn default_source_container() -> String {
    "HS".to_string()
}

fn default_source_prefix() -> String {
    "SM".to_string()
}

fn default_source_infix() -> String {
    "Valparaiso_GCOM_mes".to_string()
}

fn default_source_separator() -> String {
    "_".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            container: default_source_container(),
            prefix: default_source_prefix(),
            infix: default_source_infix(),
            separator: default_source_separator(),
        }
    }
}

impl SourceConfig {
    pub fn naming(&self) -> SourceNaming {
        let mut naming = SourceNaming::new(self.prefix.clone(), self.infix.clone());
        naming.separator = self.separator.clone();
        naming
    }
}

/// Cumulative metrics table container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default = "default_table_container")]
    pub container: String,
    #[serde(default = "default_id_attribute")]
    pub id_attribute: String,
    #[serde(default = "default_region_code")]
    pub region_code: String,
    #[serde(default = "default_description_prefix")]
    pub description_prefix: String,
}

fn default_table_container() -> String {
    "MetricsHSTransposed".to_string()
}

fn default_id_attribute() -> String {
    "COD_SUBC".to_string()
}

fn default_region_code() -> String {
    "Region".to_string()
}

fn default_description_prefix() -> String {
    "HS_Update".to_string()
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            container: default_table_container(),
            id_attribute: default_id_attribute(),
            region_code: default_region_code(),
            description_prefix: default_description_prefix(),
        }
    }
}

/// Reference subdivision polygons and the allow-list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubdivisionConfig {
    #[serde(default = "default_subdivision_reference")]
    pub reference: String,
    #[serde(default = "default_subdivision_codes")]
    pub codes: Vec<String>,
}

fn default_subdivision_reference() -> String {
    "Geometrias/SubcuencasValparaiso".to_string()
}

fn default_subdivision_codes() -> Vec<String> {
    DEFAULT_SUBDIVISION_CODES
        .iter()
        .map(|c| c.to_string())
        .collect()
}

impl Default for SubdivisionConfig {
    fn default() -> Self {
        Self {
            reference: default_subdivision_reference(),
            codes: default_subdivision_codes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Ground resolution of the reduction in metres
    #[serde(default = "default_scale_m")]
    pub scale_m: f64,
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,
}

fn default_scale_m() -> f64 {
    30.0
}

fn default_max_pixels() -> u64 {
    10_000_000_000_000
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            scale_m: default_scale_m(),
            max_pixels: default_max_pixels(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    15
}

fn default_max_wait_secs() -> u64 {
    1800
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_wait_secs: default_max_wait_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Containers made public after every update
    #[serde(default = "default_publish_containers")]
    pub containers: Vec<String>,
}

fn default_publish_containers() -> Vec<String> {
    vec![default_source_container(), default_table_container()]
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            containers: default_publish_containers(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Age after which a held lease is taken over
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_stale_after_secs() -> u64 {
    7200
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Field(String, String),
    Section(String, String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Field(field, msg) => write!(f, "{}: {}", field, msg),
            ValidationError::Section(section, msg) => write!(f, "[{}] {}", section, msg),
        }
    }
}

impl std::error::Error for ValidationError {}

fn require_non_empty(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError::Field(
            field.to_string(),
            "cannot be empty".to_string(),
        ));
    }
}

impl GeoseriesConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.platform.root.as_os_str().is_empty() {
            errors.push(ValidationError::Field(
                "platform.root".to_string(),
                "cannot be empty".to_string(),
            ));
        }
        require_non_empty(&mut errors, "source.container", &self.source.container);
        require_non_empty(&mut errors, "source.prefix", &self.source.prefix);
        require_non_empty(&mut errors, "table.container", &self.table.container);
        require_non_empty(&mut errors, "table.id_attribute", &self.table.id_attribute);
        require_non_empty(&mut errors, "table.region_code", &self.table.region_code);
        require_non_empty(
            &mut errors,
            "subdivisions.reference",
            &self.subdivisions.reference,
        );

        if self.source.container.trim_end_matches('/')
            == self.table.container.trim_end_matches('/')
        {
            errors.push(ValidationError::Section(
                "table".to_string(),
                "container must differ from source.container".to_string(),
            ));
        }

        if self.subdivisions.codes.is_empty() {
            errors.push(ValidationError::Field(
                "subdivisions.codes".to_string(),
                "at least one code is required".to_string(),
            ));
        }
        let mut seen = std::collections::BTreeSet::new();
        for code in &self.subdivisions.codes {
            if !seen.insert(code.as_str()) {
                errors.push(ValidationError::Field(
                    "subdivisions.codes".to_string(),
                    format!("duplicate code '{}'", code),
                ));
            }
            if code == &self.table.region_code {
                errors.push(ValidationError::Field(
                    "subdivisions.codes".to_string(),
                    format!("'{}' collides with table.region_code", code),
                ));
            }
        }

        if !(self.aggregation.scale_m.is_finite() && self.aggregation.scale_m > 0.0) {
            errors.push(ValidationError::Field(
                "aggregation.scale_m".to_string(),
                "must be a positive number".to_string(),
            ));
        }
        if self.aggregation.max_pixels == 0 {
            errors.push(ValidationError::Field(
                "aggregation.max_pixels".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        if self.export.poll_interval_secs == 0 {
            errors.push(ValidationError::Field(
                "export.poll_interval_secs".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        if self.export.max_wait_secs < self.export.poll_interval_secs {
            errors.push(ValidationError::Section(
                "export".to_string(),
                "max_wait_secs must be at least poll_interval_secs".to_string(),
            ));
        }

        if self.lease.enabled && self.lease.stale_after_secs == 0 {
            errors.push(ValidationError::Field(
                "lease.stale_after_secs".to_string(),
                "must be greater than zero when the lease is enabled".to_string(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "json" | "text") {
            errors.push(ValidationError::Field(
                "logging.format".to_string(),
                format!("unknown format '{}'", self.logging.format),
            ));
        }
        if !matches!(self.logging.output.as_str(), "stdout" | "stderr" | "file") {
            errors.push(ValidationError::Field(
                "logging.output".to_string(),
                format!("unknown output '{}'", self.logging.output),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Platform root resolved against the workspace when relative.
    pub fn platform_root(&self, workspace_root: &Path) -> PathBuf {
        if self.platform.root.is_absolute() {
            self.platform.root.clone()
        } else {
            workspace_root.join(&self.platform.root)
        }
    }

    pub fn reduce_params(&self) -> ReduceParams {
        ReduceParams {
            scale_m: self.aggregation.scale_m,
            max_pixels: self.aggregation.max_pixels,
        }
    }

    pub fn backfill_settings(&self) -> BackfillSettings {
        BackfillSettings {
            naming: self.source.naming(),
            subdivisions_id: self.subdivisions.reference.clone(),
            aggregation: AggregationSettings {
                id_attribute: self.table.id_attribute.clone(),
                region_code: self.table.region_code.clone(),
                codes: self.subdivisions.codes.clone(),
                reduce: self.reduce_params(),
            },
            description_prefix: self.table.description_prefix.clone(),
            lease_stale_after: self
                .lease
                .enabled
                .then(|| Duration::from_secs(self.lease.stale_after_secs)),
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            poll_interval: Duration::from_secs(self.export.poll_interval_secs),
            max_wait: Duration::from_secs(self.export.max_wait_secs),
        }
    }

    pub fn update_targets(&self) -> UpdateTargets {
        UpdateTargets {
            source_container: self.source.container.clone(),
            table_container: self.table.container.clone(),
            publish_containers: self.publish.containers.clone(),
        }
    }
}
