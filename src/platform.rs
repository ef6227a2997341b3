//! Geospatial Platform Abstraction
//!
//! Narrow interface to the geospatial compute platform that stores tables and rasters,
//! evaluates reductions, runs asynchronous exports and holds access-control records.
//! Every pipeline component receives a shared [`GeoPlatform`] handle instead of relying
//! on an ambient session.

use crate::error::PlatformError;
use crate::geometry::Geometry;
use crate::table::FeatureCollection;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub mod local;

pub use local::LocalPlatform;

/// Shared platform handle passed to every component.
pub type SharedPlatform = Arc<dyn GeoPlatform>;

/// Kind of a listed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Table,
    Raster,
    Folder,
}

/// A resource directly under a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub id: String,
    pub name: String,
    pub kind: ResourceKind,
}

/// Raster metadata returned by an existence check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterInfo {
    pub id: String,
    pub projection: String,
    pub footprint: Geometry,
    pub bands: Vec<String>,
    /// Native ground sample distance in metres
    pub gsd_m: f64,
}

/// Parameters of a mean reduction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReduceParams {
    /// Ground sampling resolution in metres
    pub scale_m: f64,
    /// Upper bound on pixels considered
    pub max_pixels: u64,
}

impl Default for ReduceParams {
    fn default() -> Self {
        Self {
            scale_m: 30.0,
            max_pixels: 10_000_000_000_000,
        }
    }
}

/// Per-band mean; `None` when a band had no valid pixels in the region.
pub type BandMeans = BTreeMap<String, Option<f64>>;

/// Handle to a submitted export job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: String,
    pub description: String,
    pub destination: String,
}

/// Remote job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
            JobState::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status record of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: String,
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Access-control record of a resource
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessControl {
    #[serde(default)]
    pub all_users_can_read: bool,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub readers: Vec<String>,
    #[serde(default)]
    pub writers: Vec<String>,
}

/// Geospatial compute platform
#[async_trait]
pub trait GeoPlatform: Send + Sync {
    /// List resources directly under a container
    async fn list_resources(&self, container: &str) -> Result<Vec<ResourceInfo>, PlatformError>;

    /// Read a vector table
    async fn read_table(&self, id: &str) -> Result<FeatureCollection, PlatformError>;

    /// Read raster metadata; fails with `NotFound` when absent
    async fn read_raster(&self, id: &str) -> Result<RasterInfo, PlatformError>;

    /// Mean of every band over `region`
    async fn reduce_mean(
        &self,
        raster_id: &str,
        region: &Geometry,
        params: &ReduceParams,
    ) -> Result<BandMeans, PlatformError>;

    /// Start an asynchronous export of `table` to `destination`
    async fn start_export(
        &self,
        table: &FeatureCollection,
        destination: &str,
        description: &str,
    ) -> Result<JobHandle, PlatformError>;

    /// Current status of a job
    async fn job_status(&self, job_id: &str) -> Result<JobStatus, PlatformError>;

    async fn get_acl(&self, id: &str) -> Result<AccessControl, PlatformError>;

    async fn set_acl(&self, id: &str, acl: &AccessControl) -> Result<(), PlatformError>;

    /// Create a marker record; returns `false` when one already exists
    async fn create_marker(&self, id: &str, body: &Value) -> Result<bool, PlatformError>;

    async fn read_marker(&self, id: &str) -> Result<Option<Value>, PlatformError>;

    async fn delete_marker(&self, id: &str) -> Result<(), PlatformError>;
}
