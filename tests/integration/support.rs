//! Shared fixtures: a seeded local platform and a scripted platform for failure injection.

use async_trait::async_trait;
use geoseries::error::PlatformError;
use geoseries::geometry::Geometry;
use geoseries::naming::{NameVariant, SourceNaming};
use geoseries::period::PeriodLabel;
use geoseries::pipeline::{AggregationSettings, BackfillSettings};
use geoseries::platform::local::{RasterBand, RasterData};
use geoseries::platform::{
    AccessControl, BandMeans, GeoPlatform, JobHandle, JobState, JobStatus, LocalPlatform,
    RasterInfo, ReduceParams, ResourceInfo, SharedPlatform,
};
use geoseries::table::{Feature, FeatureCollection};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const SOURCE: &str = "HS";
pub const TABLE: &str = "MetricsHSTransposed";
pub const SUBDIVISIONS: &str = "Geometrias/Subcuencas";
pub const CODES: [&str; 2] = ["0510", "0511"];

pub fn period(label: &str) -> PeriodLabel {
    label.parse().unwrap()
}

pub fn naming() -> SourceNaming {
    SourceNaming::new("SM", "Valparaiso_GCOM_mes")
}

pub fn settings() -> BackfillSettings {
    BackfillSettings {
        naming: naming(),
        subdivisions_id: SUBDIVISIONS.to_string(),
        aggregation: AggregationSettings {
            id_attribute: "COD_SUBC".to_string(),
            region_code: "Region".to_string(),
            codes: CODES.iter().map(|c| c.to_string()).collect(),
            reduce: ReduceParams::default(),
        },
        description_prefix: "HS_Update".to_string(),
        lease_stale_after: Some(Duration::from_secs(3600)),
    }
}

/// A 10x10 grid covering [0, 10] x [0, 10]; the left half is 0510, the right half 0511.
pub fn raster(left: Option<f64>, right: Option<f64>) -> RasterData {
    let values = (0..100)
        .map(|i| if i % 10 < 5 { left } else { right })
        .collect();
    RasterData {
        projection: "EPSG:32719".to_string(),
        origin: [0.0, 10.0],
        pixel_size: [1.0, 1.0],
        gsd_m: 30.0,
        width: 10,
        height: 10,
        bands: vec![RasterBand {
            name: "b1".to_string(),
            values,
        }],
    }
}

pub fn subdivisions() -> FeatureCollection {
    FeatureCollection::new(vec![
        Feature::new(Some(Geometry::rectangle(0.0, 0.0, 5.0, 10.0))).with_property("COD_SUBC", "0510"),
        Feature::new(Some(Geometry::rectangle(5.0, 0.0, 10.0, 10.0))).with_property("COD_SUBC", "0511"),
        Feature::new(Some(Geometry::rectangle(20.0, 20.0, 30.0, 30.0)))
            .with_property("COD_SUBC", "9999"),
    ])
}

/// Metrics table with one row per code plus the region row and the given period columns.
pub fn metrics_table(periods: &[&str]) -> FeatureCollection {
    let mut features = Vec::new();
    for code in CODES.iter().chain(["Region"].iter()) {
        let mut feature = Feature::new(None).with_property("COD_SUBC", *code);
        for p in periods {
            feature.set(*p, 1.0);
        }
        features.push(feature);
    }
    FeatureCollection::new(features)
}

pub struct Fixture {
    _temp: TempDir,
    pub local: LocalPlatform,
}

impl Fixture {
    /// Local platform with the subdivision references and an empty source container.
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let local = LocalPlatform::open(temp.path().join("platform")).unwrap();
        local.put_table(SUBDIVISIONS, &subdivisions()).unwrap();
        local.create_folder(SOURCE).unwrap();
        local.create_folder(TABLE).unwrap();
        Self { _temp: temp, local }
    }

    pub fn shared(&self) -> SharedPlatform {
        Arc::new(self.local.clone())
    }

    pub fn add_raster(&self, label: &str, variant: NameVariant, left: Option<f64>, right: Option<f64>) {
        let id = naming().asset_id(SOURCE, period(label), variant);
        self.local.put_raster(&id, &raster(left, right)).unwrap();
    }

    pub fn add_snapshot(&self, name: &str, periods: &[&str]) {
        self.local
            .put_table(&format!("{}/{}", TABLE, name), &metrics_table(periods))
            .unwrap();
    }
}

/// One scripted answer to `job_status`.
#[derive(Debug, Clone)]
pub enum Poll {
    State(JobState, Option<String>),
    Transient,
}

/// Wraps a local platform and injects failures.
pub struct ScriptedPlatform {
    inner: LocalPlatform,
    pub failing_lists: Mutex<HashSet<String>>,
    pub hidden_rasters: Mutex<HashSet<String>>,
    pub failing_acl_writes: Mutex<HashSet<String>>,
    /// When non-empty, exports are not executed and polls follow this script.
    pub job_script: Mutex<VecDeque<Poll>>,
    last_state: Mutex<Option<JobState>>,
    pub set_acl_calls: Mutex<Vec<String>>,
    pub polls: Mutex<usize>,
}

impl ScriptedPlatform {
    pub fn new(inner: LocalPlatform) -> Self {
        Self {
            inner,
            failing_lists: Mutex::new(HashSet::new()),
            hidden_rasters: Mutex::new(HashSet::new()),
            failing_acl_writes: Mutex::new(HashSet::new()),
            job_script: Mutex::new(VecDeque::new()),
            last_state: Mutex::new(None),
            set_acl_calls: Mutex::new(Vec::new()),
            polls: Mutex::new(0),
        }
    }

    pub fn fail_listing(self, container: &str) -> Self {
        self.failing_lists.lock().insert(container.to_string());
        self
    }

    pub fn hide_raster(self, id: &str) -> Self {
        self.hidden_rasters.lock().insert(id.to_string());
        self
    }

    pub fn fail_acl_write(self, id: &str) -> Self {
        self.failing_acl_writes.lock().insert(id.to_string());
        self
    }

    pub fn script_jobs(self, steps: Vec<Poll>) -> Self {
        *self.job_script.lock() = steps.into();
        self
    }
}

#[async_trait]
impl GeoPlatform for ScriptedPlatform {
    async fn list_resources(&self, container: &str) -> Result<Vec<ResourceInfo>, PlatformError> {
        if self.failing_lists.lock().contains(container) {
            return Err(PlatformError::Transient(format!("listing {} refused", container)));
        }
        self.inner.list_resources(container).await
    }

    async fn read_table(&self, id: &str) -> Result<FeatureCollection, PlatformError> {
        self.inner.read_table(id).await
    }

    async fn read_raster(&self, id: &str) -> Result<RasterInfo, PlatformError> {
        if self.hidden_rasters.lock().contains(id) {
            return Err(PlatformError::NotFound(id.to_string()));
        }
        self.inner.read_raster(id).await
    }

    async fn reduce_mean(
        &self,
        raster_id: &str,
        region: &Geometry,
        params: &ReduceParams,
    ) -> Result<BandMeans, PlatformError> {
        self.inner.reduce_mean(raster_id, region, params).await
    }

    async fn start_export(
        &self,
        table: &FeatureCollection,
        destination: &str,
        description: &str,
    ) -> Result<JobHandle, PlatformError> {
        if self.job_script.lock().is_empty() {
            return self.inner.start_export(table, destination, description).await;
        }
        Ok(JobHandle {
            id: "scripted-job".to_string(),
            description: description.to_string(),
            destination: destination.to_string(),
        })
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatus, PlatformError> {
        *self.polls.lock() += 1;
        if job_id != "scripted-job" {
            return self.inner.job_status(job_id).await;
        }
        let step = self.job_script.lock().pop_front();
        let (state, error_message) = match step {
            Some(Poll::Transient) => {
                return Err(PlatformError::Transient("status endpoint unavailable".to_string()))
            }
            Some(Poll::State(state, message)) => {
                *self.last_state.lock() = Some(state);
                (state, message)
            }
            None => (self.last_state.lock().unwrap_or(JobState::Running), None),
        };
        Ok(JobStatus {
            id: job_id.to_string(),
            state,
            error_message,
            destination: String::new(),
            updated_at: String::new(),
        })
    }

    async fn get_acl(&self, id: &str) -> Result<AccessControl, PlatformError> {
        self.inner.get_acl(id).await
    }

    async fn set_acl(&self, id: &str, acl: &AccessControl) -> Result<(), PlatformError> {
        self.set_acl_calls.lock().push(id.to_string());
        if self.failing_acl_writes.lock().contains(id) {
            return Err(PlatformError::Transient(format!("acl write for {} refused", id)));
        }
        self.inner.set_acl(id, acl).await
    }

    async fn create_marker(&self, id: &str, body: &Value) -> Result<bool, PlatformError> {
        self.inner.create_marker(id, body).await
    }

    async fn read_marker(&self, id: &str) -> Result<Option<Value>, PlatformError> {
        self.inner.read_marker(id).await
    }

    async fn delete_marker(&self, id: &str) -> Result<(), PlatformError> {
        self.inner.delete_marker(id).await
    }
}
