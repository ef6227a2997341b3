//! Directory-backed platform.
//!
//! Layout under the root directory:
//! - `<id>.json`: a table or raster document (`{"type": "table" | "raster", ...}`)
//! - `<id>/`: a folder (container)
//! - `.acl/<id>.json`: access-control records
//! - `.jobs/<job id>.json`: export job status
//! - `.markers/<id>.json`: lease and other marker records

use crate::error::PlatformError;
use crate::geometry::Geometry;
use crate::platform::{
    AccessControl, BandMeans, GeoPlatform, JobHandle, JobState, JobStatus, RasterInfo,
    ReduceParams, ResourceInfo, ResourceKind,
};
use crate::table::FeatureCollection;
use crate::telemetry::{new_job_id, now_rfc3339, unique_suffix};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

const ACL_DIR: &str = ".acl";
const JOBS_DIR: &str = ".jobs";
const MARKERS_DIR: &str = ".markers";

/// Stored resource document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoredResource {
    Table(FeatureCollection),
    Raster(RasterData),
}

/// Gridded raster with nodata-aware bands, stored row-major from the top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterData {
    #[serde(default = "default_projection")]
    pub projection: String,
    /// Top-left corner `[x, y]`
    pub origin: [f64; 2],
    /// Pixel extent `[dx, dy]`; rows advance towards decreasing y
    pub pixel_size: [f64; 2],
    /// Ground sample distance in metres
    pub gsd_m: f64,
    pub width: usize,
    pub height: usize,
    pub bands: Vec<RasterBand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterBand {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

fn default_projection() -> String {
    "EPSG:32719".to_string()
}

impl RasterData {
    pub fn footprint(&self) -> Geometry {
        let [ox, oy] = self.origin;
        let [px, py] = self.pixel_size;
        Geometry::rectangle(
            ox,
            oy - self.height as f64 * py,
            ox + self.width as f64 * px,
            oy,
        )
    }

    fn check(&self, id: &str) -> Result<(), PlatformError> {
        let cells = self.width * self.height;
        let malformed = |message: String| PlatformError::Malformed {
            id: id.to_string(),
            message,
        };
        if self.pixel_size[0] <= 0.0 || self.pixel_size[1] <= 0.0 || self.gsd_m <= 0.0 {
            return Err(malformed("pixel size and gsd must be positive".to_string()));
        }
        for band in &self.bands {
            if band.values.len() != cells {
                return Err(malformed(format!(
                    "band {} has {} values, expected {}",
                    band.name,
                    band.values.len(),
                    cells
                )));
            }
        }
        Ok(())
    }

    /// Mean of every band over pixel centres inside `region`.
    pub fn reduce_mean(
        &self,
        region: &Geometry,
        params: &ReduceParams,
    ) -> Result<BandMeans, PlatformError> {
        let bounds = region.bounds()?;
        let stride = (params.scale_m / self.gsd_m).floor().max(1.0) as usize;
        let [ox, oy] = self.origin;
        let [px, py] = self.pixel_size;

        let mut sums = vec![(0.0_f64, 0_u64); self.bands.len()];
        let mut considered: u64 = 0;
        for row in (0..self.height).step_by(stride) {
            let y = oy - (row as f64 + 0.5) * py;
            if y < bounds.min_y || y > bounds.max_y {
                continue;
            }
            for col in (0..self.width).step_by(stride) {
                let x = ox + (col as f64 + 0.5) * px;
                if x < bounds.min_x || x > bounds.max_x || !region.contains(x, y) {
                    continue;
                }
                considered += 1;
                if considered > params.max_pixels {
                    return Err(PlatformError::Computation(format!(
                        "Too many pixels in region (limit {})",
                        params.max_pixels
                    )));
                }
                let idx = row * self.width + col;
                for (band, acc) in self.bands.iter().zip(sums.iter_mut()) {
                    if let Some(v) = band.values[idx].filter(|v| v.is_finite()) {
                        acc.0 += v;
                        acc.1 += 1;
                    }
                }
            }
        }

        Ok(self
            .bands
            .iter()
            .zip(sums)
            .map(|(band, (sum, n))| {
                let mean = if n > 0 { Some(sum / n as f64) } else { None };
                (band.name.clone(), mean)
            })
            .collect())
    }
}

/// Platform rooted at a local directory
#[derive(Clone)]
pub struct LocalPlatform {
    root: PathBuf,
    jobs: Arc<Mutex<HashMap<String, JobStatus>>>,
}

impl LocalPlatform {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PlatformError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a resource document, creating parent folders. Overwrites existing documents.
    pub fn put_resource(&self, id: &str, resource: &StoredResource) -> Result<(), PlatformError> {
        let path = self.resource_path(id)?;
        write_json_atomic(&path, resource)
    }

    pub fn put_table(&self, id: &str, table: &FeatureCollection) -> Result<(), PlatformError> {
        self.put_resource(id, &StoredResource::Table(table.clone()))
    }

    pub fn put_raster(&self, id: &str, raster: &RasterData) -> Result<(), PlatformError> {
        raster.check(id)?;
        self.put_resource(id, &StoredResource::Raster(raster.clone()))
    }

    pub fn create_folder(&self, id: &str) -> Result<(), PlatformError> {
        let path = self.folder_path(id)?;
        std::fs::create_dir_all(path)?;
        Ok(())
    }

    fn folder_path(&self, id: &str) -> Result<PathBuf, PlatformError> {
        let mut path = self.root.clone();
        for segment in id_segments(id)? {
            path.push(segment);
        }
        Ok(path)
    }

    fn resource_path(&self, id: &str) -> Result<PathBuf, PlatformError> {
        Ok(json_file(self.folder_path(id)?))
    }

    fn side_path(&self, dir: &str, id: &str) -> Result<PathBuf, PlatformError> {
        let mut path = self.root.join(dir);
        for segment in id_segments(id)? {
            path.push(segment);
        }
        Ok(json_file(path))
    }

    fn exists(&self, id: &str) -> Result<bool, PlatformError> {
        Ok(self.resource_path(id)?.is_file() || self.folder_path(id)?.is_dir())
    }

    fn load(&self, id: &str) -> Result<StoredResource, PlatformError> {
        let path = self.resource_path(id)?;
        if !path.is_file() {
            return Err(PlatformError::NotFound(id.to_string()));
        }
        let raw = std::fs::read_to_string(&path)?;
        serde_json::from_str(&raw).map_err(|e| PlatformError::Malformed {
            id: id.to_string(),
            message: e.to_string(),
        })
    }

    fn load_raster(&self, id: &str) -> Result<RasterData, PlatformError> {
        match self.load(id)? {
            StoredResource::Raster(raster) => {
                raster.check(id)?;
                Ok(raster)
            }
            StoredResource::Table(_) => Err(PlatformError::WrongKind {
                id: id.to_string(),
                expected: "raster",
            }),
        }
    }

    fn record_job(&self, status: JobStatus) -> Result<(), PlatformError> {
        let path = self.side_path(JOBS_DIR, &status.id)?;
        write_json_atomic(&path, &status)?;
        self.jobs.lock().insert(status.id.clone(), status);
        Ok(())
    }
}

fn json_file(path: PathBuf) -> PathBuf {
    let mut raw = path.into_os_string();
    raw.push(".json");
    PathBuf::from(raw)
}

/// Split an id into path segments, rejecting anything that could escape the root.
fn id_segments(id: &str) -> Result<Vec<&str>, PlatformError> {
    let trimmed = id.trim_matches('/');
    let segments: Vec<&str> = trimmed.split('/').collect();
    let bad = trimmed.is_empty()
        || segments
            .iter()
            .any(|s| s.is_empty() || *s == "." || *s == ".." || s.contains('\\'));
    if bad {
        return Err(PlatformError::Malformed {
            id: id.to_string(),
            message: "invalid resource id".to_string(),
        });
    }
    Ok(segments)
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), PlatformError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_vec_pretty(value).map_err(|e| PlatformError::Malformed {
        id: path.display().to_string(),
        message: e.to_string(),
    })?;
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Create `path` only if it does not exist yet. The document is written to a hidden
/// temp file first and hard-linked into place, so a failed write never leaves a
/// partial document under the final name.
fn write_json_new<T: Serialize>(path: &Path, value: &T) -> Result<bool, PlatformError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let body = serde_json::to_vec_pretty(value).map_err(|e| PlatformError::Malformed {
        id: path.display().to_string(),
        message: e.to_string(),
    })?;
    if path.exists() {
        return Ok(false);
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = dir.join(format!(".{}.{}.tmp", file_name, unique_suffix()));
    let written = std::fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(&body)?;
        file.sync_all()
    });
    let linked = written.and_then(|()| std::fs::hard_link(&tmp, path));
    if let Err(e) = std::fs::remove_file(&tmp) {
        debug!(path = %tmp.display(), error = %e, "Temp file already gone");
    }
    match linked {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn kind_of(path: &Path) -> Option<ResourceKind> {
    let raw = std::fs::read_to_string(path).ok()?;
    let value: Value = serde_json::from_str(&raw).ok()?;
    match value.get("type")?.as_str()? {
        "table" => Some(ResourceKind::Table),
        "raster" => Some(ResourceKind::Raster),
        _ => None,
    }
}

#[async_trait]
impl GeoPlatform for LocalPlatform {
    async fn list_resources(&self, container: &str) -> Result<Vec<ResourceInfo>, PlatformError> {
        let dir = self.folder_path(container)?;
        if !dir.is_dir() {
            return Err(PlatformError::NotFound(container.to_string()));
        }
        let prefix = container.trim_matches('/');
        let mut out = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| PlatformError::Transient(e.to_string()))?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            if file_name.starts_with('.') {
                continue;
            }
            let (name, kind) = if entry.file_type().is_dir() {
                (file_name, ResourceKind::Folder)
            } else if let Some(stem) = file_name.strip_suffix(".json") {
                match kind_of(entry.path()) {
                    Some(kind) => (stem.to_string(), kind),
                    None => {
                        warn!(path = %entry.path().display(), "Skipping unreadable resource document");
                        continue;
                    }
                }
            } else {
                continue;
            };
            out.push(ResourceInfo {
                id: format!("{}/{}", prefix, name),
                name,
                kind,
            });
        }
        Ok(out)
    }

    async fn read_table(&self, id: &str) -> Result<FeatureCollection, PlatformError> {
        match self.load(id)? {
            StoredResource::Table(table) => Ok(table),
            StoredResource::Raster(_) => Err(PlatformError::WrongKind {
                id: id.to_string(),
                expected: "table",
            }),
        }
    }

    async fn read_raster(&self, id: &str) -> Result<RasterInfo, PlatformError> {
        let raster = self.load_raster(id)?;
        Ok(RasterInfo {
            id: id.to_string(),
            projection: raster.projection.clone(),
            footprint: raster.footprint(),
            bands: raster.bands.iter().map(|b| b.name.clone()).collect(),
            gsd_m: raster.gsd_m,
        })
    }

    async fn reduce_mean(
        &self,
        raster_id: &str,
        region: &Geometry,
        params: &ReduceParams,
    ) -> Result<BandMeans, PlatformError> {
        let raster = self.load_raster(raster_id)?;
        raster.reduce_mean(region, params)
    }

    async fn start_export(
        &self,
        table: &FeatureCollection,
        destination: &str,
        description: &str,
    ) -> Result<JobHandle, PlatformError> {
        let destination_path = self.resource_path(destination)?;
        let handle = JobHandle {
            id: new_job_id(),
            description: description.to_string(),
            destination: destination.to_string(),
        };
        self.record_job(JobStatus {
            id: handle.id.clone(),
            state: JobState::Pending,
            error_message: None,
            destination: destination.to_string(),
            updated_at: now_rfc3339(),
        })?;
        debug!(job_id = %handle.id, destination, "Export job queued");

        // Runs to a terminal state before returning: a caller that stops waiting (or
        // exits) must not leave the job behind.
        let status = |state: JobState, error_message: Option<String>| JobStatus {
            id: handle.id.clone(),
            state,
            error_message,
            destination: destination.to_string(),
            updated_at: now_rfc3339(),
        };
        self.record_job(status(JobState::Running, None))?;
        let document = StoredResource::Table(table.clone());
        let finished = match write_json_new(&destination_path, &document) {
            Ok(true) => status(JobState::Completed, None),
            Ok(false) => status(
                JobState::Failed,
                Some(format!("Cannot overwrite asset '{}'", destination)),
            ),
            Err(e) => status(JobState::Failed, Some(e.to_string())),
        };
        debug!(job_id = %handle.id, state = %finished.state, "Export job finished");
        self.record_job(finished)?;

        Ok(handle)
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatus, PlatformError> {
        if let Some(status) = self.jobs.lock().get(job_id) {
            return Ok(status.clone());
        }
        let path = self.side_path(JOBS_DIR, job_id)?;
        if !path.is_file() {
            return Err(PlatformError::NotFound(job_id.to_string()));
        }
        let raw = std::fs::read_to_string(&path)?;
        serde_json::from_str(&raw).map_err(|e| PlatformError::Malformed {
            id: job_id.to_string(),
            message: e.to_string(),
        })
    }

    async fn get_acl(&self, id: &str) -> Result<AccessControl, PlatformError> {
        if !self.exists(id)? {
            return Err(PlatformError::NotFound(id.to_string()));
        }
        let path = self.side_path(ACL_DIR, id)?;
        if !path.is_file() {
            return Ok(AccessControl::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        serde_json::from_str(&raw).map_err(|e| PlatformError::Malformed {
            id: id.to_string(),
            message: e.to_string(),
        })
    }

    async fn set_acl(&self, id: &str, acl: &AccessControl) -> Result<(), PlatformError> {
        if !self.exists(id)? {
            return Err(PlatformError::NotFound(id.to_string()));
        }
        write_json_atomic(&self.side_path(ACL_DIR, id)?, acl)
    }

    async fn create_marker(&self, id: &str, body: &Value) -> Result<bool, PlatformError> {
        write_json_new(&self.side_path(MARKERS_DIR, id)?, body)
    }

    async fn read_marker(&self, id: &str) -> Result<Option<Value>, PlatformError> {
        let path = self.side_path(MARKERS_DIR, id)?;
        if !path.is_file() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)?;
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| PlatformError::Malformed {
                id: id.to_string(),
                message: e.to_string(),
            })
    }

    async fn delete_marker(&self, id: &str) -> Result<(), PlatformError> {
        let path = self.side_path(MARKERS_DIR, id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
