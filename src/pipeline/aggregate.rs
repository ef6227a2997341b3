//! Spatial aggregation of one source raster onto the metrics table.
//!
//! One call adds exactly one period column to every row, or leaves the table untouched.

use crate::error::AggregationError;
use crate::geometry::Geometry;
use crate::naming::SourceNaming;
use crate::period::PeriodLabel;
use crate::platform::{BandMeans, ReduceParams, SharedPlatform};
use crate::table::FeatureCollection;
use serde_json::Value;
use tracing::{debug, info, warn};

/// What subdivisions participate and how rows are keyed.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSettings {
    pub id_attribute: String,
    pub region_code: String,
    pub codes: Vec<String>,
    pub reduce: ReduceParams,
}

/// Result of aggregating one asset.
#[derive(Debug, Clone)]
pub enum Aggregation {
    Added {
        period: PeriodLabel,
        table: FeatureCollection,
    },
    Unchanged {
        table: FeatureCollection,
        reason: String,
    },
}

impl Aggregation {
    pub fn table(&self) -> &FeatureCollection {
        match self {
            Aggregation::Added { table, .. } | Aggregation::Unchanged { table, .. } => table,
        }
    }
}

pub struct SpatialAggregator {
    platform: SharedPlatform,
    naming: SourceNaming,
    subdivisions: FeatureCollection,
    settings: AggregationSettings,
}

impl SpatialAggregator {
    /// `references` is the full subdivision set; only allow-listed codes are kept.
    pub fn new(
        platform: SharedPlatform,
        naming: SourceNaming,
        references: &FeatureCollection,
        settings: AggregationSettings,
    ) -> Self {
        let subdivisions = references.filter_codes(&settings.id_attribute, &settings.codes);
        Self {
            platform,
            naming,
            subdivisions,
            settings,
        }
    }

    pub fn subdivisions(&self) -> &FeatureCollection {
        &self.subdivisions
    }

    /// Add the period column for `asset_id`; on any failure return the table unchanged.
    pub async fn aggregate(&self, asset_id: &str, mut table: FeatureCollection) -> Aggregation {
        match self.compute(asset_id, &table).await {
            Ok((period, values)) => {
                let column = period.to_string();
                for (row, value) in table.features.iter_mut().zip(values) {
                    row.set(column.clone(), value);
                }
                info!(asset_id, period = %period, rows = table.len(), "Aggregated period");
                Aggregation::Added { period, table }
            }
            Err(e) => {
                warn!(asset_id, error = %e, "Error processing image, table left unchanged");
                Aggregation::Unchanged {
                    table,
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn compute(
        &self,
        asset_id: &str,
        table: &FeatureCollection,
    ) -> Result<(PeriodLabel, Vec<Value>), AggregationError> {
        let (period, _) = self.naming.parse(asset_id)?;
        let raster = self.platform.read_raster(asset_id).await?;
        debug!(
            asset_id,
            projection = %raster.projection,
            bands = raster.bands.len(),
            "Loaded source raster"
        );

        let region_mean = self.scalar_mean(asset_id, &raster.footprint, "footprint").await?;

        let mut values = Vec::with_capacity(table.len());
        for (row, feature) in table.features.iter().enumerate() {
            let code = feature.get_str(&self.settings.id_attribute).ok_or_else(|| {
                AggregationError::MissingCode {
                    row,
                    attribute: self.settings.id_attribute.clone(),
                }
            })?;
            let value = if code == self.settings.region_code {
                region_mean
            } else {
                let geometry = self.subdivision_geometry(&code)?;
                self.scalar_mean(asset_id, geometry, &code).await?
            };
            values.push(Value::from(value));
        }
        Ok((period, values))
    }

    fn subdivision_geometry(&self, code: &str) -> Result<&Geometry, AggregationError> {
        self.subdivisions
            .find_by(&self.settings.id_attribute, code)
            .and_then(|f| f.geometry.as_ref())
            .ok_or_else(|| AggregationError::UnknownSubdivision(code.to_string()))
    }

    async fn scalar_mean(
        &self,
        asset_id: &str,
        region: &Geometry,
        label: &str,
    ) -> Result<f64, AggregationError> {
        let means = self
            .platform
            .reduce_mean(asset_id, region, &self.settings.reduce)
            .await?;
        mean_of_bands(&means).ok_or_else(|| AggregationError::NoData(label.to_string()))
    }
}

/// Average of the band means that have data.
pub fn mean_of_bands(means: &BandMeans) -> Option<f64> {
    let valid: Vec<f64> = means.values().flatten().copied().collect();
    if valid.is_empty() {
        None
    } else {
        Some(valid.iter().sum::<f64>() / valid.len() as f64)
    }
}
