//! Date gap resolution: which periods have a source raster but no table column.

use crate::error::PlatformError;
use crate::naming::SourceNaming;
use crate::period::PeriodLabel;
use crate::platform::{ResourceKind, SharedPlatform};
use crate::table::FeatureCollection;
use serde::Serialize;
use tracing::{debug, warn};

/// Available, processed and missing periods of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodGaps {
    pub available: Vec<PeriodLabel>,
    pub processed: Vec<PeriodLabel>,
    pub missing: Vec<PeriodLabel>,
}

impl PeriodGaps {
    pub fn from_sets(available: Vec<PeriodLabel>, processed: Vec<PeriodLabel>) -> Self {
        let missing = missing_periods(&available, &processed);
        Self {
            available,
            processed,
            missing,
        }
    }
}

pub struct GapResolver {
    platform: SharedPlatform,
    naming: SourceNaming,
}

impl GapResolver {
    pub fn new(platform: SharedPlatform, naming: SourceNaming) -> Self {
        Self { platform, naming }
    }

    /// Periods with a raster in `source_container`, in listing order without duplicates.
    pub async fn available_periods(
        &self,
        source_container: &str,
    ) -> Result<Vec<PeriodLabel>, PlatformError> {
        let resources = self.platform.list_resources(source_container).await?;
        let mut periods = Vec::new();
        for resource in resources {
            if resource.kind != ResourceKind::Raster {
                debug!(id = %resource.id, "Skipping non-raster resource");
                continue;
            }
            match self.naming.parse(&resource.name) {
                Ok((period, _)) if !periods.contains(&period) => periods.push(period),
                Ok(_) => {}
                Err(e) => warn!(id = %resource.id, error = %e, "Couldn't parse date, skipping"),
            }
        }
        Ok(periods)
    }

    /// Run both sides of the comparison against a loaded table.
    pub async fn resolve(
        &self,
        source_container: &str,
        table: &FeatureCollection,
    ) -> Result<PeriodGaps, PlatformError> {
        let available = self.available_periods(source_container).await?;
        let processed = processed_periods(table);
        Ok(PeriodGaps::from_sets(available, processed))
    }
}

/// Period columns on the table's first row.
pub fn processed_periods(table: &FeatureCollection) -> Vec<PeriodLabel> {
    let mut periods = Vec::new();
    for column in table.period_columns() {
        match column.parse::<PeriodLabel>() {
            Ok(period) if !periods.contains(&period) => periods.push(period),
            Ok(_) => {}
            Err(_) => debug!(column = %column, "Ignoring non-period column"),
        }
    }
    periods
}

/// `available - processed`, keeping the order of `available`.
pub fn missing_periods(available: &[PeriodLabel], processed: &[PeriodLabel]) -> Vec<PeriodLabel> {
    available
        .iter()
        .filter(|p| !processed.contains(p))
        .copied()
        .collect()
}
