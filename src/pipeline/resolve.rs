//! Source asset resolution across the two live naming variants.

use crate::error::PipelineError;
use crate::naming::{NameVariant, SourceNaming};
use crate::period::PeriodLabel;
use crate::platform::SharedPlatform;
use crate::telemetry::emit_event;
use serde::Serialize;
use tracing::{debug, info, warn};

/// A resolved source asset and the naming variant it was found under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAsset {
    pub id: String,
    pub period: PeriodLabel,
    pub variant: NameVariant,
}

pub struct AssetResolver {
    platform: SharedPlatform,
    naming: SourceNaming,
    container: String,
}

impl AssetResolver {
    pub fn new(platform: SharedPlatform, naming: SourceNaming, container: impl Into<String>) -> Self {
        Self {
            platform,
            naming,
            container: container.into(),
        }
    }

    /// Try each naming variant in order; the first readable raster wins.
    ///
    /// Nothing is cached: every call asks the platform again.
    pub async fn resolve(&self, period: PeriodLabel) -> Result<ResolvedAsset, PipelineError> {
        let mut tried = Vec::with_capacity(NameVariant::LOOKUP_ORDER.len());
        for variant in NameVariant::LOOKUP_ORDER {
            let candidate = self.naming.asset_id(&self.container, period, variant);
            match self.platform.read_raster(&candidate).await {
                Ok(_) => {
                    info!(
                        period = %period,
                        asset_id = %candidate,
                        variant = variant.as_str(),
                        "Resolved source asset"
                    );
                    let resolved = ResolvedAsset {
                        id: candidate,
                        period,
                        variant,
                    };
                    emit_event("asset_resolved", &resolved);
                    return Ok(resolved);
                }
                Err(e) if e.is_not_found() => {
                    debug!(asset_id = %candidate, "Candidate not found");
                }
                Err(e) => {
                    warn!(asset_id = %candidate, error = %e, "Candidate lookup failed");
                }
            }
            tried.push(candidate);
        }
        Err(PipelineError::AssetNotFound {
            period: period.to_string(),
            tried,
        })
    }
}
