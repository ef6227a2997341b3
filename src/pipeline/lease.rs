//! Run lease: a marker record guarding a table container against concurrent backfills.

use crate::error::{PipelineError, PlatformError};
use crate::platform::SharedPlatform;
use crate::telemetry::{now_millis, now_rfc3339};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Contents of the lease marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub owner: String,
    pub acquired_at: String,
    pub acquired_at_ms: u64,
}

impl LeaseRecord {
    fn fresh(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            acquired_at: now_rfc3339(),
            acquired_at_ms: now_millis(),
        }
    }

    pub fn is_stale(&self, stale_after: Duration, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.acquired_at_ms) > stale_after.as_millis() as u64
    }
}

/// A held lease. Release it explicitly; there is no async drop.
pub struct RunLease {
    platform: SharedPlatform,
    lease_id: String,
    owner: String,
}

impl RunLease {
    /// Marker id used for a table container.
    pub fn lease_id_for(table_container: &str) -> String {
        format!("{}/.backfill-lease", table_container.trim_end_matches('/'))
    }

    /// Acquire the lease, taking over a stale or unreadable one.
    pub async fn acquire(
        platform: SharedPlatform,
        lease_id: &str,
        owner: &str,
        stale_after: Duration,
    ) -> Result<Self, PipelineError> {
        // Two attempts: the second only after clearing a stale marker.
        for _ in 0..2 {
            let record = LeaseRecord::fresh(owner);
            let body = serde_json::to_value(&record).map_err(|e| PlatformError::Malformed {
                id: lease_id.to_string(),
                message: e.to_string(),
            })?;
            if platform.create_marker(lease_id, &body).await? {
                info!(lease_id, owner, "Acquired run lease");
                return Ok(Self {
                    platform,
                    lease_id: lease_id.to_string(),
                    owner: owner.to_string(),
                });
            }

            let existing = platform
                .read_marker(lease_id)
                .await?
                .and_then(|v| serde_json::from_value::<LeaseRecord>(v).ok());
            match existing {
                Some(held) if !held.is_stale(stale_after, now_millis()) => {
                    return Err(PipelineError::LeaseHeld {
                        lease_id: lease_id.to_string(),
                        owner: held.owner,
                        acquired_at: held.acquired_at,
                    });
                }
                Some(held) => {
                    warn!(lease_id, previous_owner = %held.owner, "Taking over stale run lease");
                }
                None => {
                    warn!(lease_id, "Replacing unreadable run lease");
                }
            }
            platform.delete_marker(lease_id).await?;
        }
        Err(PipelineError::LeaseHeld {
            lease_id: lease_id.to_string(),
            owner: "unknown".to_string(),
            acquired_at: "unknown".to_string(),
        })
    }

    /// Delete the marker if it still belongs to this owner.
    pub async fn release(self) -> Result<(), PlatformError> {
        let current = self
            .platform
            .read_marker(&self.lease_id)
            .await?
            .and_then(|v| serde_json::from_value::<LeaseRecord>(v).ok());
        match current {
            Some(record) if record.owner == self.owner => {
                self.platform.delete_marker(&self.lease_id).await?;
                debug!(lease_id = %self.lease_id, "Released run lease");
            }
            Some(record) => {
                warn!(
                    lease_id = %self.lease_id,
                    owner = %record.owner,
                    "Run lease was taken over; leaving it in place"
                );
            }
            None => {}
        }
        Ok(())
    }
}
