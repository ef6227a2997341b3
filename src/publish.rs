//! Access publication: flip the public-read flag on resources, idempotently.

use crate::error::PlatformError;
use crate::platform::SharedPlatform;
use serde::Serialize;
use tracing::{error, info, warn};

/// Counts from publishing one container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishSummary {
    pub container: String,
    pub listed: usize,
    pub already_public: usize,
    pub made_public: usize,
    pub failed: usize,
}

pub struct AccessPublisher {
    platform: SharedPlatform,
}

impl AccessPublisher {
    pub fn new(platform: SharedPlatform) -> Self {
        Self { platform }
    }

    /// Whether the resource is publicly readable. A failed read counts as not public.
    pub async fn is_public(&self, resource_id: &str) -> bool {
        match self.platform.get_acl(resource_id).await {
            Ok(acl) => acl.all_users_can_read,
            Err(e) => {
                warn!(resource_id, error = %e, "Error verifying asset status");
                false
            }
        }
    }

    /// Make a resource public. Returns true only when the flag was changed.
    pub async fn make_public(&self, resource_id: &str) -> bool {
        if self.is_public(resource_id).await {
            return false;
        }
        self.set_public(resource_id).await
    }

    async fn set_public(&self, resource_id: &str) -> bool {
        let result: Result<(), PlatformError> = async {
            let mut acl = self.platform.get_acl(resource_id).await?;
            acl.all_users_can_read = true;
            self.platform.set_acl(resource_id, &acl).await
        }
        .await;
        match result {
            Ok(()) => {
                info!(resource_id, "Asset is now public");
                true
            }
            Err(e) => {
                error!(resource_id, error = %e, "Error making asset public");
                false
            }
        }
    }

    /// Make every resource directly under `container` public.
    ///
    /// A listing failure aborts this container only; per-resource failures are counted.
    pub async fn publish_container(&self, container: &str) -> Result<PublishSummary, PlatformError> {
        let resources = match self.platform.list_resources(container).await {
            Ok(resources) => resources,
            Err(e) => {
                error!(container, error = %e, "Error listing assets for publication");
                return Err(e);
            }
        };
        info!(container, count = resources.len(), "Found assets");

        let mut summary = PublishSummary {
            container: container.to_string(),
            listed: resources.len(),
            ..PublishSummary::default()
        };
        for resource in &resources {
            if self.is_public(&resource.id).await {
                summary.already_public += 1;
            } else if self.set_public(&resource.id).await {
                summary.made_public += 1;
            } else {
                summary.failed += 1;
            }
        }
        info!(
            container,
            already_public = summary.already_public,
            made_public = summary.made_public,
            failed = summary.failed,
            "Published container"
        );
        Ok(summary)
    }
}
