//! Tracks objects created during a test session so cleanup only removes
//! what this session created.
use chrono::{DateTime, Utc};
use std::sync::{LazyLock, PoisonError, RwLock};
use std::time::Duration;
use tracing::{info, warn};

use super::rate_limit::RateLimiter;
use crate::api::client::{with_deadline, F5xcClient};
use crate::error::Result;
use crate::resources::registry::{
    ResourceType, APP_FIREWALL, HEALTHCHECK, HTTP_LOADBALANCER, IP_PREFIX_SET,
    MALICIOUS_USER_MITIGATION, NAMESPACE, ORIGIN_POOL, RATE_LIMITER, SERVICE_POLICY,
    USER_IDENTIFICATION,
};

/// Deadline for a single cleanup delete
pub const DELETE_TIMEOUT: Duration = Duration::from_secs(60);

/// Types deleted first, most dependent first. Anything else follows, then
/// namespaces.
pub const DELETE_ORDER: &[ResourceType] = &[
    HTTP_LOADBALANCER,
    ORIGIN_POOL,
    HEALTHCHECK,
    APP_FIREWALL,
    SERVICE_POLICY,
    IP_PREFIX_SET,
    RATE_LIMITER,
    USER_IDENTIFICATION,
    MALICIOUS_USER_MITIGATION,
];

static GLOBAL: LazyLock<ResourceTracker> = LazyLock::new(ResourceTracker::new);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedResource {
    pub kind: ResourceType,
    pub name: String,
    /// Empty for namespaces
    pub namespace: String,
    pub created_at: DateTime<Utc>,
}

impl TrackedResource {
    fn matches(&self, kind: ResourceType, name: &str, namespace: &str) -> bool {
        self.kind == kind && self.name == name && self.namespace == namespace
    }
}

/// Outcome of [`ResourceTracker::cleanup_tracked`]
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub deleted: usize,
    pub failures: Vec<(TrackedResource, crate::error::F5xcError)>,
}

impl CleanupReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ResourceTracker {
    resources: RwLock<Vec<TrackedResource>>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker shared by the whole test process
    pub fn global() -> &'static ResourceTracker {
        &GLOBAL
    }

    pub fn track(&self, kind: ResourceType, name: &str, namespace: &str) {
        self.resources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(TrackedResource {
                kind,
                name: name.to_string(),
                namespace: namespace.to_string(),
                created_at: Utc::now(),
            });
        info!("Tracking {}: {} (namespace: {})", kind, name, namespace);
    }

    pub fn track_namespace(&self, name: &str) {
        self.track(NAMESPACE, name, "");
    }

    pub fn tracked(&self) -> Vec<TrackedResource> {
        self.resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn tracked_by_type(&self, kind: ResourceType) -> Vec<TrackedResource> {
        self.resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    /// Stop tracking one object; returns whether it was tracked
    pub fn remove(&self, kind: ResourceType, name: &str, namespace: &str) -> bool {
        let mut resources = self
            .resources
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match resources.iter().position(|r| r.matches(kind, name, namespace)) {
            Some(index) => {
                resources.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        self.resources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        info!("Cleared all tracked resources");
    }

    pub fn len(&self) -> usize {
        self.resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tracked objects in deletion order
    pub fn cleanup_order(&self) -> Vec<TrackedResource> {
        let tracked = self.tracked();
        let rank = |r: &TrackedResource| {
            if r.kind.is_namespace() {
                DELETE_ORDER.len() + 1
            } else {
                DELETE_ORDER
                    .iter()
                    .position(|k| *k == r.kind)
                    .unwrap_or(DELETE_ORDER.len())
            }
        };
        let mut ordered = tracked;
        // stable: keeps tracking order within a rank
        ordered.sort_by_key(rank);
        ordered
    }

    /// Delete every tracked object in dependency order.
    ///
    /// NOT_FOUND counts as deleted. Successfully deleted objects are untracked;
    /// failures stay tracked and are returned in the report.
    pub async fn cleanup_tracked(
        &self,
        client: &F5xcClient,
        limiter: &RateLimiter,
    ) -> CleanupReport {
        let ordered = self.cleanup_order();
        let mut report = CleanupReport::default();
        if ordered.is_empty() {
            info!("No tracked resources to clean up");
            return report;
        }

        info!("Starting cleanup of {} tracked resources", ordered.len());
        for resource in ordered {
            limiter.wait_for_cleanup().await;

            match delete_tracked(client, &resource).await {
                Ok(()) => {
                    self.remove(resource.kind, &resource.name, &resource.namespace);
                    report.deleted += 1;
                }
                Err(e) => {
                    warn!(
                        "Failed to delete {} {}: {}",
                        resource.kind, resource.name, e
                    );
                    report.failures.push((resource, e));
                }
            }
        }

        if report.is_success() {
            info!("Successfully cleaned up all tracked resources");
        } else {
            warn!("Cleanup completed with {} errors", report.failures.len());
        }
        report
    }
}

async fn delete_tracked(client: &F5xcClient, resource: &TrackedResource) -> Result<()> {
    info!(
        "Deleting {}: {} (namespace: {})",
        resource.kind, resource.name, resource.namespace
    );
    let result = with_deadline(
        DELETE_TIMEOUT,
        resource.kind.name,
        "delete",
        client
            .resource(resource.kind)
            .delete(&resource.namespace, &resource.name),
    )
    .await;

    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::registry::DNS_ZONE;

    #[test]
    fn test_track_and_remove() {
        let tracker = ResourceTracker::new();
        tracker.track(ORIGIN_POOL, "pool", "ns");
        tracker.track_namespace("ns");
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.tracked_by_type(NAMESPACE)[0].namespace, "");

        assert!(tracker.remove(ORIGIN_POOL, "pool", "ns"));
        assert!(!tracker.remove(ORIGIN_POOL, "pool", "ns"));
        assert_eq!(tracker.len(), 1);

        tracker.clear();
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_cleanup_order() {
        let tracker = ResourceTracker::new();
        tracker.track_namespace("ns");
        tracker.track(DNS_ZONE, "zone", "ns");
        tracker.track(ORIGIN_POOL, "pool", "ns");
        tracker.track(HTTP_LOADBALANCER, "lb", "ns");
        tracker.track(HEALTHCHECK, "hc", "ns");

        let kinds: Vec<&str> = tracker
            .cleanup_order()
            .iter()
            .map(|r| r.kind.name)
            .collect();
        assert_eq!(
            kinds,
            vec!["http_loadbalancer", "origin_pool", "healthcheck", "dns_zone", "namespace"]
        );
    }
}
