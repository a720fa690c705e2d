//! Checks that deleted objects are really gone
use std::time::Duration;
use tracing::debug;

use super::tracker::TrackedResource;
use crate::api::client::F5xcClient;
use crate::error::{ErrorCode, F5xcError, Result};
use crate::resources::registry::ResourceType;
use crate::utils::polling::PollingConfig;

/// Ok only when the API reports NOT_FOUND for the object
pub async fn verify_destroyed(
    client: &F5xcClient,
    kind: ResourceType,
    namespace: &str,
    name: &str,
) -> Result<()> {
    match client.resource(kind).get(namespace, name).await {
        Ok(_) => Err(F5xcError::new(
            ErrorCode::Conflict,
            format!("{} {} still exists", kind, name),
        )
        .with_resource(kind.name)
        .with_operation("verify_destroyed")
        .with_detail("namespace", namespace)),
        Err(e) if e.is_not_found() => {
            debug!("{} {} destroyed", kind, name);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Poll until the object is gone or `timeout` elapses
pub async fn wait_for_destroyed(
    client: &F5xcClient,
    kind: ResourceType,
    namespace: &str,
    name: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<()> {
    PollingConfig::new(timeout, interval, format!("Waiting for {} {} to be deleted", kind, name))
        .poll_until(|| async {
            match verify_destroyed(client, kind, namespace, name).await {
                Ok(()) => Ok(true),
                Err(e) if e.code == ErrorCode::Conflict => Ok(false),
                Err(e) => Err(e),
            }
        })
        .await
}

/// Verify every given object is gone, collecting all failures
pub async fn verify_tracked_destroyed(
    client: &F5xcClient,
    resources: &[TrackedResource],
) -> std::result::Result<(), Vec<F5xcError>> {
    let mut failures = Vec::new();
    for resource in resources {
        if let Err(e) =
            verify_destroyed(client, resource.kind, &resource.namespace, &resource.name).await
        {
            failures.push(e);
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}
