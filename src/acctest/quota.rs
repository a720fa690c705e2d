//! Skip tests up front when the tenant has no room for the objects they
//! create.
use std::time::Duration;
use tracing::{info, warn};

use crate::api::client::{with_deadline, F5xcClient};

pub const QUOTA_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// What a test needs from a quota
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaRequirement {
    /// At least one free slot
    Available,
    /// Usage strictly below this percentage
    BelowPercent(i64),
    /// At least this many free slots
    AtLeast(i64),
}

/// Reason to skip, or `None` to proceed.
///
/// Quota lookups that fail never skip a test; the failure is only logged.
pub async fn quota_skip_reason(
    client: &F5xcClient,
    namespace: &str,
    resource_type: &str,
    requirement: QuotaRequirement,
) -> Option<String> {
    let info = match with_deadline(
        QUOTA_CHECK_TIMEOUT,
        resource_type,
        "quota_check",
        client.quota_info(namespace, resource_type),
    )
    .await
    {
        Ok(info) => info,
        Err(e) => {
            warn!("Quota check for {} failed: {}", resource_type, e);
            return None;
        }
    };

    match requirement {
        QuotaRequirement::Available if info.available <= 0 => Some(format!(
            "quota exhausted for {}: {}/{} used",
            resource_type, info.used, info.limit
        )),
        QuotaRequirement::BelowPercent(threshold) if info.percent_used() >= threshold => {
            Some(format!(
                "quota for {} at {}% (threshold {}%): {}/{} used",
                resource_type,
                info.percent_used(),
                threshold,
                info.used,
                info.limit
            ))
        }
        QuotaRequirement::AtLeast(required) if info.available < required => Some(format!(
            "insufficient quota for {}: need {}, {} available",
            resource_type, required, info.available
        )),
        _ => None,
    }
}

/// Log usage for every quota-tracked type in `namespace`
pub async fn log_quota_usage(client: &F5xcClient, namespace: &str) {
    match client.all_quota_info(namespace).await {
        Ok(quotas) => {
            for q in quotas {
                info!(
                    "Quota {}: {}/{} used ({}%), {} available",
                    q.resource_type,
                    q.used,
                    q.limit,
                    q.percent_used(),
                    q.available
                );
            }
        }
        Err(e) => warn!("Failed to read quota usage for {}: {}", namespace, e),
    }
}
