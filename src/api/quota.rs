//! Tenant quota usage
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::client::F5xcClient;
use crate::error::{F5xcError, Result};

/// Response of `/api/web/namespaces/{ns}/quota/usage`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotaUsageResponse {
    #[serde(default)]
    pub objects: HashMap<String, ObjectQuota>,
}

/// Limit and usage of one object type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectQuota {
    #[serde(default)]
    pub limit: LimitValue,
    #[serde(default)]
    pub usage: UsageValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitValue {
    #[serde(default)]
    pub maximum: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageValue {
    #[serde(default)]
    pub current: i64,
}

/// Flattened quota view for a single resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaInfo {
    pub resource_type: String,
    pub limit: i64,
    pub used: i64,
    pub available: i64,
}

impl QuotaInfo {
    fn from_quota(resource_type: &str, quota: &ObjectQuota) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            limit: quota.limit.maximum,
            used: quota.usage.current,
            available: quota.limit.maximum - quota.usage.current,
        }
    }

    /// Usage as a percentage of the limit; 0 when no positive limit is set
    pub fn percent_used(&self) -> i64 {
        if self.limit <= 0 {
            return 0;
        }
        self.used * 100 / self.limit
    }
}

pub fn quota_usage_path(namespace: &str) -> String {
    format!("/api/web/namespaces/{}/quota/usage", namespace)
}

impl F5xcClient {
    /// Fetch raw quota usage for a namespace
    pub async fn quota_usage(&self, namespace: &str) -> Result<QuotaUsageResponse> {
        self.get(&quota_usage_path(namespace)).await.map_err(|e| {
            F5xcError::wrap(e, "quota", &format!("get usage for namespace {}", namespace))
        })
    }

    /// Quota of a single resource type
    pub async fn quota_info(&self, namespace: &str, resource_type: &str) -> Result<QuotaInfo> {
        let usage = self.quota_usage(namespace).await?;
        let quota = usage.objects.get(resource_type).ok_or_else(|| {
            F5xcError::not_found("quota", resource_type, namespace).with_operation("quota_info")
        })?;
        Ok(QuotaInfo::from_quota(resource_type, quota))
    }

    /// Whether at least one more object of `resource_type` can be created
    pub async fn is_quota_available(&self, namespace: &str, resource_type: &str) -> Result<bool> {
        Ok(self.quota_info(namespace, resource_type).await?.available > 0)
    }

    /// Quota of every resource type in the namespace, sorted by type
    pub async fn all_quota_info(&self, namespace: &str) -> Result<Vec<QuotaInfo>> {
        let usage = self.quota_usage(namespace).await?;
        let mut infos: Vec<QuotaInfo> = usage
            .objects
            .iter()
            .map(|(resource_type, quota)| QuotaInfo::from_quota(resource_type, quota))
            .collect();
        infos.sort_by(|a, b| a.resource_type.cmp(&b.resource_type));
        Ok(infos)
    }
}
