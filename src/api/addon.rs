//! Read-only access to addon services (system-managed)
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::client::F5xcClient;
use super::models::Metadata;
use crate::error::Result;

/// Addon service object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddonService {
    pub metadata: Metadata,
    #[serde(default)]
    pub spec: Map<String, Value>,
}

/// Detailed addon service information from the custom API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddonServiceDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addon_service_group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addon_service_group_display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_activation: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partially_managed_activation: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_activation: Option<Map<String, Value>>,
}

/// Activation state of an addon service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddonServiceActivationStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl F5xcClient {
    pub async fn get_addon_service(&self, namespace: &str, name: &str) -> Result<AddonService> {
        self.get(&format!(
            "/api/web/namespaces/{}/addon_services/{}",
            namespace, name
        ))
        .await
    }

    pub async fn addon_service_details(&self, name: &str) -> Result<AddonServiceDetails> {
        self.get(&format!(
            "/api/web/custom/namespaces/shared/addon_services/{}",
            name
        ))
        .await
    }

    pub async fn addon_service_activation_status(
        &self,
        addon_service: &str,
    ) -> Result<AddonServiceActivationStatus> {
        self.get(&format!(
            "/api/web/namespaces/system/addon_services/{}/activation-status",
            addon_service
        ))
        .await
    }

    pub async fn list_addon_services(&self, namespace: &str) -> Result<Vec<AddonService>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            items: Vec<AddonService>,
        }
        let response: Response = self
            .get(&format!("/api/web/namespaces/{}/addon_services", namespace))
            .await?;
        Ok(response.items)
    }
}
