//! Namespace endpoints under `/api/web/namespaces`
use tracing::info;

use super::client::F5xcClient;
use super::models::{ListResponse, Resource};
use crate::error::Result;

pub const NAMESPACES_PATH: &str = "/api/web/namespaces";

impl F5xcClient {
    /// List all namespaces of the tenant
    pub async fn list_namespaces(&self) -> Result<Vec<Resource>> {
        let response: ListResponse = self.get(NAMESPACES_PATH).await?;
        Ok(response.items)
    }

    /// Names of every namespace, in API order
    pub async fn namespace_names(&self) -> Result<Vec<String>> {
        Ok(self
            .list_namespaces()
            .await?
            .into_iter()
            .map(|ns| ns.metadata.name)
            .collect())
    }

    /// Delete a namespace and everything inside it.
    ///
    /// Plain DELETE on a namespace returns 501, so the API exposes this as a
    /// POST with an empty body.
    pub async fn cascade_delete_namespace(&self, name: &str) -> Result<()> {
        info!("Cascade deleting namespace: {}", name);
        let path = format!("{}/{}/cascade_delete", NAMESPACES_PATH, name);
        let _: serde_json::Value = self.post(&path, &serde_json::json!({})).await?;
        Ok(())
    }
}
