//! Generic CRUD over any registered resource type
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use tracing::{debug, info};

use super::registry::ResourceType;
use crate::api::client::F5xcClient;
use crate::api::models::{ListResponse, Resource, Spec};
use crate::error::{F5xcError, Result};

/// CRUD handle bound to one resource type.
///
/// `S` is the spec type; the default [`Spec`] keeps every field as JSON so
/// any type in the registry can be handled without a dedicated struct.
pub struct ResourceApi<'a, S = Spec> {
    client: &'a F5xcClient,
    kind: ResourceType,
    _spec: PhantomData<S>,
}

impl F5xcClient {
    /// CRUD handle for `kind` with a free-form spec
    pub fn resource(&self, kind: ResourceType) -> ResourceApi<'_> {
        ResourceApi::new(self, kind)
    }

    /// CRUD handle for `kind` with a typed spec
    pub fn typed_resource<S>(&self, kind: ResourceType) -> ResourceApi<'_, S> {
        ResourceApi::new(self, kind)
    }
}

impl<'a, S> ResourceApi<'a, S> {
    pub fn new(client: &'a F5xcClient, kind: ResourceType) -> Self {
        Self {
            client,
            kind,
            _spec: PhantomData,
        }
    }

    pub fn kind(&self) -> ResourceType {
        self.kind
    }

    fn validate(&self, namespace: &str, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(F5xcError::validation(self.kind.name, "name", "must not be empty"));
        }
        if !self.kind.is_namespace() && namespace.trim().is_empty() {
            return Err(F5xcError::validation(
                self.kind.name,
                "namespace",
                "must not be empty",
            ));
        }
        Ok(())
    }

    fn label(&self, err: F5xcError, operation: &str, name: &str) -> F5xcError {
        F5xcError::wrap(err, self.kind.name, operation).with_detail("name", name)
    }
}

impl<'a, S> ResourceApi<'a, S>
where
    S: Serialize + DeserializeOwned + Default,
{
    /// Create the object in `metadata.namespace`
    pub async fn create(&self, resource: &Resource<S>) -> Result<Resource<S>> {
        let (namespace, name) = (resource.namespace(), resource.name());
        self.validate(namespace, name)?;

        info!("Creating {}: {}/{}", self.kind, namespace, name);
        self.client
            .post(&self.kind.collection_path(namespace), resource)
            .await
            .map_err(|e| self.label(e, "create", name))
    }

    pub async fn get(&self, namespace: &str, name: &str) -> Result<Resource<S>> {
        self.validate(namespace, name)?;

        debug!("Getting {}: {}/{}", self.kind, namespace, name);
        self.client
            .get(&self.kind.item_path(namespace, name))
            .await
            .map_err(|e| self.label(e, "read", name))
    }

    /// Replace the object with `resource`
    pub async fn update(&self, resource: &Resource<S>) -> Result<Resource<S>> {
        let (namespace, name) = (resource.namespace(), resource.name());
        self.validate(namespace, name)?;

        info!("Updating {}: {}/{}", self.kind, namespace, name);
        self.client
            .put(&self.kind.item_path(namespace, name), resource)
            .await
            .map_err(|e| self.label(e, "update", name))
    }

    /// Delete an object; namespaces go through cascade delete
    pub async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.validate(namespace, name)?;

        let result = if self.kind.is_namespace() {
            self.client.cascade_delete_namespace(name).await
        } else {
            info!("Deleting {}: {}/{}", self.kind, namespace, name);
            self.client.delete(&self.kind.item_path(namespace, name)).await
        };
        result.map_err(|e| self.label(e, "delete", name))
    }

    pub async fn list(&self, namespace: &str) -> Result<Vec<Resource<S>>> {
        if !self.kind.is_namespace() && namespace.trim().is_empty() {
            return Err(F5xcError::validation(
                self.kind.name,
                "namespace",
                "must not be empty",
            ));
        }

        let response: ListResponse<S> = self
            .client
            .get(&self.kind.collection_path(namespace))
            .await
            .map_err(|e| F5xcError::wrap(e, self.kind.name, "list"))?;
        Ok(response.items)
    }

    /// Whether the object exists; only NOT_FOUND counts as absent
    pub async fn exists(&self, namespace: &str, name: &str) -> Result<bool> {
        match self.get(namespace, name).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
