//! # Kubernetes Store
//!
//! [`ResourceStore`] backed by the Kubernetes API server.
//!
//! Updates go through `replace`, which sends the fetched `resourceVersion`
//! back to the API server; a stale version comes back as HTTP 409 and is
//! surfaced as [`StoreError::Conflict`].

use super::{ManagedObject, ObjectKey, ResourceKind, ResourceStore, StoreError};
use crate::constants::CONTROLLER_NAME;
use crate::crd::ArgoCD;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Secret, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::debug;

/// Live cluster store
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn get_typed<K>(&self, key: &ObjectKey) -> Result<Option<K>, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        self.api::<K>(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(|e| map_kube_error(e, key.clone()))
    }

    async fn create_typed<K>(&self, key: &ObjectKey, object: &K) -> Result<K, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug,
    {
        self.api::<K>(&key.namespace)
            .create(&post_params(), object)
            .await
            .map_err(|e| map_kube_error(e, key.clone()))
    }

    async fn replace_typed<K>(&self, key: &ObjectKey, object: &K) -> Result<K, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug,
    {
        self.api::<K>(&key.namespace)
            .replace(&key.name, &post_params(), object)
            .await
            .map_err(|e| map_kube_error(e, key.clone()))
    }
}

fn post_params() -> PostParams {
    PostParams {
        dry_run: false,
        field_manager: Some(CONTROLLER_NAME.to_string()),
    }
}

/// Classify a kube error for the reconciler
fn map_kube_error(error: kube::Error, key: ObjectKey) -> StoreError {
    match error {
        kube::Error::Api(api_err) if api_err.code == 404 => StoreError::NotFound(key),
        kube::Error::Api(api_err) if api_err.code == 409 && api_err.reason == "AlreadyExists" => {
            StoreError::AlreadyExists(key)
        }
        kube::Error::Api(api_err) if api_err.code == 409 => StoreError::Conflict(key),
        source => StoreError::Api { key, source },
    }
}

fn require_key(object: &ManagedObject) -> Result<ObjectKey, StoreError> {
    if object.name().is_empty() || object.namespace().is_empty() {
        return Err(StoreError::MissingObjectKey(object.kind()));
    }
    Ok(object.key())
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn fetch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ManagedObject>, StoreError> {
        let key = ObjectKey::new(kind, namespace, name);
        debug!("Fetching {}", key);
        let found = match kind {
            ResourceKind::ServiceAccount => self
                .get_typed::<ServiceAccount>(&key)
                .await?
                .map(ManagedObject::ServiceAccount),
            ResourceKind::Role => self.get_typed::<Role>(&key).await?.map(ManagedObject::Role),
            ResourceKind::RoleBinding => self
                .get_typed::<RoleBinding>(&key)
                .await?
                .map(ManagedObject::RoleBinding),
            ResourceKind::Deployment => self
                .get_typed::<Deployment>(&key)
                .await?
                .map(ManagedObject::Deployment),
            ResourceKind::StatefulSet => self
                .get_typed::<StatefulSet>(&key)
                .await?
                .map(ManagedObject::StatefulSet),
            ResourceKind::Secret => self.get_typed::<Secret>(&key).await?.map(ManagedObject::Secret),
            ResourceKind::Service => self
                .get_typed::<Service>(&key)
                .await?
                .map(ManagedObject::Service),
        };
        Ok(found)
    }

    async fn fetch_parent(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ArgoCD>, StoreError> {
        let api: Api<ArgoCD> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await
            .map_err(|source| StoreError::ParentFetch {
                namespace: namespace.to_string(),
                name: name.to_string(),
                source,
            })
    }

    async fn create(&self, object: ManagedObject) -> Result<ManagedObject, StoreError> {
        let key = require_key(&object)?;
        debug!("Creating {}", key);
        let created = match &object {
            ManagedObject::ServiceAccount(o) => {
                ManagedObject::ServiceAccount(self.create_typed(&key, o).await?)
            }
            ManagedObject::Role(o) => ManagedObject::Role(self.create_typed(&key, o).await?),
            ManagedObject::RoleBinding(o) => {
                ManagedObject::RoleBinding(self.create_typed(&key, o).await?)
            }
            ManagedObject::Deployment(o) => {
                ManagedObject::Deployment(self.create_typed(&key, o).await?)
            }
            ManagedObject::StatefulSet(o) => {
                ManagedObject::StatefulSet(self.create_typed(&key, o).await?)
            }
            ManagedObject::Secret(o) => ManagedObject::Secret(self.create_typed(&key, o).await?),
            ManagedObject::Service(o) => ManagedObject::Service(self.create_typed(&key, o).await?),
        };
        Ok(created)
    }

    async fn update(&self, object: ManagedObject) -> Result<ManagedObject, StoreError> {
        let key = require_key(&object)?;
        debug!("Replacing {}", key);
        let updated = match &object {
            ManagedObject::ServiceAccount(o) => {
                ManagedObject::ServiceAccount(self.replace_typed(&key, o).await?)
            }
            ManagedObject::Role(o) => ManagedObject::Role(self.replace_typed(&key, o).await?),
            ManagedObject::RoleBinding(o) => {
                ManagedObject::RoleBinding(self.replace_typed(&key, o).await?)
            }
            ManagedObject::Deployment(o) => {
                ManagedObject::Deployment(self.replace_typed(&key, o).await?)
            }
            ManagedObject::StatefulSet(o) => {
                ManagedObject::StatefulSet(self.replace_typed(&key, o).await?)
            }
            ManagedObject::Secret(o) => ManagedObject::Secret(self.replace_typed(&key, o).await?),
            ManagedObject::Service(o) => {
                ManagedObject::Service(self.replace_typed(&key, o).await?)
            }
        };
        Ok(updated)
    }

    async fn update_status(&self, parent: &ArgoCD) -> Result<(), StoreError> {
        let namespace = parent.metadata.namespace.as_deref().unwrap_or_default();
        let name = parent.metadata.name.as_deref().unwrap_or_default();
        let api: Api<ArgoCD> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({
            "status": parent.status
        });

        api.patch_status(
            name,
            &PatchParams::apply(CONTROLLER_NAME),
            &Patch::Merge(patch),
        )
        .await
        .map_err(|source| StoreError::StatusUpdate {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        })?;

        Ok(())
    }
}
