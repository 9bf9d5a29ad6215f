//! # Resource Store
//!
//! The seam between reconciliation logic and the cluster state backend.
//!
//! Every object the reconciler touches is one of a closed set of kinds
//! ([`ResourceKind`]) carried in a [`ManagedObject`]. The [`ResourceStore`]
//! trait is implemented by:
//!
//! - [`KubeStore`] - the live Kubernetes API via `kube::Api`
//! - [`MemoryStore`] - an in-process store with resource versions and a write log

mod kube_store;
mod memory;

pub use self::kube_store::KubeStore;
pub use self::memory::{MemoryStore, WriteLog};

use crate::crd::ArgoCD;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Secret, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use std::fmt;
use thiserror::Error;

/// Kinds of objects the reconciler reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    ServiceAccount,
    Role,
    RoleBinding,
    Deployment,
    StatefulSet,
    Secret,
    Service,
}

impl ResourceKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ServiceAccount => "ServiceAccount",
            ResourceKind::Role => "Role",
            ResourceKind::RoleBinding => "RoleBinding",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::StatefulSet => "StatefulSet",
            ResourceKind::Secret => "Secret",
            ResourceKind::Service => "Service",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a namespaced object of a given kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(kind: ResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// A Kubernetes object of one of the managed kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ManagedObject {
    ServiceAccount(ServiceAccount),
    Role(Role),
    RoleBinding(RoleBinding),
    Deployment(Deployment),
    StatefulSet(StatefulSet),
    Secret(Secret),
    Service(Service),
}

macro_rules! for_each_variant {
    ($value:expr, $inner:ident => $body:expr) => {
        match $value {
            ManagedObject::ServiceAccount($inner) => $body,
            ManagedObject::Role($inner) => $body,
            ManagedObject::RoleBinding($inner) => $body,
            ManagedObject::Deployment($inner) => $body,
            ManagedObject::StatefulSet($inner) => $body,
            ManagedObject::Secret($inner) => $body,
            ManagedObject::Service($inner) => $body,
        }
    };
}

impl ManagedObject {
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            ManagedObject::ServiceAccount(_) => ResourceKind::ServiceAccount,
            ManagedObject::Role(_) => ResourceKind::Role,
            ManagedObject::RoleBinding(_) => ResourceKind::RoleBinding,
            ManagedObject::Deployment(_) => ResourceKind::Deployment,
            ManagedObject::StatefulSet(_) => ResourceKind::StatefulSet,
            ManagedObject::Secret(_) => ResourceKind::Secret,
            ManagedObject::Service(_) => ResourceKind::Service,
        }
    }

    #[must_use]
    pub fn meta(&self) -> &ObjectMeta {
        for_each_variant!(self, o => o.meta())
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        for_each_variant!(self, o => o.meta_mut())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        self.meta().namespace.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.kind(), self.namespace(), self.name())
    }
}

/// Errors returned by a [`ResourceStore`]
///
/// Not-found is its own variant so callers can treat it as the create trigger,
/// and conflicts are separated so the outer loop can retry from a fresh read.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(ObjectKey),
    #[error("{0} already exists")]
    AlreadyExists(ObjectKey),
    #[error("{0} was modified concurrently; retry from a fresh read")]
    Conflict(ObjectKey),
    #[error("object has no name or namespace: {0}")]
    MissingObjectKey(ResourceKind),
    #[error("Kubernetes API request for {key} failed: {source}")]
    Api {
        key: ObjectKey,
        #[source]
        source: kube::Error,
    },
    #[error("failed to read ArgoCD {namespace}/{name}: {source}")]
    ParentFetch {
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },
    #[error("failed to update status of ArgoCD {namespace}/{name}: {source}")]
    StatusUpdate {
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },
    #[error("resource store unavailable for {target}: {message}")]
    Unavailable { target: String, message: String },
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Cluster state backend consumed by the reconciler
///
/// Implementations must reject an `update` whose resource version is stale
/// with [`StoreError::Conflict`] instead of overwriting newer state.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch an object by identity; `Ok(None)` when it does not exist
    async fn fetch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ManagedObject>, StoreError>;

    /// Fetch the current parent, status included, bypassing any watch cache
    async fn fetch_parent(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ArgoCD>, StoreError>;

    /// Create an object, returning it as persisted
    async fn create(&self, object: ManagedObject) -> Result<ManagedObject, StoreError>;

    /// Replace an existing object, returning it as persisted
    async fn update(&self, object: ManagedObject) -> Result<ManagedObject, StoreError>;

    /// Persist the status subresource of the parent
    async fn update_status(&self, parent: &ArgoCD) -> Result<(), StoreError>;
}
