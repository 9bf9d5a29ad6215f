//! # In-Memory Store
//!
//! [`ResourceStore`] kept entirely in process memory.
//!
//! Behaves like the API server where the reconciler can observe it:
//! - `create` on an existing identity fails with `AlreadyExists`
//! - `update` of a missing object fails with `NotFound`
//! - `update` carrying a stale `resourceVersion` fails with `Conflict`
//! - every successful write bumps the object's `resourceVersion`
//!
//! Every successful write is recorded in a [`WriteLog`] so callers can assert
//! how many writes a pass issued. Individual objects can be marked to fail
//! their fetches or their updates, which is how partial rollouts and
//! backend outages are exercised.
//!
//! This is ephemeral - data does not persist across restarts.
//! Thread-safe using `Arc<RwLock>` for concurrent access.

use super::{ManagedObject, ObjectKey, ResourceKind, ResourceStore, StoreError};
use crate::crd::ArgoCD;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Successful writes issued against a [`MemoryStore`], in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteLog {
    pub creates: Vec<ObjectKey>,
    pub updates: Vec<ObjectKey>,
    pub status_updates: usize,
}

impl WriteLog {
    #[must_use]
    pub fn creates_of(&self, kind: ResourceKind) -> usize {
        self.creates.iter().filter(|k| k.kind == kind).count()
    }

    #[must_use]
    pub fn updates_of(&self, kind: ResourceKind) -> usize {
        self.updates.iter().filter(|k| k.kind == kind).count()
    }

    /// Object creates and updates, status writes excluded
    #[must_use]
    pub fn object_writes(&self) -> usize {
        self.creates.len() + self.updates.len()
    }
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<ObjectKey, ManagedObject>,
    parents: BTreeMap<(String, String), ArgoCD>,
    failing_fetches: HashSet<ObjectKey>,
    failing_updates: HashSet<ObjectKey>,
    log: WriteLog,
}

/// In-memory resource store
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
    next_version: Arc<AtomicU64>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn bump_version(&self) -> String {
        (self.next_version.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }

    /// Seed an object without recording a write
    ///
    /// Assigns a resource version and a uid when the object has none.
    pub async fn insert(&self, mut object: ManagedObject) {
        let version = self.bump_version();
        let meta = object.meta_mut();
        meta.resource_version = Some(version.clone());
        if meta.uid.is_none() {
            meta.uid = Some(format!("uid-{version}"));
        }
        let key = object.key();
        self.state.write().await.objects.insert(key, object);
    }

    /// Seed a parent so that status writes can be observed
    pub async fn insert_parent(&self, parent: ArgoCD) {
        let key = parent_key(&parent);
        self.state.write().await.parents.insert(key, parent);
    }

    /// Current copy of an object
    pub async fn get(&self, kind: ResourceKind, namespace: &str, name: &str) -> Option<ManagedObject> {
        let key = ObjectKey::new(kind, namespace, name);
        self.state.read().await.objects.get(&key).cloned()
    }

    /// Current copy of a parent, including the last persisted status
    pub async fn parent(&self, namespace: &str, name: &str) -> Option<ArgoCD> {
        self.state
            .read()
            .await
            .parents
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// All objects of a kind in a namespace
    pub async fn list(&self, kind: ResourceKind, namespace: &str) -> Vec<ManagedObject> {
        self.state
            .read()
            .await
            .objects
            .iter()
            .filter(|(k, _)| k.kind == kind && k.namespace == namespace)
            .map(|(_, o)| o.clone())
            .collect()
    }

    /// Make every update of this object fail until [`MemoryStore::heal`] is called
    pub async fn fail_updates(&self, kind: ResourceKind, namespace: &str, name: &str) {
        let key = ObjectKey::new(kind, namespace, name);
        self.state.write().await.failing_updates.insert(key);
    }

    /// Make every fetch of this object fail until [`MemoryStore::heal`] is called
    pub async fn fail_fetches(&self, kind: ResourceKind, namespace: &str, name: &str) {
        let key = ObjectKey::new(kind, namespace, name);
        self.state.write().await.failing_fetches.insert(key);
    }

    /// Clear all injected failures
    pub async fn heal(&self) {
        let mut state = self.state.write().await;
        state.failing_fetches.clear();
        state.failing_updates.clear();
    }

    /// Snapshot of the writes recorded so far
    pub async fn writes(&self) -> WriteLog {
        self.state.read().await.log.clone()
    }

    pub async fn reset_writes(&self) {
        self.state.write().await.log = WriteLog::default();
    }
}

fn parent_key(parent: &ArgoCD) -> (String, String) {
    (
        parent.metadata.namespace.clone().unwrap_or_default(),
        parent.metadata.name.clone().unwrap_or_default(),
    )
}

fn injected_failure(key: &ObjectKey) -> StoreError {
    StoreError::Unavailable {
        target: key.to_string(),
        message: "injected failure".to_string(),
    }
}

fn require_key(object: &ManagedObject) -> Result<ObjectKey, StoreError> {
    if object.name().is_empty() || object.namespace().is_empty() {
        return Err(StoreError::MissingObjectKey(object.kind()));
    }
    Ok(object.key())
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn fetch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ManagedObject>, StoreError> {
        let key = ObjectKey::new(kind, namespace, name);
        let state = self.state.read().await;
        if state.failing_fetches.contains(&key) {
            return Err(injected_failure(&key));
        }
        Ok(state.objects.get(&key).cloned())
    }

    async fn fetch_parent(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ArgoCD>, StoreError> {
        Ok(self.parent(namespace, name).await)
    }

    async fn create(&self, mut object: ManagedObject) -> Result<ManagedObject, StoreError> {
        let key = require_key(&object)?;
        let mut state = self.state.write().await;
        if state.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }

        let version = self.bump_version();
        let meta = object.meta_mut();
        meta.resource_version = Some(version.clone());
        meta.uid = Some(format!("uid-{version}"));

        debug!("memory store: created {}", key);
        state.objects.insert(key.clone(), object.clone());
        state.log.creates.push(key);
        Ok(object)
    }

    async fn update(&self, mut object: ManagedObject) -> Result<ManagedObject, StoreError> {
        let key = require_key(&object)?;
        let mut state = self.state.write().await;
        if state.failing_updates.contains(&key) {
            return Err(injected_failure(&key));
        }

        let Some(current) = state.objects.get(&key) else {
            return Err(StoreError::NotFound(key));
        };
        if object.meta().resource_version != current.meta().resource_version {
            return Err(StoreError::Conflict(key));
        }

        object.meta_mut().resource_version = Some(self.bump_version());

        debug!("memory store: updated {}", key);
        state.objects.insert(key.clone(), object.clone());
        state.log.updates.push(key);
        Ok(object)
    }

    async fn update_status(&self, parent: &ArgoCD) -> Result<(), StoreError> {
        let key = parent_key(parent);
        let mut state = self.state.write().await;
        let stored = state.parents.entry(key).or_insert_with(|| parent.clone());
        stored.status.clone_from(&parent.status);
        state.log.status_updates += 1;
        Ok(())
    }
}
