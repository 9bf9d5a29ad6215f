//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::store::{ObjectKey, ResourceKind, ResourceStore, StoreError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The parent has no name or uid, so children cannot point back at it
    #[error("cannot set owner reference on {child}: parent has no name or uid")]
    OwnerReference { child: ObjectKey },

    #[error("ArgoCD resource has no {0}")]
    MissingObjectKey(&'static str),

    #[error("{0} is not a registered ApplicationSet child")]
    UnmanagedKind(ResourceKind),

    /// Some dependents kept their old rollout marker; the ones listed failed
    #[error("rollout propagated to {updated} of {total} workloads; failed: {}", format_failures(.failed))]
    PartialPropagation {
        updated: usize,
        total: usize,
        failed: Vec<(ObjectKey, StoreError)>,
    },
}

fn format_failures(failed: &[(ObjectKey, StoreError)]) -> String {
    failed
        .iter()
        .map(|(key, err)| format!("{key} ({err})"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ReconcilerError {
    /// True when retrying from a fresh read is expected to succeed
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            ReconcilerError::Store(e) => e.is_conflict(),
            ReconcilerError::PartialPropagation { failed, .. } => {
                !failed.is_empty() && failed.iter().all(|(_, e)| e.is_conflict())
            }
            _ => false,
        }
    }
}

/// Shared reconciliation context
///
/// Holds the store handle explicitly so every pass, including tests, runs
/// against exactly the store it was given.
#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn ResourceStore>,
    pub config: ControllerConfig,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(store: Arc<dyn ResourceStore>, config: ControllerConfig) -> Self {
        Self { store, config }
    }
}
