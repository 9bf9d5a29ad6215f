//! # Prelude
//!
//! Re-exports commonly used types and functions for convenience.
//!
//! ```rust
//! use argocd_applicationset_reconciler::prelude::*;
//! ```

// Resource types
pub use crate::crd::{ApplicationSetSpec, ArgoCD, ArgoCDSpec, ArgoCDStatus};

// Configuration
pub use crate::config::ControllerConfig;

// Stores
pub use crate::controller::store::{
    KubeStore, ManagedObject, MemoryStore, ObjectKey, ResourceKind, ResourceStore, StoreError,
    WriteLog,
};

// Reconciliation
pub use crate::controller::reconciler::{
    compute_fingerprint, dependent_workloads, has_changed, parents_of_tls_secret, propagate,
    reconcile_argocd, reconcile_child, reconcile_pass, reconcile_repo_server_tls, Reconciler,
    ReconcilerError, TlsSecretMaterial, TlsSecretOutcome,
};
