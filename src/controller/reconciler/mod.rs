//! # Reconciler
//!
//! Core reconciliation logic for `ArgoCD` resources.
//!
//! The reconciler:
//! - Ensures the ApplicationSet controller's service account, role, role
//!   binding and deployment exist and match their desired state
//! - Fingerprints the repo-server TLS secret and rolls out the workloads
//!   that mount it when the material changes
//! - Updates resource status with reconciliation results
//!
//! ## Module Structure
//!
//! - `desired` - pure builders for every managed child
//! - `children` - registration table and per-kind create-or-update
//! - `fingerprint` - TLS material digest and change decision
//! - `rollout` - restart signal for dependent workloads
//! - `tls_secret` - eligibility of the repo-server TLS secret
//! - `status` - phase and conditions written back to the parent

pub mod children;
pub mod desired;
pub mod fingerprint;
pub mod labels;
pub mod reconcile;
pub mod rollout;
pub mod status;
pub mod tls_secret;
pub mod types;

// Re-export public API
pub use children::{reconcile_child, APPLICATIONSET_CHILDREN};
pub use fingerprint::{compute_fingerprint, has_changed, TlsSecretMaterial};
pub use reconcile::{reconcile, reconcile_argocd, reconcile_pass};
pub use rollout::propagate;
pub use tls_secret::{
    dependent_workloads, parents_of_tls_secret, reconcile_repo_server_tls, TlsSecretOutcome,
};
pub use types::{Reconciler, ReconcilerError};
