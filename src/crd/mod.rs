//! # Custom Resource Definitions
//!
//! CRD types for the ApplicationSet reconciler.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `ArgoCD` parent resource and the ApplicationSet options
//! - `status.rs` - Status types, including the repo-server TLS fingerprint

mod spec;
mod status;

pub use spec::{ApplicationSetSpec, ArgoCD, ArgoCDSpec};
pub use status::{ArgoCDStatus, Condition};

impl ArgoCD {
    /// Stored repo-server TLS fingerprint, empty when never recorded
    #[must_use]
    pub fn secret_fingerprint(&self) -> &str {
        self.status
            .as_ref()
            .map_or("", |s| s.secret_fingerprint.as_str())
    }

    /// Status, created on first access
    pub fn status_mut(&mut self) -> &mut ArgoCDStatus {
        self.status.get_or_insert_with(ArgoCDStatus::default)
    }
}
