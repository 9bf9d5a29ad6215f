//! # ApplicationSet Reconciler
//!
//! Reconciliation core for `ArgoCD` resources (`argoproj.io/v1alpha1`).
//!
//! ## Overview
//!
//! For every `ArgoCD` resource the controller:
//!
//! 1. **Ensures ApplicationSet children** - service account, role, role
//!    binding and deployment named `<name>-applicationset-controller`, created
//!    with an owner reference and corrected only where they drift
//! 2. **Fingerprints the repo-server TLS secret** - SHA-256 of `tls.crt` then
//!    `tls.key`, compared with `status.secretFingerprint`
//! 3. **Rolls out dependents on change** - a fresh `repo.tls.cert.changed`
//!    pod template label on the server, repo server and application controller
//!
//! All cluster access goes through [`controller::store::ResourceStore`], so
//! the whole pass runs unchanged against [`controller::store::MemoryStore`].

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
