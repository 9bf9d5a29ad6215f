//! # Runtime
//!
//! Process-level wiring around the reconciler.
//!
//! - `initialization`: rustls, tracing, metrics, server and client setup
//! - `watch_loop`: kube-runtime `Controller` driving reconciliation
//! - `error_policy`: requeue decision for failed reconciliations

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
