//! # Controller
//!
//! Core controller modules for the ApplicationSet reconciler.
//!
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP server for metrics and health checks
//! - `store`: Cluster state backends (Kubernetes API, in-memory)

pub mod reconciler;
pub mod server;
pub mod store;
