//! # ApplicationSet Reconciler
//!
//! Kubernetes controller that keeps the ArgoCD ApplicationSet controller's
//! service account, role, role binding and deployment in line with each
//! `ArgoCD` resource, and rolls out the ArgoCD workloads when the repo-server
//! TLS certificate changes.

use anyhow::Result;
use argocd_applicationset_reconciler::runtime::{initialization, watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialization::initialize().await?;
    watch_loop::run_watch_loop(
        init.argocds,
        init.client,
        init.reconciler,
        init.server_state,
    )
    .await
}
