//! # Reconciliation Logic
//!
//! One pass over an `ArgoCD` resource:
//!
//! 1. ApplicationSet controller children, in registration order
//! 2. Repo-server TLS secret fingerprint and rollout of dependents
//! 3. Status (fingerprint, phase, Ready condition)
//!
//! Steps run sequentially and the first failing step ends the pass; children
//! already applied stay in place.

use crate::controller::reconciler::children::{reconcile_child, APPLICATIONSET_CHILDREN};
use crate::controller::reconciler::status::{persist_failure, persist_if_changed, record_outcome};
use crate::controller::reconciler::tls_secret::{reconcile_repo_server_tls, TlsSecretOutcome};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::ArgoCD;
use crate::observability;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, Instrument};

/// Main reconciliation function
///
/// Errors are handled by the error policy of the watch loop.
pub async fn reconcile(parent: Arc<ArgoCD>, ctx: Arc<Reconciler>) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    let name = parent.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = parent.metadata.namespace.as_deref().unwrap_or("default");

    let span = tracing::span!(
        tracing::Level::INFO,
        "reconcile",
        resource.name = name,
        resource.namespace = namespace,
        resource.kind = "ArgoCD"
    );

    let mut parent = (*parent).clone();
    let result = reconcile_argocd(&ctx, &mut parent).instrument(span).await;

    observability::metrics::increment_reconciliations();
    observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

    result?;
    Ok(Action::requeue(ctx.config.reconciliation_interval()))
}

/// Run one pass and record its outcome in the parent's status
///
/// The stored fingerprint advances only when the whole pass succeeded.
pub async fn reconcile_argocd(
    ctx: &Reconciler,
    parent: &mut ArgoCD,
) -> Result<TlsSecretOutcome, ReconcilerError> {
    info!(
        "🔄 Reconciling ArgoCD: {}/{}",
        parent.metadata.namespace.as_deref().unwrap_or_default(),
        parent.metadata.name.as_deref().unwrap_or_default()
    );

    let previous = parent.status.clone();
    match reconcile_pass(ctx, parent).await {
        Ok(outcome) => {
            record_outcome(parent, None);
            if persist_if_changed(ctx, parent, previous.as_ref()).await? {
                debug!("Status updated");
            }
            info!("✅ Reconciliation complete ({:?})", outcome);
            Ok(outcome)
        }
        Err(e) => {
            record_outcome(parent, Some(&e));
            persist_failure(ctx, parent, previous.as_ref()).await;
            Err(e)
        }
    }
}

/// Children then TLS secret, without touching the persisted status
pub async fn reconcile_pass(
    ctx: &Reconciler,
    parent: &mut ArgoCD,
) -> Result<TlsSecretOutcome, ReconcilerError> {
    for registration in &APPLICATIONSET_CHILDREN {
        reconcile_child(ctx, registration.kind, parent).await?;
    }

    let outcome = reconcile_repo_server_tls(ctx, parent).await?;
    if let TlsSecretOutcome::RolledOut(count) = outcome {
        info!("🔐 Rolled out {} workload(s) for new repo server TLS material", count);
    }
    Ok(outcome)
}
