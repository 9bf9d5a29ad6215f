//! # Error Policy
//!
//! Requeue decision for failed reconciliations.
//!
//! Version conflicts are retried almost immediately from a fresh read;
//! every other failure waits for the configured error requeue interval.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::ArgoCD;
use crate::observability;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub fn handle_reconciliation_error(
    obj: Arc<ArgoCD>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = obj.metadata.namespace.as_deref().unwrap_or("default");

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = name,
        resource.namespace = namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    let delay = requeue_delay(error, &ctx);
    if error.is_conflict() {
        observability::metrics::increment_conflicts();
        info!(
            "🔁 Conflict while reconciling {}/{}, retrying in {}s",
            namespace,
            name,
            delay.as_secs()
        );
    } else {
        observability::metrics::increment_reconciliation_errors();
        error!("Reconciliation error for {}/{}: {}", namespace, name, error);
        info!("🔄 Retrying in {}s", delay.as_secs());
    }

    Action::requeue(delay)
}

#[must_use]
pub fn requeue_delay(error: &ReconcilerError, ctx: &Reconciler) -> Duration {
    if error.is_conflict() {
        ctx.config.conflict_requeue_duration()
    } else {
        ctx.config.reconciliation_error_requeue_duration()
    }
}
