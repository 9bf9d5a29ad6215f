//! # Status
//!
//! Phase and Ready condition of the parent, derived from the outcome of a
//! pass. The status is written only when it actually changed so that status
//! writes do not retrigger the watch forever.

use crate::constants::{PHASE_AVAILABLE, PHASE_FAILED};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::{ArgoCD, Condition};
use tracing::{debug, warn};

const READY_CONDITION: &str = "Ready";

/// Fold the outcome of a pass into the parent's in-memory status
///
/// `lastReconcileTime` is left alone; it is stamped only when the status is
/// persisted.
pub fn record_outcome(parent: &mut ArgoCD, error: Option<&ReconcilerError>) {
    let generation = parent.metadata.generation;
    let status = parent.status_mut();

    let (phase, ready, reason, message) = match error {
        None => (PHASE_AVAILABLE, "True", "ReconciliationSucceeded", None),
        Some(e) => (
            PHASE_FAILED,
            "False",
            "ReconciliationFailed",
            Some(e.to_string()),
        ),
    };

    status.phase = Some(phase.to_string());
    status.observed_generation = generation;

    let transitioned = status
        .conditions
        .iter()
        .find(|c| c.r#type == READY_CONDITION)
        .map_or(true, |c| c.status != ready);
    let last_transition_time = if transitioned {
        Some(chrono::Utc::now().to_rfc3339())
    } else {
        status
            .conditions
            .iter()
            .find(|c| c.r#type == READY_CONDITION)
            .and_then(|c| c.last_transition_time.clone())
    };

    status.conditions.retain(|c| c.r#type != READY_CONDITION);
    status.conditions.push(Condition {
        r#type: READY_CONDITION.to_string(),
        status: ready.to_string(),
        last_transition_time,
        reason: Some(reason.to_string()),
        message,
    });
}

/// Persist the status when it differs from `previous`
///
/// Returns whether a write was issued.
pub async fn persist_if_changed(
    ctx: &Reconciler,
    parent: &mut ArgoCD,
    previous: Option<&crate::crd::ArgoCDStatus>,
) -> Result<bool, ReconcilerError> {
    if parent.status.as_ref() == previous {
        debug!("Skipping status update - status unchanged");
        return Ok(false);
    }

    parent.status_mut().last_reconcile_time = Some(chrono::Utc::now().to_rfc3339());
    ctx.store.update_status(parent).await?;
    Ok(true)
}

/// Persist a failed pass without masking the error that caused it
pub async fn persist_failure(
    ctx: &Reconciler,
    parent: &mut ArgoCD,
    previous: Option<&crate::crd::ArgoCDStatus>,
) {
    if let Err(e) = persist_if_changed(ctx, parent, previous).await {
        warn!("Failed to record Failed phase: {}", e);
    }
}
