//! # Metrics
//!
//! Prometheus metrics for monitoring the reconciler.
//!
//! ## Metrics Exposed
//!
//! - `applicationset_reconciler_reconciliations_total` - Total number of reconciliation passes
//! - `applicationset_reconciler_reconciliation_errors_total` - Total number of failed passes
//! - `applicationset_reconciler_conflicts_total` - Passes requeued after a version conflict
//! - `applicationset_reconciler_reconciliation_duration_seconds` - Duration of a pass
//! - `applicationset_reconciler_child_writes_total` - Child creates and updates by kind and operation
//! - `applicationset_reconciler_rollouts_triggered_total` - Dependent workloads asked to roll out

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "applicationset_reconciler_reconciliations_total",
        "Total number of reconciliation passes",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "applicationset_reconciler_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static CONFLICTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "applicationset_reconciler_conflicts_total",
        "Total number of passes requeued after a resource version conflict",
    )
    .expect("Failed to create CONFLICTS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "applicationset_reconciler_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static CHILD_WRITES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "applicationset_reconciler_child_writes_total",
            "Total number of child resource writes by kind and operation",
        ),
        &["kind", "operation"],
    )
    .expect("Failed to create CHILD_WRITES_TOTAL metric - this should never happen")
});

static ROLLOUTS_TRIGGERED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "applicationset_reconciler_rollouts_triggered_total",
        "Total number of dependent workloads asked to roll out after a TLS change",
    )
    .expect("Failed to create ROLLOUTS_TRIGGERED_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CONFLICTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(CHILD_WRITES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ROLLOUTS_TRIGGERED_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn increment_conflicts() {
    CONFLICTS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

/// `operation` is `create` or `update`
pub fn increment_child_writes(kind: &str, operation: &str) {
    CHILD_WRITES_TOTAL
        .with_label_values(&[kind, operation])
        .inc();
}

pub fn increment_rollouts_triggered() {
    ROLLOUTS_TRIGGERED_TOTAL.inc();
}
