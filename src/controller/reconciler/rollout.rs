//! # Rollout Propagation
//!
//! Restarts dependent workloads by writing a fresh value into the
//! `repo.tls.cert.changed` label of their pod template. The workload
//! controllers roll the pods because the template changed.

use crate::constants::LABEL_REPO_TLS_CERT_CHANGED;
use crate::controller::reconciler::types::ReconcilerError;
use crate::controller::store::{ManagedObject, ObjectKey, ResourceStore, StoreError};
use crate::observability::metrics;
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Signal a rollout to every dependent when `changed` is set
///
/// Every dependent is attempted even after a failure. Returns how many were
/// updated; absent dependents are skipped. Markers already written stay in
/// place when another dependent fails.
pub async fn propagate(
    store: &dyn ResourceStore,
    changed: bool,
    dependents: &[ObjectKey],
) -> Result<usize, ReconcilerError> {
    if !changed {
        return Ok(0);
    }

    let mut updated = 0;
    let mut total = 0;
    let mut failed = Vec::new();

    for key in dependents {
        let existing = match store.fetch(key.kind, &key.namespace, &key.name).await {
            Ok(Some(existing)) => existing,
            Ok(None) => {
                debug!("{} does not exist, skipping rollout", key);
                continue;
            }
            Err(e) => {
                total += 1;
                failed.push((key.clone(), e));
                continue;
            }
        };
        total += 1;

        match signal_rollout(store, existing).await {
            Ok(marker) => {
                updated += 1;
                metrics::increment_rollouts_triggered();
                info!("🔄 Requested rollout of {} ({}={})", key, LABEL_REPO_TLS_CERT_CHANGED, marker);
            }
            Err(e) => {
                warn!("Failed to request rollout of {}: {}", key, e);
                failed.push((key.clone(), e));
            }
        }
    }

    if failed.is_empty() {
        Ok(updated)
    } else {
        Err(ReconcilerError::PartialPropagation {
            updated,
            total,
            failed,
        })
    }
}

async fn signal_rollout(
    store: &dyn ResourceStore,
    mut workload: ManagedObject,
) -> Result<String, StoreError> {
    let key = workload.key();
    let Some(template) = pod_template_meta(&mut workload) else {
        return Err(StoreError::Unavailable {
            target: key.to_string(),
            message: "only Deployments and StatefulSets can be rolled out".to_string(),
        });
    };

    let labels = template.labels.get_or_insert_with(BTreeMap::new);
    let marker = next_marker(labels.get(LABEL_REPO_TLS_CERT_CHANGED).map(String::as_str));
    labels.insert(LABEL_REPO_TLS_CERT_CHANGED.to_string(), marker.clone());

    store.update(workload).await?;
    Ok(marker)
}

fn pod_template_meta(workload: &mut ManagedObject) -> Option<&mut ObjectMeta> {
    let template = match workload {
        ManagedObject::Deployment(d) => &mut d.spec.get_or_insert_with(Default::default).template,
        ManagedObject::StatefulSet(s) => &mut s.spec.get_or_insert_with(Default::default).template,
        _ => return None,
    };
    Some(template.metadata.get_or_insert_with(ObjectMeta::default))
}

/// Current UTC time in Unix nanoseconds, bumped past `previous` when the
/// clock has not moved beyond it
#[must_use]
pub fn next_marker(previous: Option<&str>) -> String {
    let now = i128::from(Utc::now().timestamp_nanos_opt().unwrap_or_default());
    let floor = previous
        .and_then(|p| p.parse::<i128>().ok())
        .map_or(i128::MIN, |p| p + 1);
    now.max(floor).to_string()
}
