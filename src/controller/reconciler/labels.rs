//! # Labels and Names
//!
//! Identity of every child is `<parent name>-<suffix>` in the parent's namespace.

use crate::constants::{
    APPSET_LABEL_COMPONENT, APPSET_LABEL_NAME, APPSET_LABEL_PART_OF, LABEL_COMPONENT, LABEL_NAME,
    LABEL_PART_OF,
};
use crate::controller::reconciler::types::ReconcilerError;
use crate::crd::ArgoCD;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Namespace and name of the parent, both required
pub fn parent_identity(parent: &ArgoCD) -> Result<(&str, &str), ReconcilerError> {
    let namespace = parent
        .metadata
        .namespace
        .as_deref()
        .filter(|ns| !ns.is_empty())
        .ok_or(ReconcilerError::MissingObjectKey("namespace"))?;
    let name = parent
        .metadata
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .ok_or(ReconcilerError::MissingObjectKey("name"))?;
    Ok((namespace, name))
}

#[must_use]
pub fn child_name(parent_name: &str, suffix: &str) -> String {
    format!("{parent_name}-{suffix}")
}

/// The three labels every ApplicationSet child must carry
#[must_use]
pub fn appset_labels() -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_NAME.to_string(), APPSET_LABEL_NAME.to_string()),
        (LABEL_PART_OF.to_string(), APPSET_LABEL_PART_OF.to_string()),
        (LABEL_COMPONENT.to_string(), APPSET_LABEL_COMPONENT.to_string()),
    ])
}

/// Overwrite the ApplicationSet labels on `meta`, keeping any other labels.
/// Returns true when a label was added or changed.
pub fn apply_appset_labels(meta: &mut ObjectMeta) -> bool {
    let labels = meta.labels.get_or_insert_with(BTreeMap::new);
    let mut changed = false;
    for (key, value) in appset_labels() {
        if labels.get(&key) != Some(&value) {
            labels.insert(key, value);
            changed = true;
        }
    }
    changed
}
