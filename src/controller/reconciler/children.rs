//! # Child Reconciliation
//!
//! Idempotent "ensure it exists and matches" for every ApplicationSet child.
//!
//! Each kind is registered once in [`APPLICATIONSET_CHILDREN`] with its name
//! suffix, the builder producing its desired state, and the drift policy that
//! decides what is corrected on an existing object. A pass issues at most one
//! write per child and none when nothing differs.

use crate::config::ControllerConfig;
use crate::constants::APPSET_RESOURCE_SUFFIX;
use crate::controller::reconciler::desired;
use crate::controller::reconciler::labels::{apply_appset_labels, child_name, parent_identity};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::controller::store::{ManagedObject, ResourceKind};
use crate::crd::ArgoCD;
use crate::observability::metrics;
use k8s_openapi::api::core::v1::Container;
use kube::Resource;
use tracing::{debug, info};

/// Produces the desired object for a parent
pub type Builder = fn(&ArgoCD, &ControllerConfig) -> Result<ManagedObject, ReconcilerError>;

/// Copies the authoritative fields of `desired` onto `existing`.
/// Returns true when `existing` changed and must be written back.
pub type DriftPolicy =
    fn(&ArgoCD, &mut ManagedObject, &ManagedObject) -> Result<bool, ReconcilerError>;

#[derive(Clone, Copy)]
pub struct ChildRegistration {
    pub kind: ResourceKind,
    pub suffix: &'static str,
    pub build: Builder,
    pub drift: DriftPolicy,
}

impl std::fmt::Debug for ChildRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildRegistration")
            .field("kind", &self.kind)
            .field("suffix", &self.suffix)
            .finish_non_exhaustive()
    }
}

/// Children of the ApplicationSet controller, in reconciliation order
pub static APPLICATIONSET_CHILDREN: [ChildRegistration; 4] = [
    ChildRegistration {
        kind: ResourceKind::ServiceAccount,
        suffix: APPSET_RESOURCE_SUFFIX,
        build: desired::service_account,
        drift: existence_only,
    },
    ChildRegistration {
        kind: ResourceKind::Role,
        suffix: APPSET_RESOURCE_SUFFIX,
        build: desired::role,
        drift: role_rules,
    },
    ChildRegistration {
        kind: ResourceKind::RoleBinding,
        suffix: APPSET_RESOURCE_SUFFIX,
        build: desired::role_binding,
        drift: role_binding_subjects,
    },
    ChildRegistration {
        kind: ResourceKind::Deployment,
        suffix: APPSET_RESOURCE_SUFFIX,
        build: desired::deployment,
        drift: deployment_containers,
    },
];

fn registration(kind: ResourceKind) -> Option<&'static ChildRegistration> {
    APPLICATIONSET_CHILDREN.iter().find(|r| r.kind == kind)
}

/// Ensure one registered child exists and matches its desired state
///
/// Only kinds listed in [`APPLICATIONSET_CHILDREN`] can be reconciled here.
pub async fn reconcile_child(
    ctx: &Reconciler,
    kind: ResourceKind,
    parent: &ArgoCD,
) -> Result<ManagedObject, ReconcilerError> {
    let registration = registration(kind).ok_or(ReconcilerError::UnmanagedKind(kind))?;
    let (namespace, parent_name) = parent_identity(parent)?;
    let name = child_name(parent_name, registration.suffix);

    let mut desired = (registration.build)(parent, &ctx.config)?;

    let Some(mut existing) = ctx.store.fetch(kind, namespace, &name).await? else {
        set_controller_reference(parent, &mut desired)?;
        let created = ctx.store.create(desired).await?;
        metrics::increment_child_writes(kind.as_str(), "create");
        info!("🆕 Created {}", created.key());
        return Ok(created);
    };

    if !(registration.drift)(parent, &mut existing, &desired)? {
        debug!("{} is up to date", existing.key());
        return Ok(existing);
    }

    let updated = ctx.store.update(existing).await?;
    metrics::increment_child_writes(kind.as_str(), "update");
    info!("🔧 Updated {} to match desired state", updated.key());
    Ok(updated)
}

/// Point `child` at the parent as its controller
///
/// Fails when the parent lacks a name or uid, or when another object
/// already controls the child.
pub fn set_controller_reference(
    parent: &ArgoCD,
    child: &mut ManagedObject,
) -> Result<bool, ReconcilerError> {
    let owner = parent
        .controller_owner_ref(&())
        .ok_or_else(|| ReconcilerError::OwnerReference { child: child.key() })?;

    let key = child.key();
    let refs = child.meta_mut().owner_references.get_or_insert_with(Vec::new);

    if refs
        .iter()
        .any(|r| r.controller == Some(true) && r.uid != owner.uid)
    {
        return Err(ReconcilerError::OwnerReference { child: key });
    }

    match refs.iter_mut().find(|r| r.uid == owner.uid) {
        Some(current) if *current == owner => Ok(false),
        Some(current) => {
            *current = owner;
            Ok(true)
        }
        None => {
            refs.push(owner);
            Ok(true)
        }
    }
}

fn existence_only(
    _parent: &ArgoCD,
    _existing: &mut ManagedObject,
    _desired: &ManagedObject,
) -> Result<bool, ReconcilerError> {
    Ok(false)
}

fn role_rules(
    parent: &ArgoCD,
    existing: &mut ManagedObject,
    desired: &ManagedObject,
) -> Result<bool, ReconcilerError> {
    let (ManagedObject::Role(current), ManagedObject::Role(wanted)) = (&mut *existing, desired)
    else {
        return Ok(false);
    };

    let mut changed = false;
    if current.rules != wanted.rules {
        current.rules.clone_from(&wanted.rules);
        changed = true;
    }
    if changed {
        apply_appset_labels(&mut current.metadata);
        set_controller_reference(parent, existing)?;
    }
    Ok(changed)
}

fn role_binding_subjects(
    parent: &ArgoCD,
    existing: &mut ManagedObject,
    desired: &ManagedObject,
) -> Result<bool, ReconcilerError> {
    let (ManagedObject::RoleBinding(current), ManagedObject::RoleBinding(wanted)) =
        (&mut *existing, desired)
    else {
        return Ok(false);
    };

    let mut changed = false;
    if current.role_ref != wanted.role_ref {
        current.role_ref = wanted.role_ref.clone();
        changed = true;
    }
    if current.subjects != wanted.subjects {
        current.subjects.clone_from(&wanted.subjects);
        changed = true;
    }
    if changed {
        apply_appset_labels(&mut current.metadata);
        set_controller_reference(parent, existing)?;
    }
    Ok(changed)
}

fn deployment_containers(
    _parent: &ArgoCD,
    existing: &mut ManagedObject,
    desired: &ManagedObject,
) -> Result<bool, ReconcilerError> {
    let (ManagedObject::Deployment(current), ManagedObject::Deployment(wanted)) =
        (existing, desired)
    else {
        return Ok(false);
    };

    let wanted_containers = wanted
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .map(|p| &p.containers);
    let Some(wanted_containers) = wanted_containers else {
        return Ok(false);
    };

    let pod = current
        .spec
        .get_or_insert_with(Default::default)
        .template
        .spec
        .get_or_insert_with(Default::default);
    if containers_match(&pod.containers, wanted_containers) {
        return Ok(false);
    }
    pod.containers.clone_from(wanted_containers);
    Ok(true)
}

/// Compares only the container fields the builder sets. Fields added by
/// admission (security context injection, probes) do not count as drift.
fn containers_match(current: &[Container], wanted: &[Container]) -> bool {
    current.len() == wanted.len()
        && current.iter().zip(wanted).all(|(c, w)| {
            c.name == w.name
                && c.image == w.image
                && c.image_pull_policy == w.image_pull_policy
                && c.command == w.command
                && c.args == w.args
                && c.env == w.env
                && c.resources == w.resources
                && c.volume_mounts == w.volume_mounts
                && c.termination_message_path == w.termination_message_path
                && c.termination_message_policy == w.termination_message_policy
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::store::{MemoryStore, ResourceStore};
    use crate::controller::store::StoreError;
    use crate::crd::{ApplicationSetSpec, ArgoCDSpec};
    use k8s_openapi::api::core::v1::{ResourceRequirements, SecurityContext};
    use k8s_openapi::api::rbac::v1::{PolicyRule, Role};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn parent() -> ArgoCD {
        let mut cr = ArgoCD::new("argocd", ArgoCDSpec::default());
        cr.metadata.namespace = Some("argocd".to_string());
        cr.metadata.uid = Some("parent-uid".to_string());
        cr
    }

    fn context(store: &MemoryStore) -> Reconciler {
        Reconciler::new(Arc::new(store.clone()), ControllerConfig::default())
    }

    #[tokio::test]
    async fn test_creates_with_owner_reference() {
        let store = MemoryStore::new();
        let created = reconcile_child(&context(&store), ResourceKind::Role, &parent())
            .await
            .unwrap();

        let owners = created.meta().owner_references.clone().unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].uid, "parent-uid");
        assert_eq!(owners[0].controller, Some(true));
        assert_eq!(store.writes().await.creates_of(ResourceKind::Role), 1);
    }

    #[tokio::test]
    async fn test_parent_without_uid_cannot_own_children() {
        let store = MemoryStore::new();
        let mut cr = parent();
        cr.metadata.uid = None;
        let err = reconcile_child(&context(&store), ResourceKind::ServiceAccount, &cr)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcilerError::OwnerReference { .. }));
        assert_eq!(store.writes().await.object_writes(), 0);
    }

    #[tokio::test]
    async fn test_service_account_is_never_updated() {
        let store = MemoryStore::new();
        let ctx = context(&store);
        reconcile_child(&ctx, ResourceKind::ServiceAccount, &parent())
            .await
            .unwrap();

        let mut sa = store
            .get(ResourceKind::ServiceAccount, "argocd", "argocd-applicationset-controller")
            .await
            .unwrap();
        sa.meta_mut().labels = None;
        store.update(sa).await.unwrap();
        store.reset_writes().await;

        reconcile_child(&ctx, ResourceKind::ServiceAccount, &parent())
            .await
            .unwrap();
        assert_eq!(store.writes().await.object_writes(), 0);
    }

    #[tokio::test]
    async fn test_stale_rules_are_replaced_wholesale() {
        let store = MemoryStore::new();
        store
            .insert(ManagedObject::Role(Role {
                metadata: ObjectMeta {
                    name: Some("argocd-applicationset-controller".to_string()),
                    namespace: Some("argocd".to_string()),
                    ..ObjectMeta::default()
                },
                rules: Some(vec![PolicyRule {
                    api_groups: Some(vec!["stale".to_string()]),
                    verbs: vec!["*".to_string()],
                    ..PolicyRule::default()
                }]),
            }))
            .await;

        let updated = reconcile_child(&context(&store), ResourceKind::Role, &parent())
            .await
            .unwrap();
        let ManagedObject::Role(role) = updated else {
            panic!("expected a Role");
        };
        assert_eq!(role.rules, Some(desired::policy_rules()));
        assert_eq!(
            role.metadata.labels,
            Some(crate::controller::reconciler::labels::appset_labels())
        );
        assert_eq!(store.writes().await.updates_of(ResourceKind::Role), 1);
    }

    /// What a live cluster hands back after persisting the Deployment
    fn apply_cluster_defaults(object: &mut ManagedObject) {
        let ManagedObject::Deployment(deployment) = object else {
            return;
        };
        let Some(pod) = deployment
            .spec
            .as_mut()
            .and_then(|s| s.template.spec.as_mut())
        else {
            return;
        };
        pod.restart_policy.get_or_insert_with(|| "Always".to_string());
        pod.dns_policy.get_or_insert_with(|| "ClusterFirst".to_string());
        for container in &mut pod.containers {
            container
                .termination_message_path
                .get_or_insert_with(|| "/dev/termination-log".to_string());
            container
                .termination_message_policy
                .get_or_insert_with(|| "File".to_string());
            for env in container.env.iter_mut().flatten() {
                if let Some(field_ref) = env.value_from.as_mut().and_then(|v| v.field_ref.as_mut()) {
                    field_ref.api_version.get_or_insert_with(|| "v1".to_string());
                }
            }
            if let Some(resources) = container.resources.as_mut() {
                if let Some(limits) = resources.limits.clone() {
                    let requests = resources.requests.get_or_insert_with(BTreeMap::new);
                    for (resource, quantity) in limits {
                        requests.entry(resource).or_insert(quantity);
                    }
                }
            }
            container
                .security_context
                .get_or_insert_with(SecurityContext::default);
        }
    }

    #[tokio::test]
    async fn test_cluster_defaulted_deployment_is_not_rewritten() {
        let store = MemoryStore::new();
        let ctx = context(&store);
        let mut cr = parent();
        cr.spec.application_set = Some(ApplicationSetSpec {
            image: String::new(),
            version: String::new(),
            resources: Some(ResourceRequirements {
                limits: Some(BTreeMap::from([(
                    "cpu".to_string(),
                    Quantity("500m".to_string()),
                )])),
                ..ResourceRequirements::default()
            }),
        });

        reconcile_child(&ctx, ResourceKind::Deployment, &cr)
            .await
            .unwrap();

        for _ in 0..3 {
            let mut persisted = store
                .get(ResourceKind::Deployment, "argocd", "argocd-applicationset-controller")
                .await
                .unwrap();
            apply_cluster_defaults(&mut persisted);
            store.update(persisted).await.unwrap();
            store.reset_writes().await;

            reconcile_child(&ctx, ResourceKind::Deployment, &cr)
                .await
                .unwrap();
            assert_eq!(store.writes().await.updates_of(ResourceKind::Deployment), 0);
        }
    }

    #[tokio::test]
    async fn test_fetch_error_is_returned_without_writing() {
        let store = MemoryStore::new();
        store
            .fail_fetches(ResourceKind::Role, "argocd", "argocd-applicationset-controller")
            .await;

        let err = reconcile_child(&context(&store), ResourceKind::Role, &parent())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcilerError::Store(StoreError::Unavailable { .. })
        ));
        assert_eq!(store.writes().await.object_writes(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_kind_is_rejected() {
        let store = MemoryStore::new();
        let err = reconcile_child(&context(&store), ResourceKind::Secret, &parent())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcilerError::UnmanagedKind(ResourceKind::Secret)
        ));
    }

    #[test]
    fn test_foreign_controller_is_rejected() {
        let mut child = ManagedObject::Role(Role {
            metadata: ObjectMeta {
                name: Some("argocd-applicationset-controller".to_string()),
                namespace: Some("argocd".to_string()),
                owner_references: Some(vec![OwnerReference {
                    api_version: "apps/v1".to_string(),
                    kind: "Deployment".to_string(),
                    name: "other".to_string(),
                    uid: "other-uid".to_string(),
                    controller: Some(true),
                    ..OwnerReference::default()
                }]),
                ..ObjectMeta::default()
            },
            rules: None,
        });
        assert!(matches!(
            set_controller_reference(&parent(), &mut child),
            Err(ReconcilerError::OwnerReference { .. })
        ));
    }

    #[test]
    fn test_owner_reference_is_not_duplicated() {
        let mut child = ManagedObject::Role(Role::default());
        assert!(set_controller_reference(&parent(), &mut child).unwrap());
        assert!(!set_controller_reference(&parent(), &mut child).unwrap());
        assert_eq!(child.meta().owner_references.as_ref().unwrap().len(), 1);
    }
}
