//! # Repo Server TLS Secret
//!
//! Detects a change of the repo-server TLS material and asks every workload
//! that mounts it to roll out.
//!
//! The secret is only considered when it is a `kubernetes.io/tls` secret
//! carrying both `tls.crt` and `tls.key`, and when it belongs to this parent,
//! either directly or through the `<name>-repo-server` Service the parent
//! owns. Anything else leaves the pass untouched.

use crate::constants::{
    APPLICATION_CONTROLLER_SUFFIX, REPO_SERVER_SUFFIX, REPO_SERVER_TLS_SECRET_NAME, SERVER_SUFFIX,
};
use crate::controller::reconciler::fingerprint::{compute_fingerprint, has_changed, TlsSecretMaterial};
use crate::controller::reconciler::labels::{child_name, parent_identity};
use crate::controller::reconciler::rollout::propagate;
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::controller::store::{ManagedObject, ObjectKey, ResourceKind};
use crate::crd::ArgoCD;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use kube_runtime::reflector::ObjectRef;
use tracing::{debug, info};

/// What the TLS step did during a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsSecretOutcome {
    /// No eligible secret
    Skipped,
    /// Fingerprint matches the stored one
    Unchanged,
    /// Material changed; this many workloads were asked to roll out
    RolledOut(usize),
}

/// Workloads that mount the repo-server TLS material
pub fn dependent_workloads(parent: &ArgoCD) -> Result<Vec<ObjectKey>, ReconcilerError> {
    let (namespace, name) = parent_identity(parent)?;
    Ok(vec![
        ObjectKey::new(ResourceKind::Deployment, namespace, child_name(name, SERVER_SUFFIX)),
        ObjectKey::new(
            ResourceKind::Deployment,
            namespace,
            child_name(name, REPO_SERVER_SUFFIX),
        ),
        ObjectKey::new(
            ResourceKind::StatefulSet,
            namespace,
            child_name(name, APPLICATION_CONTROLLER_SUFFIX),
        ),
    ])
}

/// Parents to requeue when the repo-server TLS secret changes
///
/// Follows a direct `ArgoCD` owner, or a `<name>-repo-server` Service owner
/// back to the `ArgoCD` named `<name>`. Ownership is verified again during
/// the pass.
#[must_use]
pub fn parents_of_tls_secret(secret: &Secret) -> Vec<ObjectRef<ArgoCD>> {
    if secret.metadata.name.as_deref() != Some(REPO_SERVER_TLS_SECRET_NAME) {
        return Vec::new();
    }
    let Some(namespace) = secret.metadata.namespace.as_deref() else {
        return Vec::new();
    };
    let parent_api_version = ArgoCD::api_version(&());
    let service_suffix = format!("-{REPO_SERVER_SUFFIX}");

    secret
        .metadata
        .owner_references
        .iter()
        .flatten()
        .filter_map(|owner| match owner.kind.as_str() {
            "ArgoCD" if owner.api_version == parent_api_version => Some(owner.name.as_str()),
            "Service" => owner.name.strip_suffix(service_suffix.as_str()),
            _ => None,
        })
        .filter(|name| !name.is_empty())
        .map(|name| ObjectRef::new(name).within(namespace))
        .collect()
}

/// Fingerprint the repo-server TLS secret and roll out dependents on change
///
/// The new fingerprint is written into `parent`'s in-memory status only when
/// every dependent accepted its rollout marker; persisting the status is left
/// to the caller.
pub async fn reconcile_repo_server_tls(
    ctx: &Reconciler,
    parent: &mut ArgoCD,
) -> Result<TlsSecretOutcome, ReconcilerError> {
    let Some(material) = eligible_material(ctx, parent).await? else {
        return Ok(TlsSecretOutcome::Skipped);
    };

    let digest = compute_fingerprint(&material);
    let changed = has_changed(parent, &digest) && !already_recorded(ctx, parent, &digest).await?;
    if changed {
        info!(
            "🔐 Repo server TLS material changed (fingerprint {}), rolling out dependents",
            digest
        );
    }

    let updated = propagate(ctx.store.as_ref(), changed, &dependent_workloads(parent)?).await?;
    parent.status_mut().secret_fingerprint = digest;

    Ok(if changed {
        TlsSecretOutcome::RolledOut(updated)
    } else {
        TlsSecretOutcome::Unchanged
    })
}

/// The parent handed to a pass comes from the watch cache, which may not yet
/// hold the status written by the previous pass. The persisted copy decides.
async fn already_recorded(
    ctx: &Reconciler,
    parent: &ArgoCD,
    digest: &str,
) -> Result<bool, ReconcilerError> {
    let (namespace, name) = parent_identity(parent)?;
    let persisted = ctx.store.fetch_parent(namespace, name).await?;
    if persisted
        .as_ref()
        .is_some_and(|current| !has_changed(current, digest))
    {
        debug!(
            "Fingerprint {} already recorded on ArgoCD {}/{}, cached copy is stale",
            digest, namespace, name
        );
        return Ok(true);
    }
    Ok(false)
}

async fn eligible_material(
    ctx: &Reconciler,
    parent: &ArgoCD,
) -> Result<Option<TlsSecretMaterial>, ReconcilerError> {
    let (namespace, name) = parent_identity(parent)?;
    let Some(parent_uid) = parent.metadata.uid.as_deref() else {
        debug!("ArgoCD {}/{} has no uid yet, skipping TLS secret", namespace, name);
        return Ok(None);
    };

    let secret = match ctx
        .store
        .fetch(ResourceKind::Secret, namespace, REPO_SERVER_TLS_SECRET_NAME)
        .await?
    {
        Some(ManagedObject::Secret(secret)) => secret,
        _ => {
            debug!("No {} secret in {}", REPO_SERVER_TLS_SECRET_NAME, namespace);
            return Ok(None);
        }
    };

    let Some(material) = TlsSecretMaterial::from_secret(&secret) else {
        debug!(
            "Secret {}/{} is not a complete TLS secret, skipping",
            namespace, REPO_SERVER_TLS_SECRET_NAME
        );
        return Ok(None);
    };

    if is_owned_by(&secret.metadata, parent_uid) {
        return Ok(Some(material));
    }

    let service_name = child_name(name, REPO_SERVER_SUFFIX);
    let Some(service_uid) = owner_uid(&secret.metadata, "Service", &service_name) else {
        debug!(
            "Secret {}/{} is not owned by this ArgoCD, skipping",
            namespace, REPO_SERVER_TLS_SECRET_NAME
        );
        return Ok(None);
    };

    let service_owned = match ctx
        .store
        .fetch(ResourceKind::Service, namespace, &service_name)
        .await?
    {
        Some(service) => {
            service.meta().uid.as_deref() == Some(service_uid)
                && is_owned_by(service.meta(), parent_uid)
        }
        None => false,
    };

    if service_owned {
        Ok(Some(material))
    } else {
        debug!(
            "Service {}/{} does not belong to this ArgoCD, skipping TLS secret",
            namespace, service_name
        );
        Ok(None)
    }
}

fn is_owned_by(meta: &ObjectMeta, uid: &str) -> bool {
    meta.owner_references
        .iter()
        .flatten()
        .any(|r| r.uid == uid)
}

fn owner_uid<'a>(meta: &'a ObjectMeta, kind: &str, name: &str) -> Option<&'a str> {
    meta.owner_references
        .iter()
        .flatten()
        .find(|r| r.kind == kind && r.name == name)
        .map(|r| r.uid.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::constants::{SECRET_TYPE_TLS, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY};
    use crate::controller::store::{MemoryStore, StoreError};
    use crate::crd::ArgoCDSpec;
    use k8s_openapi::api::core::v1::Service;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn parent() -> ArgoCD {
        let mut cr = ArgoCD::new("argocd", ArgoCDSpec::default());
        cr.metadata.namespace = Some("argocd".to_string());
        cr.metadata.uid = Some("parent-uid".to_string());
        cr
    }

    fn owner(kind: &str, name: &str, uid: &str) -> OwnerReference {
        OwnerReference {
            api_version: "v1".to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            uid: uid.to_string(),
            ..OwnerReference::default()
        }
    }

    fn tls_secret(owner_ref: OwnerReference) -> ManagedObject {
        ManagedObject::Secret(Secret {
            metadata: ObjectMeta {
                name: Some(REPO_SERVER_TLS_SECRET_NAME.to_string()),
                namespace: Some("argocd".to_string()),
                owner_references: Some(vec![owner_ref]),
                ..ObjectMeta::default()
            },
            type_: Some(SECRET_TYPE_TLS.to_string()),
            data: Some(BTreeMap::from([
                (TLS_CERT_KEY.to_string(), ByteString(b"foo".to_vec())),
                (TLS_PRIVATE_KEY_KEY.to_string(), ByteString(b"bar".to_vec())),
            ])),
            ..Secret::default()
        })
    }

    fn context(store: &MemoryStore) -> Reconciler {
        Reconciler::new(Arc::new(store.clone()), ControllerConfig::default())
    }

    #[tokio::test]
    async fn test_missing_secret_is_skipped() {
        let store = MemoryStore::new();
        let mut cr = parent();
        let outcome = reconcile_repo_server_tls(&context(&store), &mut cr).await.unwrap();
        assert_eq!(outcome, TlsSecretOutcome::Skipped);
        assert_eq!(cr.secret_fingerprint(), "");
    }

    #[tokio::test]
    async fn test_secret_owned_by_parent_is_fingerprinted() {
        let store = MemoryStore::new();
        store
            .insert(tls_secret(owner("ArgoCD", "argocd", "parent-uid")))
            .await;
        let mut cr = parent();

        let outcome = reconcile_repo_server_tls(&context(&store), &mut cr).await.unwrap();
        assert_eq!(outcome, TlsSecretOutcome::RolledOut(0));
        assert_eq!(
            cr.secret_fingerprint(),
            "c3ab8ff13720e8ad9047dd39466b3c8974e592c2fa383d4a3960714caef0c4f2"
        );

        let outcome = reconcile_repo_server_tls(&context(&store), &mut cr).await.unwrap();
        assert_eq!(outcome, TlsSecretOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_secret_owned_by_foreign_service_is_skipped() {
        let store = MemoryStore::new();
        store
            .insert(ManagedObject::Service(Service {
                metadata: ObjectMeta {
                    name: Some("argocd-repo-server".to_string()),
                    namespace: Some("argocd".to_string()),
                    uid: Some("service-uid".to_string()),
                    owner_references: Some(vec![owner("ArgoCD", "other", "other-uid")]),
                    ..ObjectMeta::default()
                },
                ..Service::default()
            }))
            .await;
        store
            .insert(tls_secret(owner("Service", "argocd-repo-server", "service-uid")))
            .await;

        let mut cr = parent();
        let outcome = reconcile_repo_server_tls(&context(&store), &mut cr).await.unwrap();
        assert_eq!(outcome, TlsSecretOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_stale_cached_parent_does_not_roll_out_again() {
        let store = MemoryStore::new();
        store
            .insert(tls_secret(owner("ArgoCD", "argocd", "parent-uid")))
            .await;
        let mut persisted = parent();
        persisted.status_mut().secret_fingerprint =
            "c3ab8ff13720e8ad9047dd39466b3c8974e592c2fa383d4a3960714caef0c4f2".to_string();
        store.insert_parent(persisted).await;

        let mut cached = parent();
        let outcome = reconcile_repo_server_tls(&context(&store), &mut cached)
            .await
            .unwrap();
        assert_eq!(outcome, TlsSecretOutcome::Unchanged);
        assert_eq!(
            cached.secret_fingerprint(),
            "c3ab8ff13720e8ad9047dd39466b3c8974e592c2fa383d4a3960714caef0c4f2"
        );
        assert_eq!(store.writes().await.object_writes(), 0);
    }

    #[tokio::test]
    async fn test_secret_fetch_failure_is_returned() {
        let store = MemoryStore::new();
        store
            .fail_fetches(ResourceKind::Secret, "argocd", REPO_SERVER_TLS_SECRET_NAME)
            .await;
        let err = reconcile_repo_server_tls(&context(&store), &mut parent())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcilerError::Store(StoreError::Unavailable { .. })
        ));
    }

    fn secret_of(object: ManagedObject) -> Secret {
        let ManagedObject::Secret(secret) = object else {
            panic!("expected a Secret");
        };
        secret
    }

    #[test]
    fn test_secret_owned_by_parent_maps_to_parent() {
        let mut argocd_owner = owner("ArgoCD", "argocd", "parent-uid");
        argocd_owner.api_version = "argoproj.io/v1alpha1".to_string();
        let secret = secret_of(tls_secret(argocd_owner));
        assert_eq!(
            parents_of_tls_secret(&secret),
            vec![ObjectRef::<ArgoCD>::new("argocd").within("argocd")]
        );
    }

    #[test]
    fn test_secret_owned_by_repo_server_service_maps_to_parent() {
        let secret = secret_of(tls_secret(owner(
            "Service",
            "argocd-repo-server",
            "service-uid",
        )));
        assert_eq!(
            parents_of_tls_secret(&secret),
            vec![ObjectRef::<ArgoCD>::new("argocd").within("argocd")]
        );
    }

    #[test]
    fn test_unrelated_secrets_map_to_nothing() {
        let foreign = secret_of(tls_secret(owner("Service", "ingress", "service-uid")));
        assert!(parents_of_tls_secret(&foreign).is_empty());

        let mut renamed = secret_of(tls_secret(owner("ArgoCD", "argocd", "parent-uid")));
        renamed.metadata.name = Some("other-tls".to_string());
        assert!(parents_of_tls_secret(&renamed).is_empty());
    }

    #[test]
    fn test_dependent_workloads() {
        let names: Vec<String> = dependent_workloads(&parent())
            .unwrap()
            .into_iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "Deployment argocd/argocd-server",
                "Deployment argocd/argocd-repo-server",
                "StatefulSet argocd/argocd-application-controller",
            ]
        );
    }
}
