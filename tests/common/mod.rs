//! Common test fixtures
//!
//! Builds parents, TLS secrets and dependent workloads in a fresh
//! `MemoryStore` per test.

#![allow(dead_code, reason = "Not every test binary uses every fixture")]

use argocd_applicationset_reconciler::prelude::*;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const NAMESPACE: &str = "argocd-operator";
pub const PARENT_NAME: &str = "argocd";
pub const PARENT_UID: &str = "argocd-uid-123";
pub const APPSET_NAME: &str = "argocd-applicationset-controller";
pub const MARKER_LABEL: &str = "repo.tls.cert.changed";

pub fn parent() -> ArgoCD {
    let mut cr = ArgoCD::new(PARENT_NAME, ArgoCDSpec::default());
    cr.metadata.namespace = Some(NAMESPACE.to_string());
    cr.metadata.uid = Some(PARENT_UID.to_string());
    cr.metadata.generation = Some(1);
    cr
}

pub fn parent_with_appset(image: &str, version: &str) -> ArgoCD {
    let mut cr = parent();
    cr.spec.application_set = Some(ApplicationSetSpec {
        image: image.to_string(),
        version: version.to_string(),
        resources: None,
    });
    cr
}

pub fn reconciler(store: &MemoryStore) -> Reconciler {
    reconciler_with_config(store, ControllerConfig::default())
}

pub fn reconciler_with_config(store: &MemoryStore, config: ControllerConfig) -> Reconciler {
    Reconciler::new(Arc::new(store.clone()), config)
}

fn meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(NAMESPACE.to_string()),
        ..ObjectMeta::default()
    }
}

fn owner(api_version: &str, kind: &str, name: &str, uid: &str) -> OwnerReference {
    OwnerReference {
        api_version: api_version.to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
        uid: uid.to_string(),
        ..OwnerReference::default()
    }
}

/// `argocd-repo-server` Service owned by the parent
pub fn repo_server_service() -> ManagedObject {
    let mut metadata = meta("argocd-repo-server");
    metadata.uid = Some("service-123".to_string());
    metadata.owner_references = Some(vec![owner(
        "argoproj.io/v1alpha1",
        "ArgoCD",
        PARENT_NAME,
        PARENT_UID,
    )]);
    ManagedObject::Service(Service {
        metadata,
        ..Service::default()
    })
}

/// `argocd-repo-server-tls` owned by the repo server Service
pub fn repo_server_tls_secret(certificate: &[u8], private_key: &[u8]) -> Secret {
    let mut metadata = meta("argocd-repo-server-tls");
    metadata.owner_references = Some(vec![owner(
        "v1",
        "Service",
        "argocd-repo-server",
        "service-123",
    )]);
    Secret {
        metadata,
        type_: Some("kubernetes.io/tls".to_string()),
        data: Some(BTreeMap::from([
            ("tls.crt".to_string(), ByteString(certificate.to_vec())),
            ("tls.key".to_string(), ByteString(private_key.to_vec())),
        ])),
        ..Secret::default()
    }
}

pub fn deployment(name: &str) -> ManagedObject {
    ManagedObject::Deployment(Deployment {
        metadata: meta(name),
        ..Deployment::default()
    })
}

pub fn statefulset(name: &str) -> ManagedObject {
    ManagedObject::StatefulSet(StatefulSet {
        metadata: meta(name),
        ..StatefulSet::default()
    })
}

/// Parent, repo server Service, TLS secret and the three dependents
pub async fn seed_tls_fixture(store: &MemoryStore, certificate: &[u8], private_key: &[u8]) {
    store.insert_parent(parent()).await;
    store.insert(repo_server_service()).await;
    store
        .insert(ManagedObject::Secret(repo_server_tls_secret(
            certificate,
            private_key,
        )))
        .await;
    store.insert(deployment("argocd-server")).await;
    store.insert(deployment("argocd-repo-server")).await;
    store
        .insert(statefulset("argocd-application-controller"))
        .await;
}

/// Replace the TLS material of the seeded secret
pub async fn rotate_tls_secret(store: &MemoryStore, certificate: &[u8], private_key: &[u8]) {
    let Some(ManagedObject::Secret(mut current)) = store
        .get(ResourceKind::Secret, NAMESPACE, "argocd-repo-server-tls")
        .await
    else {
        panic!("TLS secret not seeded");
    };
    current.data = repo_server_tls_secret(certificate, private_key).data;
    store
        .update(ManagedObject::Secret(current))
        .await
        .expect("rotate TLS secret");
}

/// Rollout marker on a dependent's pod template
pub async fn marker(store: &MemoryStore, kind: ResourceKind, name: &str) -> Option<String> {
    let object = store.get(kind, NAMESPACE, name).await?;
    let template = match object {
        ManagedObject::Deployment(d) => d.spec?.template,
        ManagedObject::StatefulSet(s) => s.spec?.template,
        _ => return None,
    };
    template.metadata?.labels?.get(MARKER_LABEL).cloned()
}

/// Markers of server, repo server and application controller, in that order
pub async fn markers(store: &MemoryStore) -> [Option<String>; 3] {
    [
        marker(store, ResourceKind::Deployment, "argocd-server").await,
        marker(store, ResourceKind::Deployment, "argocd-repo-server").await,
        marker(store, ResourceKind::StatefulSet, "argocd-application-controller").await,
    ]
}
