//! # Watch Loop
//!
//! Controller watch loop that monitors ArgoCD resources, the children they
//! own and the repo-server TLS secret, and triggers reconciliation when
//! changes are detected.

use crate::constants::REPO_SERVER_TLS_SECRET_NAME;
use crate::controller::reconciler::{parents_of_tls_secret, reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::ArgoCD;
use crate::runtime::error_policy::handle_reconciliation_error;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use kube::api::Api;
use kube::Client;
use kube_runtime::{controller, watcher, Controller};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

fn owned_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}

/// Run the controller watch loop until a shutdown signal arrives
///
/// Changes to owned children requeue their parent, so drift is corrected
/// without waiting for the periodic requeue. A change to the repo-server TLS
/// secret requeues the parent that owns it, directly or through its
/// repo-server Service.
pub async fn run_watch_loop(
    argocds: Api<ArgoCD>,
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let namespace = reconciler.config.watch_namespace.clone();
    let concurrency = reconciler.config.max_concurrent_reconciliations;

    let watch_span = tracing::span!(
        tracing::Level::INFO,
        "controller.watch",
        operation = "watch_loop"
    );

    info!("Starting controller watch loop...");
    let owned = watcher::Config::default();
    let tls_secret =
        watcher::Config::default().fields(&format!("metadata.name={REPO_SERVER_TLS_SECRET_NAME}"));
    Controller::new(argocds, watcher::Config::default().any_semantic())
        .owns(owned_api::<Deployment>(&client, namespace.as_deref()), owned.clone())
        .owns(owned_api::<ServiceAccount>(&client, namespace.as_deref()), owned.clone())
        .owns(owned_api::<Role>(&client, namespace.as_deref()), owned.clone())
        .owns(owned_api::<RoleBinding>(&client, namespace.as_deref()), owned)
        .watches(
            owned_api::<Secret>(&client, namespace.as_deref()),
            tls_secret,
            |secret| parents_of_tls_secret(&secret),
        )
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile, handle_reconciliation_error, reconciler)
        .for_each(|result| {
            match result {
                Ok((object, _)) => debug!("watch.event.success: {}", object),
                Err(e) => warn!("Controller stream error: {}", e),
            }
            futures::future::ready(())
        })
        .instrument(watch_span)
        .await;

    server_state.set_ready(false);
    info!("Controller stopped gracefully");
    Ok(())
}
