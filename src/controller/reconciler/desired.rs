//! # Desired State
//!
//! Pure builders producing the fully specified ApplicationSet controller
//! objects for a parent. Nothing here talks to the store; owner references
//! are attached by the reconciler when an object is created.

use crate::config::ControllerConfig;
use crate::constants::{
    APPSET_CONTAINER_NAME, APPSET_RESOURCE_SUFFIX, DEFAULT_APPSET_IMAGE, DEFAULT_APPSET_VERSION,
    GPG_KEYS_CONFIGMAP_NAME, KNOWN_HOSTS_CONFIGMAP_NAME, LABEL_NAME, REPO_SERVER_PORT,
    REPO_SERVER_SUFFIX, REPO_SERVER_TLS_SECRET_NAME, TERMINATION_MESSAGE_PATH,
    TERMINATION_MESSAGE_POLICY, TLS_CERTS_CONFIGMAP_NAME,
};
use crate::controller::reconciler::labels::{appset_labels, child_name, parent_identity};
use crate::controller::reconciler::types::ReconcilerError;
use crate::controller::store::ManagedObject;
use crate::crd::ArgoCD;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, EmptyDirVolumeSource, EnvVar, EnvVarSource,
    ObjectFieldSelector, PodSpec, PodTemplateSpec, ResourceRequirements, SecretVolumeSource,
    ServiceAccount, Volume, VolumeMount,
};
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

fn appset_metadata(parent: &ArgoCD) -> Result<ObjectMeta, ReconcilerError> {
    let (namespace, name) = parent_identity(parent)?;
    Ok(ObjectMeta {
        name: Some(child_name(name, APPSET_RESOURCE_SUFFIX)),
        namespace: Some(namespace.to_string()),
        labels: Some(appset_labels()),
        ..ObjectMeta::default()
    })
}

pub fn service_account(
    parent: &ArgoCD,
    _config: &ControllerConfig,
) -> Result<ManagedObject, ReconcilerError> {
    Ok(ManagedObject::ServiceAccount(ServiceAccount {
        metadata: appset_metadata(parent)?,
        ..ServiceAccount::default()
    }))
}

pub fn role(parent: &ArgoCD, _config: &ControllerConfig) -> Result<ManagedObject, ReconcilerError> {
    Ok(ManagedObject::Role(Role {
        metadata: appset_metadata(parent)?,
        rules: Some(policy_rules()),
    }))
}

/// Binds the ApplicationSet role to the ApplicationSet service account.
/// Both share the binding's name, so no store lookup is needed.
pub fn role_binding(
    parent: &ArgoCD,
    _config: &ControllerConfig,
) -> Result<ManagedObject, ReconcilerError> {
    let metadata = appset_metadata(parent)?;
    let name = metadata.name.clone().unwrap_or_default();
    let namespace = metadata.namespace.clone();
    Ok(ManagedObject::RoleBinding(RoleBinding {
        metadata,
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "Role".to_string(),
            name: name.clone(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name,
            namespace,
            ..Subject::default()
        }]),
    }))
}

pub fn deployment(
    parent: &ArgoCD,
    config: &ControllerConfig,
) -> Result<ManagedObject, ReconcilerError> {
    let metadata = appset_metadata(parent)?;
    let name = metadata.name.clone().unwrap_or_default();
    let selector_labels = BTreeMap::from([(LABEL_NAME.to_string(), name.clone())]);

    Ok(ManagedObject::Deployment(Deployment {
        metadata,
        spec: Some(DeploymentSpec {
            selector: LabelSelector {
                match_labels: Some(selector_labels.clone()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(selector_labels),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(name),
                    volumes: Some(volumes()),
                    containers: containers(
                        parent,
                        config.applicationset_image_override.as_deref(),
                    )?,
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    }))
}

/// Container list of the ApplicationSet controller; the only part of the
/// Deployment reconciled after creation
///
/// Spells out the values the API server would default so that a persisted
/// container compares equal to a freshly built one.
pub fn containers(
    parent: &ArgoCD,
    image_override: Option<&str>,
) -> Result<Vec<Container>, ReconcilerError> {
    Ok(vec![Container {
        name: APPSET_CONTAINER_NAME.to_string(),
        command: Some(vec![
            "applicationset-controller".to_string(),
            "--argocd-repo-server".to_string(),
            repo_server_address(parent)?,
        ]),
        env: Some(vec![EnvVar {
            name: "NAMESPACE".to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    api_version: Some("v1".to_string()),
                    field_path: "metadata.namespace".to_string(),
                }),
                ..EnvVarSource::default()
            }),
            ..EnvVar::default()
        }]),
        image: Some(applicationset_image(parent, image_override)),
        image_pull_policy: Some("Always".to_string()),
        resources: Some(applicationset_resources(parent)),
        volume_mounts: Some(vec![
            volume_mount("ssh-known-hosts", "/app/config/ssh"),
            volume_mount("tls-certs", "/app/config/tls"),
            volume_mount("gpg-keys", "/app/config/gpg/source"),
            volume_mount("gpg-keyring", "/app/config/gpg/keys"),
            volume_mount("argocd-repo-server-tls", "/app/config/reposerver/tls"),
        ]),
        termination_message_path: Some(TERMINATION_MESSAGE_PATH.to_string()),
        termination_message_policy: Some(TERMINATION_MESSAGE_POLICY.to_string()),
        ..Container::default()
    }])
}

fn volume_mount(name: &str, mount_path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: mount_path.to_string(),
        ..VolumeMount::default()
    }
}

fn config_map_volume(name: &str, config_map: &str) -> Volume {
    Volume {
        name: name.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map.to_string(),
            ..ConfigMapVolumeSource::default()
        }),
        ..Volume::default()
    }
}

fn volumes() -> Vec<Volume> {
    vec![
        config_map_volume("ssh-known-hosts", KNOWN_HOSTS_CONFIGMAP_NAME),
        config_map_volume("tls-certs", TLS_CERTS_CONFIGMAP_NAME),
        config_map_volume("gpg-keys", GPG_KEYS_CONFIGMAP_NAME),
        Volume {
            name: "gpg-keyring".to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Volume::default()
        },
        Volume {
            name: "argocd-repo-server-tls".to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(REPO_SERVER_TLS_SECRET_NAME.to_string()),
                optional: Some(true),
                ..SecretVolumeSource::default()
            }),
            ..Volume::default()
        },
    ]
}

/// `<parent>-repo-server.<namespace>.svc.cluster.local:8081`
pub fn repo_server_address(parent: &ArgoCD) -> Result<String, ReconcilerError> {
    let (namespace, name) = parent_identity(parent)?;
    Ok(format!(
        "{}.{namespace}.svc.cluster.local:{REPO_SERVER_PORT}",
        child_name(name, REPO_SERVER_SUFFIX)
    ))
}

/// Image for the ApplicationSet container
///
/// Spec values win. The override is used only when the parent leaves both
/// image and version at their defaults.
#[must_use]
pub fn applicationset_image(parent: &ArgoCD, image_override: Option<&str>) -> String {
    let (image, version) = parent
        .spec
        .application_set
        .as_ref()
        .map_or(("", ""), |s| (s.image.as_str(), s.version.as_str()));

    let default_image = image.is_empty();
    let default_version = version.is_empty();

    if let Some(image_override) = image_override.filter(|i| !i.is_empty()) {
        if default_image && default_version {
            return image_override.to_string();
        }
    }

    let image = if default_image { DEFAULT_APPSET_IMAGE } else { image };
    let version = if default_version {
        DEFAULT_APPSET_VERSION
    } else {
        version
    };
    combine_image_tag(image, version)
}

/// `image@digest` when the tag is a digest, `image:tag` otherwise
#[must_use]
pub fn combine_image_tag(image: &str, tag: &str) -> String {
    if tag.contains(':') {
        format!("{image}@{tag}")
    } else if tag.is_empty() {
        image.to_string()
    } else {
        format!("{image}:{tag}")
    }
}

/// Resources from the parent; a limit without a request also becomes the
/// request, as the API server does on admission
fn applicationset_resources(parent: &ArgoCD) -> ResourceRequirements {
    let mut resources = parent
        .spec
        .application_set
        .as_ref()
        .and_then(|s| s.resources.clone())
        .unwrap_or_default();
    if let Some(limits) = resources.limits.clone() {
        let requests = resources.requests.get_or_insert_with(BTreeMap::new);
        for (resource, quantity) in limits {
            requests.entry(resource).or_insert(quantity);
        }
    }
    resources
}

fn rule(api_groups: &[&str], resources: &[&str], verbs: &[&str]) -> PolicyRule {
    let owned = |items: &[&str]| items.iter().map(ToString::to_string).collect::<Vec<_>>();
    PolicyRule {
        api_groups: Some(owned(api_groups)),
        resources: Some(owned(resources)),
        verbs: owned(verbs),
        ..PolicyRule::default()
    }
}

/// Permissions of the ApplicationSet controller
#[must_use]
pub fn policy_rules() -> Vec<PolicyRule> {
    const ALL_VERBS: &[&str] = &["create", "delete", "get", "list", "patch", "update", "watch"];
    const READ_VERBS: &[&str] = &["get", "list", "watch"];

    vec![
        rule(
            &["argoproj.io"],
            &[
                "applications",
                "applicationsets",
                "appprojects",
                "applicationsets/finalizers",
            ],
            ALL_VERBS,
        ),
        rule(
            &["argoproj.io"],
            &["applicationsets/status"],
            &["get", "patch", "update"],
        ),
        rule(&[""], &["events"], ALL_VERBS),
        rule(&[""], &["secrets", "configmaps"], READ_VERBS),
        rule(&["apps", "extensions"], &["deployments"], READ_VERBS),
    ]
}
