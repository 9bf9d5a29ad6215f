//! # ArgoCD Spec
//!
//! The parent custom resource driving every child this controller manages.

use k8s_openapi::api::core::v1::ResourceRequirements;
use serde::{Deserialize, Serialize};

/// ArgoCD Custom Resource Definition
///
/// Only the fields relevant to the ApplicationSet controller are modelled here;
/// unknown fields are preserved by the API server and ignored by this controller.
///
/// # Example
///
/// ```yaml
/// apiVersion: argoproj.io/v1alpha1
/// kind: ArgoCD
/// metadata:
///   name: argocd
///   namespace: argocd
/// spec:
///   applicationSet:
///     image: quay.io/argocdapplicationset/argocd-applicationset
///     version: v0.2.0
///     resources:
///       limits:
///         cpu: 500m
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "ArgoCD",
    group = "argoproj.io",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::ArgoCDStatus",
    shortname = "argocd",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"SecretFingerprint", "type":"string", "priority":1, "jsonPath":".status.secretFingerprint"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDSpec {
    /// ApplicationSet controller options
    /// When omitted the controller runs with the default image and no resource requirements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_set: Option<ApplicationSetSpec>,
}

/// ApplicationSet controller configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSetSpec {
    /// Container image (without tag)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    /// Image tag, or a digest such as `sha256:...`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Container resource requirements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}
