//! # ArgoCD Status
//!
//! Status types written back by the controller after every pass.

use serde::{Deserialize, Serialize};

/// Status of the ArgoCD resource
///
/// `secret_fingerprint` is the authoritative record of which repo-server TLS
/// content has been propagated to the dependent workloads.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDStatus {
    /// Lowercase hex SHA-256 of `tls.crt ++ tls.key` of the repo-server TLS secret
    #[serde(default, alias = "repoTLSChecksum", skip_serializing_if = "String::is_empty")]
    pub secret_fingerprint: String,
    /// Current phase (Available, Failed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Observed generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Last reconciliation time (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconcile_time: Option<String>,
}

/// Condition represents a status condition for the resource
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of condition (True, False, Unknown)
    pub status: String,
    #[serde(default)]
    pub last_transition_time: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
