//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Requeue interval after a successful pass (seconds)
    pub reconciliation_interval_secs: u64,
    /// Reconciliation error requeue interval (seconds)
    /// How long to wait before retrying a failed reconciliation
    pub reconciliation_error_requeue_secs: u64,
    /// Requeue interval after a resource version conflict (seconds)
    pub conflict_requeue_secs: u64,
    /// Maximum concurrent reconciliations
    /// Different parents are reconciled in parallel up to this limit
    pub max_concurrent_reconciliations: u16,
    /// HTTP port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Log format (json, text)
    pub log_format: String,
    /// Restrict the watch to a single namespace (all namespaces when unset)
    pub watch_namespace: Option<String>,
    /// ApplicationSet image override, only honoured when the parent uses default image and version
    pub applicationset_image_override: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::{
            DEFAULT_CONFLICT_REQUEUE_SECS, DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            DEFAULT_METRICS_PORT, DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            DEFAULT_RECONCILIATION_INTERVAL_SECS,
        };
        Self {
            reconciliation_interval_secs: DEFAULT_RECONCILIATION_INTERVAL_SECS,
            reconciliation_error_requeue_secs: DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            conflict_requeue_secs: DEFAULT_CONFLICT_REQUEUE_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            metrics_port: DEFAULT_METRICS_PORT,
            log_format: "text".to_string(),
            watch_namespace: None,
            applicationset_image_override: None,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        use crate::constants::{
            APPSET_IMAGE_ENV_NAME, DEFAULT_CONFLICT_REQUEUE_SECS,
            DEFAULT_MAX_CONCURRENT_RECONCILIATIONS, DEFAULT_METRICS_PORT,
            DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS, DEFAULT_RECONCILIATION_INTERVAL_SECS,
        };
        Self {
            reconciliation_interval_secs: env_var_or_default(
                "RECONCILIATION_INTERVAL_SECS",
                DEFAULT_RECONCILIATION_INTERVAL_SECS,
            ),
            reconciliation_error_requeue_secs: env_var_or_default(
                "RECONCILIATION_ERROR_REQUEUE_SECS",
                DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            ),
            conflict_requeue_secs: env_var_or_default(
                "CONFLICT_REQUEUE_SECS",
                DEFAULT_CONFLICT_REQUEUE_SECS,
            ),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            log_format: env_var_or_default_str("LOG_FORMAT", "text"),
            watch_namespace: env_var_non_empty("WATCH_NAMESPACE"),
            applicationset_image_override: env_var_non_empty(APPSET_IMAGE_ENV_NAME),
        }
    }

    /// Get requeue duration after a successful pass
    #[must_use]
    pub fn reconciliation_interval(&self) -> Duration {
        Duration::from_secs(self.reconciliation_interval_secs)
    }

    /// Get reconciliation error requeue duration
    #[must_use]
    pub fn reconciliation_error_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.reconciliation_error_requeue_secs)
    }

    #[must_use]
    pub fn conflict_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.conflict_requeue_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_var_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
