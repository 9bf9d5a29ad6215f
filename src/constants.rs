//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default requeue interval after a successful reconciliation (seconds)
pub const DEFAULT_RECONCILIATION_INTERVAL_SECS: u64 = 300;

/// Default requeue interval for reconciliation errors (seconds)
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 60;

/// Requeue interval after an optimistic-concurrency conflict (seconds)
pub const DEFAULT_CONFLICT_REQUEUE_SECS: u64 = 1;

/// Default number of parents reconciled in parallel
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Field manager / controller name reported to the API server
pub const CONTROLLER_NAME: &str = "argocd-applicationset-reconciler";

// Label keys

pub const LABEL_NAME: &str = "app.kubernetes.io/name";
pub const LABEL_PART_OF: &str = "app.kubernetes.io/part-of";
pub const LABEL_COMPONENT: &str = "app.kubernetes.io/component";

/// Pod template label whose value change triggers a workload rollout
pub const LABEL_REPO_TLS_CERT_CHANGED: &str = "repo.tls.cert.changed";

// ApplicationSet controller

pub const APPSET_LABEL_NAME: &str = "argocd-applicationset-controller";
pub const APPSET_LABEL_PART_OF: &str = "argocd-applicationset";
pub const APPSET_LABEL_COMPONENT: &str = "controller";

/// Suffix appended to the parent name for every ApplicationSet child resource
pub const APPSET_RESOURCE_SUFFIX: &str = "applicationset-controller";

pub const APPSET_CONTAINER_NAME: &str = "argocd-applicationset-controller";

pub const DEFAULT_APPSET_IMAGE: &str = "quay.io/argocdapplicationset/argocd-applicationset";
pub const DEFAULT_APPSET_VERSION: &str = "v0.2.0";

/// Environment variable that overrides the ApplicationSet image when the parent
/// leaves both image and version at their defaults
pub const APPSET_IMAGE_ENV_NAME: &str = "ARGOCD_APPLICATIONSET_IMAGE";

// Config maps and secrets mounted into the ApplicationSet controller

pub const KNOWN_HOSTS_CONFIGMAP_NAME: &str = "argocd-ssh-known-hosts-cm";
pub const TLS_CERTS_CONFIGMAP_NAME: &str = "argocd-tls-certs-cm";
pub const GPG_KEYS_CONFIGMAP_NAME: &str = "argocd-gpg-keys-cm";
pub const REPO_SERVER_TLS_SECRET_NAME: &str = "argocd-repo-server-tls";

// Repo server TLS and dependent workloads

pub const REPO_SERVER_SUFFIX: &str = "repo-server";
pub const SERVER_SUFFIX: &str = "server";
pub const APPLICATION_CONTROLLER_SUFFIX: &str = "application-controller";

pub const REPO_SERVER_PORT: u16 = 8081;

/// Container fields the API server defaults when a Deployment is persisted
pub const TERMINATION_MESSAGE_PATH: &str = "/dev/termination-log";
pub const TERMINATION_MESSAGE_POLICY: &str = "File";

/// Secret type whose payload is fingerprinted
pub const SECRET_TYPE_TLS: &str = "kubernetes.io/tls";
pub const TLS_CERT_KEY: &str = "tls.crt";
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

// Status phases

pub const PHASE_AVAILABLE: &str = "Available";
pub const PHASE_FAILED: &str = "Failed";
