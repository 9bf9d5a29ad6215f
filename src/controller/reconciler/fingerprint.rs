//! # Fingerprint
//!
//! Content digest of the repo-server TLS material and the change decision
//! against the digest recorded in the parent's status.

use crate::constants::{SECRET_TYPE_TLS, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY};
use crate::crd::ArgoCD;
use k8s_openapi::api::core::v1::Secret;
use sha2::{Digest, Sha256};

/// Certificate and private key bytes of a TLS secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSecretMaterial {
    pub certificate: Vec<u8>,
    pub private_key: Vec<u8>,
}

impl TlsSecretMaterial {
    pub fn new(certificate: impl Into<Vec<u8>>, private_key: impl Into<Vec<u8>>) -> Self {
        Self {
            certificate: certificate.into(),
            private_key: private_key.into(),
        }
    }

    /// Material of a `kubernetes.io/tls` secret carrying both keys
    #[must_use]
    pub fn from_secret(secret: &Secret) -> Option<Self> {
        if secret.type_.as_deref() != Some(SECRET_TYPE_TLS) {
            return None;
        }
        let data = secret.data.as_ref()?;
        let certificate = data.get(TLS_CERT_KEY)?;
        let private_key = data.get(TLS_PRIVATE_KEY_KEY)?;
        Some(Self::new(certificate.0.clone(), private_key.0.clone()))
    }
}

/// Lowercase hex SHA-256 of the certificate followed by the private key
#[must_use]
pub fn compute_fingerprint(material: &TlsSecretMaterial) -> String {
    let mut hasher = Sha256::new();
    hasher.update(&material.certificate);
    hasher.update(&material.private_key);
    format!("{:x}", hasher.finalize())
}

/// An empty stored fingerprint always counts as a change
#[must_use]
pub fn has_changed(parent: &ArgoCD, digest: &str) -> bool {
    let stored = parent.secret_fingerprint();
    stored.is_empty() || stored != digest
}
