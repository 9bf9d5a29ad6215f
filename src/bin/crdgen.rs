//! # CRD Generator
//!
//! Prints the `ArgoCD` CustomResourceDefinition as YAML.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/argocd.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use argocd_applicationset_reconciler::crd::ArgoCD;
use kube::core::CustomResourceExt;

fn main() {
    let crd = ArgoCD::crd();
    match serde_yaml::to_string(&crd) {
        Ok(yaml) => print!("{yaml}"),
        Err(e) => {
            eprintln!("Failed to serialize CRD to YAML: {e}");
            std::process::exit(1);
        }
    }
}
