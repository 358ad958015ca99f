//! # CRD Generator
//!
//! Generates the `BitwardenSecret` CustomResourceDefinition YAML from the Rust
//! type definitions.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/bases/k8s.bitwarden.com_bitwardensecrets.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```
//!
//! The generated CRD includes the OpenAPI schema, defaults for
//! `onlyMappedSecrets`/`useSecretNames`, the status subresource and the
//! `Secret`/`Last Sync` printer columns.

use bitwarden_sm_operator::crd::BitwardenSecret;
use kube::core::CustomResourceExt;

fn main() {
    let crd = BitwardenSecret::crd();

    match serde_yaml::to_string(&crd) {
        Ok(yaml) => {
            println!("# This file is auto-generated by crdgen");
            println!("# DO NOT EDIT THIS FILE MANUALLY");
            println!("# Change the types in src/crd/ and regenerate instead");
            println!("---");
            print!("{yaml}");
        }
        Err(e) => {
            eprintln!("Failed to serialize CRD to YAML: {e}");
            std::process::exit(1);
        }
    }
}
