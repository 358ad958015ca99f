//! # Reconciler
//!
//! Core reconciliation logic for `BitwardenSecret` resources.
//!
//! The reconciler:
//! - Re-reads the resource and skips it while its last sync is still fresh
//! - Loads the machine account access token from a Secret in the same namespace
//! - Runs one delta sync against Bitwarden Secrets Manager
//! - Maps the returned bundle onto the target Secret's data keys
//! - Records the outcome as a status condition
//!
//! ## Reconciliation Flow
//!
//! 1. Fetch the `BitwardenSecret` (gone ⇒ nothing to do)
//! 2. Freshness guard on `lastSuccessfulSyncTime`
//! 3. Read the access token
//! 4. Login and sync; no changes ⇒ requeue
//! 5. Validate names when `useSecretNames` is set
//! 6. Fetch or create the target Secret
//! 7. Replace its data, annotate, patch
//! 8. Record `SuccessfulSync`

pub mod cluster;
pub mod fetch;
pub mod mapping;
pub mod reconcile;
pub mod status;
pub mod target;
pub mod types;
pub mod validation;

pub use cluster::{ClusterClient, KubeCluster};
pub use fetch::{fetch_secrets, SyncRequest};
pub use mapping::map_secrets;
pub use reconcile::reconcile;
pub use types::{Reconciler, ReconcilerError};
pub use validation::{validate_secret_name, validate_secret_names, SecretNameError};
