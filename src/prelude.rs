//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use bitwarden_sm_operator::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Client seams
pub use crate::controller::reconciler::{ClusterClient, KubeCluster};
pub use crate::provider::{
    ClientFactory, RemoteSecret, SecretsManagerClient, SyncResponse,
};

// Reconciler types
pub use crate::controller::reconciler::{reconcile, Reconciler, ReconcilerError};

// Config types
pub use crate::config::{ControllerConfig, ServerConfig};

// Native client
pub use crate::provider::{BitwardenClient, BitwardenClientFactory, BitwardenError};
