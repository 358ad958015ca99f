//! # Types
//!
//! Core types for the reconciler.

use std::sync::Arc;

use thiserror::Error;

use crate::config::ControllerConfig;
use crate::controller::reconciler::cluster::ClusterClient;
use crate::provider::{BitwardenError, ClientFactory};

/// Failures surfaced by one reconciliation
///
/// The `Display` text of each variant is what ends up in the `FailedSync`
/// condition message.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Error looking up {kind} {key} - {source}")]
    LookupFailure {
        kind: &'static str,
        key: String,
        #[source]
        source: kube::Error,
    },

    #[error("Error pulling authorization token secret - {0}")]
    MissingAuthToken(String),

    #[error("Failed to create Bitwarden client - {0}")]
    UpstreamClientCreationFailure(#[source] BitwardenError),

    #[error("Failed to authenticate with Bitwarden - {0}")]
    UpstreamAuthFailure(#[source] BitwardenError),

    #[error("Failed to sync secrets from Bitwarden - {0}")]
    UpstreamSyncFailure(#[source] BitwardenError),

    #[error("Invalid secret key names - {}", .0.join("; "))]
    InvalidSecretNames(Vec<String>),

    #[error("Duplicate secret key names - {}", .0.join(", "))]
    DuplicateSecretNames(Vec<String>),

    #[error("Failed to set owner reference on Secret {0} - owning resource has no name or UID")]
    OwnershipFailure(String),

    #[error("Failed to create Secret {name} - {source}")]
    CreationFailure {
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("Failed to patch Secret {name} - {source}")]
    PersistFailure {
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("Failed to update BitwardenSecret status - {0}")]
    StatusUpdateFailure(#[source] kube::Error),
}

impl ReconcilerError {
    /// Stable label for metrics and logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcilerError::LookupFailure { .. } => "LookupFailure",
            ReconcilerError::MissingAuthToken(_) => "MissingAuthToken",
            ReconcilerError::UpstreamClientCreationFailure(_) => "UpstreamClientCreationFailure",
            ReconcilerError::UpstreamAuthFailure(_) => "UpstreamAuthFailure",
            ReconcilerError::UpstreamSyncFailure(_) => "UpstreamSyncFailure",
            ReconcilerError::InvalidSecretNames(_) => "InvalidSecretNames",
            ReconcilerError::DuplicateSecretNames(_) => "DuplicateSecretNames",
            ReconcilerError::OwnershipFailure(_) => "OwnershipFailure",
            ReconcilerError::CreationFailure { .. } => "CreationFailure",
            ReconcilerError::PersistFailure { .. } => "PersistFailure",
            ReconcilerError::StatusUpdateFailure(_) => "StatusUpdateFailure",
        }
    }
}

/// Reconciler context shared by every reconciliation
///
/// Holds only immutable configuration and handles; all mutable state lives in
/// Kubernetes objects.
#[derive(Clone)]
pub struct Reconciler {
    pub cluster: Arc<dyn ClusterClient>,
    pub client_factory: Arc<dyn ClientFactory>,
    pub config: Arc<ControllerConfig>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("api_url", &self.config.api_url.as_str())
            .field("identity_url", &self.config.identity_url.as_str())
            .field("state_path", &self.config.state_path)
            .field("refresh_interval_secs", &self.config.refresh_interval_secs)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        client_factory: Arc<dyn ClientFactory>,
        config: Arc<ControllerConfig>,
    ) -> Self {
        Self {
            cluster,
            client_factory,
            config,
        }
    }
}
