//! # Provider Modules
//!
//! The secrets-manager client seam.
//!
//! The reconciler never talks HTTP itself. It asks a [`ClientFactory`] for a
//! fresh [`SecretsManagerClient`] per reconciliation, logs in, runs one delta
//! sync and closes the client again. `bitwarden` holds the native
//! implementation; tests substitute in-memory fakes.

use async_trait::async_trait;
use reqwest::Url;
use std::path::Path;

pub mod bitwarden;

pub use bitwarden::{BitwardenClient, BitwardenClientFactory, BitwardenError};

/// One decrypted secret returned by a sync
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteSecret {
    /// Secret UUID
    pub id: String,
    /// Human-readable secret name (the Bitwarden "key" field)
    pub name: String,
    /// Plaintext value
    pub value: String,
}

impl std::fmt::Debug for RemoteSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSecret")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("value", &"***")
            .finish()
    }
}

/// Result of a delta sync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResponse {
    /// Whether anything changed since the supplied timestamp
    pub has_changes: bool,
    /// Full current bundle, in the order the service returned it (empty when unchanged)
    pub secrets: Vec<RemoteSecret>,
}

/// A logged-in (or about to be) secrets-manager session
#[async_trait]
pub trait SecretsManagerClient: Send {
    /// Authenticate with a machine account access token
    ///
    /// `state_file` lets the client persist and reuse its session between
    /// reconciliations.
    async fn access_token_login(
        &mut self,
        access_token: &str,
        state_file: Option<&Path>,
    ) -> Result<(), BitwardenError>;

    /// Fetch the organization's secrets if anything changed since `last_synced`
    ///
    /// `None` requests the full bundle.
    async fn sync(
        &mut self,
        organization_id: &str,
        last_synced: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<SyncResponse, BitwardenError>;

    /// Release the session; called on every exit path
    async fn close(&mut self);
}

/// Creates clients bound to the configured API and identity endpoints
pub trait ClientFactory: Send + Sync {
    /// Create a new, unauthenticated client
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built
    fn create_client(
        &self,
        api_url: &Url,
        identity_url: &Url,
    ) -> Result<Box<dyn SecretsManagerClient>, BitwardenError>;
}
