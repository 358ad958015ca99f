//! # Sync Fetcher
//!
//! Runs one create → login → sync → close cycle against Bitwarden Secrets
//! Manager and classifies failures for the reconciler.

use crate::controller::reconciler::types::ReconcilerError;
use crate::provider::{ClientFactory, SecretsManagerClient, SyncResponse};
use chrono::{DateTime, Utc};
use reqwest::Url;
use std::path::Path;
use tracing::debug;

/// Where and as whom to sync
#[derive(Debug, Clone, Copy)]
pub struct SyncRequest<'a> {
    pub api_url: &'a Url,
    pub identity_url: &'a Url,
    pub state_file: &'a Path,
    pub organization_id: &'a str,
    pub last_synced: Option<DateTime<Utc>>,
}

/// Fetch the organization's secrets changed since `request.last_synced`
///
/// The client is closed on every path once it has been created.
///
/// # Errors
/// `UpstreamClientCreationFailure`, `UpstreamAuthFailure` or
/// `UpstreamSyncFailure` depending on which step failed
pub async fn fetch_secrets(
    factory: &dyn ClientFactory,
    request: SyncRequest<'_>,
    access_token: &str,
) -> Result<SyncResponse, ReconcilerError> {
    let mut client = factory
        .create_client(request.api_url, request.identity_url)
        .map_err(ReconcilerError::UpstreamClientCreationFailure)?;

    let result = login_and_sync(client.as_mut(), request, access_token).await;
    client.close().await;
    result
}

async fn login_and_sync(
    client: &mut dyn SecretsManagerClient,
    request: SyncRequest<'_>,
    access_token: &str,
) -> Result<SyncResponse, ReconcilerError> {
    client
        .access_token_login(access_token, Some(request.state_file))
        .await
        .map_err(ReconcilerError::UpstreamAuthFailure)?;

    debug!(
        "Syncing organization {} (last synced: {:?})",
        request.organization_id, request.last_synced
    );
    client
        .sync(request.organization_id, request.last_synced)
        .await
        .map_err(|e| {
            if e.is_authentication_failure() {
                ReconcilerError::UpstreamAuthFailure(e)
            } else {
                ReconcilerError::UpstreamSyncFailure(e)
            }
        })
}
