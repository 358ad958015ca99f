//! # Request Types
//!
//! Bitwarden identity and Secrets Manager API request structures.

use serde::Serialize;

/// Form body for `POST {identity}/connect/token`
///
/// Machine accounts authenticate with the OAuth2 client credentials grant,
/// scoped to `api.secrets`.
#[derive(Serialize)]
pub struct AccessTokenRequest<'a> {
    pub scope: &'a str,
    pub grant_type: &'a str,
    pub client_id: String,
    pub client_secret: &'a str,
}

impl std::fmt::Debug for AccessTokenRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenRequest")
            .field("scope", &self.scope)
            .field("grant_type", &self.grant_type)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl<'a> AccessTokenRequest<'a> {
    pub fn new(client_id: String, client_secret: &'a str) -> Self {
        Self {
            scope: "api.secrets",
            grant_type: "client_credentials",
            client_id,
            client_secret,
        }
    }
}

/// Query string for `GET /organizations/{org}/secrets/sync`
///
/// `lastSyncedDate` is omitted on the first sync to receive the full bundle.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_date: Option<String>,
}

impl SyncQuery {
    pub fn new(last_synced: Option<chrono::DateTime<chrono::Utc>>) -> Self {
        Self {
            last_synced_date: last_synced
                .map(|t| t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()),
        }
    }
}
