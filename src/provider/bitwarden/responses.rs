//! # Response Types
//!
//! Bitwarden identity and Secrets Manager API response structures.
//! Encrypted fields stay as their wire strings here; `BitwardenClient`
//! decrypts them.

use serde::Deserialize;

/// Response of `POST {identity}/connect/token`
#[derive(Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
    /// EncString wrapping `{"encryptionKey": "<base64 organization key>"}`
    pub encrypted_payload: String,
}

impl std::fmt::Debug for AccessTokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenResponse")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

/// Decrypted `encrypted_payload`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    pub encryption_key: String,
}

/// Response of `GET /organizations/{org}/secrets/sync`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretsSyncResponse {
    pub has_changes: bool,
    /// Absent or null when nothing changed
    #[serde(default)]
    pub secrets: Option<SecretsList>,
}

#[derive(Debug, Deserialize)]
pub struct SecretsList {
    #[serde(default)]
    pub data: Vec<SecretResponse>,
}

/// One secret as returned by the API, key and value still encrypted
///
/// Only the fields the operator writes are decoded; notes, projects and dates
/// are ignored.
#[derive(Debug, Deserialize)]
pub struct SecretResponse {
    pub id: String,
    pub key: String,
    pub value: String,
}

/// Error body returned by identity (`error`/`error_description`) or the API (`message`)
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorResponse {
    /// Best human-readable message, if any field was present
    #[must_use]
    pub fn best_message(&self) -> Option<String> {
        self.message
            .clone()
            .or_else(|| self.error_description.clone())
            .or_else(|| self.error.clone())
    }
}
