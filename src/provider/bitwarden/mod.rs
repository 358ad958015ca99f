//! # Bitwarden Secrets Manager Client
//!
//! Native REST implementation of the Secrets Manager machine-account flow.
//! Uses reqwest with rustls and RustCrypto primitives; no Bitwarden SDK.
//!
//! Flow per reconciliation:
//! 1. `POST {identity}/connect/token` with the client credentials grant
//! 2. decrypt `encrypted_payload` with the access-token key to obtain the
//!    organization key
//! 3. `GET {api}/organizations/{org}/secrets/sync` with the bearer token
//! 4. decrypt each secret's `key` (name) and `value` with the organization key
//!
//! Sessions are cached in the state file between steps 1 and 3 of the next
//! reconciliation (see `state`).

mod access_token;
mod crypto;
mod error;
mod requests;
mod responses;
mod state;

pub use access_token::AccessToken;
pub use crypto::{EncString, SymmetricKey};
pub use error::BitwardenError;
pub use requests::*;
pub use responses::*;
pub use state::SessionState;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::constants::BITWARDEN_DEVICE_TYPE;
use crate::observability::metrics;
use crate::provider::{ClientFactory, RemoteSecret, SecretsManagerClient, SyncResponse};

struct Session {
    bearer: Zeroizing<String>,
    organization_key: SymmetricKey,
    from_cache: bool,
}

/// Bitwarden Secrets Manager REST client
pub struct BitwardenClient {
    http_client: Client,
    api_url: Url,
    identity_url: Url,
    access_token: Option<AccessToken>,
    state_file: Option<PathBuf>,
    session: Option<Session>,
}

impl std::fmt::Debug for BitwardenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitwardenClient")
            .field("api_url", &self.api_url.as_str())
            .field("identity_url", &self.identity_url.as_str())
            .field("logged_in", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl BitwardenClient {
    /// Create an unauthenticated client
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(api_url: Url, identity_url: Url, timeout: Duration) -> Result<Self, BitwardenError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bitwarden-sm-operator/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http_client,
            api_url,
            identity_url,
            access_token: None,
            state_file: None,
            session: None,
        })
    }

    /// Join `path` onto a base URL, keeping any path prefix of self-hosted installs
    fn endpoint(base: &Url, path: &str) -> String {
        format!("{}{}", base.as_str().trim_end_matches('/'), path)
    }

    /// Exchange the client credentials for a bearer token and the organization key
    async fn login_remote(&self, token: &AccessToken) -> Result<SessionState, BitwardenError> {
        let url = Self::endpoint(&self.identity_url, "/connect/token");
        debug!(url = %url, client_id = %token.access_token_id, "Requesting access token");

        let started = Instant::now();
        let result = self
            .http_client
            .post(&url)
            .header("Device-Type", BITWARDEN_DEVICE_TYPE)
            .form(&AccessTokenRequest::new(
                token.access_token_id.to_string(),
                token.client_secret.as_str(),
            ))
            .send()
            .await;
        let response = check_response("login", started, result).await?;

        let body: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| BitwardenError::Decode(format!("access token response: {e}")))?;

        let payload = body
            .encrypted_payload
            .parse::<EncString>()?
            .decrypt(&token.encryption_key)?;
        let payload: LoginPayload = serde_json::from_slice(&payload)
            .map_err(|e| BitwardenError::Decode(format!("login payload: {e}")))?;
        // Validate before caching
        SymmetricKey::from_base64(&payload.encryption_key)?;

        Ok(SessionState {
            expires_at: session_expiry(chrono::Utc::now(), body.expires_in)?,
            access_token: body.access_token,
            organization_key: payload.encryption_key,
        })
    }

    async fn login_and_cache(&mut self) -> Result<(), BitwardenError> {
        let token = self.access_token.as_ref().ok_or(BitwardenError::NotLoggedIn)?;
        let state = self.login_remote(token).await?;

        if let Some(path) = &self.state_file {
            if let Err(e) = state::save(path, &token.encryption_key, &state).await {
                warn!(path = %path.display(), error = %e, "Failed to persist session state");
            }
        }

        self.session = Some(Session {
            organization_key: SymmetricKey::from_base64(&state.organization_key)?,
            bearer: Zeroizing::new(state.access_token),
            from_cache: false,
        });
        Ok(())
    }

    async fn request_sync(
        &self,
        organization_id: &str,
        last_synced: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<SecretsSyncResponse, BitwardenError> {
        let session = self.session.as_ref().ok_or(BitwardenError::NotLoggedIn)?;
        let url = Self::endpoint(
            &self.api_url,
            &format!("/organizations/{organization_id}/secrets/sync"),
        );
        debug!(url = %url, since = ?last_synced, "Requesting secrets sync");

        let started = Instant::now();
        let result = self
            .http_client
            .get(&url)
            .bearer_auth(session.bearer.as_str())
            .query(&SyncQuery::new(last_synced))
            .send()
            .await;
        let response = check_response("sync", started, result).await?;

        response
            .json()
            .await
            .map_err(|e| BitwardenError::Decode(format!("sync response: {e}")))
    }

    fn decrypt_secrets(
        &self,
        secrets: Vec<SecretResponse>,
    ) -> Result<Vec<RemoteSecret>, BitwardenError> {
        let session = self.session.as_ref().ok_or(BitwardenError::NotLoggedIn)?;
        secrets
            .into_iter()
            .map(|secret| {
                let name = secret
                    .key
                    .parse::<EncString>()
                    .and_then(|enc| enc.decrypt_to_string(&session.organization_key))
                    .map_err(|e| BitwardenError::Crypto(format!("secret {} name: {e}", secret.id)))?;
                let value = secret
                    .value
                    .parse::<EncString>()
                    .and_then(|enc| enc.decrypt_to_string(&session.organization_key))
                    .map_err(|e| BitwardenError::Crypto(format!("secret {} value: {e}", secret.id)))?;
                Ok(RemoteSecret {
                    id: secret.id,
                    name,
                    value,
                })
            })
            .collect()
    }
}

/// Absolute expiry of a bearer token issued at `now` for `expires_in` seconds
fn session_expiry(
    now: chrono::DateTime<chrono::Utc>,
    expires_in: i64,
) -> Result<chrono::DateTime<chrono::Utc>, BitwardenError> {
    chrono::TimeDelta::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            BitwardenError::Decode(format!("access token lifetime out of range: {expires_in}s"))
        })
}

/// Record metrics and turn non-2xx responses into `BitwardenError::Api`
async fn check_response(
    operation: &str,
    started: Instant,
    result: Result<reqwest::Response, reqwest::Error>,
) -> Result<reqwest::Response, BitwardenError> {
    metrics::observe_upstream_request_duration(operation, started.elapsed().as_secs_f64());

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            metrics::increment_upstream_requests(operation, "error");
            return Err(e.into());
        }
    };

    let status = response.status();
    if status.is_success() {
        metrics::increment_upstream_requests(operation, "success");
        return Ok(response);
    }

    metrics::increment_upstream_requests(operation, "error");
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&text)
        .ok()
        .and_then(|e| e.best_message())
        .unwrap_or(text);
    Err(BitwardenError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl SecretsManagerClient for BitwardenClient {
    async fn access_token_login(
        &mut self,
        access_token: &str,
        state_file: Option<&Path>,
    ) -> Result<(), BitwardenError> {
        let token: AccessToken = access_token.parse()?;
        self.state_file = state_file.map(Path::to_path_buf);

        if let Some(path) = state_file {
            if let Some(cached) = state::load(path, &token.encryption_key).await {
                if cached.is_valid_at(chrono::Utc::now()) {
                    if let Ok(organization_key) = SymmetricKey::from_base64(&cached.organization_key) {
                        debug!(client_id = %token.access_token_id, "Reusing cached session");
                        self.session = Some(Session {
                            bearer: Zeroizing::new(cached.access_token),
                            organization_key,
                            from_cache: true,
                        });
                        self.access_token = Some(token);
                        return Ok(());
                    }
                }
            }
        }

        self.access_token = Some(token);
        self.login_and_cache().await?;
        info!("🔑 Logged in to Bitwarden Secrets Manager");
        Ok(())
    }

    async fn sync(
        &mut self,
        organization_id: &str,
        last_synced: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<SyncResponse, BitwardenError> {
        let response = match self.request_sync(organization_id, last_synced).await {
            Err(e)
                if e.is_unauthorized()
                    && self.session.as_ref().is_some_and(|s| s.from_cache) =>
            {
                // Cached token revoked or rotated server-side
                warn!(error = %e, "Cached session rejected, logging in again");
                self.login_and_cache()
                    .await
                    .map_err(|e| BitwardenError::Reauthentication(Box::new(e)))?;
                self.request_sync(organization_id, last_synced).await?
            }
            other => other?,
        };

        if !response.has_changes {
            return Ok(SyncResponse {
                has_changes: false,
                secrets: Vec::new(),
            });
        }

        let secrets = self.decrypt_secrets(response.secrets.map(|s| s.data).unwrap_or_default())?;
        Ok(SyncResponse {
            has_changes: true,
            secrets,
        })
    }

    async fn close(&mut self) {
        self.session = None;
        self.access_token = None;
        self.state_file = None;
    }
}

/// Factory producing native clients with a shared request timeout
#[derive(Debug, Clone)]
pub struct BitwardenClientFactory {
    timeout: Duration,
}

impl BitwardenClientFactory {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ClientFactory for BitwardenClientFactory {
    fn create_client(
        &self,
        api_url: &Url,
        identity_url: &Url,
    ) -> Result<Box<dyn SecretsManagerClient>, BitwardenError> {
        let client = BitwardenClient::new(api_url.clone(), identity_url.clone(), self.timeout)?;
        Ok(Box::new(client))
    }
}
