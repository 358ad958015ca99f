//! # Controller Configuration
//!
//! Operator settings loaded from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `BW_API_URL` | `https://api.bitwarden.com` |
//! | `BW_IDENTITY_API_URL` | `https://identity.bitwarden.com` |
//! | `BW_SECRETS_MANAGER_STATE_PATH` | `/var/bitwarden/state` |
//! | `BW_SECRETS_MANAGER_REFRESH_INTERVAL` | `300` (seconds, minimum 180) |
//! | `BW_HTTP_TIMEOUT_SECS` | `30` |
//! | `POD_NAMESPACE` | `default` |
//! | `POD_NAME` / `HOSTNAME` | random UUID |

use anyhow::{Context, Result};
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::constants::{
    DEFAULT_API_URL, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_IDENTITY_URL, DEFAULT_POD_NAMESPACE,
    DEFAULT_REFRESH_INTERVAL_SECS, DEFAULT_STATE_PATH, MIN_REFRESH_INTERVAL_SECS,
};

/// Operator-level configuration
///
/// Immutable after startup; shared with every reconciliation.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Bitwarden API base URL
    pub api_url: Url,
    /// Bitwarden identity base URL
    pub identity_url: Url,
    /// Directory holding per-resource session state files
    pub state_path: PathBuf,
    /// Seconds between syncs of one resource
    pub refresh_interval_secs: u64,
    /// Per-request timeout for Bitwarden calls (seconds)
    pub http_timeout_secs: u64,
    /// Namespace the operator runs in (leader lease location)
    pub pod_namespace: String,
    /// Identity used as the lease holder
    pub pod_name: String,
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    ///
    /// # Errors
    /// Fails when `BW_API_URL` or `BW_IDENTITY_API_URL` is not an absolute URL
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// # Errors
    /// Fails when an endpoint URL is not an absolute URL with scheme and host
    pub fn from_source<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = parse_endpoint(
            "BW_API_URL",
            &lookup("BW_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        )?;
        let identity_url = parse_endpoint(
            "BW_IDENTITY_API_URL",
            &lookup("BW_IDENTITY_API_URL").unwrap_or_else(|| DEFAULT_IDENTITY_URL.to_string()),
        )?;

        let state_path = lookup("BW_SECRETS_MANAGER_STATE_PATH")
            .filter(|p| !p.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_STATE_PATH), PathBuf::from);

        let refresh_interval_secs =
            parse_refresh_interval(lookup("BW_SECRETS_MANAGER_REFRESH_INTERVAL").as_deref());

        let http_timeout_secs = lookup("BW_HTTP_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse().ok())
            .filter(|v: &u64| *v > 0)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);

        let pod_namespace =
            lookup("POD_NAMESPACE").unwrap_or_else(|| DEFAULT_POD_NAMESPACE.to_string());
        let pod_name = lookup("POD_NAME")
            .or_else(|| lookup("HOSTNAME"))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(Self {
            api_url,
            identity_url,
            state_path,
            refresh_interval_secs,
            http_timeout_secs,
            pod_namespace,
            pod_name,
        })
    }

    /// Get refresh interval duration
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Get Bitwarden request timeout duration
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Parse an endpoint variable; it must be an absolute URL with scheme and host
///
/// # Errors
/// Returns an error naming the variable when the value is not usable
pub fn parse_endpoint(var: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .with_context(|| format!("{var} must be an absolute URL, got '{raw}'"))?;
    if url.scheme().is_empty() || url.host_str().is_none_or(str::is_empty) {
        anyhow::bail!("{var} must include a scheme and host, got '{raw}'");
    }
    Ok(url)
}

/// Parse `BW_SECRETS_MANAGER_REFRESH_INTERVAL`, falling back to the default with a warning
#[must_use]
pub fn parse_refresh_interval(raw: Option<&str>) -> u64 {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return DEFAULT_REFRESH_INTERVAL_SECS;
    };

    match raw.parse::<u64>() {
        Ok(secs) if secs >= MIN_REFRESH_INTERVAL_SECS => secs,
        Ok(secs) => {
            warn!(
                "BW_SECRETS_MANAGER_REFRESH_INTERVAL={} is below the minimum of {}s, using default {}s",
                secs, MIN_REFRESH_INTERVAL_SECS, DEFAULT_REFRESH_INTERVAL_SECS
            );
            DEFAULT_REFRESH_INTERVAL_SECS
        }
        Err(e) => {
            warn!(
                "BW_SECRETS_MANAGER_REFRESH_INTERVAL='{}' is not an integer ({}), using default {}s",
                raw, e, DEFAULT_REFRESH_INTERVAL_SECS
            );
            DEFAULT_REFRESH_INTERVAL_SECS
        }
    }
}
