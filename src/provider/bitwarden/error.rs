//! # Errors
//!
//! Errors raised by the native Bitwarden Secrets Manager client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BitwardenError {
    #[error("invalid access token: {0}")]
    InvalidAccessToken(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Bitwarden API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("session state error: {0}")]
    State(String),

    #[error("client is not logged in")]
    NotLoggedIn,

    /// Logging in again after the service rejected a cached session failed
    #[error("re-authentication after a rejected session failed: {0}")]
    Reauthentication(#[source] Box<BitwardenError>),
}

impl BitwardenError {
    /// True when the identity or API service rejected the credentials
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        match self {
            BitwardenError::Api { status, .. } => *status == 400 || *status == 401,
            BitwardenError::Reauthentication(inner) => inner.is_unauthorized(),
            _ => false,
        }
    }

    /// True when a sync failed because logging in again failed
    #[must_use]
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, BitwardenError::Reauthentication(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_reauthentication_is_an_auth_failure() {
        let rejected = BitwardenError::Reauthentication(Box::new(BitwardenError::Api {
            status: 400,
            message: "invalid_client".to_string(),
        }));
        assert!(rejected.is_authentication_failure());
        assert!(rejected.is_unauthorized());
        assert!(rejected.to_string().contains("invalid_client"));

        let unreachable = BitwardenError::Reauthentication(Box::new(BitwardenError::Decode(
            "access token response".to_string(),
        )));
        assert!(unreachable.is_authentication_failure());
        assert!(!unreachable.is_unauthorized());

        let sync_rejected = BitwardenError::Api {
            status: 401,
            message: "expired".to_string(),
        };
        assert!(!sync_rejected.is_authentication_failure());
        assert!(sync_rejected.is_unauthorized());
    }
}
