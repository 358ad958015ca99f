//! # Session State
//!
//! Login sessions are cached on disk so that a reconciliation inside the
//! token lifetime skips the identity round trip. The file holds one
//! EncString encrypted with the access-token key, so it is only readable by
//! the holder of the same token.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use super::crypto::{EncString, SymmetricKey};
use super::BitwardenError;
use crate::constants::SESSION_EXPIRY_SKEW_SECS;

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    /// Base64 organization key
    pub organization_key: String,
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl SessionState {
    /// Whether the bearer token is still usable at `now`, leaving room for the request itself
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now + chrono::Duration::seconds(SESSION_EXPIRY_SKEW_SECS) < self.expires_at
    }
}

/// Read a cached session, ignoring missing, foreign or corrupt files
pub async fn load(path: &Path, key: &SymmetricKey) -> Option<SessionState> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No session state to reuse");
            return None;
        }
    };

    let decrypted = contents
        .trim()
        .parse::<EncString>()
        .and_then(|enc| enc.decrypt(key));
    let plaintext = match decrypted {
        Ok(plaintext) => plaintext,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Ignoring unreadable session state");
            return None;
        }
    };

    match serde_json::from_slice::<SessionState>(&plaintext) {
        Ok(state) => Some(state),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Ignoring malformed session state");
            None
        }
    }
}

/// Persist a session atomically (temp file + rename, mode 0600 on Unix)
///
/// # Errors
/// Returns an error if the directory or file cannot be written
pub async fn save(path: &Path, key: &SymmetricKey, state: &SessionState) -> Result<(), BitwardenError> {
    let plaintext = Zeroizing::new(
        serde_json::to_vec(state)
            .map_err(|e| BitwardenError::State(format!("failed to encode session: {e}")))?,
    );
    let encrypted = EncString::encrypt(&plaintext, key)?.to_string();

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            BitwardenError::State(format!("failed to create {}: {e}", parent.display()))
        })?;
    }

    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, encrypted.as_bytes())
        .await
        .map_err(|e| BitwardenError::State(format!("failed to write {}: {e}", tmp.display())))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(|e| BitwardenError::State(format!("failed to restrict {}: {e}", tmp.display())))?;
    }

    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| BitwardenError::State(format!("failed to replace {}: {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(expires_in_secs: i64) -> SessionState {
        SessionState {
            access_token: "bearer".to_string(),
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in_secs),
            organization_key: "org-key".to_string(),
        }
    }

    #[tokio::test]
    async fn test_save_then_load_with_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session");
        let key = SymmetricKey::from_bytes(&[3u8; 64]).unwrap();

        save(&path, &key, &state(3600)).await.unwrap();
        let loaded = load(&path, &key).await.unwrap();

        assert_eq!(loaded.access_token, "bearer");
        assert_eq!(loaded.organization_key, "org-key");
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_load_with_other_key_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session");
        let key = SymmetricKey::from_bytes(&[3u8; 64]).unwrap();
        let other = SymmetricKey::from_bytes(&[4u8; 64]).unwrap();

        save(&path, &key, &state(3600)).await.unwrap();
        assert!(load(&path, &other).await.is_none());
    }

    #[tokio::test]
    async fn test_load_garbage_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session");
        tokio::fs::write(&path, "not an encstring").await.unwrap();
        let key = SymmetricKey::from_bytes(&[3u8; 64]).unwrap();
        assert!(load(&path, &key).await.is_none());
    }

    #[test]
    fn test_expiry_skew() {
        let now = Utc::now();
        assert!(state(3600).is_valid_at(now));
        assert!(!state(30).is_valid_at(now));
        assert!(!state(-10).is_valid_at(now));
    }
}
