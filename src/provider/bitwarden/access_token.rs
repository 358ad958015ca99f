//! # Access Token
//!
//! Machine account access tokens have the form
//! `0.<client id>.<client secret>:<base64 16-byte seed>`. The seed never
//! leaves the process; it derives the key that unwraps the login payload and
//! protects the on-disk session state.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::crypto::SymmetricKey;
use super::BitwardenError;

const TOKEN_VERSION: &str = "0";
const KEY_NAME: &[u8] = b"bitwarden-accesstoken";
const KEY_INFO: &[u8] = b"sm-access-token";

pub struct AccessToken {
    pub access_token_id: Uuid,
    pub client_secret: Zeroizing<String>,
    pub encryption_key: SymmetricKey,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token_id", &self.access_token_id)
            .finish_non_exhaustive()
    }
}

impl FromStr for AccessToken {
    type Err = BitwardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (credentials, seed_b64) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| invalid("missing ':' separator"))?;

        let parts: Vec<&str> = credentials.split('.').collect();
        let [version, client_id, client_secret] = parts.as_slice() else {
            return Err(invalid("expected <version>.<client id>.<client secret>"));
        };
        if *version != TOKEN_VERSION {
            return Err(invalid(&format!("unsupported version '{version}'")));
        }
        let access_token_id =
            Uuid::parse_str(client_id).map_err(|e| invalid(&format!("client id: {e}")))?;
        if client_secret.is_empty() {
            return Err(invalid("client secret is empty"));
        }

        let seed = Zeroizing::new(
            STANDARD
                .decode(seed_b64)
                .map_err(|e| invalid(&format!("encryption key: {e}")))?,
        );
        if seed.len() != 16 {
            return Err(invalid(&format!(
                "encryption key must be 16 bytes, got {}",
                seed.len()
            )));
        }

        Ok(Self {
            access_token_id,
            client_secret: Zeroizing::new((*client_secret).to_string()),
            encryption_key: derive_token_key(&seed)?,
        })
    }
}

/// HMAC-SHA256 extract keyed by the key name, then HKDF-SHA256 expand to 64 bytes
fn derive_token_key(seed: &[u8]) -> Result<SymmetricKey, BitwardenError> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(KEY_NAME)
        .map_err(|e| BitwardenError::Crypto(format!("key derivation failed: {e}")))?;
    mac.update(seed);
    let prk = mac.finalize().into_bytes();

    let hkdf = Hkdf::<Sha256>::from_prk(&prk)
        .map_err(|e| BitwardenError::Crypto(format!("key derivation failed: {e}")))?;
    let mut okm = Zeroizing::new([0u8; 64]);
    hkdf.expand(KEY_INFO, okm.as_mut())
        .map_err(|e| BitwardenError::Crypto(format!("key derivation failed: {e}")))?;
    SymmetricKey::from_bytes(okm.as_ref())
}

fn invalid(reason: &str) -> BitwardenError {
    BitwardenError::InvalidAccessToken(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "0.ec2c1d46-6a4b-4751-a310-af9601317f2d.C2IgxjjLF7qSshsbwe8JGcbM075YXw:X8vbvA0bduihIDe/qrzIQQ==";

    #[test]
    fn test_parses_and_derives_key() {
        let token: AccessToken = TOKEN.parse().unwrap();
        assert_eq!(
            token.access_token_id.to_string(),
            "ec2c1d46-6a4b-4751-a310-af9601317f2d"
        );
        assert_eq!(token.client_secret.as_str(), "C2IgxjjLF7qSshsbwe8JGcbM075YXw");
        assert_eq!(
            token.encryption_key.to_base64(),
            "H9/oIRLtL9nGCQOVDjSMoEbJsjWXSOCb3qeyDt6ckzS3FhyboEDWyTP/CQfbIszNmAVg2ExFganG1FVFGXO/Jg=="
        );
    }

    #[test]
    fn test_rejects_malformed_tokens() {
        let cases = vec![
            "",
            "no-separator",
            "1.ec2c1d46-6a4b-4751-a310-af9601317f2d.secret:X8vbvA0bduihIDe/qrzIQQ==",
            "0.not-a-uuid.secret:X8vbvA0bduihIDe/qrzIQQ==",
            "0.ec2c1d46-6a4b-4751-a310-af9601317f2d:X8vbvA0bduihIDe/qrzIQQ==",
            "0.ec2c1d46-6a4b-4751-a310-af9601317f2d.:X8vbvA0bduihIDe/qrzIQQ==",
            "0.ec2c1d46-6a4b-4751-a310-af9601317f2d.secret:AAAA",
            "0.ec2c1d46-6a4b-4751-a310-af9601317f2d.secret:not base64",
        ];
        for token in cases {
            assert!(
                token.parse::<AccessToken>().is_err(),
                "token '{token}' should be rejected"
            );
        }
    }

    #[test]
    fn test_debug_hides_secret() {
        let token: AccessToken = TOKEN.parse().unwrap();
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("C2IgxjjLF7qSshsbwe8JGcbM075YXw"));
    }
}
