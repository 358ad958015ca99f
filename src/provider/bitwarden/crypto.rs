//! # Crypto
//!
//! Symmetric keys and type-2 `EncString`s (AES-256-CBC with PKCS7 padding,
//! authenticated by HMAC-SHA256 over `iv || ciphertext`).
//!
//! Wire form: `2.<base64 iv>|<base64 ciphertext>|<base64 mac>`.

use std::fmt;
use std::str::FromStr;

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::BitwardenError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

const ENC_TYPE_AES_CBC_256_HMAC_SHA256: &str = "2";

/// 64-byte key: 32 bytes AES key followed by 32 bytes MAC key
#[derive(Clone)]
pub struct SymmetricKey {
    enc_key: Zeroizing<[u8; 32]>,
    mac_key: Zeroizing<[u8; 32]>,
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(***)")
    }
}

impl SymmetricKey {
    /// Build a key from its 64-byte raw form
    ///
    /// # Errors
    /// Returns an error unless exactly 64 bytes are supplied
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BitwardenError> {
        if bytes.len() != 64 {
            return Err(BitwardenError::Crypto(format!(
                "symmetric key must be 64 bytes, got {}",
                bytes.len()
            )));
        }
        let mut enc_key = Zeroizing::new([0u8; 32]);
        let mut mac_key = Zeroizing::new([0u8; 32]);
        enc_key.copy_from_slice(&bytes[..32]);
        mac_key.copy_from_slice(&bytes[32..]);
        Ok(Self { enc_key, mac_key })
    }

    /// Decode a base64 encoded 64-byte key
    ///
    /// # Errors
    /// Returns an error on invalid base64 or wrong length
    pub fn from_base64(encoded: &str) -> Result<Self, BitwardenError> {
        let bytes = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| BitwardenError::Crypto(format!("invalid key encoding: {e}")))?,
        );
        Self::from_bytes(&bytes)
    }

    #[must_use]
    pub fn to_base64(&self) -> String {
        let mut bytes = Zeroizing::new(Vec::with_capacity(64));
        bytes.extend_from_slice(self.enc_key.as_ref());
        bytes.extend_from_slice(self.mac_key.as_ref());
        STANDARD.encode(bytes.as_slice())
    }
}

/// Encrypted string in Bitwarden's type-2 format
#[derive(Clone, PartialEq, Eq)]
pub struct EncString {
    iv: [u8; 16],
    data: Vec<u8>,
    mac: [u8; 32],
}

impl fmt::Debug for EncString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncString")
            .field("len", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl FromStr for EncString {
    type Err = BitwardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (enc_type, rest) = s
            .split_once('.')
            .ok_or_else(|| BitwardenError::Crypto("EncString is missing its type".to_string()))?;
        if enc_type != ENC_TYPE_AES_CBC_256_HMAC_SHA256 {
            return Err(BitwardenError::Crypto(format!(
                "unsupported EncString type {enc_type}"
            )));
        }

        let parts: Vec<&str> = rest.split('|').collect();
        let [iv, data, mac] = parts.as_slice() else {
            return Err(BitwardenError::Crypto(format!(
                "EncString must have 3 parts, got {}",
                parts.len()
            )));
        };

        Ok(Self {
            iv: decode_fixed::<16>(iv, "iv")?,
            data: decode_part(data, "data")?,
            mac: decode_fixed::<32>(mac, "mac")?,
        })
    }
}

impl fmt::Display for EncString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}|{}|{}",
            ENC_TYPE_AES_CBC_256_HMAC_SHA256,
            STANDARD.encode(self.iv),
            STANDARD.encode(&self.data),
            STANDARD.encode(self.mac)
        )
    }
}

impl EncString {
    /// Encrypt `plaintext` under `key` with a random IV
    ///
    /// # Errors
    /// Returns an error if the cipher cannot be initialized
    pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> Result<Self, BitwardenError> {
        let iv: [u8; 16] = rand::random();
        Self::encrypt_with_iv(plaintext, key, iv)
    }

    pub(crate) fn encrypt_with_iv(
        plaintext: &[u8],
        key: &SymmetricKey,
        iv: [u8; 16],
    ) -> Result<Self, BitwardenError> {
        let data = Aes256CbcEnc::new_from_slices(key.enc_key.as_ref(), &iv)
            .map_err(|e| BitwardenError::Crypto(format!("cipher init failed: {e}")))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        let mac = compute_mac(key, &iv, &data)?;
        Ok(Self { iv, data, mac })
    }

    /// Verify the MAC and decrypt
    ///
    /// # Errors
    /// Returns an error on MAC mismatch or invalid padding
    pub fn decrypt(&self, key: &SymmetricKey) -> Result<Zeroizing<Vec<u8>>, BitwardenError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(key.mac_key.as_ref())
            .map_err(|e| BitwardenError::Crypto(format!("mac init failed: {e}")))?;
        mac.update(&self.iv);
        mac.update(&self.data);
        mac.verify_slice(&self.mac)
            .map_err(|e| BitwardenError::Crypto(format!("MAC verification failed: {e}")))?;

        let plaintext = Aes256CbcDec::new_from_slices(key.enc_key.as_ref(), &self.iv)
            .map_err(|e| BitwardenError::Crypto(format!("cipher init failed: {e}")))?
            .decrypt_padded_vec_mut::<Pkcs7>(&self.data)
            .map_err(|e| BitwardenError::Crypto(format!("decryption failed: {e}")))?;
        Ok(Zeroizing::new(plaintext))
    }

    /// Decrypt into a UTF-8 string
    ///
    /// # Errors
    /// Returns an error if decryption fails or the plaintext is not UTF-8
    pub fn decrypt_to_string(&self, key: &SymmetricKey) -> Result<String, BitwardenError> {
        let bytes = self.decrypt(key)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| BitwardenError::Crypto(format!("plaintext is not UTF-8: {e}")))
    }
}

fn compute_mac(key: &SymmetricKey, iv: &[u8], data: &[u8]) -> Result<[u8; 32], BitwardenError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.mac_key.as_ref())
        .map_err(|e| BitwardenError::Crypto(format!("mac init failed: {e}")))?;
    mac.update(iv);
    mac.update(data);
    let digest = mac.finalize().into_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Ok(out)
}

fn decode_part(part: &str, what: &str) -> Result<Vec<u8>, BitwardenError> {
    STANDARD
        .decode(part)
        .map_err(|e| BitwardenError::Crypto(format!("invalid EncString {what}: {e}")))
}

fn decode_fixed<const N: usize>(part: &str, what: &str) -> Result<[u8; N], BitwardenError> {
    let bytes = decode_part(part, what)?;
    bytes.as_slice().try_into().map_err(|_| {
        BitwardenError::Crypto(format!(
            "EncString {what} must be {N} bytes, got {}",
            bytes.len()
        ))
    })
}
