//! AES-256-GCM encryption for the stored Gigya app secret.
//!
//! The secret lives encrypted in `gigya.settings`; the key lives in a file on
//! disk (see `GIGYA_KEY_FILE_LOCATION`). Ciphertext is stored as
//! `base64(nonce):base64(ciphertext)`.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;
use thiserror::Error;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Encryption key for AES-256-GCM.
#[derive(Clone)]
pub struct EncryptionKey {
    key: [u8; KEY_LEN],
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

/// Encryption error types.
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("no decryption key available")]
    MissingKey,

    #[error("invalid key: must be exactly 32 bytes (256 bits)")]
    InvalidKeyLength,

    #[error("invalid base64 encoding: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed: invalid ciphertext or wrong key")]
    DecryptionFailed,

    #[error("invalid ciphertext format")]
    InvalidCiphertextFormat,
}

impl EncryptionKey {
    /// Create a key from raw bytes.
    #[must_use]
    pub const fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Create a key from its base64 encoding, as found in the key file.
    ///
    /// Surrounding whitespace (a trailing newline in the file) is ignored.
    ///
    /// # Errors
    ///
    /// Returns `EncryptionError::Base64` for invalid base64 and
    /// `EncryptionError::InvalidKeyLength` when the key is not 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, EncryptionError> {
        let bytes = BASE64.decode(encoded.trim())?;
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| EncryptionError::InvalidKeyLength)?;
        Ok(Self { key })
    }

    /// Generate a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut key);
        Self { key }
    }

    /// Base64 encoding of the key, suitable for writing to the key file.
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.key)
    }
}

/// Encrypt plaintext with AES-256-GCM.
///
/// # Errors
///
/// Returns `EncryptionError::EncryptionFailed` if the cipher rejects the input.
pub fn encrypt(key: &EncryptionKey, plaintext: &str) -> Result<String, EncryptionError> {
    let cipher =
        Aes256Gcm::new_from_slice(&key.key).map_err(|_| EncryptionError::EncryptionFailed)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| EncryptionError::EncryptionFailed)?;

    Ok(format!(
        "{}:{}",
        BASE64.encode(nonce),
        BASE64.encode(ciphertext)
    ))
}

/// Decrypt a value produced by [`encrypt`].
///
/// # Errors
///
/// Returns `EncryptionError::InvalidCiphertextFormat` for malformed input and
/// `EncryptionError::DecryptionFailed` when the key does not match.
pub fn decrypt(key: &EncryptionKey, encrypted: &str) -> Result<String, EncryptionError> {
    let (nonce_b64, ciphertext_b64) = encrypted
        .trim()
        .split_once(':')
        .ok_or(EncryptionError::InvalidCiphertextFormat)?;

    let nonce_bytes = BASE64.decode(nonce_b64)?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(EncryptionError::InvalidCiphertextFormat);
    }
    let ciphertext = BASE64.decode(ciphertext_b64)?;

    let cipher =
        Aes256Gcm::new_from_slice(&key.key).map_err(|_| EncryptionError::DecryptionFailed)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|_| EncryptionError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| EncryptionError::DecryptionFailed)
}

/// Decrypt with a key that may be absent.
///
/// # Errors
///
/// Returns `EncryptionError::MissingKey` when `key` is `None`, otherwise the
/// errors of [`decrypt`].
pub fn decrypt_with(key: Option<&EncryptionKey>, encrypted: &str) -> Result<String, EncryptionError> {
    decrypt(key.ok_or(EncryptionError::MissingKey)?, encrypted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_key() -> EncryptionKey {
        let mut bytes = [0u8; KEY_LEN];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = u8::try_from(i).unwrap();
        }
        EncryptionKey::new(bytes)
    }

    #[test]
    fn test_encrypt_decrypt() {
        let key = test_key();
        let encrypted = encrypt(&key, "app-secret").unwrap();
        assert_ne!(encrypted, "app-secret");
        assert_eq!(decrypt(&key, &encrypted).unwrap(), "app-secret");
    }

    #[test]
    fn test_fresh_nonce_per_encryption() {
        let key = test_key();
        assert_ne!(encrypt(&key, "same").unwrap(), encrypt(&key, "same").unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = encrypt(&test_key(), "app-secret").unwrap();
        let other = EncryptionKey::generate();
        assert!(matches!(
            decrypt(&other, &encrypted),
            Err(EncryptionError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_malformed_ciphertext() {
        let key = test_key();
        assert!(matches!(
            decrypt(&key, "no-separator"),
            Err(EncryptionError::InvalidCiphertextFormat)
        ));
        assert!(matches!(
            decrypt(&key, "AAAA:AAAA"),
            Err(EncryptionError::InvalidCiphertextFormat)
        ));
    }

    #[test]
    fn test_missing_key() {
        assert!(matches!(
            decrypt_with(None, "a:b"),
            Err(EncryptionError::MissingKey)
        ));
    }

    #[test]
    fn test_key_base64_with_trailing_newline() {
        let key = EncryptionKey::generate();
        let file_contents = format!("{}\n", key.to_base64());
        let parsed = EncryptionKey::from_base64(&file_contents).unwrap();
        let encrypted = encrypt(&key, "x").unwrap();
        assert_eq!(decrypt(&parsed, &encrypted).unwrap(), "x");
    }

    #[test]
    fn test_key_wrong_length() {
        assert!(matches!(
            EncryptionKey::from_base64(&BASE64.encode([0u8; 16])),
            Err(EncryptionError::InvalidKeyLength)
        ));
    }
}
