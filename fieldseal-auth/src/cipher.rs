//! Field-level symmetric encryption.
//!
//! Individual JSON values are encrypted with AES-256 in CTR mode (128-bit
//! big-endian counter seeded from a 16-byte IV). There is no padding, so
//! ciphertext length equals plaintext length. Ciphertext and IV travel as
//! standard base64 next to each other:
//!
//! ```json
//! { "ciphertext": "<base64>", "iv": "<base64>" }
//! ```
//!
//! The IV must be unique per field for a given key; the encrypting side is
//! responsible for that, the server only consumes it.

use aes::Aes256;
use base64::prelude::*;
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::derive::DerivedKey;

/// IV length for AES-CTR.
pub const IV_LEN: usize = 16;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Errors that can occur while decrypting a field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DecryptionError {
    /// Ciphertext or IV is not valid base64.
    #[error("malformed base64")]
    MalformedEncoding,

    /// The IV does not have the expected length.
    #[error("invalid iv length: expected {IV_LEN}, got {0}")]
    InvalidIv(usize),

    /// The decrypted bytes are not UTF-8 (wrong key or truncated input).
    #[error("decrypted field is not valid utf-8")]
    InvalidPlaintext,
}

/// Wire form of one encrypted field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedField {
    /// Base64 ciphertext.
    pub ciphertext: String,
    /// Base64 IV.
    pub iv: String,
}

fn apply_keystream(key: &DerivedKey, iv: &[u8], data: &mut [u8]) -> Result<(), DecryptionError> {
    let mut cipher = Aes256Ctr::new_from_slices(key.as_bytes(), iv)
        .map_err(|_| DecryptionError::InvalidIv(iv.len()))?;
    cipher.apply_keystream(data);
    Ok(())
}

/// Decrypt one field value.
///
/// # Errors
///
/// Returns `DecryptionError` if either input is not base64, the IV is not
/// 16 bytes, or the plaintext is not UTF-8.
pub fn decrypt_field(
    ciphertext_b64: &str,
    iv_b64: &str,
    key: &DerivedKey,
) -> Result<String, DecryptionError> {
    let mut data = BASE64_STANDARD
        .decode(ciphertext_b64)
        .map_err(|_| DecryptionError::MalformedEncoding)?;
    let iv = BASE64_STANDARD
        .decode(iv_b64)
        .map_err(|_| DecryptionError::MalformedEncoding)?;

    apply_keystream(key, &iv, &mut data)?;

    String::from_utf8(data).map_err(|_| DecryptionError::InvalidPlaintext)
}

/// Encrypt one field value with a caller-chosen IV.
///
/// Mirrors the client so the server side can produce test vectors.
#[must_use]
pub fn encrypt_field_with_iv(plaintext: &str, key: &DerivedKey, iv: &[u8; IV_LEN]) -> EncryptedField {
    let mut data = plaintext.as_bytes().to_vec();
    // A 16-byte IV and 32-byte key are always accepted.
    let mut cipher = Aes256Ctr::new(key.as_bytes().into(), iv.into());
    cipher.apply_keystream(&mut data);

    EncryptedField {
        ciphertext: BASE64_STANDARD.encode(&data),
        iv: BASE64_STANDARD.encode(iv),
    }
}

/// Encrypt one field value under a fresh random IV.
#[must_use]
pub fn encrypt_field(plaintext: &str, key: &DerivedKey) -> EncryptedField {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    encrypt_field_with_iv(plaintext, key, &iv)
}

impl EncryptedField {
    /// Decrypt this field with `key`.
    ///
    /// # Errors
    ///
    /// See [`decrypt_field`].
    pub fn decrypt(&self, key: &DerivedKey) -> Result<String, DecryptionError> {
        decrypt_field(&self.ciphertext, &self.iv, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::KeyDeriver;
    use crate::secret::BaseSecret;
    use std::sync::Arc;

    const T: u64 = 1_700_000_000_000;

    fn key_for(device: &str, timestamp: u64) -> DerivedKey {
        let secret = Arc::new(BaseSecret::new("cipher-test-secret").unwrap());
        KeyDeriver::new(secret, 180_000).derive_key(timestamp, device)
    }

    #[test]
    fn test_encrypt_then_decrypt() {
        let key = key_for("dev-123", T);
        let field = encrypt_field("correct horse battery staple", &key);
        assert_eq!(field.decrypt(&key).unwrap(), "correct horse battery staple");
    }

    #[test]
    fn test_ciphertext_length_equals_plaintext_length() {
        let key = key_for("dev-123", T);
        let field = encrypt_field_with_iv("seventeen bytes!!", &key, &[7u8; IV_LEN]);
        let raw = BASE64_STANDARD.decode(&field.ciphertext).unwrap();
        assert_eq!(raw.len(), "seventeen bytes!!".len());
    }

    #[test]
    fn test_empty_plaintext() {
        let key = key_for("dev-123", T);
        let field = encrypt_field("", &key);
        assert_eq!(field.ciphertext, "");
        assert_eq!(field.decrypt(&key).unwrap(), "");
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let key = key_for("dev-123", T);
        let a = encrypt_field("same", &key);
        let b = encrypt_field("same", &key);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_known_iv_is_deterministic() {
        let key = key_for("dev-123", T);
        let iv = [1u8; IV_LEN];
        assert_eq!(
            encrypt_field_with_iv("pw", &key, &iv),
            encrypt_field_with_iv("pw", &key, &iv)
        );
    }

    #[test]
    fn test_malformed_base64_rejected() {
        let key = key_for("dev-123", T);
        let iv = BASE64_STANDARD.encode([0u8; IV_LEN]);
        assert_eq!(
            decrypt_field("***", &iv, &key),
            Err(DecryptionError::MalformedEncoding)
        );
        assert_eq!(
            decrypt_field("AAAA", "not base64!", &key),
            Err(DecryptionError::MalformedEncoding)
        );
    }

    #[test]
    fn test_truncated_iv_rejected() {
        let key = key_for("dev-123", T);
        let short_iv = BASE64_STANDARD.encode([0u8; 8]);
        assert_eq!(
            decrypt_field("AAAA", &short_iv, &key),
            Err(DecryptionError::InvalidIv(8))
        );
    }

    #[test]
    fn test_wrong_key_does_not_recover_plaintext() {
        let key = key_for("dev-123", T);
        let other = key_for("dev-999", T);
        let field = encrypt_field_with_iv("secret-password", &key, &[9u8; IV_LEN]);
        match field.decrypt(&other) {
            Ok(plaintext) => assert_ne!(plaintext, "secret-password"),
            Err(e) => assert_eq!(e, DecryptionError::InvalidPlaintext),
        }
    }

    #[test]
    fn test_unicode_plaintext() {
        let key = key_for("dev-123", T);
        let field = encrypt_field("pässwörd ✓", &key);
        assert_eq!(field.decrypt(&key).unwrap(), "pässwörd ✓");
    }
}
