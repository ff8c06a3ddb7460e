//! Outer encryption layer for session tokens.
//!
//! The signed artifact is encrypted with AES-256 in ECB mode with PKCS#7
//! padding under `SHA256(secret || "_aes_key")`, then standard base64 encoded.
//! The key is neither time- nor device-scoped.
//!
//! ECB leaks equal plaintext blocks; it is kept so tokens stay readable by
//! existing clients and servers.

use aes::Aes256;
use base64::prelude::*;
use ecb::cipher::block_padding::Pkcs7;
use ecb::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::secret::BaseSecret;

type Aes256EcbEnc = ecb::Encryptor<Aes256>;
type Aes256EcbDec = ecb::Decryptor<Aes256>;

/// Suffix mixed into the secret to derive the wrapping key.
const WRAP_KEY_SUFFIX: &[u8] = b"_aes_key";

/// Static key for the outer token layer.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct TokenWrapper {
    key: [u8; 32],
}

impl TokenWrapper {
    pub(crate) fn new(secret: &BaseSecret) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hasher.update(WRAP_KEY_SUFFIX);
        Self {
            key: hasher.finalize().into(),
        }
    }

    /// Encrypt a signed artifact into the external token string.
    pub(crate) fn wrap(&self, artifact: &str) -> String {
        let ciphertext = Aes256EcbEnc::new((&self.key).into())
            .encrypt_padded_vec_mut::<Pkcs7>(artifact.as_bytes());
        BASE64_STANDARD.encode(ciphertext)
    }

    /// Reverse [`wrap`](Self::wrap).
    ///
    /// Returns `None` when the input is not base64, not a whole number of
    /// blocks, badly padded, or not UTF-8.
    pub(crate) fn unwrap(&self, token: &str) -> Option<String> {
        let ciphertext = BASE64_STANDARD.decode(token.trim()).ok()?;
        let plaintext = Aes256EcbDec::new((&self.key).into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .ok()?;
        String::from_utf8(plaintext).ok()
    }
}

impl std::fmt::Debug for TokenWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenWrapper([REDACTED])")
    }
}
