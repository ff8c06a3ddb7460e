//! Time-window and device scoped key derivation.
//!
//! ```text
//! TimeWindow       = timestamp_ms / WINDOW_MS
//! ObfuscatedSecret = hex(SHA256(secret || hex(SHA256(device[..40 chars]))))
//! DerivedKey       = SHA256(ObfuscatedSecret || "|" || TimeWindow || "|" || device)
//! ```
//!
//! Derivation is a pure function of its inputs and the base secret: nothing
//! is cached, so keys for any window and device can be recomputed on demand
//! by both the signer and the verifier.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::secret::BaseSecret;

/// Size of a derived key in bytes.
pub const DERIVED_KEY_LEN: usize = 32;

/// Number of device fingerprint characters mixed into the obfuscated secret.
const DEVICE_PREFIX_CHARS: usize = 40;

/// Compute the time window a timestamp falls into.
///
/// A zero `window_ms` is rejected by
/// [`ProtocolConfig::validate`](crate::config::ProtocolConfig::validate);
/// here it maps everything to window zero.
#[must_use]
pub fn time_window(timestamp_ms: u64, window_ms: u64) -> u64 {
    timestamp_ms.checked_div(window_ms).unwrap_or(0)
}

/// Per-device transform of the base secret, as lowercase hex.
#[must_use]
pub fn obfuscated_secret(secret: &BaseSecret, device: &str) -> String {
    let prefix: String = device.chars().take(DEVICE_PREFIX_CHARS).collect();
    let device_digest = hex::encode(Sha256::digest(prefix.as_bytes()));

    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(device_digest.as_bytes());
    hex::encode(hasher.finalize())
}

/// Window- and device-scoped key material.
///
/// The raw bytes key AES-256; the lowercase hex form keys HMAC-SHA256.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: [u8; DERIVED_KEY_LEN],
    hex: String,
}

impl DerivedKey {
    fn from_digest(bytes: [u8; DERIVED_KEY_LEN]) -> Self {
        Self {
            hex: hex::encode(bytes),
            bytes,
        }
    }

    /// Raw key bytes (AES-256 key).
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; DERIVED_KEY_LEN] {
        &self.bytes
    }

    /// Lowercase hex encoding of the key (HMAC key material).
    #[must_use]
    pub fn to_hex(&self) -> &str {
        &self.hex
    }
}

impl PartialEq for DerivedKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for DerivedKey {}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey([redacted])")
    }
}

/// Derives keys from the shared base secret.
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    secret: Arc<BaseSecret>,
    window_ms: u64,
}

impl KeyDeriver {
    /// Create a deriver over the given secret and window width.
    #[must_use]
    pub fn new(secret: Arc<BaseSecret>, window_ms: u64) -> Self {
        Self { secret, window_ms }
    }

    /// Window width in milliseconds.
    #[must_use]
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Window index for `timestamp_ms`.
    #[must_use]
    pub fn window(&self, timestamp_ms: u64) -> u64 {
        time_window(timestamp_ms, self.window_ms)
    }

    /// Derive the key for the window containing `timestamp_ms` and `device`.
    #[must_use]
    pub fn derive_key(&self, timestamp_ms: u64, device: &str) -> DerivedKey {
        let obfuscated = obfuscated_secret(&self.secret, device);
        let window = self.window(timestamp_ms);

        let mut hasher = Sha256::new();
        hasher.update(obfuscated.as_bytes());
        hasher.update(b"|");
        hasher.update(window.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(device.as_bytes());
        DerivedKey::from_digest(hasher.finalize().into())
    }
}
