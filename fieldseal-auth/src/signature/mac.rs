//! HMAC-SHA256 over window-scoped keys.

use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::derive::DerivedKey;

type HmacSha256 = Hmac<Sha256>;

fn keyed(key: &DerivedKey) -> HmacSha256 {
    HmacSha256::new_from_slice(key.to_hex().as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length")
}

/// Compute the base64 MAC of `message` under `key`.
#[must_use]
pub fn mac_base64(key: &DerivedKey, message: &[u8]) -> String {
    let mut mac = keyed(key);
    mac.update(message);
    BASE64_STANDARD.encode(mac.finalize().into_bytes())
}

/// Check `supplied` against the MAC of `message` under `key` in constant time.
#[must_use]
pub fn verify_mac(key: &DerivedKey, message: &[u8], supplied: &[u8]) -> bool {
    let mut mac = keyed(key);
    mac.update(message);
    mac.verify_slice(supplied).is_ok()
}

/// Decode a base64 signature as sent by the client.
///
/// Returns `None` for anything that is not standard base64.
#[must_use]
pub fn decode_signature(signature_b64: &str) -> Option<Vec<u8>> {
    BASE64_STANDARD.decode(signature_b64.trim()).ok()
}
