//! The `_crypto` body envelope for field-level encryption.
//!
//! A sealed body keeps its plaintext fields as-is, replaces each sensitive
//! field with an [`EncryptedField`], and adds a metadata block:
//!
//! ```json
//! {
//!   "username": "alice",
//!   "password": { "ciphertext": "...", "iv": "..." },
//!   "_crypto": {
//!     "encrypted": true,
//!     "fields": ["password"],
//!     "timestamp": 1700000000000,
//!     "signature": "..."
//!   }
//! }
//! ```
//!
//! The envelope signature is an HMAC under the key for `_crypto.timestamp`
//! over `entries | timestamp | device`, where `entries` joins
//! `name:ciphertext:iv` with `,` for every listed field present in the body.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cipher::{encrypt_field, EncryptedField};
use crate::signature::{decode_signature, mac_base64, verify_mac, SignatureEngine, SignatureError, DELIMITER};

use super::error::GuardError;

/// Top-level key of the metadata block.
pub const CRYPTO_KEY: &str = "_crypto";

/// Contents of the `_crypto` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoMeta {
    /// Whether `fields` are encrypted.
    pub encrypted: bool,
    /// Names of the encrypted fields.
    #[serde(default)]
    pub fields: Vec<String>,
    /// Unix milliseconds whose window key encrypted the fields.
    pub timestamp: u64,
    /// Base64 envelope signature.
    #[serde(default)]
    pub signature: String,
}

/// Collect the encrypted fields named in `meta` that are present in `body`.
///
/// Absent fields are skipped; present fields that are not
/// `{ciphertext, iv}` objects make the envelope malformed.
fn present_fields(
    body: &Map<String, Value>,
    meta: &CryptoMeta,
) -> Result<Vec<(String, EncryptedField)>, GuardError> {
    meta.fields
        .iter()
        .filter_map(|name| body.get(name).map(|value| (name, value)))
        .map(|(name, value)| {
            serde_json::from_value::<EncryptedField>(value.clone())
                .map(|field| (name.clone(), field))
                .map_err(|_| GuardError::MalformedEnvelope)
        })
        .collect()
}

/// Build the string the envelope signature covers.
#[must_use]
pub fn envelope_signing_string(
    fields: &[(String, EncryptedField)],
    timestamp: u64,
    device: &str,
) -> String {
    let entries: Vec<String> = fields
        .iter()
        .map(|(name, field)| format!("{name}:{}:{}", field.ciphertext, field.iv))
        .collect();
    format!(
        "{entries}{DELIMITER}{timestamp}{DELIMITER}{device}",
        entries = entries.join(",")
    )
}

/// Whether a parsed body carries a `_crypto` block.
#[must_use]
pub fn has_envelope(body: &Value) -> bool {
    body.as_object().is_some_and(|map| map.contains_key(CRYPTO_KEY))
}

/// Encrypt `fields` of a JSON object body and attach the `_crypto` block.
///
/// This is the client-side half of the protocol. Listed fields missing from
/// the body are skipped; non-string values are encrypted as their JSON text.
///
/// # Errors
///
/// Returns `GuardError::MalformedEnvelope` if `body` is not a JSON object.
pub fn seal_fields(
    engine: &SignatureEngine,
    body: Value,
    fields: &[&str],
    timestamp: u64,
    device: &str,
) -> Result<Value, GuardError> {
    let Value::Object(mut map) = body else {
        return Err(GuardError::MalformedEnvelope);
    };

    let key = engine.deriver().derive_key(timestamp, device);
    let mut sealed = Vec::with_capacity(fields.len());
    for name in fields {
        let Some(value) = map.get(*name) else {
            continue;
        };
        let plaintext = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let field = encrypt_field(&plaintext, &key);
        map.insert((*name).to_string(), serde_json::json!(field));
        sealed.push(((*name).to_string(), field));
    }

    let signature = mac_base64(
        &key,
        envelope_signing_string(&sealed, timestamp, device).as_bytes(),
    );
    let meta = CryptoMeta {
        encrypted: true,
        fields: fields.iter().map(|f| (*f).to_string()).collect(),
        timestamp,
        signature,
    };
    map.insert(CRYPTO_KEY.to_string(), serde_json::json!(meta));
    Ok(Value::Object(map))
}

/// Verify and decrypt a sealed JSON object body.
///
/// On success the returned object has `_crypto` removed and every present
/// listed field replaced with its plaintext string. Any failure rejects the
/// whole body; nothing is partially decrypted.
///
/// # Errors
///
/// - `GuardError::MalformedEnvelope` if `_crypto` or a listed field has the
///   wrong shape
/// - `GuardError::EnvelopeSignature` if `_crypto.timestamp` is out of
///   tolerance or the envelope signature does not match
/// - `GuardError::Decryption` if a field does not decrypt
pub fn open_fields(
    engine: &SignatureEngine,
    mut body: Map<String, Value>,
    device: &str,
    now_ms: u64,
) -> Result<Map<String, Value>, GuardError> {
    let meta_value = body.remove(CRYPTO_KEY).ok_or(GuardError::MalformedEnvelope)?;
    let meta: CryptoMeta =
        serde_json::from_value(meta_value).map_err(|_| GuardError::MalformedEnvelope)?;

    if !meta.encrypted {
        return Ok(body);
    }

    if !engine.within_tolerance(meta.timestamp, now_ms) {
        return Err(GuardError::EnvelopeSignature(SignatureError::StaleRequest));
    }

    let fields = present_fields(&body, &meta)?;
    let key = engine.deriver().derive_key(meta.timestamp, device);

    let supplied = decode_signature(&meta.signature)
        .ok_or(GuardError::EnvelopeSignature(SignatureError::InvalidSignature))?;
    let message = envelope_signing_string(&fields, meta.timestamp, device);
    if !verify_mac(&key, message.as_bytes(), &supplied) {
        return Err(GuardError::EnvelopeSignature(SignatureError::InvalidSignature));
    }

    for (name, field) in fields {
        let plaintext = field
            .decrypt(&key)
            .map_err(|source| GuardError::Decryption {
                field: name.clone(),
                source,
            })?;
        body.insert(name, Value::String(plaintext));
    }

    Ok(body)
}
