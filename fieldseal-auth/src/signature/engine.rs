//! Request signature generation and verification.

use std::sync::Arc;

use crate::config::ProtocolConfig;
use crate::derive::KeyDeriver;
use crate::secret::BaseSecret;

use super::canonical::{build_signing_string, SigningInput};
use super::error::SignatureError;
use super::headers::SignedHeaders;
use super::mac::{decode_signature, mac_base64, verify_mac};

/// Which window's key reproduced a signature.
///
/// Strategies are tried in [`KeyStrategy::ORDER`]; the adjacent windows
/// absorb client/server skew around a window boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyStrategy {
    /// Key for the window containing the request timestamp.
    OwnWindow,
    /// Key for `timestamp - WINDOW_MS`.
    PreviousWindow,
    /// Key for `timestamp + WINDOW_MS`.
    NextWindow,
}

impl KeyStrategy {
    /// Order in which candidate keys are tried.
    pub const ORDER: [Self; 3] = [Self::OwnWindow, Self::PreviousWindow, Self::NextWindow];

    /// Timestamp whose window supplies this strategy's key.
    #[must_use]
    pub fn candidate(self, timestamp: u64, window_ms: u64) -> Option<u64> {
        match self {
            Self::OwnWindow => Some(timestamp),
            Self::PreviousWindow => timestamp.checked_sub(window_ms),
            Self::NextWindow => timestamp.checked_add(window_ms),
        }
    }
}

/// Builds and checks request signatures.
#[derive(Debug, Clone)]
pub struct SignatureEngine {
    deriver: KeyDeriver,
    tolerance_ms: u64,
    context_prefix: String,
}

impl SignatureEngine {
    /// Create an engine from the shared secret and protocol settings.
    #[must_use]
    pub fn new(secret: Arc<BaseSecret>, config: &ProtocolConfig) -> Self {
        Self {
            deriver: KeyDeriver::new(secret, config.window_ms),
            tolerance_ms: config.tolerance_ms,
            context_prefix: config.context_prefix.clone(),
        }
    }

    /// The key deriver used for every signature.
    #[must_use]
    pub fn deriver(&self) -> &KeyDeriver {
        &self.deriver
    }

    /// Accepted distance from server time in milliseconds.
    #[must_use]
    pub fn tolerance_ms(&self) -> u64 {
        self.tolerance_ms
    }

    /// Whether `timestamp` is within tolerance of `now_ms`.
    #[must_use]
    pub fn within_tolerance(&self, timestamp: u64, now_ms: u64) -> bool {
        timestamp.abs_diff(now_ms) <= self.tolerance_ms
    }

    /// The canonical string for `input`.
    #[must_use]
    pub fn signing_string(&self, input: &SigningInput<'_>) -> String {
        build_signing_string(input, &self.context_prefix)
    }

    /// Produce the base64 signature a client would send for `input`.
    #[must_use]
    pub fn sign(&self, input: &SigningInput<'_>) -> String {
        let key = self.deriver.derive_key(input.timestamp, input.device);
        mac_base64(&key, self.signing_string(input).as_bytes())
    }

    /// Produce the full header set for `input`.
    #[must_use]
    pub fn sign_headers(&self, input: &SigningInput<'_>) -> SignedHeaders {
        SignedHeaders {
            timestamp: input.timestamp,
            signature: self.sign(input),
            device: input.device.to_string(),
        }
    }

    /// Verify `signature` over `input` at server time `now_ms`.
    #[must_use = "verification result must be checked"]
    pub fn verify(&self, input: &SigningInput<'_>, signature: &str, now_ms: u64) -> bool {
        self.check(input, signature, now_ms).is_ok()
    }

    /// Verify `signature` and report which key matched.
    ///
    /// The timestamp tolerance is checked before any MAC work. The signing
    /// string is then checked against the key for the timestamp's own window,
    /// and on mismatch against the adjacent windows' keys, each only if that
    /// adjacent timestamp is itself within tolerance.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError::StaleRequest` if the timestamp is out of
    /// tolerance and `SignatureError::InvalidSignature` if no key matches.
    pub fn check(
        &self,
        input: &SigningInput<'_>,
        signature: &str,
        now_ms: u64,
    ) -> Result<KeyStrategy, SignatureError> {
        if !self.within_tolerance(input.timestamp, now_ms) {
            tracing::warn!(
                timestamp = input.timestamp,
                now = now_ms,
                "request timestamp outside tolerance"
            );
            return Err(SignatureError::StaleRequest);
        }

        let Some(supplied) = decode_signature(signature) else {
            tracing::warn!(device = input.device, "request signature is not base64");
            return Err(SignatureError::InvalidSignature);
        };

        let message = self.signing_string(input);
        for strategy in KeyStrategy::ORDER {
            let Some(candidate) = strategy.candidate(input.timestamp, self.deriver.window_ms())
            else {
                continue;
            };
            if strategy != KeyStrategy::OwnWindow && !self.within_tolerance(candidate, now_ms) {
                continue;
            }

            let key = self.deriver.derive_key(candidate, input.device);
            if verify_mac(&key, message.as_bytes(), &supplied) {
                if strategy != KeyStrategy::OwnWindow {
                    tracing::debug!(?strategy, device = input.device, "signature matched adjacent window");
                }
                return Ok(strategy);
            }
        }

        tracing::warn!(
            method = input.method,
            path = input.path,
            device = input.device,
            "request signature mismatch"
        );
        Err(SignatureError::InvalidSignature)
    }
}
