//! The per-request guard state machine.
//!
//! ```text
//! MethodCheck → ContentTypeCheck → BodyRead → HeaderCheck → SignatureVerify → FieldDecrypt → Forward
//!                                                  │               │                │
//!                                                  └───────────────┴────────────────┴──→ Reject
//! ```
//!
//! Non-mutating methods, non-JSON bodies, empty bodies and unsigned requests
//! are forwarded untouched. Once all three signing headers are present the
//! signature is mandatory.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

use crate::clock::now_millis;
use crate::config::ProtocolConfig;
use crate::secret::BaseSecret;
use crate::signature::{SignatureEngine, SignedHeaders, SigningInput};

use super::envelope::{has_envelope, open_fields};
use super::error::GuardError;
use super::request::{GuardContext, GuardOutcome, Guarded, InboundRequest};

/// States of one guard run. Terminal states carry their result.
#[derive(Debug)]
enum Stage {
    MethodCheck,
    ContentTypeCheck,
    BodyRead,
    HeaderCheck,
    SignatureVerify(SignedHeaders),
    FieldDecrypt(SignedHeaders),
    Forward(Option<Bytes>),
    Reject(GuardError),
}

/// Verifies signed requests and decrypts sealed fields before dispatch.
#[derive(Debug, Clone)]
pub struct RequestGuard {
    engine: SignatureEngine,
}

impl RequestGuard {
    /// Create a guard from the shared secret and protocol settings.
    #[must_use]
    pub fn new(secret: Arc<BaseSecret>, config: &ProtocolConfig) -> Self {
        Self {
            engine: SignatureEngine::new(secret, config),
        }
    }

    /// The signature engine backing this guard.
    #[must_use]
    pub fn engine(&self) -> &SignatureEngine {
        &self.engine
    }

    /// Run the guard at the current system time.
    #[must_use]
    pub fn process_now(&self, context: GuardContext, request: &InboundRequest) -> Guarded {
        self.process(context, request, now_millis())
    }

    /// Run the guard for `request` at server time `now_ms`.
    ///
    /// A context that is already processed short-circuits to pass-through.
    #[must_use]
    pub fn process(&self, context: GuardContext, request: &InboundRequest, now_ms: u64) -> Guarded {
        if context.is_processed() {
            return Guarded {
                outcome: GuardOutcome::PassThrough,
                context,
            };
        }

        let mut stage = Stage::MethodCheck;
        let outcome = loop {
            stage = match stage {
                Stage::Forward(None) => break GuardOutcome::PassThrough,
                Stage::Forward(Some(body)) => break GuardOutcome::Decrypted(body),
                Stage::Reject(err) => {
                    tracing::warn!(
                        method = %request.method,
                        path = %request.path,
                        error = %err,
                        "request rejected"
                    );
                    break GuardOutcome::Rejected(err.rejection());
                }
                other => self.step(other, request, now_ms),
            };
        };

        Guarded {
            outcome,
            context: context.mark_processed(),
        }
    }

    fn step(&self, stage: Stage, request: &InboundRequest, now_ms: u64) -> Stage {
        match stage {
            Stage::MethodCheck if request.is_mutating() => Stage::ContentTypeCheck,
            Stage::ContentTypeCheck if request.is_json() => Stage::BodyRead,
            Stage::BodyRead if !request.body.is_empty() => Stage::HeaderCheck,
            Stage::MethodCheck | Stage::ContentTypeCheck | Stage::BodyRead => Stage::Forward(None),

            Stage::HeaderCheck => match SignedHeaders::from_headers(&request.headers) {
                Ok(Some(signed)) => Stage::SignatureVerify(signed),
                Ok(None) => {
                    tracing::debug!(path = %request.path, "unsigned request passed through");
                    Stage::Forward(None)
                }
                Err(err) => Stage::Reject(err.into()),
            },

            Stage::SignatureVerify(signed) => {
                let input = SigningInput {
                    method: request.method.as_str(),
                    path: &request.path,
                    body: Some(&request.body),
                    timestamp: signed.timestamp,
                    device: &signed.device,
                };
                match self.engine.check(&input, &signed.signature, now_ms) {
                    Ok(_) => Stage::FieldDecrypt(signed),
                    Err(err) => Stage::Reject(err.into()),
                }
            }

            Stage::FieldDecrypt(signed) => self.decrypt_body(&request.body, &signed.device, now_ms),

            terminal @ (Stage::Forward(_) | Stage::Reject(_)) => terminal,
        }
    }

    fn decrypt_body(&self, body: &Bytes, device: &str, now_ms: u64) -> Stage {
        let parsed = match serde_json::from_slice::<Value>(body) {
            Ok(value) if has_envelope(&value) => value,
            _ => return Stage::Forward(None),
        };
        let Value::Object(map) = parsed else {
            return Stage::Forward(None);
        };

        match open_fields(&self.engine, map, device, now_ms) {
            Ok(opened) => match serde_json::to_vec(&Value::Object(opened)) {
                Ok(bytes) => Stage::Forward(Some(Bytes::from(bytes))),
                Err(_) => Stage::Reject(GuardError::MalformedEnvelope),
            },
            Err(err) => Stage::Reject(err),
        }
    }
}
