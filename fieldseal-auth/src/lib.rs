//! Request-level authentication and selective field encryption.
//!
//! This crate is intentionally IO-free:
//! - No filesystem operations
//! - No network calls
//! - No database interactions
//!
//! External stores are injected via traits:
//! - [`token::Denylist`] - Revoked session tokens with TTL semantics
//! - [`login::LoginFailureTracker`] - Consecutive login failure accounting
//!
//! Rejections are reported through `tracing` events; installing a subscriber
//! is left to the binary.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use fieldseal_auth::{BaseSecret, ProtocolConfig, RequestGuard, GuardContext};
//!
//! let secret = Arc::new(BaseSecret::from_env()?);
//! let guard = RequestGuard::new(secret, &ProtocolConfig::default());
//!
//! let guarded = guard.process(GuardContext::fresh(), &request, now_ms);
//! match guarded.outcome { /* forward, forward decrypted, or reject */ }
//! ```

pub mod cipher;
pub mod clock;
pub mod config;
pub mod derive;
pub mod guard;
pub mod login;
pub mod secret;
pub mod signature;
pub mod token;

#[cfg(test)]
mod proptests;

pub use cipher::{DecryptionError, EncryptedField};
pub use config::{ConfigError, ProtocolConfig};
pub use derive::{DerivedKey, KeyDeriver, time_window};
pub use guard::{GuardContext, GuardOutcome, Guarded, InboundRequest, Rejection, RequestGuard};
pub use login::{FailureState, InMemoryFailureTracker, LoginFailureTracker};
pub use secret::{BaseSecret, SecretError};
pub use signature::{SignatureEngine, SignatureError, SignedHeaders};
pub use token::{bearer_token, Denylist, InMemoryDenylist, TokenClaims, TokenCodec, TokenError};
