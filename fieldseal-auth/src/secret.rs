//! The process-wide base secret.
//!
//! The secret is loaded once at startup and shared read-only (behind an
//! `Arc`) with every component that derives key material from it:
//! - Zeroized on drop
//! - No `Debug`/`Display` output that leaks the bytes
//! - An empty secret is a startup error, never a per-request one

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Environment variable holding the base secret.
pub const SECRET_ENV: &str = "FIELDSEAL_BASE_SECRET";

/// Errors that can occur while loading the base secret.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SecretError {
    /// The secret is missing from the environment.
    #[error("{0} is not set")]
    Missing(&'static str),

    /// The secret is present but empty.
    #[error("base secret must not be empty")]
    Empty,
}

/// Static server secret (`BASE_SECRET`). Never transmitted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct BaseSecret(Vec<u8>);

impl BaseSecret {
    /// Wrap raw secret bytes.
    ///
    /// # Errors
    ///
    /// Returns `SecretError::Empty` if `bytes` is empty.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, SecretError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(SecretError::Empty);
        }
        Ok(Self(bytes))
    }

    /// Load the secret from `FIELDSEAL_BASE_SECRET`.
    ///
    /// # Errors
    ///
    /// Returns `SecretError::Missing` if the variable is unset and
    /// `SecretError::Empty` if it is blank.
    pub fn from_env() -> Result<Self, SecretError> {
        let value = std::env::var(SECRET_ENV).map_err(|_| SecretError::Missing(SECRET_ENV))?;
        Self::new(value.trim().as_bytes())
    }

    /// Get the raw secret bytes.
    ///
    /// # Security
    ///
    /// The returned reference should not be stored or logged.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for BaseSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BaseSecret([redacted])")
    }
}
