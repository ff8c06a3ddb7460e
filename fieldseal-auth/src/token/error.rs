//! Session token error types.

/// Message returned to callers for every token failure.
pub const PUBLIC_TOKEN_ERROR: &str = "invalid credentials";

/// Errors that can occur while validating a session token.
///
/// Variants are distinct for logging; callers must surface
/// [`TokenError::public_message`] only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TokenError {
    /// The token cannot be decoded or parsed.
    #[error("malformed token")]
    Malformed,

    /// The claims signature does not verify.
    #[error("invalid token signature")]
    SignatureInvalid,

    /// The token is past its expiry.
    #[error("token expired")]
    Expired,

    /// The token is not an access token or has an unknown version.
    #[error("unsupported token type")]
    UnsupportedType,

    /// The token is bound to a different device.
    #[error("device mismatch")]
    DeviceMismatch,

    /// The token was revoked.
    #[error("token revoked")]
    Revoked,
}

impl TokenError {
    /// The message callers may show externally.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        PUBLIC_TOKEN_ERROR
    }
}
