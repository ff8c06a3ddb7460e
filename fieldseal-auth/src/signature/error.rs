//! Request signature error types.

/// Errors that can occur during request signature verification.
///
/// `StaleRequest` and `InvalidSignature` are both reported to the caller as
/// the same unauthorized outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SignatureError {
    /// The timestamp header is not a decimal millisecond value.
    #[error("malformed timestamp")]
    MalformedTimestamp,

    /// The timestamp is outside the accepted distance from server time.
    #[error("stale request")]
    StaleRequest,

    /// No candidate key reproduces the supplied signature.
    #[error("invalid signature")]
    InvalidSignature,
}
