//! Request guard error types.

use http::StatusCode;
use serde::Serialize;

use crate::cipher::DecryptionError;
use crate::signature::SignatureError;

/// Reasons the guard rejects a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum GuardError {
    /// The timestamp header is not a decimal millisecond value.
    #[error("malformed timestamp")]
    MalformedTimestamp,

    /// Stale request or signature mismatch. Which one is kept internal.
    #[error("unauthorized: {0}")]
    Unauthorized(SignatureError),

    /// The `_crypto` block or an encrypted field is structurally invalid.
    #[error("malformed encryption envelope")]
    MalformedEnvelope,

    /// The `_crypto` signature does not match the encrypted fields.
    #[error("envelope signature rejected: {0}")]
    EnvelopeSignature(SignatureError),

    /// A listed field could not be decrypted.
    #[error("decryption failed for field {field:?}: {source}")]
    Decryption {
        field: String,
        #[source]
        source: DecryptionError,
    },
}

impl From<SignatureError> for GuardError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::MalformedTimestamp => Self::MalformedTimestamp,
            other => Self::Unauthorized(other),
        }
    }
}

impl GuardError {
    /// The terminal response for this error.
    #[must_use]
    pub fn rejection(&self) -> Rejection {
        match self {
            Self::MalformedTimestamp => Rejection::new(StatusCode::BAD_REQUEST, "Invalid timestamp"),
            Self::Unauthorized(_) => Rejection::new(StatusCode::UNAUTHORIZED, "Invalid signature"),
            Self::MalformedEnvelope | Self::EnvelopeSignature(_) | Self::Decryption { .. } => {
                Rejection::new(StatusCode::BAD_REQUEST, "Decryption failed")
            }
        }
    }
}

/// A terminal rejection, serialized as `{"error": <message>, "code": <int>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    /// User-visible message.
    #[serde(rename = "error")]
    pub message: String,
    /// HTTP status code.
    pub code: u16,
}

impl Rejection {
    fn new(status: StatusCode, message: &str) -> Self {
        Self {
            message: message.to_string(),
            code: status.as_u16(),
        }
    }

    /// HTTP status of this rejection.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::BAD_REQUEST)
    }

    /// JSON response body.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::json!({ "error": self.message, "code": self.code }).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_timestamp_is_bad_request() {
        let rejection = GuardError::from(SignatureError::MalformedTimestamp).rejection();
        assert_eq!(rejection.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_stale_and_invalid_look_identical() {
        let stale = GuardError::from(SignatureError::StaleRequest).rejection();
        let invalid = GuardError::from(SignatureError::InvalidSignature).rejection();
        assert_eq!(stale, invalid);
        assert_eq!(stale.code, 401);
    }

    #[test]
    fn test_decryption_is_bad_request() {
        let err = GuardError::Decryption {
            field: "password".to_string(),
            source: DecryptionError::MalformedEncoding,
        };
        assert_eq!(err.rejection().code, 400);
        assert_eq!(GuardError::MalformedEnvelope.rejection().code, 400);
    }

    #[test]
    fn test_rejection_json_shape() {
        let body = GuardError::from(SignatureError::InvalidSignature)
            .rejection()
            .to_json();
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["error"], "Invalid signature");
        assert_eq!(parsed["code"], 401);
        assert_eq!(parsed.as_object().unwrap().len(), 2);
    }
}
