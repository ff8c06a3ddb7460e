//! Signing metadata carried in request headers.

use http::HeaderMap;

use super::error::SignatureError;

/// Decimal Unix milliseconds at which the client signed.
pub const TIMESTAMP_HEADER: &str = "x-timestamp";

/// Base64 HMAC-SHA256 of the signing string.
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Opaque device fingerprint.
pub const DEVICE_HEADER: &str = "x-device-id";

/// Informational client type; not covered by the signature.
pub const CLIENT_TYPE_HEADER: &str = "x-client-type";

/// The three signing headers of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// Client timestamp in Unix milliseconds.
    pub timestamp: u64,
    /// Base64 signature.
    pub signature: String,
    /// Device fingerprint.
    pub device: String,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl SignedHeaders {
    /// Extract the signing headers.
    ///
    /// Returns `Ok(None)` when any of the three is absent or blank: such a
    /// request is treated as unsigned.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError::MalformedTimestamp` if all three are present
    /// but the timestamp is not a decimal integer.
    pub fn from_headers(headers: &HeaderMap) -> Result<Option<Self>, SignatureError> {
        let (Some(timestamp), Some(signature), Some(device)) = (
            header_str(headers, TIMESTAMP_HEADER),
            header_str(headers, SIGNATURE_HEADER),
            header_str(headers, DEVICE_HEADER),
        ) else {
            return Ok(None);
        };

        let timestamp = timestamp
            .parse::<u64>()
            .map_err(|_| SignatureError::MalformedTimestamp)?;

        Ok(Some(Self {
            timestamp,
            signature: signature.to_string(),
            device: device.to_string(),
        }))
    }

    /// Header name/value pairs as a client would send them.
    #[must_use]
    pub fn to_pairs(&self) -> [(&'static str, String); 3] {
        [
            (TIMESTAMP_HEADER, self.timestamp.to_string()),
            (SIGNATURE_HEADER, self.signature.clone()),
            (DEVICE_HEADER, self.device.clone()),
        ]
    }
}

/// Read the device fingerprint header on its own (used for token binding).
#[must_use]
pub fn device_from_headers(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, DEVICE_HEADER)
}
