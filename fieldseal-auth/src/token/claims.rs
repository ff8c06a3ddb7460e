//! Session token claims.

use serde::{Deserialize, Serialize};

/// The only accepted token type.
pub const ACCESS_TOKEN_TYPE: &str = "access_token";

/// Current claims format version.
pub const TOKEN_VERSION: u8 = 1;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject identity (user name).
    pub sub: String,
    /// Issue time, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
    /// Device fingerprint the token is bound to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Token type marker.
    #[serde(rename = "type")]
    pub token_type: String,
    /// Claims format version.
    pub version: u8,
}

impl TokenClaims {
    /// Claims for a new access token.
    #[must_use]
    pub fn access(subject: &str, device: Option<&str>, issued_at: i64, ttl_secs: i64) -> Self {
        Self {
            sub: subject.to_string(),
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_secs),
            device: device.map(str::to_string),
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            version: TOKEN_VERSION,
        }
    }

    /// Whether the token is expired at `now` (Unix seconds).
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.exp
    }

    /// Seconds of validity left at `now`, zero once expired.
    #[must_use]
    pub fn remaining_secs(&self, now: i64) -> u64 {
        u64::try_from(self.exp.saturating_sub(now)).unwrap_or(0)
    }
}
