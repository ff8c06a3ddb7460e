//! Session token issue, validation and revocation.
//!
//! Wire format of the signed artifact:
//!
//! ```text
//! base64url(claims_json) "." base64url(HMAC-SHA256(secret, DOMAIN_PREFIX || claims_b64))
//! ```
//!
//! The artifact is then wrapped by the outer layer (see `wrap`). Tokens
//! issued before that layer existed are still accepted as plain artifacts.

use std::sync::Arc;
use std::time::Duration;

use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::clock::now_secs;
use crate::config::ProtocolConfig;
use crate::secret::BaseSecret;

use super::claims::{TokenClaims, ACCESS_TOKEN_TYPE, TOKEN_VERSION};
use super::denylist::Denylist;
use super::error::TokenError;
use super::wrap::TokenWrapper;

type HmacSha256 = Hmac<Sha256>;

/// Domain separation prefix for the claims MAC.
const DOMAIN_PREFIX: &[u8] = b"FIELDSEAL-TOKEN-v1:";

/// Separator between the claims and the signature.
const ARTIFACT_SEPARATOR: char = '.';

/// Which form a validated token arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenForm {
    /// Signed artifact inside the outer encryption layer.
    Wrapped,
    /// Bare signed artifact, issued before the outer layer existed.
    Plain,
}

/// Issues and validates opaque bearer tokens.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    secret: Arc<BaseSecret>,
    wrapper: TokenWrapper,
    ttl: Duration,
}

impl TokenCodec {
    /// Create a codec from the shared secret and protocol settings.
    #[must_use]
    pub fn new(secret: Arc<BaseSecret>, config: &ProtocolConfig) -> Self {
        Self {
            wrapper: TokenWrapper::new(&secret),
            secret,
            ttl: config.token_ttl,
        }
    }

    /// Configured token lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `subject` at the current time.
    #[must_use]
    pub fn issue(&self, subject: &str, device: Option<&str>) -> String {
        self.issue_at(subject, device, now_secs())
    }

    /// Issue a token for `subject`, optionally bound to `device`, at `now`
    /// (Unix seconds).
    #[must_use]
    pub fn issue_at(&self, subject: &str, device: Option<&str>, now: i64) -> String {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = TokenClaims::access(subject, device.filter(|d| !d.is_empty()), now, ttl);
        self.wrapper.wrap(&self.sign_claims(&claims))
    }

    /// Build the signed artifact for `claims` without the outer layer.
    #[must_use]
    pub fn sign_claims(&self, claims: &TokenClaims) -> String {
        // Serializing a struct of strings and integers cannot fail.
        let json = serde_json::to_vec(claims).unwrap_or_default();
        let claims_b64 = BASE64_URL_SAFE_NO_PAD.encode(json);
        let mac = self.claims_mac(&claims_b64).finalize().into_bytes();
        format!(
            "{claims_b64}{ARTIFACT_SEPARATOR}{}",
            BASE64_URL_SAFE_NO_PAD.encode(mac)
        )
    }

    /// Validate `token` at the current time.
    ///
    /// # Errors
    ///
    /// See [`validate_at`](Self::validate_at).
    pub fn validate(
        &self,
        token: &str,
        device: Option<&str>,
        denylist: &dyn Denylist,
    ) -> Result<TokenClaims, TokenError> {
        self.validate_at(token, device, denylist, now_secs())
    }

    /// Validate `token` for a caller presenting `device` at `now`.
    ///
    /// Checks, in order: denylist, outer layer (falling back to a plain
    /// artifact), signature, type and version, device binding, expiry. The
    /// device check applies only when both the claim and `device` are present.
    ///
    /// # Errors
    ///
    /// Returns the first failing check as a [`TokenError`]. Callers should
    /// surface only [`TokenError::public_message`].
    pub fn validate_at(
        &self,
        token: &str,
        device: Option<&str>,
        denylist: &dyn Denylist,
        now: i64,
    ) -> Result<TokenClaims, TokenError> {
        let result = self.check(token, device, denylist, now);
        if let Err(err) = &result {
            tracing::warn!(error = %err, "token rejected");
        }
        result
    }

    fn check(
        &self,
        token: &str,
        device: Option<&str>,
        denylist: &dyn Denylist,
        now: i64,
    ) -> Result<TokenClaims, TokenError> {
        if denylist.is_revoked(token) {
            return Err(TokenError::Revoked);
        }

        let (claims, form) = self.open(token)?;
        if form == TokenForm::Plain {
            tracing::debug!(subject = %claims.sub, "accepted token without outer layer");
        }

        if let (Some(bound), Some(presented)) = (claims.device.as_deref(), device) {
            if !presented.is_empty() && bound != presented {
                return Err(TokenError::DeviceMismatch);
            }
        }

        if claims.is_expired(now) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Recover and authenticate the claims of `token`, without device,
    /// expiry or denylist checks.
    ///
    /// # Errors
    ///
    /// Returns `Malformed`, `SignatureInvalid` or `UnsupportedType`.
    pub fn open(&self, token: &str) -> Result<(TokenClaims, TokenForm), TokenError> {
        let token = token.trim();
        let (artifact, form) = match self.wrapper.unwrap(token) {
            Some(artifact) => (artifact, TokenForm::Wrapped),
            None => (token.to_string(), TokenForm::Plain),
        };
        Ok((self.verify_artifact(&artifact)?, form))
    }

    fn verify_artifact(&self, artifact: &str) -> Result<TokenClaims, TokenError> {
        let (claims_b64, mac_b64) = artifact
            .split_once(ARTIFACT_SEPARATOR)
            .ok_or(TokenError::Malformed)?;
        let claims_json = BASE64_URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| TokenError::Malformed)?;
        let supplied = BASE64_URL_SAFE_NO_PAD
            .decode(mac_b64)
            .map_err(|_| TokenError::Malformed)?;

        self.claims_mac(claims_b64)
            .verify_slice(&supplied)
            .map_err(|_| TokenError::SignatureInvalid)?;

        let claims: TokenClaims =
            serde_json::from_slice(&claims_json).map_err(|_| TokenError::Malformed)?;
        if claims.token_type != ACCESS_TOKEN_TYPE || claims.version != TOKEN_VERSION {
            return Err(TokenError::UnsupportedType);
        }
        Ok(claims)
    }

    fn claims_mac(&self, claims_b64: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC-SHA256 accepts keys of any length");
        mac.update(DOMAIN_PREFIX);
        mac.update(claims_b64.as_bytes());
        mac
    }

    /// Revoke `token` at the current time.
    ///
    /// # Errors
    ///
    /// See [`revoke_at`](Self::revoke_at).
    pub fn revoke(&self, token: &str, denylist: &dyn Denylist) -> Result<(), TokenError> {
        self.revoke_at(token, denylist, now_secs())
    }

    /// Add `token` to `denylist` for the rest of its lifetime.
    ///
    /// Revoking an already expired token is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the token does not authenticate.
    pub fn revoke_at(
        &self,
        token: &str,
        denylist: &dyn Denylist,
        now: i64,
    ) -> Result<(), TokenError> {
        let (claims, _) = self.open(token)?;
        let remaining = claims.remaining_secs(now);
        if remaining == 0 {
            return Ok(());
        }
        denylist.revoke(token, &claims.sub, Duration::from_secs(remaining));
        tracing::debug!(subject = %claims.sub, remaining_secs = remaining, "token revoked");
        Ok(())
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value.
#[must_use]
pub fn bearer_token(authorization: &str) -> Option<&str> {
    let (scheme, token) = authorization.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Extract the bearer token from request headers.
#[must_use]
pub fn bearer_from_headers(headers: &http::HeaderMap) -> Option<&str> {
    headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
}
