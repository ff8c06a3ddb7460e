//! Protocol configuration.

use std::time::Duration;

/// Width of one key window in milliseconds (3 minutes).
pub const DEFAULT_WINDOW_MS: u64 = 180_000;

/// Maximum distance between a request timestamp and server time (15 minutes).
pub const DEFAULT_TOLERANCE_MS: u64 = 900_000;

/// Default session token lifetime (24 hours).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors raised while reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    /// A numeric setting must be positive.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Tunable parameters shared by the guard and the token codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Key window width (`WINDOW_MS`).
    pub window_ms: u64,
    /// Accepted clock distance (`TOLERANCE_MS`).
    pub tolerance_ms: u64,
    /// Deployment context prefix stripped from request paths before signing
    /// (e.g. `/api`). Empty means paths are signed as received.
    pub context_prefix: String,
    /// Lifetime of issued session tokens.
    pub token_ttl: Duration,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            tolerance_ms: DEFAULT_TOLERANCE_MS,
            context_prefix: String::new(),
            token_ttl: DEFAULT_TOKEN_TTL,
        }
    }
}

impl ProtocolConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset.
    ///
    /// Recognised variables:
    /// - `FIELDSEAL_WINDOW_MS`
    /// - `FIELDSEAL_TOLERANCE_MS`
    /// - `FIELDSEAL_CONTEXT_PATH`
    /// - `FIELDSEAL_TOKEN_TTL_SECS`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unparsable or zero value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(window) = read_u64("FIELDSEAL_WINDOW_MS")? {
            config.window_ms = window;
        }
        if let Some(tolerance) = read_u64("FIELDSEAL_TOLERANCE_MS")? {
            config.tolerance_ms = tolerance;
        }
        if let Ok(prefix) = std::env::var("FIELDSEAL_CONTEXT_PATH") {
            config.context_prefix = prefix.trim().to_string();
        }
        if let Some(ttl) = read_u64("FIELDSEAL_TOKEN_TTL_SECS")? {
            config.token_ttl = Duration::from_secs(ttl);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that every numeric setting is usable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Zero` naming the first zero setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_ms == 0 {
            return Err(ConfigError::Zero("window_ms"));
        }
        if self.tolerance_ms == 0 {
            return Err(ConfigError::Zero("tolerance_ms"));
        }
        if self.token_ttl.is_zero() {
            return Err(ConfigError::Zero("token_ttl"));
        }
        Ok(())
    }
}

fn read_u64(name: &'static str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(None),
    }
}
