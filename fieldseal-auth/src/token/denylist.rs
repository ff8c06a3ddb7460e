//! Revoked token store.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Key prefix of denylist entries.
pub const DENYLIST_PREFIX: &str = "blacklist:";

/// Store key for a revoked token: `blacklist:<token>`.
#[must_use]
pub fn denylist_key(token: &str) -> String {
    format!("{DENYLIST_PREFIX}{token}")
}

/// Key-value store of revoked tokens with TTL semantics.
///
/// Implementations must make `revoke` atomic and visible to every later
/// `is_revoked` call; validation consults the store on every request.
pub trait Denylist: Send + Sync {
    /// Record `token` (issued to `subject`) as revoked for `ttl`.
    fn revoke(&self, token: &str, subject: &str, ttl: Duration);

    /// Whether `token` is currently revoked.
    fn is_revoked(&self, token: &str) -> bool;
}

/// Process-local denylist backed by a concurrent map.
///
/// Expired entries are ignored on lookup and dropped by
/// [`cleanup_expired`](Self::cleanup_expired).
#[derive(Debug, Default)]
pub struct InMemoryDenylist {
    /// `blacklist:<token>` -> (subject, expiry)
    entries: DashMap<String, (String, Instant)>,
}

impl InMemoryDenylist {
    /// Create an empty denylist.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subject recorded for a revoked token, if still live.
    #[must_use]
    pub fn subject(&self, token: &str) -> Option<String> {
        let now = Instant::now();
        self.entries
            .get(&denylist_key(token))
            .filter(|entry| entry.1 > now)
            .map(|entry| entry.0.clone())
    }

    /// Remove expired entries.
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, (_, expires)| *expires > now);
    }

    /// Number of stored entries, expired ones included until cleanup.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Denylist for InMemoryDenylist {
    fn revoke(&self, token: &str, subject: &str, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let expires = Instant::now() + ttl;
        self.entries
            .insert(denylist_key(token), (subject.to_string(), expires));
    }

    fn is_revoked(&self, token: &str) -> bool {
        let key = denylist_key(token);
        let now = Instant::now();
        let live = match self.entries.get(&key) {
            Some(entry) => entry.1 > now,
            None => return false,
        };
        if !live {
            self.entries.remove_if(&key, |_, (_, expires)| *expires <= now);
        }
        live
    }
}
