//! Consecutive login failure accounting.
//!
//! The tracker consumes authentication outcomes from the login handler and
//! nothing else in this crate depends on it. After `max_attempts`
//! consecutive failures a subject is locked for the lockout window; a
//! success clears the record.

use std::time::Duration;

use dashmap::DashMap;

/// Default number of consecutive failures before lockout.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default lockout window.
pub const DEFAULT_LOCKOUT: Duration = Duration::from_secs(15 * 60);

/// Failure record of one subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureState {
    /// Consecutive failures since the last success or lockout expiry.
    pub failures: u32,
    /// End of the current lockout, Unix seconds.
    pub locked_until: Option<i64>,
}

impl FailureState {
    /// Whether the subject is locked out at `now`.
    #[must_use]
    pub fn is_locked(&self, now: i64) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    /// Seconds until the lockout ends, zero if not locked.
    #[must_use]
    pub fn retry_after(&self, now: i64) -> u64 {
        self.locked_until
            .and_then(|until| u64::try_from(until.saturating_sub(now)).ok())
            .unwrap_or(0)
    }
}

/// Sink for authentication outcomes.
pub trait LoginFailureTracker: Send + Sync {
    /// Record a failed attempt for `subject` at `now` (Unix seconds).
    fn record_failure(&self, subject: &str, now: i64) -> FailureState;

    /// Record a successful login, clearing the failure record.
    fn record_success(&self, subject: &str);

    /// Current record for `subject` at `now`.
    fn state(&self, subject: &str, now: i64) -> FailureState;
}

/// Process-local tracker backed by a concurrent map.
#[derive(Debug)]
pub struct InMemoryFailureTracker {
    records: DashMap<String, FailureState>,
    max_attempts: u32,
    lockout: Duration,
}

impl Default for InMemoryFailureTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_LOCKOUT)
    }
}

impl InMemoryFailureTracker {
    /// Create a tracker that locks after `max_attempts` failures for `lockout`.
    ///
    /// A `max_attempts` of zero is treated as one.
    #[must_use]
    pub fn new(max_attempts: u32, lockout: Duration) -> Self {
        Self {
            records: DashMap::new(),
            max_attempts: max_attempts.max(1),
            lockout,
        }
    }

    fn lockout_secs(&self) -> i64 {
        i64::try_from(self.lockout.as_secs()).unwrap_or(i64::MAX)
    }
}

impl LoginFailureTracker for InMemoryFailureTracker {
    fn record_failure(&self, subject: &str, now: i64) -> FailureState {
        let mut entry = self.records.entry(subject.to_string()).or_default();
        let state = entry.value_mut();

        if state.is_locked(now) {
            return *state;
        }
        if state.locked_until.is_some() {
            // Previous lockout has ended; start counting again.
            *state = FailureState::default();
        }

        state.failures = state.failures.saturating_add(1);
        if state.failures >= self.max_attempts {
            state.locked_until = Some(now.saturating_add(self.lockout_secs()));
            tracing::warn!(subject, failures = state.failures, "login locked out");
        }
        *state
    }

    fn record_success(&self, subject: &str) {
        self.records.remove(subject);
    }

    fn state(&self, subject: &str, now: i64) -> FailureState {
        match self.records.get(subject) {
            Some(state) if state.locked_until.is_some() && !state.is_locked(now) => {
                FailureState::default()
            }
            Some(state) => *state,
            None => FailureState::default(),
        }
    }
}
