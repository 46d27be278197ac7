/// Generic windowed failure counter with lockout.
///
/// One primitive serves both login brute-force protection and password-reset
/// rate limiting; the policy (threshold, window, lockout duration) comes from
/// configuration and the increment itself is a single atomic store operation.
///
/// Counters are keyed by identity, not by user row, so identities that do
/// not exist still accrue failures. That is intentional: unknown emails must
/// behave like known ones to block enumeration.
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::Result;
use crate::models::{AttemptCounter, AttemptScope};
use crate::store::AuthStore;

#[derive(Debug, Clone, Copy)]
pub struct AttemptPolicy {
    /// Failures within the window before the key locks.
    pub max_attempts: u32,
    /// Sliding window; a counter older than this resets to 1 on failure.
    pub window: Duration,
    /// How long the key stays locked once the threshold is reached.
    pub lockout: Duration,
}

/// A counter scope bound to its policy and clock.
#[derive(Clone)]
pub struct AttemptGuard {
    store: Arc<dyn AuthStore>,
    scope: AttemptScope,
    policy: AttemptPolicy,
    clock: Arc<dyn Clock>,
}

impl AttemptGuard {
    pub fn new(
        store: Arc<dyn AuthStore>,
        scope: AttemptScope,
        policy: AttemptPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            scope,
            policy,
            clock,
        }
    }

    /// Remaining lockout for a key, if it is currently locked.
    ///
    /// A lock whose deadline has passed is treated as open again; the stale
    /// row is left for the window-reset rule to recycle on the next failure.
    pub async fn remaining_lock(&self, key: &str) -> Result<Option<Duration>> {
        let Some(counter) = self.store.attempt_counter(self.scope, key).await? else {
            return Ok(None);
        };

        Ok(remaining_lock_at(&counter, self.clock.now()))
    }

    /// Record one failure, atomically applying the window/threshold rules.
    pub async fn record_failure(&self, key: &str) -> Result<AttemptCounter> {
        self.store
            .record_failure(self.scope, key, self.clock.now(), &self.policy)
            .await
    }

    /// A single success wipes all failure history for the key.
    pub async fn clear(&self, key: &str) -> Result<()> {
        self.store.clear_attempts(self.scope, key).await
    }
}

fn remaining_lock_at(counter: &AttemptCounter, now: DateTime<Utc>) -> Option<Duration> {
    match counter.locked_until {
        Some(until) if until > now => Some(until - now),
        _ => None,
    }
}

/// The state transition applied on each failure. Shared by store
/// implementations so every backend agrees on the window semantics.
pub fn apply_failure(
    existing: Option<&AttemptCounter>,
    now: DateTime<Utc>,
    policy: &AttemptPolicy,
) -> AttemptCounter {
    let mut counter = match existing {
        // First failure, or last attempt older than the window: restart.
        None => AttemptCounter {
            attempts: 1,
            last_attempt_at: now,
            locked_until: None,
        },
        Some(prev) if now - prev.last_attempt_at > policy.window => AttemptCounter {
            attempts: 1,
            last_attempt_at: now,
            locked_until: None,
        },
        Some(prev) => AttemptCounter {
            attempts: prev.attempts + 1,
            last_attempt_at: now,
            locked_until: prev.locked_until,
        },
    };

    if counter.attempts >= policy.max_attempts {
        counter.locked_until = Some(now + policy.lockout);
    }

    counter
}
