//! Session expiry: a single global idle timeout.
//!
//! Expiry is evaluated on every inbound message and on every sweep.  A
//! session whose last activity is at least `idle_timeout` old is stale;
//! the registry removes it and hands a snapshot to the summarizer.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::registry::SessionRecord;

/// Reason a session was expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiryReason {
    IdleTimeout { idle_secs: i64 },
    /// Removed explicitly through `SessionRegistry::expire`.
    Explicit,
}

impl std::fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdleTimeout { idle_secs } => write!(f, "idle timeout ({idle_secs}s)"),
            Self::Explicit => write!(f, "explicit expire"),
        }
    }
}

/// Evaluates whether a session has been idle for too long.
#[derive(Debug, Clone)]
pub struct LifecycleManager {
    idle_timeout: chrono::Duration,
}

impl LifecycleManager {
    pub fn new(idle_timeout: Duration) -> Self {
        // Out-of-range durations clamp to "never expires".
        let idle_timeout =
            chrono::Duration::from_std(idle_timeout).unwrap_or(chrono::Duration::MAX);
        Self { idle_timeout }
    }

    pub fn idle_timeout(&self) -> chrono::Duration {
        self.idle_timeout
    }

    /// Returns `Some(reason)` when `record` is stale at `now`.
    ///
    /// The boundary is inclusive: idle for exactly the timeout is stale.
    pub fn should_expire(
        &self,
        record: &SessionRecord,
        now: DateTime<Utc>,
    ) -> Option<ExpiryReason> {
        let idle = now.signed_duration_since(record.last_active_at);
        if idle >= self.idle_timeout {
            Some(ExpiryReason::IdleTimeout {
                idle_secs: idle.num_seconds(),
            })
        } else {
            None
        }
    }
}
