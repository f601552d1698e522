//! Fixed-delay reconnection policy.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before each retry.
    pub delay: Duration,
    /// Consecutive drops tolerated before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: 5,
        }
    }
}

/// What to do after a connection drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule one retry after `delay`.
    Retry {
        /// Attempt number, starting at 1.
        attempt: u32,
        /// Delay before the retry.
        delay: Duration,
    },
    /// Stop retrying.
    GiveUp {
        /// Attempts made.
        attempts: u32,
    },
}

impl ReconnectPolicy {
    /// Delay for the given attempt. The delay is the same for every attempt.
    #[must_use]
    pub const fn delay_for_attempt(&self, _attempt: u32) -> Duration {
        self.delay
    }

    /// Check if we should attempt reconnection.
    #[must_use]
    pub const fn should_reconnect(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Record a drop against `attempts` and decide whether to retry.
    ///
    /// The counter never rises above `max_attempts`.
    pub fn on_drop(&self, attempts: &AtomicU32) -> RetryDecision {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        if self.should_reconnect(attempt) {
            RetryDecision::Retry {
                attempt,
                delay: self.delay_for_attempt(attempt),
            }
        } else {
            attempts.store(self.max_attempts, Ordering::SeqCst);
            RetryDecision::GiveUp {
                attempts: self.max_attempts,
            }
        }
    }
}
