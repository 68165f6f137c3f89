//! Exponential reconnect backoff.
//!
//! Delays double from `base` on every failed attempt and saturate at
//! `max`. There is no jitter, so consecutive waits never decrease.

use std::time::Duration;

/// Reconnect delay state for one stream loop.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
    attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

impl BackoffPolicy {
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempts: 0,
        }
    }

    /// Delay to wait before the next attempt; counts the attempt.
    pub fn next_delay(&mut self) -> Duration {
        let exp = self.attempts.min(31);
        self.attempts = self.attempts.saturating_add(1);
        self.base
            .checked_mul(1u32 << exp)
            .map_or(self.max, |d| d.min(self.max))
    }

    /// Back to `base` after a successful connection.
    pub const fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Consecutive failures since the last reset.
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }
}
