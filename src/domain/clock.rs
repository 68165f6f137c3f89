//! Wall-clock and monotonic time source.
//!
//! Session boundaries are wall-clock facts while grace deadlines are
//! monotonic; both come from one `Clock` so tests can drive them together.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Time source shared by the session tracker and the economy cache.
pub trait Clock: Send + Sync + 'static {
    /// Current wall-clock time.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Current monotonic instant.
    fn now(&self) -> Instant;
}

/// Real system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for simulations and tests.
///
/// Both readings move together: advancing by one minute moves the
/// wall clock and the monotonic clock by exactly one minute.
#[derive(Debug)]
pub struct ManualClock {
    start_utc: DateTime<Utc>,
    start: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// Start the simulation at `start_utc`.
    pub fn new(start_utc: DateTime<Utc>) -> Self {
        Self {
            start_utc,
            start: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        let offset = *self.offset.lock();
        self.start_utc + chrono::Duration::from_std(offset).unwrap_or(chrono::Duration::zero())
    }

    fn now(&self) -> Instant {
        self.start + *self.offset.lock()
    }
}
