//! Poll Scheduler - Rate-limited REST Refresh
//!
//! Refreshes one asset class per call, through one batch snapshot when
//! the plan allows it and through sequential per-symbol daily bars
//! otherwise. At most one refresh runs per class; a request arriving
//! while one is in flight is dropped, not queued.
//!
//! Merge policy per channel:
//! - snapshot: full batch replaces the table, partial batch merges
//! - bars (stocks, indices): same as snapshot
//! - bars (crypto): all-or-nothing, an incomplete cycle is dropped

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::domain::clock::Clock;
use crate::domain::ticker::{AssetClass, TickerRecord};
use crate::ports::market_data::{MarketDataProvider, ProviderError, Timespan};
use crate::ports::telemetry::{FeedTelemetry, PollOutcome};

use super::market_state::{MarketState, Stamp};

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Poll pacing parameters.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Bar-mode budget per symbol (5 calls/minute = 12 s).
    pub per_symbol_spacing: Duration,
    /// Floor for the bar-mode cycle spacing.
    pub min_cycle_spacing: Duration,
    /// Pacing between calls inside one bar cycle. Zero disables it.
    pub call_spacing: Duration,
    /// Days of daily bars requested per symbol.
    pub bar_lookback_days: u32,
    /// Cadence multiplier while rate limited.
    pub rate_limit_multiplier: u32,
    /// Upper bound on the degraded cadence.
    pub rate_limit_cap: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            per_symbol_spacing: Duration::from_secs(12),
            min_cycle_spacing: Duration::from_secs(15),
            call_spacing: Duration::from_secs(1),
            bar_lookback_days: 3,
            rate_limit_multiplier: 4,
            rate_limit_cap: Duration::from_secs(120),
        }
    }
}

impl PollConfig {
    /// Minimum time between two bar cycles for `symbols` symbols.
    pub fn bar_cycle_spacing(&self, symbols: usize) -> Duration {
        let per = self
            .per_symbol_spacing
            .saturating_mul(u32::try_from(symbols).unwrap_or(u32::MAX));
        per.max(self.min_cycle_spacing)
    }

    /// Cadence to use given the sticky rate-limit flag.
    pub fn effective_interval(&self, base: Duration, rate_limited: bool) -> Duration {
        if rate_limited {
            base.saturating_mul(self.rate_limit_multiplier)
                .min(self.rate_limit_cap)
                .max(base)
        } else {
            base
        }
    }
}

/// Why a refresh did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    Spacing,
    NoSymbols,
    NotEntitled,
}

/// What one refresh did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Every symbol returned; the table was replaced.
    Full(usize),
    /// Some symbols returned and were merged.
    Partial { received: usize, expected: usize },
    /// Some symbols returned but the channel requires all of them.
    Incomplete { received: usize, expected: usize },
    /// The call succeeded with nothing usable.
    Empty,
    RateLimited,
    Failed(String),
    /// The watchlist changed while the refresh ran.
    Discarded,
    Skipped(SkipReason),
}

impl RefreshOutcome {
    const fn telemetry(&self) -> PollOutcome {
        match self {
            Self::Full(_) => PollOutcome::Full,
            Self::Partial { .. } => PollOutcome::Partial,
            Self::Incomplete { .. } | Self::Empty => PollOutcome::Empty,
            Self::RateLimited => PollOutcome::RateLimited,
            Self::Failed(_) => PollOutcome::Failed,
            Self::Discarded => PollOutcome::Discarded,
            Self::Skipped(_) => PollOutcome::Skipped,
        }
    }
}

/// Last-run bookkeeping for an interval-driven task.
#[derive(Debug, Default, Clone, Copy)]
pub struct Cadence {
    last: Option<Instant>,
}

impl Cadence {
    /// Never run, or `interval` has elapsed since the last run.
    pub fn due(&self, now: Instant, interval: Duration) -> bool {
        self.last
            .is_none_or(|last| now.saturating_duration_since(last) >= interval)
    }

    pub fn mark(&mut self, now: Instant) {
        self.last = Some(now);
    }

    pub const fn has_run(&self) -> bool {
        self.last.is_some()
    }

    /// Forget the last run so the next check is due immediately.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// RAII permit over a per-class in-flight flag.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Result of fetching bars for every symbol in a cycle.
struct BarCycle {
    records: Vec<TickerRecord>,
    newest_bar: Option<i64>,
    rate_limited: bool,
    last_error: Option<ProviderError>,
}

/// Single-flight REST refresher writing into [`MarketState`].
pub struct PollScheduler {
    provider: Arc<dyn MarketDataProvider>,
    state: Arc<MarketState>,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn FeedTelemetry>,
    config: PollConfig,
    in_flight: [AtomicBool; 3],
    /// Start of the last bar cycle per class, tagged with its generation.
    last_bar_cycle: [Mutex<Option<(u64, Instant)>>; 3],
    limiter: Option<Arc<Limiter>>,
}

impl PollScheduler {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        state: Arc<MarketState>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn FeedTelemetry>,
        config: PollConfig,
    ) -> Self {
        let limiter =
            Quota::with_period(config.call_spacing).map(|q| Arc::new(RateLimiter::direct(q)));

        Self {
            provider,
            state,
            clock,
            telemetry,
            config,
            in_flight: Default::default(),
            last_bar_cycle: Default::default(),
            limiter,
        }
    }

    pub const fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Whether a refresh for `class` is running right now.
    pub fn is_in_flight(&self, class: AssetClass) -> bool {
        self.in_flight[class.index()].load(Ordering::Acquire)
    }

    /// Time left before a bar cycle for `class` may start.
    ///
    /// Zero for snapshot-capable classes and for a watchlist that has not
    /// run a bar cycle yet.
    pub fn bar_spacing_remaining(&self, class: AssetClass) -> Duration {
        if self.state.plan().tier(class).has_batch_snapshot() {
            return Duration::ZERO;
        }
        let generation = self.state.generation();
        let spacing = self.config.bar_cycle_spacing(self.state.symbols(class).len());
        let now = self.clock.now();
        match *self.last_bar_cycle[class.index()].lock() {
            Some((cycle_gen, started)) if cycle_gen == generation => {
                spacing.saturating_sub(now.saturating_duration_since(started))
            }
            _ => Duration::ZERO,
        }
    }

    /// Refresh one asset class.
    ///
    /// Never returns an error: failures end up as a stale flag and a
    /// short diagnostic in the shared state.
    #[instrument(skip(self))]
    pub async fn refresh(&self, class: AssetClass) -> RefreshOutcome {
        let outcome = self.run_refresh(class).await;
        self.telemetry.poll_cycle(class, outcome.telemetry());
        match &outcome {
            RefreshOutcome::Skipped(reason) => debug!(?reason, "Refresh skipped"),
            RefreshOutcome::Failed(msg) => warn!(error = %msg, "Refresh failed"),
            RefreshOutcome::RateLimited => warn!("Refresh rate limited"),
            other => debug!(outcome = ?other, "Refresh complete"),
        }
        outcome
    }

    async fn run_refresh(&self, class: AssetClass) -> RefreshOutcome {
        let tier = self.state.plan().tier(class);
        if !tier.is_entitled() {
            return RefreshOutcome::Skipped(SkipReason::NotEntitled);
        }

        let Some(_guard) = InFlightGuard::try_acquire(&self.in_flight[class.index()]) else {
            return RefreshOutcome::Skipped(SkipReason::InFlight);
        };

        let generation = self.state.generation();
        let symbols = self.state.symbols(class);
        if symbols.is_empty() {
            return RefreshOutcome::Skipped(SkipReason::NoSymbols);
        }

        if tier.has_batch_snapshot() {
            self.refresh_snapshot(class, generation, &symbols).await
        } else {
            self.refresh_bars(class, generation, &symbols).await
        }
    }

    async fn refresh_snapshot(
        &self,
        class: AssetClass,
        generation: u64,
        symbols: &[String],
    ) -> RefreshOutcome {
        let records = match self.provider.fetch_batch_snapshot(symbols).await {
            Ok(records) => records,
            Err(e) => return self.fail(class, generation, &e),
        };

        self.clear_rate_limit();
        let wanted: HashSet<&str> = symbols.iter().map(String::as_str).collect();
        let received = records
            .iter()
            .filter(|r| wanted.contains(r.symbol.as_str()))
            .map(|r| r.symbol.as_str())
            .collect::<HashSet<_>>()
            .len();

        self.apply(class, generation, records, received, symbols.len())
    }

    async fn refresh_bars(
        &self,
        class: AssetClass,
        generation: u64,
        symbols: &[String],
    ) -> RefreshOutcome {
        let spacing = self.config.bar_cycle_spacing(symbols.len());
        let now = self.clock.now();
        {
            let mut last = self.last_bar_cycle[class.index()].lock();
            if last.is_some_and(|(g, t)| {
                g == generation && now.saturating_duration_since(t) < spacing
            }) {
                return RefreshOutcome::Skipped(SkipReason::Spacing);
            }
            *last = Some((generation, now));
        }

        let cycle = self.fetch_bar_cycle(symbols).await;
        let received = cycle.records.len();
        let expected = symbols.len();

        if class == AssetClass::Crypto {
            if let Some(date) = cycle.newest_bar.and_then(bar_date) {
                self.state.set_crypto_data_date(generation, date);
            }
        }

        if cycle.rate_limited {
            self.state.set_rate_limited(true);
            self.telemetry.rate_limited(true);
        } else if received > 0 {
            self.clear_rate_limit();
        }

        let crypto_incomplete = class == AssetClass::Crypto && received < expected;
        if received == 0 || crypto_incomplete {
            if cycle.rate_limited {
                return self.fail(class, generation, &ProviderError::RateLimited);
            }
            if let Some(e) = cycle.last_error {
                return self.fail(class, generation, &e);
            }
            if crypto_incomplete && received > 0 {
                info!(received, expected, "Incomplete crypto bar cycle dropped");
                return RefreshOutcome::Incomplete { received, expected };
            }
            return RefreshOutcome::Empty;
        }

        let outcome = self.apply(class, generation, cycle.records, received, expected);
        if cycle.rate_limited && outcome != RefreshOutcome::Discarded {
            self.state
                .mark_failed(class, generation, ProviderError::RateLimited.short_message());
            return RefreshOutcome::RateLimited;
        }
        outcome
    }

    /// Fetch daily bars symbol by symbol, stopping at the first rate limit.
    async fn fetch_bar_cycle(&self, symbols: &[String]) -> BarCycle {
        let to = self.clock.now_utc().date_naive();
        let from = to - chrono::Days::new(u64::from(self.config.bar_lookback_days));

        let mut cycle = BarCycle {
            records: Vec::with_capacity(symbols.len()),
            newest_bar: None,
            rate_limited: false,
            last_error: None,
        };

        for symbol in symbols {
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }
            match self.provider.fetch_bars(symbol, Timespan::Day, from, to).await {
                Ok(bars) => {
                    if let Some(ts) = bars.last().and_then(|b| b.timestamp_ms) {
                        cycle.newest_bar = Some(cycle.newest_bar.map_or(ts, |n| n.max(ts)));
                    }
                    if let Some(record) = TickerRecord::from_bars(symbol, &bars) {
                        cycle.records.push(record);
                    }
                }
                Err(ProviderError::RateLimited) => {
                    cycle.rate_limited = true;
                    break;
                }
                Err(e) => {
                    debug!(symbol = %symbol, error = %e, "Bar fetch failed");
                    cycle.last_error = Some(e);
                }
            }
        }
        cycle
    }

    fn apply(
        &self,
        class: AssetClass,
        generation: u64,
        records: Vec<TickerRecord>,
        received: usize,
        expected: usize,
    ) -> RefreshOutcome {
        if received == 0 {
            return RefreshOutcome::Empty;
        }
        let stamp = Stamp::from_clock(self.clock.as_ref());
        let full = received >= expected;
        let written = if full {
            self.state.replace(class, generation, records, stamp)
        } else {
            self.state.merge(class, generation, records, stamp)
        };

        match (written, full) {
            (false, _) => RefreshOutcome::Discarded,
            (true, true) => RefreshOutcome::Full(received),
            (true, false) => RefreshOutcome::Partial { received, expected },
        }
    }

    fn fail(&self, class: AssetClass, generation: u64, error: &ProviderError) -> RefreshOutcome {
        if !self.state.mark_failed(class, generation, error.short_message()) {
            return RefreshOutcome::Discarded;
        }
        if error.is_rate_limit() {
            self.state.set_rate_limited(true);
            self.telemetry.rate_limited(true);
            RefreshOutcome::RateLimited
        } else {
            RefreshOutcome::Failed(error.short_message())
        }
    }

    fn clear_rate_limit(&self) {
        if self.state.set_rate_limited(false) {
            info!("Rate limit cleared");
            self.telemetry.rate_limited(false);
        }
    }
}

fn bar_date(timestamp_ms: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_cycle_spacing() {
        let cfg = PollConfig::default();
        assert_eq!(cfg.bar_cycle_spacing(1), Duration::from_secs(15));
        assert_eq!(cfg.bar_cycle_spacing(5), Duration::from_secs(60));
    }

    #[test]
    fn test_effective_interval_degrades_and_caps() {
        let cfg = PollConfig::default();
        let base = Duration::from_secs(10);
        assert_eq!(cfg.effective_interval(base, false), base);
        assert_eq!(cfg.effective_interval(base, true), Duration::from_secs(40));
        assert_eq!(
            cfg.effective_interval(Duration::from_secs(60), true),
            Duration::from_secs(120)
        );
        // A base above the cap is never shortened.
        assert_eq!(
            cfg.effective_interval(Duration::from_secs(300), true),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_cadence() {
        let mut cadence = Cadence::default();
        let t0 = Instant::now();
        assert!(cadence.due(t0, Duration::from_secs(10)));
        cadence.mark(t0);
        assert!(!cadence.due(t0 + Duration::from_secs(9), Duration::from_secs(10)));
        assert!(cadence.due(t0 + Duration::from_secs(10), Duration::from_secs(10)));
        cadence.reset();
        assert!(cadence.due(t0, Duration::from_secs(10)));
    }

    #[test]
    fn test_in_flight_guard_releases_on_drop() {
        let flag = AtomicBool::new(false);
        let guard = InFlightGuard::try_acquire(&flag).unwrap();
        assert!(InFlightGuard::try_acquire(&flag).is_none());
        drop(guard);
        assert!(InFlightGuard::try_acquire(&flag).is_some());
    }
}
