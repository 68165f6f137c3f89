//! Ticker domain types.
//!
//! Defines the canonical `TickerRecord` shape every provider payload is
//! normalized into, the streaming tick that updates it in place, and the
//! transient flash marker consumed by renderers.
//!
//! Exposes two update paths:
//! - `TickerRecord::apply_tick` for raw streamed prices (derives change
//!   from the cached previous close)
//! - `TickerRecord::inherit_flash` for freshly polled records replacing
//!   an older copy of the same symbol

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Minimum movement in `change` that counts as a visible update.
pub const FLASH_EPSILON: f64 = 0.001;

// ────────────────────────────────────────────
// Asset classes
// ────────────────────────────────────────────

/// Independently entitled group of instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    /// US equities (NYSE / NASDAQ).
    Stocks,
    /// Index values (I:SPX, I:NDX, ...).
    Indices,
    /// Crypto pairs (X:BTCUSD, ...). Trades around the clock.
    Crypto,
}

impl AssetClass {
    /// All classes in display order.
    pub const ALL: [Self; 3] = [Self::Stocks, Self::Indices, Self::Crypto];

    /// Dense index for per-class arrays.
    pub const fn index(self) -> usize {
        match self {
            Self::Stocks => 0,
            Self::Indices => 1,
            Self::Crypto => 2,
        }
    }

    /// Lowercase name used in logs, metrics labels, and cache files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stocks => "stocks",
            Self::Indices => "indices",
            Self::Crypto => "crypto",
        }
    }

    /// Symbol used for the one-off entitlement probe.
    pub const fn seed_symbol(self) -> &'static str {
        match self {
            Self::Stocks => "AAPL",
            Self::Indices => "I:SPX",
            Self::Crypto => "X:BTCUSD",
        }
    }

    /// Whether the class follows the equity session calendar.
    pub const fn follows_session(self) -> bool {
        !matches!(self, Self::Crypto)
    }
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────
// Flash marker
// ────────────────────────────────────────────

/// Direction of the last visible move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashDirection {
    Up,
    Down,
}

/// Short-lived highlight hint attached to a record after a visible change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flash {
    /// Monotonic expiry.
    pub until: Instant,
    /// Whether the change moved up or down.
    pub direction: FlashDirection,
}

impl Flash {
    /// Whether the highlight should still be shown at `now`.
    pub fn is_active(&self, now: Instant) -> bool {
        now < self.until
    }
}

// ────────────────────────────────────────────
// Extended hours
// ────────────────────────────────────────────

/// Which extended session a change figure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtendedSession {
    PreMarket,
    AfterHours,
}

/// Change relative to the regular close, reported outside regular hours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtendedChange {
    pub session: ExtendedSession,
    pub change: Option<f64>,
    pub change_pct: Option<f64>,
}

// ────────────────────────────────────────────
// Records
// ────────────────────────────────────────────

/// One row of live instrument data.
///
/// Every numeric field is optional: providers routinely omit fields
/// depending on plan and session, and an absent value must render as
/// "unknown" rather than zero.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TickerRecord {
    /// Symbol, unique within its asset class.
    pub symbol: String,
    pub last: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
    /// Absolute change versus the previous regular close.
    pub change: Option<f64>,
    /// Percent change versus the previous regular close.
    pub change_pct: Option<f64>,
    /// Previous regular-session close, when the provider reported one.
    pub prev_close: Option<f64>,
    /// Pre-market or after-hours move, when reported.
    pub extended: Option<ExtendedChange>,
    /// Transient highlight set by the data layer.
    pub flash: Option<Flash>,
}

/// A single streamed update: latest trade/value plus optional aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamTick {
    pub symbol: String,
    pub price: f64,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
}

/// OHLCV bar returned by the aggregates endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bar {
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    /// Bar start, Unix milliseconds.
    pub timestamp_ms: Option<i64>,
}

impl TickerRecord {
    /// Empty record for `symbol`.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    /// Build a record from the two most recent daily bars.
    ///
    /// The last bar supplies the session values; the one before it
    /// supplies the previous close used for change figures. Returns
    /// `None` when there are no bars at all.
    pub fn from_bars(symbol: &str, bars: &[Bar]) -> Option<Self> {
        let current = bars.last()?;
        let prev_close = bars
            .len()
            .checked_sub(2)
            .and_then(|i| bars[i].close);

        let mut record = Self {
            symbol: symbol.to_string(),
            last: current.close,
            open: current.open,
            high: current.high,
            low: current.low,
            volume: current.volume,
            prev_close,
            ..Self::default()
        };
        record.recompute_change();
        Some(record)
    }

    /// Derive `change` / `change_pct` from `last` and `prev_close`.
    ///
    /// Leaves both untouched when either input is missing or the
    /// previous close is zero.
    pub fn recompute_change(&mut self) {
        if let (Some(last), Some(prev)) = (self.last, self.prev_close) {
            if prev != 0.0 {
                let change = last - prev;
                self.change = Some(change);
                self.change_pct = Some(change / prev * 100.0);
            }
        }
    }

    /// Apply a streamed price.
    ///
    /// Overwrites `last`, recomputes change against `prev_close`, widens
    /// the session range (high only rises, low only falls), and stamps a
    /// flash when the change moved by more than [`FLASH_EPSILON`].
    pub fn apply_tick(
        &mut self,
        tick: &StreamTick,
        prev_close: Option<f64>,
        now: Instant,
        flash_for: Duration,
    ) {
        let old_change = self.change;

        self.last = Some(tick.price);
        if prev_close.is_some() {
            self.prev_close = prev_close;
        }
        self.recompute_change();

        let tick_high = tick.high.unwrap_or(tick.price);
        let tick_low = tick.low.unwrap_or(tick.price);
        self.high = Some(self.high.map_or(tick_high, |h| h.max(tick_high)));
        self.low = Some(self.low.map_or(tick_low, |l| l.min(tick_low)));

        if tick.volume.is_some() {
            self.volume = tick.volume;
        }

        self.stamp_flash(old_change, now, flash_for);
    }

    /// Carry flash state over from the record this one replaces.
    ///
    /// A new flash is stamped when `change` moved by more than
    /// [`FLASH_EPSILON`]; otherwise an unexpired flash from `previous`
    /// is kept so a poll does not cut a streaming highlight short.
    pub fn inherit_flash(&mut self, previous: &Self, now: Instant, flash_for: Duration) {
        self.flash = previous.flash.filter(|f| f.is_active(now));
        self.stamp_flash(previous.change, now, flash_for);
    }

    /// Year-to-date percent move given last year's final close.
    pub fn ytd_pct(&self, year_start_close: Option<f64>) -> Option<f64> {
        let last = self.last?;
        let base = year_start_close.filter(|b| *b != 0.0)?;
        Some((last - base) / base * 100.0)
    }

    fn stamp_flash(&mut self, old_change: Option<f64>, now: Instant, flash_for: Duration) {
        let (Some(old), Some(new)) = (old_change, self.change) else {
            return;
        };
        let delta = new - old;
        if delta.abs() > FLASH_EPSILON {
            self.flash = Some(Flash {
                until: now + flash_for,
                direction: if delta > 0.0 {
                    FlashDirection::Up
                } else {
                    FlashDirection::Down
                },
            });
        }
    }
}
