//! Shared Market State - Concurrent Ticker Store
//!
//! The single mutable store read by renderers and written by the poll
//! scheduler and the stream manager. One `parking_lot::RwLock` guards
//! each asset-class table; critical sections only copy or update
//! records and never span I/O.
//!
//! Every write carries the watchlist generation captured when the work
//! started. The generation only changes while all three table locks
//! are held for writing, so a write that checks it under its table lock
//! can never land in a table that belongs to a newer watchlist.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::{RwLock, RwLockWriteGuard};
use tracing::{debug, info};

use crate::domain::capability::PlanCapability;
use crate::domain::clock::Clock;
use crate::domain::economy::EconomySnapshot;
use crate::domain::session::SessionState;
use crate::domain::ticker::{AssetClass, StreamTick, TickerRecord};
use crate::domain::watchlist::Watchlist;
use crate::ports::market_data::TickerDetails;
use crate::ports::renderer::{ClassStatus, DashboardView};

/// Wall-clock and monotonic time of one write.
#[derive(Debug, Clone, Copy)]
pub struct Stamp {
    pub at: DateTime<Utc>,
    pub now: Instant,
}

impl Stamp {
    pub fn from_clock(clock: &dyn Clock) -> Self {
        Self {
            at: clock.now_utc(),
            now: clock.now(),
        }
    }
}

/// Result of applying one streamed tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Applied,
    /// Symbol has no record in the table.
    Unknown,
    /// Tick belongs to a previous watchlist.
    Superseded,
}

#[derive(Debug, Default)]
struct Table {
    symbols: Vec<String>,
    records: Vec<TickerRecord>,
    prev_closes: HashMap<String, f64>,
    year_start_closes: HashMap<String, f64>,
    details: HashMap<String, TickerDetails>,
    data_date: Option<NaiveDate>,
    status: ClassStatus,
}

impl Table {
    fn reset(&mut self, symbols: &[String]) {
        *self = Self {
            symbols: symbols.to_vec(),
            ..Self::default()
        };
    }

    fn position(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    fn cache_prev_close(&mut self, record: &TickerRecord) {
        if let Some(prev) = record.prev_close {
            self.prev_closes.insert(record.symbol.clone(), prev);
        }
    }

    fn mark_fresh(&mut self, at: DateTime<Utc>) {
        self.status = ClassStatus {
            last_updated: Some(at),
            stale: false,
            error: None,
        };
    }
}

#[derive(Debug, Clone, Copy)]
struct SessionFlags {
    session: SessionState,
    market_open: bool,
    extended_hours: bool,
}

#[derive(Debug, Default)]
struct WatchlistMeta {
    name: String,
    treasury_keys: Vec<String>,
    economy_keys: Vec<String>,
}

/// Concurrent market data store shared through `Arc<MarketState>`.
#[derive(Debug)]
pub struct MarketState {
    tables: [RwLock<Table>; 3],
    generation: AtomicU64,
    meta: RwLock<WatchlistMeta>,
    rate_limited: AtomicBool,
    connected: AtomicU8,
    plan: RwLock<PlanCapability>,
    session: RwLock<SessionFlags>,
    economy: RwLock<Option<EconomySnapshot>>,
    economy_error: RwLock<Option<String>>,
    indices_groups: RwLock<BTreeMap<String, String>>,
    flash_for: Duration,
}

impl MarketState {
    /// Empty store; `flash_for` is how long change highlights last.
    pub fn new(flash_for: Duration) -> Self {
        Self {
            tables: Default::default(),
            generation: AtomicU64::new(0),
            meta: RwLock::new(WatchlistMeta::default()),
            rate_limited: AtomicBool::new(false),
            connected: AtomicU8::new(0),
            plan: RwLock::new(PlanCapability::default()),
            session: RwLock::new(SessionFlags {
                session: SessionState::Closed,
                market_open: false,
                extended_hours: false,
            }),
            economy: RwLock::new(None),
            economy_error: RwLock::new(None),
            indices_groups: RwLock::new(BTreeMap::new()),
            flash_for,
        }
    }

    fn table(&self, class: AssetClass) -> &RwLock<Table> {
        &self.tables[class.index()]
    }

    /// Write lock on `class` if `generation` is still current.
    fn current_table(&self, class: AssetClass, generation: u64) -> Option<RwLockWriteGuard<'_, Table>> {
        let table = self.table(class).write();
        (self.generation.load(Ordering::Acquire) == generation).then_some(table)
    }

    // ── Watchlist lifecycle ────────────────────────────────

    /// Install a new watchlist and return its generation.
    ///
    /// Purges every table and per-symbol cache. Results from work that
    /// started under an older generation are rejected from here on.
    pub fn activate_watchlist(&self, watchlist: &Watchlist) -> u64 {
        let mut guards: Vec<_> = self.tables.iter().map(RwLock::write).collect();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        for (class, table) in AssetClass::ALL.into_iter().zip(guards.iter_mut()) {
            table.reset(watchlist.symbols(class));
        }
        drop(guards);

        *self.meta.write() = WatchlistMeta {
            name: watchlist.name.clone(),
            treasury_keys: watchlist.treasury.clone(),
            economy_keys: watchlist.economy.clone(),
        };

        info!(
            watchlist = %watchlist.name,
            generation,
            tickers = watchlist.ticker_count(),
            "Watchlist activated"
        );
        generation
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Watchlist symbols for `class`.
    pub fn symbols(&self, class: AssetClass) -> Vec<String> {
        self.table(class).read().symbols.clone()
    }

    // ── Table writes ───────────────────────────────────────

    /// Replace the whole record set for `class`.
    ///
    /// Records for symbols outside the watchlist are dropped and the rest
    /// are stored in watchlist order. Flash state carries over from the
    /// records being replaced. Returns `false` if the generation moved on.
    pub fn replace(
        &self,
        class: AssetClass,
        generation: u64,
        records: Vec<TickerRecord>,
        stamp: Stamp,
    ) -> bool {
        let Some(mut table) = self.current_table(class, generation) else {
            return false;
        };

        let mut by_symbol: HashMap<String, TickerRecord> = records
            .into_iter()
            .map(|r| (r.symbol.clone(), r))
            .collect();
        let previous = std::mem::take(&mut table.records);

        let mut next = Vec::with_capacity(table.symbols.len());
        for symbol in &table.symbols {
            if let Some(mut record) = by_symbol.remove(symbol) {
                if let Some(old) = previous.iter().find(|r| &r.symbol == symbol) {
                    record.inherit_flash(old, stamp.now, self.flash_for);
                }
                next.push(record);
            }
        }
        for record in &next {
            table.cache_prev_close(record);
        }
        table.records = next;
        table.mark_fresh(stamp.at);
        true
    }

    /// Merge records into `class`, keeping symbols absent from `records`.
    ///
    /// Returns `false` if the generation moved on.
    pub fn merge(
        &self,
        class: AssetClass,
        generation: u64,
        records: Vec<TickerRecord>,
        stamp: Stamp,
    ) -> bool {
        let Some(mut table) = self.current_table(class, generation) else {
            return false;
        };

        for mut record in records {
            if table.position(&record.symbol).is_none() {
                continue;
            }
            table.cache_prev_close(&record);
            match table.records.iter_mut().find(|r| r.symbol == record.symbol) {
                Some(existing) => {
                    record.inherit_flash(existing, stamp.now, self.flash_for);
                    *existing = record;
                }
                None => table.records.push(record),
            }
        }

        let mut merged = std::mem::take(&mut table.records);
        {
            let order: HashMap<&str, usize> = table
                .symbols
                .iter()
                .enumerate()
                .map(|(i, s)| (s.as_str(), i))
                .collect();
            merged.sort_by_key(|r| order.get(r.symbol.as_str()).copied().unwrap_or(usize::MAX));
        }
        table.records = merged;
        table.mark_fresh(stamp.at);
        true
    }

    /// Apply one streamed tick to an existing record.
    ///
    /// Ticks for symbols with no record are discarded; they never
    /// create one.
    pub fn apply_tick(
        &self,
        class: AssetClass,
        generation: u64,
        tick: &StreamTick,
        stamp: Stamp,
    ) -> TickOutcome {
        let Some(mut table) = self.current_table(class, generation) else {
            return TickOutcome::Superseded;
        };

        let prev_close = table.prev_closes.get(&tick.symbol).copied();
        let Some(record) = table.records.iter_mut().find(|r| r.symbol == tick.symbol) else {
            debug!(class = %class, symbol = %tick.symbol, "Tick for unknown symbol discarded");
            return TickOutcome::Unknown;
        };
        record.apply_tick(tick, prev_close, stamp.now, self.flash_for);
        table.status.last_updated = Some(stamp.at);
        TickOutcome::Applied
    }

    /// Mark `class` stale with a short diagnostic. Data is kept.
    pub fn mark_failed(&self, class: AssetClass, generation: u64, message: String) -> bool {
        let Some(mut table) = self.current_table(class, generation) else {
            return false;
        };
        table.status.stale = true;
        table.status.error = Some(message);
        true
    }

    pub fn set_year_start_close(&self, class: AssetClass, generation: u64, symbol: &str, close: f64) -> bool {
        let Some(mut table) = self.current_table(class, generation) else {
            return false;
        };
        table.year_start_closes.insert(symbol.to_string(), close);
        true
    }

    pub fn has_year_start_close(&self, class: AssetClass, symbol: &str) -> bool {
        self.table(class).read().year_start_closes.contains_key(symbol)
    }

    pub fn set_details(&self, generation: u64, symbol: &str, details: TickerDetails) -> bool {
        let Some(mut table) = self.current_table(AssetClass::Stocks, generation) else {
            return false;
        };
        table.details.insert(symbol.to_string(), details);
        true
    }

    pub fn has_details(&self, symbol: &str) -> bool {
        self.table(AssetClass::Stocks).read().details.contains_key(symbol)
    }

    pub fn set_crypto_data_date(&self, generation: u64, date: NaiveDate) -> bool {
        let Some(mut table) = self.current_table(AssetClass::Crypto, generation) else {
            return false;
        };
        table.data_date = Some(date);
        true
    }

    // ── Table reads ────────────────────────────────────────

    pub fn records(&self, class: AssetClass) -> Vec<TickerRecord> {
        self.table(class).read().records.clone()
    }

    pub fn record(&self, class: AssetClass, symbol: &str) -> Option<TickerRecord> {
        self.table(class)
            .read()
            .records
            .iter()
            .find(|r| r.symbol == symbol)
            .cloned()
    }

    pub fn prev_close(&self, class: AssetClass, symbol: &str) -> Option<f64> {
        self.table(class).read().prev_closes.get(symbol).copied()
    }

    pub fn is_empty(&self, class: AssetClass) -> bool {
        self.table(class).read().records.is_empty()
    }

    pub fn class_status(&self, class: AssetClass) -> ClassStatus {
        self.table(class).read().status.clone()
    }

    /// At least one table holds data.
    pub fn has_data(&self) -> bool {
        AssetClass::ALL.into_iter().any(|c| !self.is_empty(c))
    }

    // ── Scalar state ───────────────────────────────────────

    /// Set the sticky rate-limit flag; returns the previous value.
    pub fn set_rate_limited(&self, limited: bool) -> bool {
        self.rate_limited.swap(limited, Ordering::AcqRel)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.rate_limited.load(Ordering::Acquire)
    }

    pub fn set_connected(&self, class: AssetClass, connected: bool) {
        let bit = 1u8 << class.index();
        if connected {
            self.connected.fetch_or(bit, Ordering::AcqRel);
        } else {
            self.connected.fetch_and(!bit, Ordering::AcqRel);
        }
    }

    pub fn is_connected(&self, class: AssetClass) -> bool {
        self.connected.load(Ordering::Acquire) & (1u8 << class.index()) != 0
    }

    /// Any class has a live streaming connection.
    pub fn is_streaming(&self) -> bool {
        self.connected.load(Ordering::Acquire) != 0
    }

    pub fn set_plan(&self, plan: PlanCapability) {
        *self.plan.write() = plan;
    }

    pub fn plan(&self) -> PlanCapability {
        *self.plan.read()
    }

    pub fn set_session(&self, session: SessionState, market_open: bool) {
        *self.session.write() = SessionFlags {
            session,
            market_open,
            extended_hours: session.is_extended(),
        };
    }

    pub fn session(&self) -> SessionState {
        self.session.read().session
    }

    pub fn set_economy(&self, snapshot: EconomySnapshot) {
        *self.economy.write() = Some(snapshot);
    }

    pub fn economy(&self) -> Option<EconomySnapshot> {
        self.economy.read().clone()
    }

    pub fn set_economy_error(&self, error: Option<String>) {
        *self.economy_error.write() = error;
    }

    pub fn set_indices_groups(&self, groups: BTreeMap<String, String>) {
        *self.indices_groups.write() = groups;
    }

    // ── Snapshot ───────────────────────────────────────────

    /// Point-in-time copy for renderers.
    ///
    /// Each table is copied under its own read lock, so every table in
    /// the view is internally consistent.
    pub fn view(&self, captured_at: DateTime<Utc>) -> DashboardView {
        let mut tables: [Vec<TickerRecord>; 3] = Default::default();
        let mut status: [ClassStatus; 3] = Default::default();
        let mut year_start_closes = HashMap::new();
        let mut details = HashMap::new();
        let mut crypto_data_date = None;

        for class in AssetClass::ALL {
            let table = self.table(class).read();
            tables[class.index()] = table.records.clone();
            status[class.index()] = table.status.clone();
            year_start_closes.extend(table.year_start_closes.iter().map(|(k, v)| (k.clone(), *v)));
            details.extend(table.details.iter().map(|(k, v)| (k.clone(), *v)));
            if class == AssetClass::Crypto {
                crypto_data_date = table.data_date;
            }
        }

        let meta = self.meta.read();
        let session = *self.session.read();

        DashboardView {
            watchlist_name: meta.name.clone(),
            generation: self.generation(),
            tables,
            status,
            plan: self.plan(),
            session: session.session,
            market_open: session.market_open,
            extended_hours: session.extended_hours,
            rate_limited: self.is_rate_limited(),
            streaming: self.is_streaming(),
            economy: self.economy(),
            economy_error: self.economy_error.read().clone(),
            year_start_closes,
            details,
            indices_groups: self.indices_groups.read().clone(),
            crypto_data_date,
            treasury_keys: meta.treasury_keys.clone(),
            economy_keys: meta.economy_keys.clone(),
            captured_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watchlist(stocks: &[&str]) -> Watchlist {
        Watchlist {
            name: "test".into(),
            stocks: stocks.iter().map(ToString::to_string).collect(),
            ..Watchlist::default()
        }
    }

    fn rec(symbol: &str, last: f64, prev: f64) -> TickerRecord {
        let mut r = TickerRecord::new(symbol);
        r.last = Some(last);
        r.prev_close = Some(prev);
        r.recompute_change();
        r
    }

    fn stamp() -> Stamp {
        Stamp {
            at: Utc::now(),
            now: Instant::now(),
        }
    }

    #[test]
    fn test_replace_filters_and_orders_by_watchlist() {
        let state = MarketState::new(Duration::from_secs(1));
        let generation = state.activate_watchlist(&watchlist(&["MSFT", "AAPL"]));

        let ok = state.replace(
            AssetClass::Stocks,
            generation,
            vec![rec("AAPL", 1.0, 1.0), rec("TSLA", 1.0, 1.0), rec("MSFT", 2.0, 2.0)],
            stamp(),
        );
        assert!(ok);
        let symbols: Vec<_> = state
            .records(AssetClass::Stocks)
            .into_iter()
            .map(|r| r.symbol)
            .collect();
        assert_eq!(symbols, vec!["MSFT", "AAPL"]);
        assert_eq!(state.prev_close(AssetClass::Stocks, "MSFT"), Some(2.0));
    }

    #[test]
    fn test_merge_keeps_missing_symbols() {
        let state = MarketState::new(Duration::from_secs(1));
        let generation = state.activate_watchlist(&watchlist(&["AAPL", "MSFT"]));
        state.replace(
            AssetClass::Stocks,
            generation,
            vec![rec("AAPL", 100.0, 99.0), rec("MSFT", 400.0, 390.0)],
            stamp(),
        );

        state.merge(AssetClass::Stocks, generation, vec![rec("AAPL", 101.0, 99.0)], stamp());

        assert_eq!(state.record(AssetClass::Stocks, "AAPL").unwrap().last, Some(101.0));
        assert_eq!(state.record(AssetClass::Stocks, "MSFT").unwrap().last, Some(400.0));
    }

    #[test]
    fn test_stale_generation_is_rejected() {
        let state = MarketState::new(Duration::from_secs(1));
        let old = state.activate_watchlist(&watchlist(&["AAPL"]));
        let new = state.activate_watchlist(&watchlist(&["AAPL"]));
        assert_ne!(old, new);

        assert!(!state.replace(AssetClass::Stocks, old, vec![rec("AAPL", 1.0, 1.0)], stamp()));
        assert!(state.is_empty(AssetClass::Stocks));
        assert_eq!(
            state.apply_tick(
                AssetClass::Stocks,
                old,
                &StreamTick {
                    symbol: "AAPL".into(),
                    price: 1.0,
                    high: None,
                    low: None,
                    volume: None,
                },
                stamp(),
            ),
            TickOutcome::Superseded
        );
    }

    #[test]
    fn test_switch_purges_tables_and_caches() {
        let state = MarketState::new(Duration::from_secs(1));
        let generation = state.activate_watchlist(&watchlist(&["AAPL"]));
        state.replace(AssetClass::Stocks, generation, vec![rec("AAPL", 1.0, 1.0)], stamp());
        state.set_year_start_close(AssetClass::Stocks, generation, "AAPL", 0.5);

        state.activate_watchlist(&watchlist(&["NVDA"]));
        assert!(state.is_empty(AssetClass::Stocks));
        assert_eq!(state.prev_close(AssetClass::Stocks, "AAPL"), None);
        assert!(!state.has_year_start_close(AssetClass::Stocks, "AAPL"));
        assert_eq!(state.symbols(AssetClass::Stocks), vec!["NVDA"]);
    }

    #[test]
    fn test_streaming_flag_is_union_of_classes() {
        let state = MarketState::new(Duration::from_secs(1));
        assert!(!state.is_streaming());
        state.set_connected(AssetClass::Stocks, true);
        state.set_connected(AssetClass::Crypto, true);
        state.set_connected(AssetClass::Stocks, false);
        assert!(state.is_streaming());
        state.set_connected(AssetClass::Crypto, false);
        assert!(!state.is_streaming());
    }

    #[test]
    fn test_failure_keeps_data() {
        let state = MarketState::new(Duration::from_secs(1));
        let generation = state.activate_watchlist(&watchlist(&["AAPL"]));
        state.replace(AssetClass::Stocks, generation, vec![rec("AAPL", 1.0, 1.0)], stamp());
        state.mark_failed(AssetClass::Stocks, generation, "boom".into());

        let status = state.class_status(AssetClass::Stocks);
        assert!(status.stale);
        assert_eq!(status.error.as_deref(), Some("boom"));
        assert!(state.record(AssetClass::Stocks, "AAPL").is_some());
    }
}
