//! Shared fakes for integration tests.
//!
//! In-memory caches, a fixed watchlist source, and a scripted stream
//! connector. Provider mocks live next to the tests that use them.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;

use tickerwatch::domain::capability::{CapabilityTier, PlanCapability};
use tickerwatch::domain::clock::ManualClock;
use tickerwatch::domain::economy::{EconomyKind, EconomyRecord, EconomySnapshot};
use tickerwatch::domain::ticker::{AssetClass, Bar, StreamTick, TickerRecord};
use tickerwatch::domain::watchlist::Watchlist;
use tickerwatch::ports::cache::{CapabilityStore, EconomyStore};
use tickerwatch::ports::market_data::{
    MarketDataProvider, MarketStatus, ProviderError, ProviderResult, TickerDetails, Timespan,
};
use tickerwatch::ports::stream::{FeedKind, StreamConnection, StreamConnector};
use tickerwatch::ports::watchlist::WatchlistSource;
use tickerwatch::usecases::market_state::MarketState;

// ---- Builders ----

/// Wednesday 2025-03-12 14:00 New York, regular session.
pub fn midsession() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 12, 18, 0, 0).unwrap()
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(midsession()))
}

pub fn watchlist(name: &str, stocks: &[&str], indices: &[&str], crypto: &[&str]) -> Watchlist {
    let owned = |xs: &[&str]| xs.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
    Watchlist {
        name: name.to_string(),
        stocks: owned(stocks),
        indices: owned(indices),
        crypto: owned(crypto),
        ..Watchlist::default()
    }
}

pub fn plan(stocks: CapabilityTier, indices: CapabilityTier, currencies: CapabilityTier) -> PlanCapability {
    PlanCapability {
        stocks,
        indices,
        currencies,
    }
}

/// Shared state with `list` active and `plan` installed.
pub fn state_with(list: &Watchlist, plan: PlanCapability) -> Arc<MarketState> {
    let state = Arc::new(MarketState::new(std::time::Duration::from_secs(1)));
    state.set_plan(plan);
    state.activate_watchlist(list);
    state
}

pub fn record(symbol: &str, last: f64, prev_close: f64) -> TickerRecord {
    let mut r = TickerRecord::new(symbol);
    r.last = Some(last);
    r.high = Some(last);
    r.low = Some(last);
    r.prev_close = Some(prev_close);
    r.recompute_change();
    r
}

pub fn tick(symbol: &str, price: f64) -> StreamTick {
    StreamTick {
        symbol: symbol.to_string(),
        price,
        high: None,
        low: None,
        volume: None,
    }
}

// ---- Caches ----

#[derive(Default)]
pub struct MemoryCapabilityStore {
    pub plans: Mutex<HashMap<String, PlanCapability>>,
    pub saves: AtomicUsize,
}

#[async_trait]
impl CapabilityStore for MemoryCapabilityStore {
    async fn load(&self, fingerprint: &str) -> Result<Option<PlanCapability>> {
        Ok(self.plans.lock().get(fingerprint).copied())
    }

    async fn save(&self, fingerprint: &str, plan: &PlanCapability) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.plans.lock().insert(fingerprint.to_string(), *plan);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryEconomyStore {
    pub snapshot: Mutex<Option<EconomySnapshot>>,
    pub saves: AtomicUsize,
}

#[async_trait]
impl EconomyStore for MemoryEconomyStore {
    async fn load(&self) -> Result<Option<EconomySnapshot>> {
        Ok(self.snapshot.lock().clone())
    }

    async fn save(&self, snapshot: &EconomySnapshot) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.snapshot.lock() = Some(snapshot.clone());
        Ok(())
    }
}

// ---- Providers ----

/// Snapshot provider that holds every call until `gate` is notified.
pub struct GatedProvider {
    pub gate: Notify,
    pub snapshot_calls: AtomicUsize,
    records: Vec<TickerRecord>,
}

impl GatedProvider {
    pub fn new(records: Vec<TickerRecord>) -> Self {
        Self {
            gate: Notify::new(),
            snapshot_calls: AtomicUsize::new(0),
            records,
        }
    }

    fn unscripted<T>() -> ProviderResult<T> {
        Err(ProviderError::Transport("not scripted".into()))
    }
}

#[async_trait]
impl MarketDataProvider for GatedProvider {
    async fn fetch_batch_snapshot(&self, _symbols: &[String]) -> ProviderResult<Vec<TickerRecord>> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(self.records.clone())
    }

    async fn fetch_bars(
        &self,
        _symbol: &str,
        _timespan: Timespan,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> ProviderResult<Vec<Bar>> {
        Self::unscripted()
    }

    async fn fetch_market_status(&self) -> ProviderResult<MarketStatus> {
        Self::unscripted()
    }

    async fn fetch_economy(&self, _kind: EconomyKind) -> ProviderResult<EconomyRecord> {
        Self::unscripted()
    }

    async fn probe_capability(&self, _class: AssetClass) -> ProviderResult<bool> {
        Self::unscripted()
    }

    async fn fetch_ticker_details(&self, _symbol: &str) -> ProviderResult<TickerDetails> {
        Self::unscripted()
    }
}

// ---- Watchlists ----

/// Cycles through a fixed list; lists without tickers are rejected.
pub struct StaticWatchlists {
    lists: Vec<Watchlist>,
    selected: Mutex<usize>,
}

impl StaticWatchlists {
    pub fn new(lists: Vec<Watchlist>) -> Self {
        Self {
            lists,
            selected: Mutex::new(0),
        }
    }
}

impl WatchlistSource for StaticWatchlists {
    fn current(&self) -> Result<Watchlist> {
        Ok(self.lists[*self.selected.lock()].clone())
    }

    fn advance(&self) -> Result<Watchlist> {
        let mut selected = self.selected.lock();
        let next = (*selected + 1) % self.lists.len();
        let list = self.lists[next].clone();
        if list.is_empty() {
            bail!("{}: no tickers", list.name);
        }
        *selected = next;
        Ok(list)
    }
}

// ---- Streams ----

/// Connector that fails every attempt, recording when each was made.
#[derive(Default)]
pub struct RefusingConnector {
    pub attempts: Mutex<Vec<tokio::time::Instant>>,
}

#[async_trait]
impl StreamConnector for RefusingConnector {
    async fn connect(
        &self,
        _class: AssetClass,
        _feed: FeedKind,
        _symbols: &[String],
    ) -> Result<Box<dyn StreamConnection>> {
        self.attempts.lock().push(tokio::time::Instant::now());
        bail!("connection refused")
    }
}

/// Connector whose first connection replays `batches` then idles.
pub struct ScriptedConnector {
    batches: Mutex<Option<VecDeque<Vec<StreamTick>>>>,
    pub connects: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(batches: Vec<Vec<StreamTick>>) -> Self {
        Self {
            batches: Mutex::new(Some(batches.into())),
            connects: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StreamConnector for ScriptedConnector {
    async fn connect(
        &self,
        _class: AssetClass,
        _feed: FeedKind,
        _symbols: &[String],
    ) -> Result<Box<dyn StreamConnection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let batches = self.batches.lock().take().unwrap_or_default();
        Ok(Box::new(ScriptedConnection { batches }))
    }
}

struct ScriptedConnection {
    batches: VecDeque<Vec<StreamTick>>,
}

#[async_trait]
impl StreamConnection for ScriptedConnection {
    async fn next_batch(&mut self) -> Result<Option<Vec<StreamTick>>> {
        match self.batches.pop_front() {
            Some(batch) => Ok(Some(batch)),
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Connector whose connections idle and never finish closing.
#[derive(Default)]
pub struct StallingConnector;

#[async_trait]
impl StreamConnector for StallingConnector {
    async fn connect(
        &self,
        _class: AssetClass,
        _feed: FeedKind,
        _symbols: &[String],
    ) -> Result<Box<dyn StreamConnection>> {
        Ok(Box::new(StallingConnection))
    }
}

struct StallingConnection;

#[async_trait]
impl StreamConnection for StallingConnection {
    async fn next_batch(&mut self) -> Result<Option<Vec<StreamTick>>> {
        std::future::pending().await
    }

    async fn close(&mut self) -> Result<()> {
        std::future::pending().await
    }
}
