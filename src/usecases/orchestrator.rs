//! Orchestrator - Coordinating Run Loop
//!
//! Ticks twice per second and on each tick:
//! 1. Collects a finished market-status check and feeds the session tracker
//! 2. Turns session events into immediate polls
//! 3. Reconciles the per-class stream loops with the current feed phase
//! 4. Spawns interval polls, economy refreshes, and deferred reference fetches
//! 5. Hands a dashboard snapshot to the renderer
//!
//! Every fetch runs in a detached task guarded by a single-flight flag,
//! so the loop itself never waits on the network and stays responsive
//! to cancellation and watchlist-switch commands.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::domain::clock::Clock;
use crate::domain::ticker::AssetClass;
use crate::ports::market_data::{MarketDataProvider, MarketStatus, ProviderError, ProviderResult};
use crate::ports::renderer::Renderer;
use crate::ports::stream::FeedKind;
use crate::ports::watchlist::WatchlistSource;

use super::economy_cache::EconomyCache;
use super::market_state::MarketState;
use super::poll_scheduler::{Cadence, PollScheduler};
use super::reference_data::ReferenceData;
use super::session_tracker::{SessionEvent, SessionTracker};
use super::stream_manager::{StreamHandle, StreamManager};

/// Requests accepted by the run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Cycle to the next watchlist.
    SwitchWatchlist,
    Quit,
}

/// Run-loop cadences.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub tick: Duration,
    /// Base poll interval for snapshot-capable classes.
    pub market_interval: Duration,
    pub economy_interval: Duration,
    /// Crypto poll interval on the daily-bar fallback.
    pub crypto_fallback_interval: Duration,
    /// Deadline for a market-status call.
    pub status_timeout: Duration,
    /// How long shutdown waits for stream loops.
    pub shutdown_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(500),
            market_interval: Duration::from_secs(10),
            economy_interval: Duration::from_secs(24 * 3600),
            crypto_fallback_interval: Duration::from_secs(3600),
            status_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// Components the run loop drives.
pub struct OrchestratorParts {
    pub state: Arc<MarketState>,
    pub provider: Arc<dyn MarketDataProvider>,
    pub scheduler: Arc<PollScheduler>,
    pub streams: StreamManager,
    pub tracker: SessionTracker,
    pub economy: Arc<EconomyCache>,
    pub reference: Arc<ReferenceData>,
    pub watchlists: Arc<dyn WatchlistSource>,
    pub renderer: Arc<dyn Renderer>,
    pub clock: Arc<dyn Clock>,
}

/// Session-aware coordinator for polls and streams.
pub struct Orchestrator {
    state: Arc<MarketState>,
    provider: Arc<dyn MarketDataProvider>,
    scheduler: Arc<PollScheduler>,
    streams: StreamManager,
    tracker: SessionTracker,
    economy: Arc<EconomyCache>,
    reference: Arc<ReferenceData>,
    watchlists: Arc<dyn WatchlistSource>,
    renderer: Arc<dyn Renderer>,
    clock: Arc<dyn Clock>,
    config: OrchestratorConfig,
    cancel: CancellationToken,

    handles: [Option<StreamHandle>; 3],
    cadences: [Cadence; 3],
    economy_cadence: Cadence,
    status_task: Option<JoinHandle<ProviderResult<MarketStatus>>>,
    /// Generation whose reference fetches have been started.
    reference_generation: Option<u64>,
}

impl Orchestrator {
    pub fn new(parts: OrchestratorParts, config: OrchestratorConfig, cancel: CancellationToken) -> Self {
        let OrchestratorParts {
            state,
            provider,
            scheduler,
            streams,
            tracker,
            economy,
            reference,
            watchlists,
            renderer,
            clock,
        } = parts;

        Self {
            state,
            provider,
            scheduler,
            streams,
            tracker,
            economy,
            reference,
            watchlists,
            renderer,
            clock,
            config,
            cancel,
            handles: Default::default(),
            cadences: Default::default(),
            economy_cadence: Cadence::default(),
            status_task: None,
            reference_generation: None,
        }
    }

    /// Run until cancelled or told to quit, then stop every stream.
    #[instrument(skip_all)]
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            generation = self.state.generation(),
            tick_ms = u64::try_from(self.config.tick.as_millis()).unwrap_or(u64::MAX),
            "Orchestrator started"
        );

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    info!("Orchestrator received shutdown signal");
                    break;
                }
                cmd = commands.recv() => match cmd {
                    Some(Command::SwitchWatchlist) => self.switch_watchlist(),
                    Some(Command::Quit) | None => {
                        info!("Quit requested");
                        break;
                    }
                },
                _ = ticker.tick() => self.on_tick().await,
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// One pass of the coordination loop.
    pub async fn on_tick(&mut self) {
        self.check_session().await;
        if let Some(event) = self.tracker.tick_grace() {
            self.handle_event(event);
        }
        self.reconcile_streams();
        self.schedule_polls();
        self.schedule_economy();
        self.schedule_reference();
        self.render();
    }

    async fn check_session(&mut self) {
        if self.status_task.as_ref().is_some_and(JoinHandle::is_finished) {
            let market_open = match self.status_task.take() {
                Some(task) => match task.await {
                    Ok(Ok(status)) => {
                        self.state.set_indices_groups(status.indices_groups);
                        Some(status.market_is_open)
                    }
                    Ok(Err(e)) => {
                        debug!(error = %e, "Market status unavailable, using calendar");
                        None
                    }
                    Err(e) => {
                        warn!(error = %e, "Market status task failed");
                        None
                    }
                },
                None => None,
            };

            let all_real_time = self.state.plan().all_real_time(&self.session_classes());
            let event = self.tracker.observe(market_open, all_real_time);
            self.state
                .set_session(self.tracker.session(), self.tracker.is_open());
            if let Some(event) = event {
                self.handle_event(event);
            }
        }

        if self.status_task.is_none() && self.tracker.due() {
            let provider = Arc::clone(&self.provider);
            let timeout = self.config.status_timeout;
            self.status_task = Some(tokio::spawn(async move {
                tokio::time::timeout(timeout, provider.fetch_market_status())
                    .await
                    .unwrap_or(Err(ProviderError::Timeout))
            }));
        }
    }

    /// Session transitions poll right away; stream starts and stops
    /// follow from the phase on the next reconcile.
    fn handle_event(&mut self, event: SessionEvent) {
        info!(?event, "Session event");
        for class in [AssetClass::Stocks, AssetClass::Indices] {
            self.cadences[class.index()].reset();
        }
        if matches!(event, SessionEvent::Opened) {
            self.cadences[AssetClass::Crypto.index()].reset();
        }
    }

    fn reconcile_streams(&mut self) {
        let plan = self.state.plan();
        for class in AssetClass::ALL {
            let tier = plan.tier(class);
            let wanted = self.tracker.phase(class, tier).keeps_stream()
                && !self.state.symbols(class).is_empty();
            let slot = &mut self.handles[class.index()];

            match (wanted, slot.take()) {
                (true, Some(handle)) if !handle.is_finished() => *slot = Some(handle),
                (true, stale) => {
                    if let Some(handle) = stale {
                        warn!(class = %class, "Stream loop exited unexpectedly, restarting");
                        self.streams.stop_detached(handle);
                    }
                    let feed = if tier.is_real_time() {
                        FeedKind::RealTime
                    } else {
                        FeedKind::Delayed
                    };
                    let symbols = self.state.symbols(class);
                    self.handles[class.index()] = Some(self.streams.start(class, feed, symbols));
                }
                (false, Some(handle)) => self.streams.stop_detached(handle),
                (false, None) => {}
            }
        }
    }

    fn schedule_polls(&mut self) {
        let now = self.clock.now();
        let rate_limited = self.state.is_rate_limited();
        let plan = self.state.plan();
        let equities_active = self.tracker.equities_active();

        for class in AssetClass::ALL {
            let tier = plan.tier(class);
            if !tier.is_entitled() || self.state.symbols(class).is_empty() {
                continue;
            }
            let cadence = &mut self.cadences[class.index()];

            let (interval, active) = match class {
                AssetClass::Crypto if !tier.has_batch_snapshot() => {
                    (self.config.crypto_fallback_interval, equities_active)
                }
                AssetClass::Crypto => (self.config.market_interval, true),
                AssetClass::Stocks | AssetClass::Indices => {
                    (self.config.market_interval, equities_active)
                }
            };
            let interval = self
                .scheduler
                .config()
                .effective_interval(interval, rate_limited);

            // The first load of a watchlist runs regardless of session.
            if !cadence.due(now, interval) || (cadence.has_run() && !active) {
                continue;
            }
            if self.scheduler.is_in_flight(class) {
                continue;
            }
            // A bar cycle inside its spacing window would be skipped; the
            // poll stays pending until the window closes.
            if !self.scheduler.bar_spacing_remaining(class).is_zero() {
                continue;
            }
            cadence.mark(now);

            let scheduler = Arc::clone(&self.scheduler);
            tokio::spawn(async move {
                scheduler.refresh(class).await;
            });
        }
    }

    fn schedule_economy(&mut self) {
        let now = self.clock.now();
        if !self.economy_cadence.due(now, self.config.economy_interval) {
            return;
        }
        self.economy_cadence.mark(now);

        let economy = Arc::clone(&self.economy);
        let cancel = self.cancel.child_token();
        tokio::spawn(async move {
            let outcome = economy.fetch_and_cache(&cancel).await;
            debug!(?outcome, "Economy refresh finished");
        });
    }

    /// Year-start closes and market caps, once economy data has landed.
    fn schedule_reference(&mut self) {
        let generation = self.state.generation();
        if self.reference_generation == Some(generation) || self.state.economy().is_none() {
            return;
        }
        self.reference_generation = Some(generation);

        let reference = Arc::clone(&self.reference);
        let cancel = self.cancel.child_token();
        tokio::spawn(async move {
            let closes = reference.fetch_year_start_closes(&cancel).await;
            if closes.interrupted {
                return;
            }
            reference.fetch_details(&cancel).await;
        });
    }

    fn render(&self) {
        let view = self.state.view(self.clock.now_utc());
        if let Err(e) = self.renderer.render(&view) {
            warn!(error = %e, "Render failed");
        }
    }

    /// Cycle to the next watchlist, purge every table, and start over.
    #[instrument(skip(self))]
    pub fn switch_watchlist(&mut self) {
        let watchlist = match self.watchlists.advance() {
            Ok(watchlist) => watchlist,
            Err(e) => {
                warn!(error = %e, "Watchlist switch rejected");
                return;
            }
        };

        for handle in self.handles.iter_mut().filter_map(Option::take) {
            self.streams.stop_detached(handle);
        }

        let generation = self.state.activate_watchlist(&watchlist);
        self.tracker.reset();
        for cadence in &mut self.cadences {
            cadence.reset();
        }
        self.economy_cadence.reset();
        self.reference_generation = None;

        info!(
            name = %watchlist.name,
            tickers = watchlist.ticker_count(),
            generation,
            "Watchlist switched"
        );
    }

    async fn shutdown(&mut self) {
        self.cancel.cancel();
        let handles: Vec<StreamHandle> = self.handles.iter_mut().filter_map(Option::take).collect();
        let count = handles.len();
        if tokio::time::timeout(self.config.shutdown_timeout, self.streams.stop_all(handles))
            .await
            .is_err()
        {
            warn!("Streams did not stop before the shutdown deadline");
        }
        if let Some(task) = self.status_task.take() {
            task.abort();
        }
        info!(streams = count, "Orchestrator stopped");
    }

    /// Session-following classes present in the watchlist.
    fn session_classes(&self) -> Vec<AssetClass> {
        AssetClass::ALL
            .into_iter()
            .filter(|c| c.follows_session() && !self.state.symbols(*c).is_empty())
            .collect()
    }

    /// Classes with a live stream loop.
    pub fn streaming_classes(&self) -> Vec<AssetClass> {
        self.handles.iter().flatten().map(|h| h.class).collect()
    }
}
