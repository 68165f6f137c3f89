//! Stream Manager - Streaming Feed Lifecycle
//!
//! One reconnect loop task per streaming asset class. Each loop
//! connects, pumps ticks into the shared state, and on any drop waits
//! with exponential backoff before trying again. Every wait races a
//! `CancellationToken`, so a stop takes effect mid-sleep and closes a
//! live connection promptly.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::domain::backoff::BackoffPolicy;
use crate::domain::clock::Clock;
use crate::domain::ticker::AssetClass;
use crate::ports::stream::{FeedKind, StreamConnection, StreamConnector};
use crate::ports::telemetry::FeedTelemetry;

use super::market_state::{MarketState, Stamp, TickOutcome};

/// Reconnect and shutdown timing.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// How long `stop` waits for the loop task to exit.
    pub stop_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

/// A running stream loop.
#[derive(Debug)]
pub struct StreamHandle {
    pub class: AssetClass,
    pub feed: FeedKind,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Loop task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// How one connection ended.
enum SessionEnd {
    Cancelled,
    Closed,
    Failed(anyhow::Error),
}

/// Starts and stops per-class stream loops.
pub struct StreamManager {
    connector: Arc<dyn StreamConnector>,
    state: Arc<MarketState>,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn FeedTelemetry>,
    config: StreamConfig,
    shutdown: CancellationToken,
}

impl StreamManager {
    /// Loops are children of `shutdown`; cancelling it stops them all.
    pub fn new(
        connector: Arc<dyn StreamConnector>,
        state: Arc<MarketState>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn FeedTelemetry>,
        config: StreamConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            connector,
            state,
            clock,
            telemetry,
            config,
            shutdown,
        }
    }

    /// Spawn the reconnect loop for `class`.
    ///
    /// Ticks are applied against the watchlist generation current at
    /// the time of the call.
    pub fn start(&self, class: AssetClass, feed: FeedKind, symbols: Vec<String>) -> StreamHandle {
        let cancel = self.shutdown.child_token();
        let task = StreamTask {
            class,
            feed,
            symbols,
            generation: self.state.generation(),
            connector: Arc::clone(&self.connector),
            state: Arc::clone(&self.state),
            clock: Arc::clone(&self.clock),
            telemetry: Arc::clone(&self.telemetry),
            backoff: BackoffPolicy::new(self.config.backoff_base, self.config.backoff_max),
            cancel: cancel.clone(),
        };

        info!(class = %class, feed = feed.as_str(), "Starting stream");
        StreamHandle {
            class,
            feed,
            cancel,
            task: tokio::spawn(task.run()),
        }
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn stop(&self, handle: StreamHandle) {
        let (class, task) = self.cancel(handle);
        join_stopped(class, task, self.config.stop_timeout).await;
    }

    /// Cancel the loop and reap its task in the background.
    ///
    /// The class reads as disconnected as soon as this returns.
    pub fn stop_detached(&self, handle: StreamHandle) {
        let (class, task) = self.cancel(handle);
        tokio::spawn(join_stopped(class, task, self.config.stop_timeout));
    }

    /// Stop several loops concurrently.
    pub async fn stop_all(&self, handles: Vec<StreamHandle>) {
        futures_util::future::join_all(handles.into_iter().map(|h| self.stop(h))).await;
    }

    fn cancel(&self, handle: StreamHandle) -> (AssetClass, JoinHandle<()>) {
        let StreamHandle { class, cancel, task, .. } = handle;
        cancel.cancel();
        self.state.set_connected(class, false);
        self.telemetry.stream_connected(class, false);
        (class, task)
    }
}

async fn join_stopped(class: AssetClass, task: JoinHandle<()>, timeout: Duration) {
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(())) => info!(class = %class, "Stream stopped"),
        Ok(Err(e)) => warn!(class = %class, error = %e, "Stream task panicked"),
        Err(_) => warn!(class = %class, "Stream task did not stop in time"),
    }
}

struct StreamTask {
    class: AssetClass,
    feed: FeedKind,
    symbols: Vec<String>,
    generation: u64,
    connector: Arc<dyn StreamConnector>,
    state: Arc<MarketState>,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn FeedTelemetry>,
    backoff: BackoffPolicy,
    cancel: CancellationToken,
}

impl StreamTask {
    #[instrument(skip(self), fields(class = %self.class, feed = self.feed.as_str()))]
    async fn run(mut self) {
        loop {
            let connected = tokio::select! {
                () = self.cancel.cancelled() => break,
                res = self.connector.connect(self.class, self.feed, &self.symbols) => res,
            };

            match connected {
                Ok(mut conn) => {
                    self.backoff.reset();
                    self.set_connected(true);
                    info!(symbols = self.symbols.len(), "Stream connected");

                    let end = self.pump(conn.as_mut()).await;
                    if let Err(e) = conn.close().await {
                        debug!(error = %e, "Stream close failed");
                    }
                    self.set_connected(false);

                    match end {
                        SessionEnd::Cancelled => break,
                        SessionEnd::Closed => info!("Stream closed by server"),
                        SessionEnd::Failed(e) => warn!(error = %e, "Stream dropped"),
                    }
                }
                Err(e) => warn!(error = %e, "Stream connect failed"),
            }

            let delay = self.backoff.next_delay();
            self.telemetry.reconnect_attempt(self.class);
            info!(
                attempt = self.backoff.attempts(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Reconnecting stream"
            );
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.set_connected(false);
        debug!("Stream loop exited");
    }

    async fn pump(&self, conn: &mut dyn StreamConnection) -> SessionEnd {
        loop {
            let batch = tokio::select! {
                () = self.cancel.cancelled() => return SessionEnd::Cancelled,
                batch = conn.next_batch() => batch,
            };

            match batch {
                Ok(Some(ticks)) => {
                    let stamp = Stamp::from_clock(self.clock.as_ref());
                    for tick in &ticks {
                        let outcome = self.state.apply_tick(self.class, self.generation, tick, stamp);
                        self.telemetry.tick(self.class, outcome == TickOutcome::Applied);
                    }
                }
                Ok(None) => return SessionEnd::Closed,
                Err(e) => return SessionEnd::Failed(e),
            }
        }
    }

    /// No-op once cancelled; the stopping side has already cleared the
    /// flag and a replacement loop may own it by now.
    fn set_connected(&self, connected: bool) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.state.set_connected(self.class, connected);
        self.telemetry.stream_connected(self.class, connected);
    }
}
