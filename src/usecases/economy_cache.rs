//! Economy Cache - Slow-changing Macro Data
//!
//! Treasury yields, labor figures, and inflation change at most daily.
//! A snapshot cached on disk is reused as long as it was fetched after
//! the most recent regular-session close. Fetches are spaced and
//! retried to fit a five-calls-per-minute budget shared with the
//! market pollers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::domain::clock::Clock;
use crate::domain::economy::{EconomyKind, EconomyRecord, EconomySnapshot};
use crate::domain::session::TradingCalendar;
use crate::ports::cache::EconomyStore;
use crate::ports::market_data::{MarketDataProvider, ProviderError};

use super::market_state::MarketState;

/// Characters of provider detail kept per economy error.
const ERROR_DETAIL_LEN: usize = 60;

/// Economy fetch pacing.
#[derive(Debug, Clone)]
pub struct EconomyConfig {
    /// Pause between the three endpoint calls.
    pub call_spacing: Duration,
    /// Extra attempts after a rate limit or timeout.
    pub retries: u32,
    pub retry_delay: Duration,
    /// Per-attempt deadline.
    pub timeout: Duration,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            call_spacing: Duration::from_secs(15),
            retries: 2,
            retry_delay: Duration::from_secs(15),
            timeout: Duration::from_secs(20),
        }
    }
}

/// Result of one `fetch_and_cache` run.
#[derive(Debug, Clone, PartialEq)]
pub enum EconomyOutcome {
    /// The on-disk snapshot was still fresh; nothing was fetched.
    Cached,
    /// All three sections refreshed and the snapshot was saved.
    Complete,
    /// Some sections failed; the rest were applied but not saved.
    Partial(Vec<EconomyKind>),
    /// Another fetch is running.
    InFlight,
    Cancelled,
}

/// Disk-backed economy snapshot loader and refresher.
pub struct EconomyCache {
    provider: Arc<dyn MarketDataProvider>,
    store: Arc<dyn EconomyStore>,
    state: Arc<MarketState>,
    clock: Arc<dyn Clock>,
    calendar: TradingCalendar,
    config: EconomyConfig,
    in_flight: AtomicBool,
}

impl EconomyCache {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        store: Arc<dyn EconomyStore>,
        state: Arc<MarketState>,
        clock: Arc<dyn Clock>,
        calendar: TradingCalendar,
        config: EconomyConfig,
    ) -> Self {
        Self {
            provider,
            store,
            state,
            clock,
            calendar,
            config,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Cached snapshot, only if fetched at or after the last regular close.
    pub async fn load(&self) -> Option<EconomySnapshot> {
        let snapshot = match self.store.load().await {
            Ok(snapshot) => snapshot?,
            Err(e) => {
                warn!(error = %e, "Economy cache unreadable");
                return None;
            }
        };
        let last_close = self.calendar.last_regular_close(self.clock.now_utc());
        snapshot.is_fresh(last_close).then_some(snapshot)
    }

    /// Use the fresh cache when there is one, otherwise fetch.
    ///
    /// The snapshot lands in shared state either way. Successful sections
    /// are applied on top of the previous snapshot even when others fail;
    /// the disk cache is only written when all three succeed.
    #[instrument(skip(self, cancel))]
    pub async fn fetch_and_cache(&self, cancel: &CancellationToken) -> EconomyOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return EconomyOutcome::InFlight;
        }
        let outcome = self.refresh(cancel).await;
        self.in_flight.store(false, Ordering::Release);
        outcome
    }

    async fn refresh(&self, cancel: &CancellationToken) -> EconomyOutcome {
        if let Some(cached) = self.load().await {
            info!(fetched_at = %cached.fetched_at, "Economy cache is fresh");
            self.state.set_economy(cached);
            self.state.set_economy_error(None);
            return EconomyOutcome::Cached;
        }

        let mut snapshot = self
            .state
            .economy()
            .unwrap_or_else(|| EconomySnapshot::empty(self.clock.now_utc()));
        let mut failed = Vec::new();
        let mut last_error = None;

        for (i, kind) in EconomyKind::ALL.into_iter().enumerate() {
            if i > 0 && !sleep_or_cancel(cancel, self.config.call_spacing).await {
                return EconomyOutcome::Cancelled;
            }

            match self.fetch_with_retry(kind, cancel).await {
                Some(Ok(record)) => snapshot.apply(record, self.clock.now_utc()),
                Some(Err(e)) => {
                    warn!(kind = kind.label(), error = %e, "Economy fetch failed");
                    snapshot.stale.insert(kind);
                    let detail: String = e.short_message().chars().take(ERROR_DETAIL_LEN).collect();
                    last_error = Some(format!("{}: {detail}", kind.label()));
                    failed.push(kind);
                }
                None => return EconomyOutcome::Cancelled,
            }
            // Inflation history that was too short also marks the section stale.
            if snapshot.stale.contains(&kind) && !failed.contains(&kind) {
                failed.push(kind);
            }
        }

        if failed.is_empty() {
            snapshot.fetched_at = self.clock.now_utc();
            if let Err(e) = self.store.save(&snapshot).await {
                warn!(error = %e, "Failed to persist economy cache");
            }
            self.state.set_economy(snapshot);
            self.state.set_economy_error(None);
            info!("Economy data refreshed");
            EconomyOutcome::Complete
        } else {
            self.state.set_economy(snapshot);
            self.state
                .set_economy_error(last_error.or_else(|| Some("Inflation: short history".to_string())));
            EconomyOutcome::Partial(failed)
        }
    }

    /// One endpoint with a per-attempt timeout and bounded retries.
    ///
    /// `None` means cancelled.
    async fn fetch_with_retry(
        &self,
        kind: EconomyKind,
        cancel: &CancellationToken,
    ) -> Option<Result<EconomyRecord, ProviderError>> {
        let mut attempt = 0;
        loop {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return None,
                res = tokio::time::timeout(self.config.timeout, self.provider.fetch_economy(kind)) => {
                    res.unwrap_or(Err(ProviderError::Timeout))
                }
            };

            match result {
                Err(e) if e.is_retryable() && attempt < self.config.retries => {
                    attempt += 1;
                    warn!(kind = kind.label(), attempt, error = %e, "Retrying economy fetch");
                    if !sleep_or_cancel(cancel, self.config.retry_delay).await {
                        return None;
                    }
                }
                other => return Some(other),
            }
        }
    }
}

/// Sleep unless cancelled first; `false` when cancelled.
async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}
