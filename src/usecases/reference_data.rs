//! Reference Data - Year-start Closes and Ticker Details
//!
//! Low-priority fetches that run after the first economy refresh has
//! landed, so they never compete with the initial table loads. Each
//! symbol is fetched at most once per watchlist; a switch mid-run stops
//! the loop at the next symbol.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use chrono_tz::America::New_York;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::domain::clock::Clock;
use crate::domain::ticker::AssetClass;
use crate::ports::market_data::{MarketDataProvider, ProviderError, Timespan};

use super::market_state::MarketState;

/// Classes that show a year-to-date column.
const YTD_CLASSES: [AssetClass; 2] = [AssetClass::Stocks, AssetClass::Indices];

/// Reference fetch pacing.
#[derive(Debug, Clone)]
pub struct ReferenceConfig {
    pub call_spacing: Duration,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            call_spacing: Duration::from_millis(500),
        }
    }
}

/// Counts from one reference run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceSummary {
    pub fetched: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Stopped early on cancellation, a watchlist switch, or a rate limit.
    pub interrupted: bool,
}

/// Fetches year-start closes and market caps.
pub struct ReferenceData {
    provider: Arc<dyn MarketDataProvider>,
    state: Arc<MarketState>,
    clock: Arc<dyn Clock>,
    config: ReferenceConfig,
}

impl ReferenceData {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        state: Arc<MarketState>,
        clock: Arc<dyn Clock>,
        config: ReferenceConfig,
    ) -> Self {
        Self {
            provider,
            state,
            clock,
            config,
        }
    }

    /// Last trading days of the previous calendar year, exchange time.
    pub fn year_start_window(&self) -> (NaiveDate, NaiveDate) {
        let year = self.clock.now_utc().with_timezone(&New_York).year() - 1;
        let from = NaiveDate::from_ymd_opt(year, 12, 26).unwrap_or(NaiveDate::MIN);
        let to = NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(NaiveDate::MIN);
        (from, to)
    }

    /// Fill in the prior-year closing price for equities and indices.
    #[instrument(skip(self, cancel))]
    pub async fn fetch_year_start_closes(&self, cancel: &CancellationToken) -> ReferenceSummary {
        let generation = self.state.generation();
        let (from, to) = self.year_start_window();
        let mut summary = ReferenceSummary::default();
        let mut first = true;

        for class in YTD_CLASSES {
            if !self.state.plan().tier(class).is_entitled() {
                continue;
            }
            for symbol in self.state.symbols(class) {
                if self.state.has_year_start_close(class, &symbol) {
                    summary.skipped += 1;
                    continue;
                }
                if !self.pace(cancel, generation, &mut first).await {
                    summary.interrupted = true;
                    return summary;
                }

                match self.provider.fetch_bars(&symbol, Timespan::Day, from, to).await {
                    Ok(bars) => match bars.last().and_then(|bar| bar.close) {
                        Some(close) => {
                            if !self.state.set_year_start_close(class, generation, &symbol, close) {
                                summary.interrupted = true;
                                return summary;
                            }
                            summary.fetched += 1;
                        }
                        None => {
                            debug!(symbol = %symbol, "No bars in year-start window");
                            summary.failed += 1;
                        }
                    },
                    Err(ProviderError::RateLimited) => {
                        warn!(symbol = %symbol, "Rate limited fetching year-start closes");
                        summary.interrupted = true;
                        return summary;
                    }
                    Err(e) => {
                        debug!(symbol = %symbol, error = %e, "Year-start close fetch failed");
                        summary.failed += 1;
                    }
                }
            }
        }

        info!(
            fetched = summary.fetched,
            skipped = summary.skipped,
            failed = summary.failed,
            "Year-start closes loaded"
        );
        summary
    }

    /// Fill in market capitalization for equities.
    #[instrument(skip(self, cancel))]
    pub async fn fetch_details(&self, cancel: &CancellationToken) -> ReferenceSummary {
        let generation = self.state.generation();
        let mut summary = ReferenceSummary::default();
        let mut first = true;

        if !self.state.plan().tier(AssetClass::Stocks).is_entitled() {
            return summary;
        }

        for symbol in self.state.symbols(AssetClass::Stocks) {
            if self.state.has_details(&symbol) {
                summary.skipped += 1;
                continue;
            }
            if !self.pace(cancel, generation, &mut first).await {
                summary.interrupted = true;
                return summary;
            }

            match self.provider.fetch_ticker_details(&symbol).await {
                Ok(details) => {
                    if !self.state.set_details(generation, &symbol, details) {
                        summary.interrupted = true;
                        return summary;
                    }
                    summary.fetched += 1;
                }
                Err(ProviderError::RateLimited) => {
                    warn!(symbol = %symbol, "Rate limited fetching ticker details");
                    summary.interrupted = true;
                    return summary;
                }
                Err(e) => {
                    debug!(symbol = %symbol, error = %e, "Ticker details fetch failed");
                    summary.failed += 1;
                }
            }
        }

        info!(fetched = summary.fetched, failed = summary.failed, "Ticker details loaded");
        summary
    }

    /// Wait out the call spacing. `false` when the run should stop.
    async fn pace(&self, cancel: &CancellationToken, generation: u64, first: &mut bool) -> bool {
        if self.state.generation() != generation {
            return false;
        }
        if std::mem::take(first) {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            () = tokio::time::sleep(self.config.call_spacing) => self.state.generation() == generation,
        }
    }
}
