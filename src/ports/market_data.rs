//! Market Data Port - REST Provider Interface
//!
//! Everything the scheduler, registry, and economy cache need from the
//! market data vendor. Errors are classified here so callers can pick a
//! policy (back off, mark stale, fall back) without inspecting
//! transport details.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::economy::{EconomyKind, EconomyRecord};
use crate::domain::ticker::{AssetClass, Bar, TickerRecord};

/// Longest diagnostic kept in shared state.
pub const MAX_ERROR_LEN: usize = 80;

/// Classified provider failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// HTTP 429 or a provider message mentioning a rate limit.
    #[error("rate limited")]
    RateLimited,
    /// The plan does not cover the endpoint or symbol.
    #[error("not entitled: {0}")]
    Entitlement(String),
    /// No response within the per-call deadline.
    #[error("request timed out")]
    Timeout,
    /// Connection, TLS, or unexpected HTTP status.
    #[error("transport error: {0}")]
    Transport(String),
    /// Payload did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ProviderError {
    pub const fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited)
    }

    /// Worth retrying after a pause.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout)
    }

    /// User-facing diagnostic, at most [`MAX_ERROR_LEN`] characters.
    pub fn short_message(&self) -> String {
        match self {
            Self::RateLimited => "Rate limited".to_string(),
            other => other.to_string().chars().take(MAX_ERROR_LEN).collect(),
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Aggregate bar width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timespan {
    Minute,
    Hour,
    Day,
}

impl Timespan {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }
}

/// Venue-reported market status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketStatus {
    /// Overrides the calendar (holidays, early closes).
    pub market_is_open: bool,
    /// Per index family status, e.g. `s_and_p` -> `open`.
    pub indices_groups: BTreeMap<String, String>,
}

/// Static reference data for one ticker.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickerDetails {
    pub market_cap: Option<f64>,
}

/// REST market data provider.
///
/// Implementations must not retry rate-limited calls on their own;
/// pacing and back-off belong to the caller.
#[async_trait]
pub trait MarketDataProvider: Send + Sync + 'static {
    /// One call for many symbols. Symbols the provider could not
    /// resolve are simply absent from the result.
    async fn fetch_batch_snapshot(&self, symbols: &[String]) -> ProviderResult<Vec<TickerRecord>>;

    /// Aggregate bars for one symbol over an inclusive date range,
    /// oldest first.
    async fn fetch_bars(
        &self,
        symbol: &str,
        timespan: Timespan,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ProviderResult<Vec<Bar>>;

    async fn fetch_market_status(&self) -> ProviderResult<MarketStatus>;

    async fn fetch_economy(&self, kind: EconomyKind) -> ProviderResult<EconomyRecord>;

    /// Cheap entitlement check against the class seed symbol.
    ///
    /// `Ok(true)` means a usable batch snapshot came back, `Ok(false)`
    /// means the plan rejected it.
    async fn probe_capability(&self, class: AssetClass) -> ProviderResult<bool>;

    async fn fetch_ticker_details(&self, symbol: &str) -> ProviderResult<TickerDetails>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_is_truncated() {
        let err = ProviderError::Transport("x".repeat(200));
        assert_eq!(err.short_message().chars().count(), MAX_ERROR_LEN);
        assert_eq!(ProviderError::RateLimited.short_message(), "Rate limited");
    }

    #[test]
    fn test_retry_classification() {
        assert!(ProviderError::Timeout.is_retryable());
        assert!(ProviderError::RateLimited.is_retryable());
        assert!(!ProviderError::Entitlement("plan".into()).is_retryable());
        assert!(!ProviderError::Decode("bad".into()).is_retryable());
    }
}
