//! Massive API Response Types
//!
//! Serde shapes for the REST payloads this crate reads. Every numeric
//! field is optional; the provider omits fields depending on plan,
//! asset class, and time of day.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Generic `{"results": [...]}` list envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
  #[serde(default = "Vec::new")]
  pub results: Vec<T>,
  /// "OK", "DELAYED", or "ERROR".
  pub status: Option<String>,
  /// Provider message on errors.
  pub message: Option<String>,
  pub error: Option<String>,
}

/// Single-object `{"results": {...}}` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectResponse<T> {
  pub results: Option<T>,
}

// ── Universal snapshot ──────────────────────────────────

/// One entry of `/v3/snapshot`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotEntry {
  pub ticker: Option<String>,
  /// Set instead of data when the symbol could not be served.
  pub error: Option<String>,
  pub message: Option<String>,
  pub session: Option<SnapshotSession>,
  pub last_trade: Option<SnapshotTrade>,
  pub last_quote: Option<SnapshotQuote>,
  /// Index value.
  pub value: Option<f64>,
  pub price: Option<f64>,
  pub open: Option<f64>,
  pub high: Option<f64>,
  pub low: Option<f64>,
  pub volume: Option<f64>,
  pub change: Option<f64>,
  pub change_percent: Option<f64>,
}

/// Day session aggregates inside a snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotSession {
  pub price: Option<f64>,
  pub open: Option<f64>,
  pub high: Option<f64>,
  pub low: Option<f64>,
  pub close: Option<f64>,
  pub volume: Option<f64>,
  pub change: Option<f64>,
  pub change_percent: Option<f64>,
  pub previous_close: Option<f64>,
  pub early_trading_change: Option<f64>,
  pub early_trading_change_percent: Option<f64>,
  pub late_trading_change: Option<f64>,
  pub late_trading_change_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotTrade {
  #[serde(alias = "p")]
  pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotQuote {
  #[serde(alias = "P")]
  pub ask: Option<f64>,
  #[serde(alias = "p")]
  pub bid: Option<f64>,
}

// ── Aggregates ─────────────────────────────────────────

/// One bar of `/v2/aggs`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct AggBar {
  #[serde(rename = "o")]
  pub open: Option<f64>,
  #[serde(rename = "h")]
  pub high: Option<f64>,
  #[serde(rename = "l")]
  pub low: Option<f64>,
  #[serde(rename = "c")]
  pub close: Option<f64>,
  #[serde(rename = "v")]
  pub volume: Option<f64>,
  /// Bar start, Unix milliseconds.
  #[serde(rename = "t")]
  pub timestamp: Option<i64>,
}

// ── Market status ──────────────────────────────────────

/// `/v1/marketstatus/now`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketStatusResponse {
  /// "open", "closed", "extended-hours".
  pub market: Option<String>,
  #[serde(rename = "indicesGroups", alias = "indices_groups", default)]
  pub indices_groups: BTreeMap<String, serde_json::Value>,
}

// ── Economy ────────────────────────────────────────────

/// One row of `/fed/v1/labor-market`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LaborRow {
  pub date: Option<String>,
  pub unemployment_rate: Option<f64>,
  pub labor_force_participation_rate: Option<f64>,
  pub avg_hourly_earnings: Option<f64>,
}

/// One row of `/fed/v1/inflation`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InflationRow {
  pub date: Option<String>,
  pub cpi: Option<f64>,
  pub cpi_core: Option<f64>,
}

// ── Reference ──────────────────────────────────────────

/// `/v3/reference/tickers/{ticker}` results object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TickerDetailsResult {
  pub market_cap: Option<f64>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_snapshot_entry_deserialize() {
    let json = r#"{
      "results": [
        {"ticker": "AAPL", "type": "stocks",
         "session": {"close": 190.5, "change": 1.5, "change_percent": 0.79, "volume": 1000.0},
         "last_trade": {"price": 190.4}},
        {"ticker": "NOPE", "error": "NOT_FOUND", "message": "Ticker not found."}
      ],
      "status": "OK"
    }"#;
    let resp: ListResponse<SnapshotEntry> = serde_json::from_str(json).unwrap();
    assert_eq!(resp.results.len(), 2);
    assert_eq!(resp.results[0].session.as_ref().unwrap().close, Some(190.5));
    assert_eq!(resp.results[1].error.as_deref(), Some("NOT_FOUND"));
  }

  #[test]
  fn test_missing_results_is_empty() {
    let resp: ListResponse<AggBar> =
      serde_json::from_str(r#"{"status": "OK", "resultsCount": 0}"#).unwrap();
    assert!(resp.results.is_empty());
  }

  #[test]
  fn test_market_status_groups() {
    let json = r#"{"market": "open", "indicesGroups": {"s_and_p": "open", "nasdaq": "closed"}}"#;
    let status: MarketStatusResponse = serde_json::from_str(json).unwrap();
    assert_eq!(status.market.as_deref(), Some("open"));
    assert_eq!(status.indices_groups.len(), 2);
  }
}
