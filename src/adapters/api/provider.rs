//! Massive Market Data Provider
//!
//! Implements the `MarketDataProvider` port on top of `MassiveClient`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::domain::economy::{
    EconomyKind, EconomyRecord, INFLATION_HISTORY, InflationRecord, LaborMarket, TreasuryYields,
};
use crate::domain::ticker::{AssetClass, Bar, TickerRecord};
use crate::ports::market_data::{
    MarketDataProvider, MarketStatus, ProviderError, ProviderResult, TickerDetails, Timespan,
};

use super::client::MassiveClient;
use super::normalize::{agg_to_bar, snapshot_to_record};
use super::types::{
    AggBar, InflationRow, LaborRow, ListResponse, MarketStatusResponse, ObjectResponse,
    SnapshotEntry, TickerDetailsResult,
};

/// Most symbols one snapshot call may request.
pub const MAX_SNAPSHOT_SYMBOLS: usize = 250;

/// REST provider for the Massive API.
pub struct MassiveProvider {
    client: Arc<MassiveClient>,
}

impl MassiveProvider {
    pub const fn new(client: Arc<MassiveClient>) -> Self {
        Self { client }
    }

    async fn latest_row<T: serde::de::DeserializeOwned>(&self, path: &str) -> ProviderResult<T> {
        let resp: ListResponse<T> = self
            .client
            .get_json(path, &[("sort", "date.desc".to_string()), ("limit", "1".to_string())])
            .await?;
        resp.results
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Decode(format!("{path}: empty results")))
    }
}

/// Query for one snapshot call over at most [`MAX_SNAPSHOT_SYMBOLS`] symbols.
fn snapshot_query(symbols: &[String]) -> [(&'static str, String); 2] {
    [
        ("ticker.any_of", symbols.join(",")),
        ("limit", symbols.len().to_string()),
    ]
}

#[async_trait]
impl MarketDataProvider for MassiveProvider {
    async fn fetch_batch_snapshot(&self, symbols: &[String]) -> ProviderResult<Vec<TickerRecord>> {
        let mut records = Vec::with_capacity(symbols.len());
        for chunk in symbols.chunks(MAX_SNAPSHOT_SYMBOLS) {
            let resp: ListResponse<SnapshotEntry> =
                match self.client.get_json("/v3/snapshot", &snapshot_query(chunk)).await {
                    Ok(resp) => resp,
                    // Later chunks failing leave a partial batch for the merge.
                    Err(e) if !records.is_empty() => {
                        warn!(error = %e, received = records.len(), "Snapshot chunk failed");
                        break;
                    }
                    Err(e) => return Err(e),
                };
            records.extend(resp.results.iter().filter_map(snapshot_to_record));
        }
        debug!(requested = symbols.len(), received = records.len(), "Snapshot fetched");
        Ok(records)
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        timespan: Timespan,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ProviderResult<Vec<Bar>> {
        let path = format!(
            "/v2/aggs/ticker/{symbol}/range/1/{}/{}/{}",
            timespan.as_str(),
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d"),
        );
        let resp: ListResponse<AggBar> = self
            .client
            .get_json(
                &path,
                &[
                    ("adjusted", "true".to_string()),
                    ("sort", "asc".to_string()),
                ],
            )
            .await?;
        Ok(resp.results.iter().map(agg_to_bar).collect())
    }

    async fn fetch_market_status(&self) -> ProviderResult<MarketStatus> {
        let resp: MarketStatusResponse = self.client.get_json("/v1/marketstatus/now", &[]).await?;
        let indices_groups = resp
            .indices_groups
            .into_iter()
            .filter_map(|(group, value)| value.as_str().map(|s| (group, s.to_string())))
            .collect();
        Ok(MarketStatus {
            market_is_open: resp.market.as_deref() == Some("open"),
            indices_groups,
        })
    }

    async fn fetch_economy(&self, kind: EconomyKind) -> ProviderResult<EconomyRecord> {
        match kind {
            EconomyKind::Treasury => {
                let row: TreasuryYields = self.latest_row("/fed/v1/treasury-yields").await?;
                Ok(EconomyRecord::Treasury(row))
            }
            EconomyKind::Labor => {
                let row: LaborRow = self.latest_row("/fed/v1/labor-market").await?;
                Ok(EconomyRecord::Labor(LaborMarket {
                    date: row.date,
                    unemployment_rate: row.unemployment_rate,
                    participation_rate: row.labor_force_participation_rate,
                    avg_hourly_earnings: row.avg_hourly_earnings,
                }))
            }
            EconomyKind::Inflation => {
                let resp: ListResponse<InflationRow> = self
                    .client
                    .get_json(
                        "/fed/v1/inflation",
                        &[
                            ("sort", "date.desc".to_string()),
                            ("limit", INFLATION_HISTORY.to_string()),
                        ],
                    )
                    .await?;
                let history = resp
                    .results
                    .into_iter()
                    .take(INFLATION_HISTORY)
                    .map(|r| InflationRecord {
                        date: r.date,
                        cpi: r.cpi,
                        cpi_core: r.cpi_core,
                    })
                    .collect();
                Ok(EconomyRecord::Inflation(history))
            }
        }
    }

    async fn probe_capability(&self, class: AssetClass) -> ProviderResult<bool> {
        match self.fetch_batch_snapshot(&[class.seed_symbol().to_string()]).await {
            Ok(records) => Ok(!records.is_empty()),
            Err(ProviderError::Entitlement(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn fetch_ticker_details(&self, symbol: &str) -> ProviderResult<TickerDetails> {
        let resp: ObjectResponse<TickerDetailsResult> = self
            .client
            .get_json(&format!("/v3/reference/tickers/{symbol}"), &[])
            .await?;
        Ok(TickerDetails {
            market_cap: resp.results.and_then(|r| r.market_cap),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_large_watchlists_are_split_across_snapshot_calls() {
        let symbols: Vec<String> = (0..600).map(|i| format!("S{i:03}")).collect();
        let queries: Vec<_> = symbols.chunks(MAX_SNAPSHOT_SYMBOLS).map(snapshot_query).collect();
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[0][1].1, "250");
        assert_eq!(queries[2][1].1, "100");

        let requested: Vec<&str> = queries
            .iter()
            .flat_map(|[(_, tickers), _]| tickers.split(','))
            .collect();
        let expected: Vec<&str> = symbols.iter().map(String::as_str).collect();
        assert_eq!(requested, expected);
    }
}
