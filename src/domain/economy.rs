//! Macro-economic indicators.
//!
//! Treasury yields, labor-market figures, and inflation change at most
//! daily, so they are fetched rarely and cached on disk. Each section
//! carries its own fetch timestamp so a partial refresh can mix fresh
//! and carried-over sections.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the three economy endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EconomyKind {
    Treasury,
    Labor,
    Inflation,
}

impl EconomyKind {
    /// Fetch order; calls are spaced to share one rate budget.
    pub const ALL: [Self; 3] = [Self::Treasury, Self::Labor, Self::Inflation];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Treasury => "Treasury",
            Self::Labor => "Labor",
            Self::Inflation => "Inflation",
        }
    }
}

/// Latest treasury yield curve row (percent).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreasuryYields {
    pub date: Option<String>,
    pub yield_1_month: Option<f64>,
    pub yield_3_month: Option<f64>,
    pub yield_6_month: Option<f64>,
    pub yield_1_year: Option<f64>,
    pub yield_2_year: Option<f64>,
    pub yield_5_year: Option<f64>,
    pub yield_10_year: Option<f64>,
    pub yield_30_year: Option<f64>,
}

/// Latest labor-market indicators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaborMarket {
    pub date: Option<String>,
    pub unemployment_rate: Option<f64>,
    pub participation_rate: Option<f64>,
    pub avg_hourly_earnings: Option<f64>,
}

/// One monthly inflation row as returned by the provider (newest first).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InflationRecord {
    pub date: Option<String>,
    pub cpi: Option<f64>,
    pub cpi_core: Option<f64>,
}

/// Current inflation readings plus year-over-year CPI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inflation {
    pub date: Option<String>,
    pub cpi: Option<f64>,
    pub cpi_core: Option<f64>,
    pub cpi_year_over_year: Option<f64>,
}

/// Months of history needed to compare against the same month last year.
pub const INFLATION_HISTORY: usize = 13;

impl Inflation {
    /// Summarize the newest-first monthly history.
    ///
    /// Year-over-year CPI needs 13 rows (current month plus the same
    /// month a year earlier); with fewer rows it stays `None`.
    pub fn from_history(records: &[InflationRecord]) -> Option<Self> {
        let current = records.first()?;
        let cpi_year_over_year = if records.len() >= INFLATION_HISTORY {
            match (current.cpi, records[INFLATION_HISTORY - 1].cpi) {
                (Some(now), Some(year_ago)) if year_ago != 0.0 => {
                    Some((now - year_ago) / year_ago * 100.0)
                }
                _ => None,
            }
        } else {
            None
        };

        Some(Self {
            date: current.date.clone(),
            cpi: current.cpi,
            cpi_core: current.cpi_core,
            cpi_year_over_year,
        })
    }
}

/// Provider response for one economy endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum EconomyRecord {
    Treasury(TreasuryYields),
    Labor(LaborMarket),
    Inflation(Vec<InflationRecord>),
}

/// A value with the time it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamped<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
}

/// Everything shown in the economy panels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomySnapshot {
    /// When the snapshot was assembled.
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub treasury: Option<Timestamped<TreasuryYields>>,
    #[serde(default)]
    pub labor: Option<Timestamped<LaborMarket>>,
    #[serde(default)]
    pub inflation: Option<Timestamped<Inflation>>,
    /// Sections whose last refresh failed and still show older data.
    #[serde(default)]
    pub stale: BTreeSet<EconomyKind>,
}

impl EconomySnapshot {
    /// Empty snapshot stamped at `fetched_at`.
    pub fn empty(fetched_at: DateTime<Utc>) -> Self {
        Self {
            fetched_at,
            treasury: None,
            labor: None,
            inflation: None,
            stale: BTreeSet::new(),
        }
    }

    /// Usable iff fetched at or after the most recent regular close.
    pub fn is_fresh(&self, last_close: DateTime<Utc>) -> bool {
        self.fetched_at >= last_close
    }

    /// Whether every section refreshed successfully.
    pub fn is_complete(&self) -> bool {
        self.stale.is_empty()
            && self.treasury.is_some()
            && self.labor.is_some()
            && self.inflation.is_some()
    }

    /// Store a successful fetch for one section.
    pub fn apply(&mut self, record: EconomyRecord, at: DateTime<Utc>) {
        match record {
            EconomyRecord::Treasury(value) => {
                self.treasury = Some(Timestamped { value, fetched_at: at });
                self.stale.remove(&EconomyKind::Treasury);
            }
            EconomyRecord::Labor(value) => {
                self.labor = Some(Timestamped { value, fetched_at: at });
                self.stale.remove(&EconomyKind::Labor);
            }
            EconomyRecord::Inflation(history) => {
                if let Some(value) = Inflation::from_history(&history) {
                    self.inflation = Some(Timestamped { value, fetched_at: at });
                    self.stale.remove(&EconomyKind::Inflation);
                } else {
                    self.stale.insert(EconomyKind::Inflation);
                }
            }
        }
    }
}
