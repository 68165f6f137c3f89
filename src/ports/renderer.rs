//! Renderer Port - Read-only Dashboard Consumer
//!
//! `DashboardView` is a point-in-time copy of the shared market state.
//! Renderers never see the live tables and cannot mutate them.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::capability::PlanCapability;
use crate::domain::economy::EconomySnapshot;
use crate::domain::session::SessionState;
use crate::domain::ticker::{AssetClass, TickerRecord};
use crate::ports::market_data::TickerDetails;

/// Freshness of one asset-class table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassStatus {
    pub last_updated: Option<DateTime<Utc>>,
    pub stale: bool,
    pub error: Option<String>,
}

/// Consistent snapshot handed to renderers.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub watchlist_name: String,
    pub generation: u64,
    /// Tables in watchlist order, indexed by [`AssetClass::index`].
    pub tables: [Vec<TickerRecord>; 3],
    pub status: [ClassStatus; 3],
    pub plan: PlanCapability,
    pub session: SessionState,
    pub market_open: bool,
    pub extended_hours: bool,
    pub rate_limited: bool,
    /// At least one streaming connection is up.
    pub streaming: bool,
    pub economy: Option<EconomySnapshot>,
    pub economy_error: Option<String>,
    pub year_start_closes: HashMap<String, f64>,
    pub details: HashMap<String, TickerDetails>,
    pub indices_groups: BTreeMap<String, String>,
    /// Date of the newest crypto bar on the bar fallback.
    pub crypto_data_date: Option<NaiveDate>,
    /// Treasury keys to display, from the watchlist.
    pub treasury_keys: Vec<String>,
    /// Economy indicator keys to display, from the watchlist.
    pub economy_keys: Vec<String>,
    pub captured_at: DateTime<Utc>,
}

impl DashboardView {
    pub fn table(&self, class: AssetClass) -> &[TickerRecord] {
        &self.tables[class.index()]
    }

    pub fn class_status(&self, class: AssetClass) -> &ClassStatus {
        &self.status[class.index()]
    }

    /// YTD percent for a symbol, when both inputs are known.
    pub fn ytd_pct(&self, record: &TickerRecord) -> Option<f64> {
        record.ytd_pct(self.year_start_closes.get(&record.symbol).copied())
    }
}

/// Draws dashboard snapshots. Called twice per second.
pub trait Renderer: Send + Sync + 'static {
    fn render(&self, view: &DashboardView) -> anyhow::Result<()>;
}
