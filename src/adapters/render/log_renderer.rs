//! Log Renderer - Dashboard State as Structured Log Lines
//!
//! Headless renderer: summarizes each dashboard snapshot as one `info!`
//! line, throttled so the twice-per-second render cadence does not
//! flood the log. Individual rows go out at `debug`.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::domain::ticker::AssetClass;
use crate::ports::renderer::{DashboardView, Renderer};

/// Logs dashboard snapshots at most once per `every`.
pub struct LogRenderer {
    every: Duration,
    last: Mutex<Option<Instant>>,
}

impl LogRenderer {
    pub fn new(every: Duration) -> Self {
        Self {
            every,
            last: Mutex::new(None),
        }
    }

    fn due(&self) -> bool {
        let now = Instant::now();
        let mut last = self.last.lock();
        if last.is_some_and(|t| now.duration_since(t) < self.every) {
            return false;
        }
        *last = Some(now);
        true
    }
}

impl Renderer for LogRenderer {
    fn render(&self, view: &DashboardView) -> anyhow::Result<()> {
        if !self.due() {
            return Ok(());
        }

        let count = |c: AssetClass| view.table(c).len();
        let stale: Vec<&str> = AssetClass::ALL
            .into_iter()
            .filter(|c| view.class_status(*c).stale)
            .map(AssetClass::as_str)
            .collect();

        info!(
            watchlist = %view.watchlist_name,
            session = %view.session,
            market_open = view.market_open,
            streaming = view.streaming,
            rate_limited = view.rate_limited,
            stocks = count(AssetClass::Stocks),
            indices = count(AssetClass::Indices),
            crypto = count(AssetClass::Crypto),
            stale = ?stale,
            economy = view.economy.is_some(),
            "Dashboard"
        );

        for class in AssetClass::ALL {
            if let Some(error) = &view.class_status(class).error {
                debug!(class = %class, error = %error, "Class error");
            }
            for record in view.table(class) {
                debug!(
                    class = %class,
                    symbol = %record.symbol,
                    last = ?record.last,
                    change_pct = ?record.change_pct,
                    ytd_pct = ?view.ytd_pct(record),
                    "Row"
                );
            }
        }
        if let Some(error) = &view.economy_error {
            debug!(error = %error, "Economy error");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_is_throttled() {
        let renderer = LogRenderer::new(Duration::from_secs(60));
        assert!(renderer.due());
        assert!(!renderer.due());

        let eager = LogRenderer::new(Duration::ZERO);
        assert!(eager.due());
        assert!(eager.due());
    }
}
