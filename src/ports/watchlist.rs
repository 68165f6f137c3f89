//! Watchlist Port - Active Watchlist Source

use crate::domain::watchlist::Watchlist;

/// Supplies the active watchlist and cycles to the next one.
pub trait WatchlistSource: Send + Sync + 'static {
    /// Currently selected watchlist.
    fn current(&self) -> anyhow::Result<Watchlist>;

    /// Select the next watchlist and return it.
    ///
    /// Errors when the next candidate has no tickers; the selection is
    /// left unchanged in that case.
    fn advance(&self) -> anyhow::Result<Watchlist>;
}
