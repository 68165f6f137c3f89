//! Snapshot Normalization
//!
//! The one place provider payloads become `TickerRecord`s. Stocks carry
//! a day `session`; indices report a bare `value`; thinly traded symbols
//! may only have a last trade or quote.

use crate::domain::ticker::{Bar, ExtendedChange, ExtendedSession, TickerRecord};

use super::types::{AggBar, SnapshotEntry};

/// Convert one snapshot entry. `None` for error entries and entries
/// without a ticker.
pub fn snapshot_to_record(entry: &SnapshotEntry) -> Option<TickerRecord> {
    if entry.error.is_some() {
        return None;
    }
    let symbol = entry.ticker.as_deref().filter(|t| !t.is_empty())?;
    let mut record = TickerRecord::new(symbol);

    if let Some(session) = &entry.session {
        record.last = session.close.or(session.price);
        record.open = session.open;
        record.high = session.high;
        record.low = session.low;
        record.volume = session.volume;
        record.change = session.change;
        record.change_pct = session.change_percent;
        record.prev_close = session.previous_close;
        if record.prev_close.is_none() {
            if let (Some(last), Some(change)) = (record.last, record.change) {
                record.prev_close = Some(last - change);
            }
        }

        record.extended = extended_change(
            ExtendedSession::AfterHours,
            session.late_trading_change,
            session.late_trading_change_percent,
        )
        .or_else(|| {
            extended_change(
                ExtendedSession::PreMarket,
                session.early_trading_change,
                session.early_trading_change_percent,
            )
        });
    } else {
        record.last = entry.value.or(entry.price);
        record.open = entry.open;
        record.high = entry.high;
        record.low = entry.low;
        record.volume = entry.volume;
        record.change = entry.change;
        record.change_pct = entry.change_percent;
    }

    if record.last.is_none() {
        record.last = entry.last_trade.as_ref().and_then(|t| t.price);
    }
    if record.last.is_none() {
        record.last = entry.last_quote.as_ref().and_then(|q| match (q.ask, q.bid) {
            (Some(ask), Some(bid)) if ask > 0.0 && bid > 0.0 => Some((ask + bid) / 2.0),
            _ => None,
        });
    }
    if record.last.is_none() {
        record.last = entry.price.or(entry.value);
    }

    if record.change.is_none() {
        record.recompute_change();
    }
    Some(record)
}

fn extended_change(
    session: ExtendedSession,
    change: Option<f64>,
    change_pct: Option<f64>,
) -> Option<ExtendedChange> {
    if change.is_none() && change_pct.is_none() {
        return None;
    }
    Some(ExtendedChange {
        session,
        change,
        change_pct,
    })
}

/// Convert an aggregate bar.
pub const fn agg_to_bar(agg: &AggBar) -> Bar {
    Bar {
        open: agg.open,
        high: agg.high,
        low: agg.low,
        close: agg.close,
        volume: agg.volume,
        timestamp_ms: agg.timestamp,
    }
}
