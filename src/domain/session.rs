//! Market sessions and feed phases.
//!
//! Sessions are computed from exchange-local time windows on weekdays.
//! The feed phase combines the session with the plan tier and the
//! post-close grace window to decide whether a stream should be live.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use super::capability::CapabilityTier;

/// Equity market session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    PreMarket,
    Regular,
    AfterHours,
    Closed,
}

impl SessionState {
    /// Pre-market or after-hours.
    pub const fn is_extended(self) -> bool {
        matches!(self, Self::PreMarket | Self::AfterHours)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PreMarket => "pre_market",
            Self::Regular => "regular",
            Self::AfterHours => "after_hours",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Which channel should be driving an asset class right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    /// Regular session with a streaming-capable plan.
    Streaming,
    /// Interval polling only.
    Polling,
    /// Post-close window where a delayed stream drains final ticks.
    GracePolling,
}

impl FeedPhase {
    /// Resolve the phase for one class.
    pub fn resolve(session: SessionState, tier: CapabilityTier, in_grace: bool) -> Self {
        if !tier.has_streaming() {
            return Self::Polling;
        }
        if session == SessionState::Regular {
            Self::Streaming
        } else if in_grace && !tier.is_real_time() {
            Self::GracePolling
        } else {
            Self::Polling
        }
    }

    /// Whether a streaming connection should be held open.
    pub const fn keeps_stream(self) -> bool {
        matches!(self, Self::Streaming | Self::GracePolling)
    }
}

/// Weekday trading windows in exchange-local time.
#[derive(Debug, Clone, Copy)]
pub struct TradingCalendar {
    tz: Tz,
    pre_open: NaiveTime,
    open: NaiveTime,
    close: NaiveTime,
    after_close: NaiveTime,
}

impl Default for TradingCalendar {
    /// NYSE / NASDAQ: pre-market 04:00, regular 09:30–16:00, after-hours until 20:00.
    fn default() -> Self {
        Self::new(chrono_tz::America::New_York, hm(4, 0), hm(9, 30), hm(16, 0), hm(20, 0))
    }
}

impl TradingCalendar {
    pub const fn new(
        tz: Tz,
        pre_open: NaiveTime,
        open: NaiveTime,
        close: NaiveTime,
        after_close: NaiveTime,
    ) -> Self {
        Self {
            tz,
            pre_open,
            open,
            close,
            after_close,
        }
    }

    /// Session in effect at `now`.
    pub fn session_at(&self, now: DateTime<Utc>) -> SessionState {
        let local = now.with_timezone(&self.tz);
        if is_weekend(local.weekday()) {
            return SessionState::Closed;
        }

        let t = local.time();
        if t >= self.open && t < self.close {
            SessionState::Regular
        } else if t >= self.pre_open && t < self.open {
            SessionState::PreMarket
        } else if t >= self.close && t < self.after_close {
            SessionState::AfterHours
        } else {
            SessionState::Closed
        }
    }

    /// Most recent completed regular-session close at or before `now`.
    pub fn last_regular_close(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.tz);
        let mut date = local.date_naive();

        let closed_today = !is_weekend(date.weekday()) && local.time() >= self.close;
        if !closed_today {
            date = previous_day(date);
            while is_weekend(date.weekday()) {
                date = previous_day(date);
            }
        }

        self.tz
            .from_local_datetime(&date.and_time(self.close))
            .earliest()
            .map_or(now, |dt| dt.with_timezone(&Utc))
    }
}

fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

fn previous_day(date: NaiveDate) -> NaiveDate {
    date.pred_opt().unwrap_or(date)
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    fn et(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        New_York
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_weekday_windows() {
        let cal = TradingCalendar::default();
        // 2024-03-12 is a Tuesday.
        assert_eq!(cal.session_at(et(2024, 3, 12, 3, 59)), SessionState::Closed);
        assert_eq!(cal.session_at(et(2024, 3, 12, 4, 0)), SessionState::PreMarket);
        assert_eq!(cal.session_at(et(2024, 3, 12, 9, 30)), SessionState::Regular);
        assert_eq!(cal.session_at(et(2024, 3, 12, 15, 59)), SessionState::Regular);
        assert_eq!(cal.session_at(et(2024, 3, 12, 16, 0)), SessionState::AfterHours);
        assert_eq!(cal.session_at(et(2024, 3, 12, 20, 0)), SessionState::Closed);
    }

    #[test]
    fn test_weekend_is_closed() {
        let cal = TradingCalendar::default();
        assert_eq!(cal.session_at(et(2024, 3, 16, 12, 0)), SessionState::Closed);
    }

    #[test]
    fn test_last_close_same_day_after_close() {
        let cal = TradingCalendar::default();
        assert_eq!(cal.last_regular_close(et(2024, 3, 12, 17, 0)), et(2024, 3, 12, 16, 0));
    }

    #[test]
    fn test_last_close_before_close_is_previous_weekday() {
        let cal = TradingCalendar::default();
        // Monday morning → previous Friday.
        assert_eq!(cal.last_regular_close(et(2024, 3, 11, 10, 0)), et(2024, 3, 8, 16, 0));
        // Sunday → Friday.
        assert_eq!(cal.last_regular_close(et(2024, 3, 10, 12, 0)), et(2024, 3, 8, 16, 0));
    }

    #[test]
    fn test_feed_phase_resolution() {
        use CapabilityTier::{Polling, RealTime, Streaming};
        use SessionState::{AfterHours, Regular};
        assert_eq!(FeedPhase::resolve(Regular, Streaming, false), FeedPhase::Streaming);
        assert_eq!(FeedPhase::resolve(Regular, Polling, false), FeedPhase::Polling);
        assert_eq!(FeedPhase::resolve(AfterHours, Streaming, true), FeedPhase::GracePolling);
        assert_eq!(FeedPhase::resolve(AfterHours, RealTime, true), FeedPhase::Polling);
        assert_eq!(FeedPhase::resolve(AfterHours, Streaming, false), FeedPhase::Polling);
    }
}
