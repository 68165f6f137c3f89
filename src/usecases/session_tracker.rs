//! Session Tracker - Market Open/Close State Machine
//!
//! Re-evaluates the equity session on a fixed cadence from an injected
//! clock and the trading calendar, optionally overridden by the venue's
//! market-status endpoint (holidays, early closes). Emits transition
//! events the orchestrator turns into stream starts, stops, and polls.
//!
//! The post-close grace window is a monotonic deadline checked on every
//! orchestrator tick, so a delayed stream lives for exactly the grace
//! duration after the close is observed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::domain::capability::CapabilityTier;
use crate::domain::clock::Clock;
use crate::domain::session::{FeedPhase, SessionState, TradingCalendar};
use crate::domain::ticker::AssetClass;

/// Session check timing.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How often the session is re-evaluated.
    pub check_interval: Duration,
    /// How long a delayed stream keeps running after the close.
    pub grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            grace: Duration::from_secs(15 * 60),
        }
    }
}

/// Session transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Entered the regular session: start streams, poll now.
    Opened,
    /// Left the regular session: poll now. Streams stop immediately
    /// when `grace_until` is `None`, otherwise at the deadline.
    Closed { grace_until: Option<Instant> },
    /// The grace deadline passed: stop streams, poll now.
    GraceExpired,
}

/// Tracks the equity session and the post-close grace window.
pub struct SessionTracker {
    calendar: TradingCalendar,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    session: SessionState,
    /// Regular session observed and not yet fully wound down.
    was_open: bool,
    grace_until: Option<Instant>,
    last_check: Option<Instant>,
}

impl SessionTracker {
    pub fn new(calendar: TradingCalendar, clock: Arc<dyn Clock>, config: SessionConfig) -> Self {
        Self {
            calendar,
            clock,
            config,
            session: SessionState::Closed,
            was_open: false,
            grace_until: None,
            last_check: None,
        }
    }

    /// A session check is due.
    pub fn due(&self) -> bool {
        let now = self.clock.now();
        self.last_check
            .is_none_or(|last| now.saturating_duration_since(last) >= self.config.check_interval)
    }

    /// Re-evaluate the session.
    ///
    /// `market_open` is the venue's own status when it was available.
    /// `all_real_time` decides whether a close starts a grace window.
    pub fn observe(&mut self, market_open: Option<bool>, all_real_time: bool) -> Option<SessionEvent> {
        let now = self.clock.now();
        self.last_check = Some(now);

        let calendar = self.calendar.session_at(self.clock.now_utc());
        let open = market_open.unwrap_or(calendar == SessionState::Regular);
        self.session = match (open, calendar) {
            (true, _) => SessionState::Regular,
            (false, SessionState::Regular) => SessionState::Closed,
            (false, other) => other,
        };

        if open && !self.was_open {
            self.was_open = true;
            self.grace_until = None;
            info!(session = %self.session, "Market opened");
            return Some(SessionEvent::Opened);
        }

        if !open && self.was_open && self.grace_until.is_none() {
            if all_real_time {
                self.was_open = false;
                info!(session = %self.session, "Market closed, real-time feeds stop now");
                return Some(SessionEvent::Closed { grace_until: None });
            }
            let deadline = now + self.config.grace;
            self.grace_until = Some(deadline);
            info!(
                session = %self.session,
                grace_secs = self.config.grace.as_secs(),
                "Market closed, delayed feeds drain during grace"
            );
            return Some(SessionEvent::Closed {
                grace_until: Some(deadline),
            });
        }

        None
    }

    /// Check the grace deadline. Call on every orchestrator tick.
    pub fn tick_grace(&mut self) -> Option<SessionEvent> {
        let deadline = self.grace_until?;
        if self.clock.now() < deadline {
            return None;
        }
        self.grace_until = None;
        self.was_open = false;
        info!("Grace window expired");
        Some(SessionEvent::GraceExpired)
    }

    pub const fn session(&self) -> SessionState {
        self.session
    }

    pub const fn is_open(&self) -> bool {
        matches!(self.session, SessionState::Regular)
    }

    pub const fn in_grace(&self) -> bool {
        self.grace_until.is_some()
    }

    /// Equities and indices should be polled: open, draining, or in
    /// pre-market / after-hours.
    pub const fn equities_active(&self) -> bool {
        self.is_open() || self.in_grace() || self.session.is_extended()
    }

    /// Channel that should drive `class` right now.
    pub fn phase(&self, class: AssetClass, tier: CapabilityTier) -> FeedPhase {
        if !class.follows_session() {
            return if tier.has_streaming() {
                FeedPhase::Streaming
            } else {
                FeedPhase::Polling
            };
        }
        FeedPhase::resolve(self.session, tier, self.in_grace())
    }

    /// Forget transitions, as after a watchlist switch.
    pub fn reset(&mut self) {
        self.was_open = false;
        self.grace_until = None;
        self.last_check = None;
    }
}
