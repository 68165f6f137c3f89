//! Telemetry Port - Feed Health Counters
//!
//! Lets use cases report feed activity without depending on a metrics
//! backend. The Prometheus adapter implements it; tests use the no-op.

use crate::domain::ticker::AssetClass;

/// Outcome label for one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Full,
    Partial,
    Empty,
    Failed,
    RateLimited,
    Discarded,
    Skipped,
}

impl PollOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Partial => "partial",
            Self::Empty => "empty",
            Self::Failed => "failed",
            Self::RateLimited => "rate_limited",
            Self::Discarded => "discarded",
            Self::Skipped => "skipped",
        }
    }
}

pub trait FeedTelemetry: Send + Sync + 'static {
    fn poll_cycle(&self, class: AssetClass, outcome: PollOutcome);

    fn stream_connected(&self, class: AssetClass, connected: bool);

    fn reconnect_attempt(&self, class: AssetClass);

    /// A streamed tick was applied (`true`) or discarded as unknown.
    fn tick(&self, class: AssetClass, applied: bool);

    fn rate_limited(&self, limited: bool);
}

/// Telemetry sink that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl FeedTelemetry for NoopTelemetry {
    fn poll_cycle(&self, _class: AssetClass, _outcome: PollOutcome) {}
    fn stream_connected(&self, _class: AssetClass, _connected: bool) {}
    fn reconnect_attempt(&self, _class: AssetClass) {}
    fn tick(&self, _class: AssetClass, _applied: bool) {}
    fn rate_limited(&self, _limited: bool) {}
}
