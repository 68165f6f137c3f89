//! Prometheus Metrics Registry - Feed Observability
//!
//! Implements the `FeedTelemetry` port with Prometheus counters and
//! gauges. All metrics are named `tickerwatch_*` and carry a `class`
//! label where they are per asset class.

use prometheus::{
    Encoder, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::domain::ticker::AssetClass;
use crate::ports::telemetry::{FeedTelemetry, PollOutcome};

/// Centralized Prometheus metrics for the feed engine.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Poll cycles by class and outcome.
    pub poll_cycles: IntCounterVec,
    /// Stream connection status (1 = connected, 0 = disconnected).
    pub stream_connected: IntGaugeVec,
    /// Reconnect attempts after a dropped or failed stream.
    pub reconnect_attempts: IntCounterVec,
    /// Streamed ticks applied to a known record.
    pub ticks_applied: IntCounterVec,
    /// Streamed ticks for symbols not in the table.
    pub ticks_discarded: IntCounterVec,
    /// Sticky rate-limit indicator (1 = limited).
    pub rate_limited: IntGauge,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let poll_cycles = IntCounterVec::new(
            Opts::new("tickerwatch_poll_cycles_total", "REST poll cycles by outcome"),
            &["class", "outcome"],
        )?;

        let stream_connected = IntGaugeVec::new(
            Opts::new(
                "tickerwatch_stream_connected",
                "Stream connection status (1=connected, 0=disconnected)",
            ),
            &["class"],
        )?;

        let reconnect_attempts = IntCounterVec::new(
            Opts::new("tickerwatch_stream_reconnects_total", "Stream reconnect attempts"),
            &["class"],
        )?;

        let ticks_applied = IntCounterVec::new(
            Opts::new("tickerwatch_ticks_applied_total", "Streamed ticks applied"),
            &["class"],
        )?;

        let ticks_discarded = IntCounterVec::new(
            Opts::new(
                "tickerwatch_ticks_discarded_total",
                "Streamed ticks for unknown symbols",
            ),
            &["class"],
        )?;

        let rate_limited = IntGauge::new(
            "tickerwatch_rate_limited",
            "Whether the provider is rate limiting requests (1=yes, 0=no)",
        )?;

        registry.register(Box::new(poll_cycles.clone()))?;
        registry.register(Box::new(stream_connected.clone()))?;
        registry.register(Box::new(reconnect_attempts.clone()))?;
        registry.register(Box::new(ticks_applied.clone()))?;
        registry.register(Box::new(ticks_discarded.clone()))?;
        registry.register(Box::new(rate_limited.clone()))?;

        Ok(Self {
            registry,
            poll_cycles,
            stream_connected,
            reconnect_attempts,
            ticks_applied,
            ticks_discarded,
            rate_limited,
        })
    }

    /// Text exposition of every registered metric.
    pub fn encode(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl FeedTelemetry for MetricsRegistry {
    fn poll_cycle(&self, class: AssetClass, outcome: PollOutcome) {
        self.poll_cycles
            .with_label_values(&[class.as_str(), outcome.as_str()])
            .inc();
    }

    fn stream_connected(&self, class: AssetClass, connected: bool) {
        self.stream_connected
            .with_label_values(&[class.as_str()])
            .set(i64::from(connected));
    }

    fn reconnect_attempt(&self, class: AssetClass) {
        self.reconnect_attempts.with_label_values(&[class.as_str()]).inc();
    }

    fn tick(&self, class: AssetClass, applied: bool) {
        let counter = if applied {
            &self.ticks_applied
        } else {
            &self.ticks_discarded
        };
        counter.with_label_values(&[class.as_str()]).inc();
    }

    fn rate_limited(&self, limited: bool) {
        self.rate_limited.set(i64::from(limited));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_updates_metrics() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.poll_cycle(AssetClass::Stocks, PollOutcome::Partial);
        metrics.poll_cycle(AssetClass::Stocks, PollOutcome::Partial);
        metrics.tick(AssetClass::Crypto, false);
        metrics.stream_connected(AssetClass::Indices, true);
        metrics.rate_limited(true);

        assert_eq!(
            metrics
                .poll_cycles
                .with_label_values(&["stocks", "partial"])
                .get(),
            2
        );
        assert_eq!(metrics.ticks_discarded.with_label_values(&["crypto"]).get(), 1);
        assert_eq!(metrics.rate_limited.get(), 1);

        let text = metrics.encode().unwrap();
        assert!(text.contains("tickerwatch_stream_connected{class=\"indices\"} 1"));
    }
}
