//! Metrics and Monitoring Adapters
//!
//! Prometheus feed metrics plus health endpoints (/live, /ready,
//! /metrics) served by axum 0.7.

pub mod health;
pub mod prometheus;

pub use health::{HealthServer, HealthState};
pub use prometheus::MetricsRegistry;
