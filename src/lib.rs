//! tickerwatch - Library Root
//!
//! Live market dashboard engine for the Massive API: stocks, indices,
//! and crypto kept current through REST polling and WebSocket streams,
//! plus treasury yields and economy indicators.
//!
//! Re-exports all modules for integration tests and benchmarks.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
