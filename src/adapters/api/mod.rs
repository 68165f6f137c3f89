//! Massive REST API Adapter
//!
//! Implements the `MarketDataProvider` port against the Massive
//! (formerly Polygon.io) REST API.
//!
//! Sub-modules:
//! - `client`: HTTP client with API-key auth and error classification
//! - `normalize`: Snapshot and bar payloads to domain records
//! - `provider`: The `MarketDataProvider` implementation
//! - `types`: API response type definitions

pub mod client;
pub mod normalize;
pub mod provider;
pub mod types;

pub use client::{MassiveClient, MassiveClientConfig};
pub use provider::MassiveProvider;
