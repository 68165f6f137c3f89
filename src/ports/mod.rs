//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the use cases require from the
//! outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `MarketDataProvider`: REST snapshots, bars, status, economy
//! - `StreamConnector`: Streaming tick subscriptions
//! - `CapabilityStore` / `EconomyStore`: Small on-disk caches
//! - `FeedTelemetry`: Feed health counters
//! - `Renderer`: Read-only dashboard consumers
//! - `WatchlistSource`: Active watchlist selection

pub mod cache;
pub mod market_data;
pub mod renderer;
pub mod stream;
pub mod telemetry;
pub mod watchlist;
