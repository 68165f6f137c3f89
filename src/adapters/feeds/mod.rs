//! Streaming Feed Adapters
//!
//! - `massive_ws`: Massive WebSocket aggregates and index values

pub mod massive_ws;

pub use massive_ws::{MassiveConnector, MassiveWsConfig};
