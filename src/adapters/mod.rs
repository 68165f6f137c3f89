//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP, WebSockets, file I/O, Prometheus).
//!
//! Adapter categories:
//! - `api`: Massive REST client, payload normalization, provider
//! - `feeds`: Massive WebSocket streams
//! - `metrics`: Prometheus metrics and health endpoints
//! - `persistence`: Plan and economy caches as atomic JSON files
//! - `render`: Dashboard renderers

pub mod api;
pub mod feeds;
pub mod metrics;
pub mod persistence;
pub mod render;
