//! Use Cases Layer - Application Workflows
//!
//! Wires domain logic to the port interfaces. Each use case owns one
//! concern and talks to the others only through `MarketState`.
//!
//! Use cases:
//! - `MarketState`: Shared per-class ticker tables and scalar flags
//! - `CapabilityRegistry`: Plan tier detection and caching
//! - `SessionTracker`: Market session state machine and grace window
//! - `PollScheduler`: Single-flight REST refresh with rate-limit pacing
//! - `StreamManager`: WebSocket reconnect loops
//! - `EconomyCache`: Treasury, labor, and inflation snapshot
//! - `ReferenceData`: Year-start closes and ticker details
//! - `Orchestrator`: The coordinating run loop

pub mod capability_registry;
pub mod economy_cache;
pub mod market_state;
pub mod orchestrator;
pub mod poll_scheduler;
pub mod reference_data;
pub mod session_tracker;
pub mod stream_manager;
