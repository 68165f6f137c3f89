//! Renderer Adapters
//!
//! - `log_renderer`: headless dashboard summaries through `tracing`

pub mod log_renderer;

pub use log_renderer::LogRenderer;
