//! Configuration Module - TOML-based Engine Configuration
//!
//! Loads and validates configuration from `config.toml`. Every field
//! has a default, so a missing file or section still yields a usable
//! configuration. Secrets never live here: the API key comes from the
//! environment (`MASSIVE_API_KEY`, optionally via `.env`).

pub mod loader;
pub mod watchlist;

use std::time::Duration;

use anyhow::{Result, bail};
use serde::{Deserialize, Deserializer};

use crate::adapters::api::MassiveClientConfig;
use crate::adapters::feeds::MassiveWsConfig;
use crate::usecases::economy_cache::EconomyConfig;
use crate::usecases::orchestrator::OrchestratorConfig;
use crate::usecases::poll_scheduler::PollConfig;
use crate::usecases::reference_data::ReferenceConfig;
use crate::usecases::session_tracker::SessionConfig;
use crate::usecases::stream_manager::StreamConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// Identity, logging, and file locations.
  pub app: AppSection,
  /// Poll cadences and rate-limit pacing.
  pub refresh: RefreshConfig,
  /// Massive endpoints.
  pub api: ApiConfig,
  /// Streaming reconnect and session timing.
  pub stream: StreamSection,
  /// Economy fetch pacing.
  pub economy: EconomySection,
  /// Metrics and health endpoints.
  pub metrics: MetricsConfig,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
  Json,
  #[default]
  Compact,
}

/// Identity and file locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
  /// Human-readable name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  pub log_level: String,
  pub log_format: LogFormat,
  /// Directory scanned for `*.txt` watchlists.
  pub watchlist_dir: String,
  /// Directory holding `.plans.json` and `.econ_cache.json`.
  pub cache_dir: String,
  /// Minimum gap between dashboard summary log lines.
  #[serde(deserialize_with = "interval")]
  pub render_log_interval: Duration,
}

/// Poll cadences.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
  /// Base poll interval for snapshot-capable classes.
  #[serde(deserialize_with = "interval")]
  pub market_interval: Duration,
  #[serde(deserialize_with = "interval")]
  pub economy_interval: Duration,
  /// Crypto poll interval on the daily-bar fallback.
  #[serde(deserialize_with = "interval")]
  pub crypto_fallback_interval: Duration,
  #[serde(deserialize_with = "interval")]
  pub session_check_interval: Duration,
  /// Cadence multiplier while rate limited.
  pub rate_limit_multiplier: u32,
  #[serde(deserialize_with = "interval")]
  pub rate_limit_cap: Duration,
  /// Bar-mode budget per symbol.
  #[serde(deserialize_with = "interval")]
  pub per_symbol_spacing: Duration,
  #[serde(deserialize_with = "interval")]
  pub min_cycle_spacing: Duration,
  /// Pacing between calls inside one bar cycle.
  #[serde(deserialize_with = "interval")]
  pub call_spacing: Duration,
  /// Pacing between year-start and details calls.
  #[serde(deserialize_with = "interval")]
  pub reference_spacing: Duration,
}

/// Massive endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  /// REST API base URL.
  pub rest_url: String,
  /// Real-time WebSocket host.
  pub ws_realtime_url: String,
  /// Delayed WebSocket host.
  pub ws_delayed_url: String,
  /// Request timeout.
  #[serde(deserialize_with = "interval")]
  pub timeout: Duration,
  /// Maximum concurrent REST requests.
  pub max_concurrent: usize,
}

/// Stream timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamSection {
  #[serde(deserialize_with = "interval")]
  pub backoff_base: Duration,
  #[serde(deserialize_with = "interval")]
  pub backoff_max: Duration,
  /// Lifetime of a price-change highlight.
  #[serde(deserialize_with = "interval")]
  pub flash: Duration,
  /// How long a delayed stream drains after the close.
  #[serde(deserialize_with = "interval")]
  pub grace: Duration,
  #[serde(deserialize_with = "interval")]
  pub handshake_timeout: Duration,
}

/// Economy fetch pacing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EconomySection {
  #[serde(deserialize_with = "interval")]
  pub call_spacing: Duration,
  pub retries: u32,
  #[serde(deserialize_with = "interval")]
  pub retry_delay: Duration,
  #[serde(deserialize_with = "interval")]
  pub timeout: Duration,
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
  /// Enable the metrics and health server.
  pub enabled: bool,
  /// Server bind address.
  pub bind_address: String,
}

impl Default for AppSection {
  fn default() -> Self {
    Self {
      name: "tickerwatch".to_string(),
      log_level: "info".to_string(),
      log_format: LogFormat::default(),
      watchlist_dir: "watchlists".to_string(),
      cache_dir: ".".to_string(),
      render_log_interval: Duration::from_secs(30),
    }
  }
}

impl Default for RefreshConfig {
  fn default() -> Self {
    let poll = PollConfig::default();
    let orchestrator = OrchestratorConfig::default();
    Self {
      market_interval: orchestrator.market_interval,
      economy_interval: orchestrator.economy_interval,
      crypto_fallback_interval: orchestrator.crypto_fallback_interval,
      session_check_interval: SessionConfig::default().check_interval,
      rate_limit_multiplier: poll.rate_limit_multiplier,
      rate_limit_cap: poll.rate_limit_cap,
      per_symbol_spacing: poll.per_symbol_spacing,
      min_cycle_spacing: poll.min_cycle_spacing,
      call_spacing: poll.call_spacing,
      reference_spacing: Duration::from_millis(500),
    }
  }
}

impl Default for ApiConfig {
  fn default() -> Self {
    let rest = MassiveClientConfig::default();
    let ws = MassiveWsConfig::default();
    Self {
      rest_url: rest.base_url,
      ws_realtime_url: ws.realtime_host,
      ws_delayed_url: ws.delayed_host,
      timeout: rest.timeout,
      max_concurrent: rest.max_concurrent,
    }
  }
}

impl Default for StreamSection {
  fn default() -> Self {
    let stream = StreamConfig::default();
    Self {
      backoff_base: stream.backoff_base,
      backoff_max: stream.backoff_max,
      flash: Duration::from_secs(1),
      grace: SessionConfig::default().grace,
      handshake_timeout: MassiveWsConfig::default().handshake_timeout,
    }
  }
}

impl Default for EconomySection {
  fn default() -> Self {
    let economy = EconomyConfig::default();
    Self {
      call_spacing: economy.call_spacing,
      retries: economy.retries,
      retry_delay: economy.retry_delay,
      timeout: economy.timeout,
    }
  }
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: "0.0.0.0:9090".to_string(),
    }
  }
}

// Mapping onto component configs

impl AppConfig {
  pub fn poll_config(&self) -> PollConfig {
    PollConfig {
      per_symbol_spacing: self.refresh.per_symbol_spacing,
      min_cycle_spacing: self.refresh.min_cycle_spacing,
      call_spacing: self.refresh.call_spacing,
      rate_limit_multiplier: self.refresh.rate_limit_multiplier,
      rate_limit_cap: self.refresh.rate_limit_cap,
      ..PollConfig::default()
    }
  }

  pub fn stream_config(&self) -> StreamConfig {
    StreamConfig {
      backoff_base: self.stream.backoff_base,
      backoff_max: self.stream.backoff_max,
      ..StreamConfig::default()
    }
  }

  pub fn session_config(&self) -> SessionConfig {
    SessionConfig {
      check_interval: self.refresh.session_check_interval,
      grace: self.stream.grace,
    }
  }

  pub fn economy_config(&self) -> EconomyConfig {
    EconomyConfig {
      call_spacing: self.economy.call_spacing,
      retries: self.economy.retries,
      retry_delay: self.economy.retry_delay,
      timeout: self.economy.timeout,
    }
  }

  pub fn orchestrator_config(&self) -> OrchestratorConfig {
    OrchestratorConfig {
      market_interval: self.refresh.market_interval,
      economy_interval: self.refresh.economy_interval,
      crypto_fallback_interval: self.refresh.crypto_fallback_interval,
      ..OrchestratorConfig::default()
    }
  }

  pub fn reference_config(&self) -> ReferenceConfig {
    ReferenceConfig {
      call_spacing: self.refresh.reference_spacing,
    }
  }

  pub fn client_config(&self) -> MassiveClientConfig {
    MassiveClientConfig {
      base_url: self.api.rest_url.clone(),
      timeout: self.api.timeout,
      max_concurrent: self.api.max_concurrent,
    }
  }

  pub fn ws_config(&self) -> MassiveWsConfig {
    MassiveWsConfig {
      realtime_host: self.api.ws_realtime_url.clone(),
      delayed_host: self.api.ws_delayed_url.clone(),
      handshake_timeout: self.stream.handshake_timeout,
    }
  }
}

/// Parse an interval such as `500ms`, `10s`, `5m`, `1h`, or `1d`.
pub fn parse_interval(value: &str) -> Result<Duration> {
  let value = value.trim().to_ascii_lowercase();
  let split = value
    .find(|c: char| !c.is_ascii_digit())
    .unwrap_or(value.len());
  let (digits, unit) = value.split_at(split);
  let Ok(n) = digits.parse::<u64>() else {
    bail!("Invalid interval '{value}': expected a number followed by ms, s, m, h, or d");
  };

  let duration = match unit.trim() {
    "ms" => Duration::from_millis(n),
    "s" => Duration::from_secs(n),
    "m" => Duration::from_secs(n * 60),
    "h" => Duration::from_secs(n * 3600),
    "d" => Duration::from_secs(n * 86_400),
    other => bail!("Invalid interval unit '{other}' in '{value}'"),
  };
  Ok(duration)
}

fn interval<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
  let raw = String::deserialize(deserializer)?;
  parse_interval(&raw).map_err(serde::de::Error::custom)
}
