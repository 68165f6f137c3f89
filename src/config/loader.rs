//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters, and
//! providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// A missing file yields the defaults with a warning. A file that
/// exists but cannot be read, parsed, or validated is an error.
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let config = if path.exists() {
    let content = std::fs::read_to_string(path)
      .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
      .with_context(|| format!("Failed to parse {}", path.display()))?
  } else {
    // Tracing is usually not initialized yet.
    eprintln!("[notice] {} not found, using defaults", path.display());
    warn!(path = %path.display(), "Config file not found, using defaults");
    AppConfig::default()
  };

  validate_config(&config)?;

  info!(
    market_interval_s = config.refresh.market_interval.as_secs(),
    economy_interval_s = config.refresh.economy_interval.as_secs(),
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Validate all configuration parameters.
fn validate_config(config: &AppConfig) -> Result<()> {
  // Refresh validation
  anyhow::ensure!(
    !config.refresh.market_interval.is_zero(),
    "refresh.market_interval must be positive"
  );
  anyhow::ensure!(
    !config.refresh.economy_interval.is_zero(),
    "refresh.economy_interval must be positive"
  );
  anyhow::ensure!(
    !config.refresh.session_check_interval.is_zero(),
    "refresh.session_check_interval must be positive"
  );
  anyhow::ensure!(
    config.refresh.rate_limit_multiplier >= 1,
    "refresh.rate_limit_multiplier must be at least 1, got {}",
    config.refresh.rate_limit_multiplier
  );
  anyhow::ensure!(
    config.refresh.rate_limit_cap >= config.refresh.market_interval,
    "refresh.rate_limit_cap must not be below refresh.market_interval"
  );

  // Stream validation
  anyhow::ensure!(
    !config.stream.backoff_base.is_zero(),
    "stream.backoff_base must be positive"
  );
  anyhow::ensure!(
    config.stream.backoff_max >= config.stream.backoff_base,
    "stream.backoff_max must be at least stream.backoff_base"
  );

  // Economy validation
  anyhow::ensure!(
    !config.economy.timeout.is_zero(),
    "economy.timeout must be positive"
  );
  anyhow::ensure!(
    config.economy.retries <= 10,
    "economy.retries must be at most 10, got {}",
    config.economy.retries
  );

  // API validation
  anyhow::ensure!(!config.api.rest_url.is_empty(), "api.rest_url must not be empty");
  anyhow::ensure!(
    config.api.ws_realtime_url.starts_with("ws") && config.api.ws_delayed_url.starts_with("ws"),
    "WebSocket URLs must use ws:// or wss://"
  );
  anyhow::ensure!(config.api.max_concurrent > 0, "api.max_concurrent must be positive");

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn test_missing_file_uses_defaults() {
    let config = load_config("definitely-not-here.toml").unwrap();
    assert_eq!(config.app.name, "tickerwatch");
  }

  #[test]
  fn test_invalid_file_is_fatal() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[refresh]\nmarket_interval = 10").unwrap();
    assert!(load_config(file.path().to_str().unwrap()).is_err());
  }

  #[test]
  fn test_validation_rejects_inverted_backoff() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[stream]\nbackoff_base = \"30s\"\nbackoff_max = \"5s\"").unwrap();
    let err = load_config(file.path().to_str().unwrap()).unwrap_err();
    assert!(err.to_string().contains("backoff_max"));
  }
}
