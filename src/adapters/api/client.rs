//! Massive HTTP Client - Authenticated REST Transport
//!
//! Wraps reqwest with API-key query authentication, a concurrency cap,
//! and error classification into `ProviderError`. It never retries on
//! its own: pacing and back-off belong to the use cases.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::ports::market_data::{ProviderError, ProviderResult};

/// Longest response body excerpt kept in an error.
const BODY_EXCERPT: usize = 120;

/// Configuration for the Massive HTTP client.
#[derive(Debug, Clone)]
pub struct MassiveClientConfig {
  /// Base URL for the REST API.
  pub base_url: String,
  /// Request timeout.
  pub timeout: Duration,
  /// Maximum concurrent requests.
  pub max_concurrent: usize,
}

impl Default for MassiveClientConfig {
  fn default() -> Self {
    Self {
      base_url: "https://api.massive.com".to_string(),
      timeout: Duration::from_secs(20),
      max_concurrent: 4,
    }
  }
}

/// Concurrency-capped HTTP client for the Massive REST API.
pub struct MassiveClient {
  /// Underlying HTTP client.
  http: Client,
  /// Credential sent as the `apiKey` query parameter.
  api_key: String,
  /// Client configuration.
  config: MassiveClientConfig,
  /// Concurrency limiter.
  semaphore: Arc<Semaphore>,
}

impl MassiveClient {
  /// Create a new client.
  pub fn new(api_key: impl Into<String>, config: MassiveClientConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(4)
      .build()
      .context("Failed to build HTTP client")?;

    let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));

    Ok(Self {
      http,
      api_key: api_key.into(),
      config,
      semaphore,
    })
  }

  /// GET `path` with `query` and decode the JSON body.
  pub async fn get_json<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, String)],
  ) -> ProviderResult<T> {
    let _permit = self
      .semaphore
      .acquire()
      .await
      .map_err(|e| ProviderError::Transport(e.to_string()))?;

    let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
    debug!(path, "GET");

    let response = self
      .http
      .get(&url)
      .query(query)
      .query(&[("apiKey", self.api_key.as_str())])
      .send()
      .await
      .map_err(classify_transport)?;

    let status = response.status();
    if status.is_success() {
      let bytes = response.bytes().await.map_err(classify_transport)?;
      return serde_json::from_slice(&bytes).map_err(|e| ProviderError::Decode(e.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    let error = classify_status(status, &body);
    warn!(path, status = status.as_u16(), error = %error, "Request rejected");
    Err(error)
  }

  /// Base URL requests are sent to.
  pub fn base_url(&self) -> &str {
    &self.config.base_url
  }
}

/// Map a non-success HTTP status and body to a provider error.
pub fn classify_status(status: StatusCode, body: &str) -> ProviderError {
  let excerpt: String = body.chars().take(BODY_EXCERPT).collect();
  match status {
    StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Entitlement(excerpt),
    _ if body.to_ascii_lowercase().contains("rate") => ProviderError::RateLimited,
    _ => ProviderError::Transport(format!("HTTP {}: {excerpt}", status.as_u16())),
  }
}

fn classify_transport(e: reqwest::Error) -> ProviderError {
  if e.is_timeout() {
    ProviderError::Timeout
  } else if e.is_decode() {
    ProviderError::Decode(e.to_string())
  } else {
    // Strip the URL so the credential never lands in logs.
    ProviderError::Transport(e.without_url().to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_classification() {
    assert_eq!(
      classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
      ProviderError::RateLimited
    );
    assert_eq!(
      classify_status(StatusCode::BAD_REQUEST, "You've exceeded the maximum requests per minute, rate limit"),
      ProviderError::RateLimited
    );
    assert!(matches!(
      classify_status(StatusCode::FORBIDDEN, "NOT_AUTHORIZED"),
      ProviderError::Entitlement(_)
    ));
    assert_eq!(
      classify_status(StatusCode::BAD_GATEWAY, "upstream"),
      ProviderError::Transport("HTTP 502: upstream".into())
    );
  }

  #[test]
  fn test_body_excerpt_is_bounded() {
    let err = classify_status(StatusCode::UNAUTHORIZED, &"x".repeat(1000));
    match err {
      ProviderError::Entitlement(msg) => assert_eq!(msg.len(), BODY_EXCERPT),
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn test_client_builds() {
    let client = MassiveClient::new("key", MassiveClientConfig::default()).unwrap();
    assert_eq!(client.base_url(), "https://api.massive.com");
  }
}
