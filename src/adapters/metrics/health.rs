//! Health Check Server - Liveness, Readiness, and Metrics
//!
//! Exposes /live, /ready and /metrics via axum 0.7. Readiness flips
//! once the first table has data.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::usecases::market_state::MarketState;

use super::prometheus::MetricsRegistry;

/// State shared with the HTTP handlers.
#[derive(Clone)]
pub struct HealthState {
    pub market: Arc<MarketState>,
    pub metrics: Arc<MetricsRegistry>,
}

impl HealthState {
    /// Ready once any snapshot has landed.
    pub fn is_ready(&self) -> bool {
        self.market.has_data()
    }
}

/// Axum-based health and metrics server.
pub struct HealthServer {
    state: HealthState,
    bind_address: String,
}

impl HealthServer {
    pub fn new(state: HealthState, bind_address: impl Into<String>) -> Self {
        Self {
            state,
            bind_address: bind_address.into(),
        }
    }

    /// Route table, exposed for tests.
    pub fn router(state: HealthState) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .route("/metrics", get(Self::metrics))
            .with_state(state)
    }

    /// Serve until `shutdown` is cancelled.
    #[instrument(skip(self, shutdown), fields(address = %self.bind_address))]
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;
        info!("Health server started");

        axum::serve(listener, Self::router(self.state))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Health server stopped");
        Ok(())
    }

    /// Liveness probe: always returns 200 if the process is running.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    async fn readiness(State(state): State<HealthState>) -> impl IntoResponse {
        if state.is_ready() {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }

    async fn metrics(State(state): State<HealthState>) -> impl IntoResponse {
        match state.metrics.encode() {
            Ok(body) => (StatusCode::OK, body),
            Err(e) => {
                warn!(error = %e, "Metrics encoding failed");
                (StatusCode::INTERNAL_SERVER_ERROR, String::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::watchlist::Watchlist;
    use crate::ports::telemetry::FeedTelemetry;
    use crate::usecases::market_state::Stamp;
    use crate::domain::ticker::{AssetClass, TickerRecord};
    use std::time::Duration;

    fn health() -> HealthState {
        HealthState {
            market: Arc::new(MarketState::new(Duration::from_secs(1))),
            metrics: Arc::new(MetricsRegistry::new().unwrap()),
        }
    }

    #[tokio::test]
    async fn test_readiness_follows_first_snapshot() {
        let state = health();
        let resp = HealthServer::readiness(State(state.clone())).await.into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let wl = Watchlist::parse("t", "[equities]\nAAPL\n");
        let generation = state.market.activate_watchlist(&wl);
        let mut rec = TickerRecord::new("AAPL");
        rec.last = Some(1.0);
        let stamp = Stamp::from_clock(&crate::domain::clock::SystemClock);
        assert!(state.market.replace(AssetClass::Stocks, generation, vec![rec], stamp));

        let resp = HealthServer::readiness(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_exposes_registry() {
        let state = health();
        state.metrics.reconnect_attempt(AssetClass::Stocks);
        let resp = HealthServer::metrics(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
