//! tickerwatch - Entry Point
//!
//! Initializes configuration, logging, the Massive adapters, and the
//! orchestrator. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load .env + config.toml and validate
//! 2. Init tracing (JSON or compact)
//! 3. Read MASSIVE_API_KEY and open the watchlist directory
//! 4. Create the REST client, provider, and file caches
//! 5. Detect plan capabilities (cached per key fingerprint)
//! 6. Spawn the health/metrics server
//! 7. Build streams, scheduler, session tracker, economy and reference fetchers
//! 8. Run the orchestrator; SIGHUP switches watchlist, SIGINT shuts down

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use tickerwatch::adapters::api::{MassiveClient, MassiveProvider};
use tickerwatch::adapters::feeds::MassiveConnector;
use tickerwatch::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use tickerwatch::adapters::persistence::{
  FileCapabilityStore, FileEconomyStore, capability_cache::PLANS_FILE, economy_cache::ECONOMY_FILE,
};
use tickerwatch::adapters::render::LogRenderer;
use tickerwatch::config::watchlist::WatchlistDir;
use tickerwatch::config::{AppConfig, LogFormat, loader};
use tickerwatch::domain::clock::{Clock, SystemClock};
use tickerwatch::domain::session::TradingCalendar;
use tickerwatch::ports::market_data::MarketDataProvider;
use tickerwatch::ports::telemetry::FeedTelemetry;
use tickerwatch::ports::watchlist::WatchlistSource;
use tickerwatch::usecases::capability_registry::CapabilityRegistry;
use tickerwatch::usecases::economy_cache::EconomyCache;
use tickerwatch::usecases::market_state::MarketState;
use tickerwatch::usecases::orchestrator::{Command, Orchestrator, OrchestratorParts};
use tickerwatch::usecases::poll_scheduler::PollScheduler;
use tickerwatch::usecases::reference_data::ReferenceData;
use tickerwatch::usecases::session_tracker::SessionTracker;
use tickerwatch::usecases::stream_manager::StreamManager;

const API_KEY_VAR: &str = "MASSIVE_API_KEY";

#[tokio::main]
async fn main() -> Result<()> {
  // 1. Environment and configuration
  if let Err(e) = dotenvy::dotenv() {
    if !e.not_found() {
      eprintln!("[warn] Ignoring unreadable .env: {e}");
    }
  }
  let config = loader::load_config("config.toml").context("Failed to load configuration")?;

  // 2. Logging
  init_tracing(&config);
  info!(
    name = %config.app.name,
    version = env!("CARGO_PKG_VERSION"),
    watchlist_dir = %config.app.watchlist_dir,
    "Starting tickerwatch"
  );

  // 3. Credentials and watchlists
  let api_key = match std::env::var(API_KEY_VAR) {
    Ok(key) if !key.trim().is_empty() => key.trim().to_string(),
    _ => bail!("{API_KEY_VAR} is not set; add it to the environment or .env"),
  };
  let watchlists = Arc::new(WatchlistDir::open(&config.app.watchlist_dir)?);
  let watchlist = watchlists.current()?;
  if watchlist.is_empty() {
    bail!("Watchlist '{}' has no tickers", watchlist.name);
  }

  // 4. REST client, provider, caches
  let client = Arc::new(
    MassiveClient::new(api_key.clone(), config.client_config())
      .context("Failed to create Massive client")?,
  );
  let provider: Arc<dyn MarketDataProvider> = Arc::new(MassiveProvider::new(client));
  let cache_dir = Path::new(&config.app.cache_dir);
  let plan_store = Arc::new(FileCapabilityStore::new(cache_dir.join(PLANS_FILE)));
  let economy_store = Arc::new(FileEconomyStore::new(cache_dir.join(ECONOMY_FILE)));

  let clock: Arc<dyn Clock> = Arc::new(SystemClock);
  let calendar = TradingCalendar::default();
  let state = Arc::new(MarketState::new(config.stream.flash));

  // 5. Plan capabilities
  let registry = CapabilityRegistry::new(Arc::clone(&provider), plan_store, &api_key);
  let plan = registry.load_or_probe().await;
  info!(plan = ?plan, "Plan capabilities resolved");
  state.set_plan(plan);
  let generation = state.activate_watchlist(&watchlist);
  info!(watchlist = %watchlist.name, generation, tickers = watchlist.ticker_count(), "Watchlist active");

  let shutdown = CancellationToken::new();

  // 6. Health and metrics
  let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);
  let health_handle = if config.metrics.enabled {
    let server = HealthServer::new(
      HealthState {
        market: Arc::clone(&state),
        metrics: Arc::clone(&metrics),
      },
      config.metrics.bind_address.clone(),
    );
    let token = shutdown.clone();
    Some(tokio::spawn(async move {
      if let Err(e) = server.run(token).await {
        error!(error = %e, "Health server failed");
      }
    }))
  } else {
    None
  };
  let telemetry: Arc<dyn FeedTelemetry> = metrics;

  // 7. Components
  let connector = Arc::new(MassiveConnector::new(api_key, config.ws_config()));
  let streams = StreamManager::new(
    connector,
    Arc::clone(&state),
    Arc::clone(&clock),
    Arc::clone(&telemetry),
    config.stream_config(),
    shutdown.clone(),
  );
  let scheduler = Arc::new(PollScheduler::new(
    Arc::clone(&provider),
    Arc::clone(&state),
    Arc::clone(&clock),
    telemetry,
    config.poll_config(),
  ));
  let tracker = SessionTracker::new(calendar, Arc::clone(&clock), config.session_config());
  let economy = Arc::new(EconomyCache::new(
    Arc::clone(&provider),
    economy_store,
    Arc::clone(&state),
    Arc::clone(&clock),
    calendar,
    config.economy_config(),
  ));
  let reference = Arc::new(ReferenceData::new(
    Arc::clone(&provider),
    Arc::clone(&state),
    Arc::clone(&clock),
    config.reference_config(),
  ));

  let orchestrator = Orchestrator::new(
    OrchestratorParts {
      state,
      provider,
      scheduler,
      streams,
      tracker,
      economy,
      reference,
      watchlists,
      renderer: Arc::new(LogRenderer::new(config.app.render_log_interval)),
      clock,
    },
    config.orchestrator_config(),
    shutdown.clone(),
  );

  // 8. Run
  let (command_tx, command_rx) = mpsc::channel::<Command>(8);
  let engine_handle = tokio::spawn(orchestrator.run(command_rx));
  spawn_signal_listener(command_tx.clone(), shutdown.clone());

  info!("All tasks spawned, tickerwatch is running");

  if let Err(e) = signal::ctrl_c().await {
    warn!(error = %e, "Failed to listen for SIGINT");
  }
  info!("SIGINT received, initiating graceful shutdown");
  shutdown.cancel();
  drop(command_tx);

  match engine_handle.await {
    Ok(Ok(())) => info!("Orchestrator stopped"),
    Ok(Err(e)) => error!(error = %e, "Orchestrator failed"),
    Err(e) => error!(error = %e, "Orchestrator task panicked"),
  }
  if let Some(handle) = health_handle {
    if let Err(e) = handle.await {
      error!(error = %e, "Health server task panicked");
    }
  }

  info!("tickerwatch shutdown complete");
  Ok(())
}

fn init_tracing(config: &AppConfig) {
  let filter = tracing_subscriber::EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.app.log_level));
  let builder = tracing_subscriber::fmt().with_env_filter(filter);
  match config.app.log_format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Compact => builder.compact().init(),
  }
}

/// SIGHUP cycles to the next watchlist.
#[cfg(unix)]
fn spawn_signal_listener(commands: mpsc::Sender<Command>, shutdown: CancellationToken) {
  use tokio::signal::unix::{SignalKind, signal};

  let mut hangup = match signal(SignalKind::hangup()) {
    Ok(s) => s,
    Err(e) => {
      warn!(error = %e, "SIGHUP handler unavailable, watchlist switching disabled");
      return;
    }
  };
  tokio::spawn(async move {
    loop {
      tokio::select! {
        () = shutdown.cancelled() => break,
        received = hangup.recv() => {
          if received.is_none() {
            break;
          }
          info!("SIGHUP received, switching watchlist");
          if commands.send(Command::SwitchWatchlist).await.is_err() {
            break;
          }
        }
      }
    }
  });
}

#[cfg(not(unix))]
fn spawn_signal_listener(_commands: mpsc::Sender<Command>, _shutdown: CancellationToken) {}
