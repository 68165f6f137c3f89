//! Massive WebSocket Feed - Aggregate and Index Value Streams
//!
//! One connection per asset class. After connecting, the client sends an
//! `auth` action with the API key, waits for `auth_success`, then
//! subscribes with class-specific topics:
//! - stocks: `A.<ticker>` (per-second aggregates)
//! - indices: `V.<ticker>` (index values)
//! - crypto: `XA.<base>-<quote>` (per-minute aggregates)
//!
//! Frames are JSON arrays of events. Status events are logged; data
//! events become `StreamTick`s keyed by the watchlist symbol.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, instrument, warn};

use crate::domain::ticker::{AssetClass, StreamTick};
use crate::ports::stream::{FeedKind, StreamConnection, StreamConnector};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Quote currencies recognized when splitting a crypto symbol.
const QUOTE_CURRENCIES: [&str; 8] = ["USDT", "USDC", "USD", "EUR", "GBP", "JPY", "BTC", "ETH"];

/// Hosts and timing for the streaming API.
#[derive(Debug, Clone)]
pub struct MassiveWsConfig {
    /// Real-time host, e.g. `wss://socket.massive.com`.
    pub realtime_host: String,
    /// Fifteen-minute delayed host.
    pub delayed_host: String,
    /// Deadline for connect plus authentication.
    pub handshake_timeout: Duration,
}

impl Default for MassiveWsConfig {
    fn default() -> Self {
        Self {
            realtime_host: "wss://socket.massive.com".to_string(),
            delayed_host: "wss://delayed.massive.com".to_string(),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

/// Opens authenticated, subscribed connections.
pub struct MassiveConnector {
    api_key: String,
    config: MassiveWsConfig,
}

impl MassiveConnector {
    pub fn new(api_key: impl Into<String>, config: MassiveWsConfig) -> Self {
        Self {
            api_key: api_key.into(),
            config,
        }
    }

    /// Endpoint for a class and feed.
    pub fn url(&self, class: AssetClass, feed: FeedKind) -> String {
        let host = match feed {
            FeedKind::RealTime => &self.config.realtime_host,
            FeedKind::Delayed => &self.config.delayed_host,
        };
        format!("{}/{}", host.trim_end_matches('/'), class.as_str())
    }

    async fn handshake(&self, url: &str, symbols: &[String], class: AssetClass) -> Result<WsStream> {
        let (mut ws, _) = connect_async(url)
            .await
            .with_context(|| format!("WebSocket connection to {url} failed"))?;

        let auth = serde_json::json!({ "action": "auth", "params": self.api_key });
        ws.send(Message::Text(auth.to_string())).await.context("Failed to send auth")?;

        loop {
            let frame = ws.next().await.context("Stream ended during auth")??;
            let Message::Text(text) = frame else { continue };
            let parsed = parse_frame(&text, class)?;
            if let Some(status) = parsed.statuses.iter().find(|s| s.status.starts_with("auth_")) {
                if status.status == "auth_success" {
                    break;
                }
                bail!("Authentication rejected: {}", status.message);
            }
        }

        let subscribe = serde_json::json!({
            "action": "subscribe",
            "params": subscription_params(class, symbols),
        });
        ws.send(Message::Text(subscribe.to_string()))
            .await
            .context("Failed to send subscribe")?;
        Ok(ws)
    }
}

#[async_trait]
impl StreamConnector for MassiveConnector {
    #[instrument(skip(self, symbols), fields(class = %class, feed = feed.as_str()))]
    async fn connect(
        &self,
        class: AssetClass,
        feed: FeedKind,
        symbols: &[String],
    ) -> Result<Box<dyn StreamConnection>> {
        if symbols.is_empty() {
            bail!("No symbols to subscribe for {class}");
        }
        let url = self.url(class, feed);
        let ws = tokio::time::timeout(self.config.handshake_timeout, self.handshake(&url, symbols, class))
            .await
            .context("WebSocket handshake timed out")??;

        info!(url = %url, symbols = symbols.len(), "Subscribed");
        Ok(Box::new(MassiveConnection { ws, class }))
    }
}

/// One live, subscribed connection.
pub struct MassiveConnection {
    ws: WsStream,
    class: AssetClass,
}

#[async_trait]
impl StreamConnection for MassiveConnection {
    async fn next_batch(&mut self) -> Result<Option<Vec<StreamTick>>> {
        loop {
            let Some(frame) = self.ws.next().await else {
                return Ok(None);
            };
            match frame.context("WebSocket error")? {
                Message::Text(text) => {
                    let parsed = match parse_frame(&text, self.class) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            debug!(error = %e, "Unparseable frame skipped");
                            continue;
                        }
                    };
                    for status in &parsed.statuses {
                        if status.status == "max_connections" || status.status == "auth_failed" {
                            bail!("Server closed session: {}", status.message);
                        }
                        debug!(status = %status.status, message = %status.message, "Status event");
                    }
                    if !parsed.ticks.is_empty() {
                        return Ok(Some(parsed.ticks));
                    }
                }
                Message::Close(frame) => {
                    info!(?frame, "Server sent close");
                    return Ok(None);
                }
                Message::Ping(data) => debug!(len = data.len(), "Ping received"),
                _ => {}
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.ws.close(None).await {
            warn!(error = %e, "WebSocket close failed");
        }
        Ok(())
    }
}

/// Subscription topic list for `symbols`.
pub fn subscription_params(class: AssetClass, symbols: &[String]) -> String {
    symbols
        .iter()
        .map(|s| match class {
            AssetClass::Stocks => format!("A.{s}"),
            AssetClass::Indices => format!("V.{s}"),
            AssetClass::Crypto => format!("XA.{}", crypto_pair(s)),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// `X:BTCUSD` to `BTC-USD`.
pub fn crypto_pair(symbol: &str) -> String {
    let bare = symbol.strip_prefix("X:").unwrap_or(symbol);
    QUOTE_CURRENCIES
        .iter()
        .find_map(|quote| {
            bare.strip_suffix(quote)
                .filter(|base| !base.is_empty())
                .map(|base| format!("{base}-{quote}"))
        })
        .unwrap_or_else(|| bare.to_string())
}

/// `BTC-USD` to `X:BTCUSD`.
pub fn crypto_symbol(pair: &str) -> String {
    format!("X:{}", pair.replace('-', ""))
}

/// Server status event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub status: String,
    pub message: String,
}

/// Decoded frame.
#[derive(Debug, Default)]
pub struct ParsedFrame {
    pub ticks: Vec<StreamTick>,
    pub statuses: Vec<StatusEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    ev: String,
    sym: Option<String>,
    pair: Option<String>,
    #[serde(rename = "T")]
    ticker: Option<String>,
    c: Option<f64>,
    h: Option<f64>,
    l: Option<f64>,
    av: Option<f64>,
    v: Option<f64>,
    val: Option<f64>,
    status: Option<String>,
    message: Option<String>,
}

/// Decode one text frame; unknown event types are ignored.
pub fn parse_frame(text: &str, class: AssetClass) -> Result<ParsedFrame> {
    let events: Vec<RawEvent> = serde_json::from_str(text).context("Invalid event JSON")?;
    let mut out = ParsedFrame::default();

    for ev in events {
        match (ev.ev.as_str(), class) {
            ("status", _) => out.statuses.push(StatusEvent {
                status: ev.status.unwrap_or_default(),
                message: ev.message.unwrap_or_default(),
            }),
            ("A" | "AM", AssetClass::Stocks) => {
                if let (Some(symbol), Some(price)) = (ev.sym, ev.c) {
                    out.ticks.push(StreamTick {
                        symbol,
                        price,
                        high: ev.h,
                        low: ev.l,
                        volume: ev.av,
                    });
                }
            }
            ("V", AssetClass::Indices) => {
                if let (Some(symbol), Some(price)) = (ev.ticker, ev.val) {
                    out.ticks.push(StreamTick {
                        symbol,
                        price,
                        high: None,
                        low: None,
                        volume: None,
                    });
                }
            }
            ("XA", AssetClass::Crypto) => {
                if let (Some(pair), Some(price)) = (ev.pair, ev.c) {
                    out.ticks.push(StreamTick {
                        symbol: crypto_symbol(&pair),
                        price,
                        high: ev.h,
                        low: ev.l,
                        volume: ev.v,
                    });
                }
            }
            _ => {}
        }
    }
    Ok(out)
}
