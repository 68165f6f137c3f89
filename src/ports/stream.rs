//! Stream Port - Streaming Feed Interface
//!
//! A connector opens one authenticated, subscribed connection per asset
//! class. The stream manager owns the reconnect loop; connections only
//! report ticks until they end or fail.

use async_trait::async_trait;

use crate::domain::ticker::{AssetClass, StreamTick};

/// Feed latency class, selecting the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    RealTime,
    Delayed,
}

impl FeedKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RealTime => "realtime",
            Self::Delayed => "delayed",
        }
    }
}

/// A live subscription.
#[async_trait]
pub trait StreamConnection: Send {
    /// Next batch of ticks.
    ///
    /// `Ok(None)` means the server closed the connection cleanly;
    /// an error means it dropped. Either way the caller reconnects.
    async fn next_batch(&mut self) -> anyhow::Result<Option<Vec<StreamTick>>>;

    /// Close the connection. Errors are ignored by callers.
    async fn close(&mut self) -> anyhow::Result<()>;
}

/// Opens subscriptions.
#[async_trait]
pub trait StreamConnector: Send + Sync + 'static {
    async fn connect(
        &self,
        class: AssetClass,
        feed: FeedKind,
        symbols: &[String],
    ) -> anyhow::Result<Box<dyn StreamConnection>>;
}
