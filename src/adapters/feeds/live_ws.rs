//! Live Games WebSocket Feed - Stream Transport Adapter
//!
//! Dials the live-games WebSocket and yields text frames. Implements the
//! `FeedConnector` / `FeedConnection` ports so the supervisor never sees
//! tungstenite types.
//!
//! Control frames are absorbed here: pings are answered by tungstenite on
//! the next read, binary frames are skipped, and a close frame is reported
//! as end-of-stream.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, instrument};

use crate::config::FeedConfig;
use crate::ports::{FeedConnection, FeedConnector};

/// Dials the live-games WebSocket.
#[derive(Debug, Clone)]
pub struct WsFeedConnector {
    /// WebSocket URL from config.
    url: String,
}

impl WsFeedConnector {
    /// Create a connector from feed config.
    pub fn new(config: &FeedConfig) -> Self {
        Self {
            url: config.url.clone(),
        }
    }
}

#[async_trait]
impl FeedConnector for WsFeedConnector {
    type Connection = WsFeedConnection;

    #[instrument(skip(self), fields(url = %self.url))]
    async fn connect(&self) -> Result<WsFeedConnection> {
        let (stream, response) = connect_async(self.url.as_str())
            .await
            .context("Live feed WebSocket connection failed")?;

        info!(status = %response.status(), "Live feed WebSocket connected");
        Ok(WsFeedConnection { stream })
    }
}

/// One open live-feed WebSocket session.
pub struct WsFeedConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FeedConnection for WsFeedConnection {
    async fn next_message(&mut self) -> Result<Option<String>> {
        // `StreamExt::next` is cancel-safe and control frames carry no
        // payload, so dropping this future between frames loses nothing.
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Live feed sent close frame");
                    return Ok(None);
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Binary(bytes))) => {
                    debug!(len = bytes.len(), "Skipping binary frame");
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => return Err(anyhow::anyhow!("Live feed WS error: {e}")),
                None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "Live feed close failed");
        }
    }
}
