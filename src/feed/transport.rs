use anyhow::Result;
use futures_util::StreamExt;
use log::debug;
use rustls::crypto::{CryptoProvider, ring};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Error as WsError, Message},
};

use crate::endpoints::Endpoint;

/// One data frame received from the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Opens connections to feed endpoints.
///
/// This is the seam between the connector state machine and the
/// wire. The production implementation is `WsTransport`; tests
/// and offline runs use `ReplayTransport`.
///
/// THREAD SAFETY:
/// - Must be Send + Sync
/// - One transport instance is shared by every connector
///
#[async_trait::async_trait]
pub trait FeedTransport: Send + Sync {
    /// Opens a subscription to `endpoint`.
    ///
    /// Errors are connection failures (refused, DNS, TLS, handshake).
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn FeedConnection>>;
}

/// One open, message-oriented connection.
#[async_trait::async_trait]
pub trait FeedConnection: Send {
    /// Waits for the next data frame.
    ///
    /// RETURNS:
    /// - `Ok(Some(frame))` for text and binary frames
    /// - `Ok(None)` once the peer closed the connection
    /// - `Err` on reset or protocol failure
    ///
    /// Control frames (ping/pong) are handled internally and never
    /// surface here.
    async fn recv(&mut self) -> Result<Option<Frame>>;

    /// Closes the connection cleanly. Must be idempotent.
    async fn close(&mut self);
}

/// Installs the `ring` rustls provider unless one is already set.
///
/// rustls >= 0.23 requires an explicit process-wide provider
/// before the first TLS handshake.
pub fn install_crypto_provider() {
    let _ = CryptoProvider::install_default(ring::default_provider());
}

// ------------------------------------------------------------
// tokio-tungstenite transport
// ------------------------------------------------------------

/// Jetstream over `wss://`.
#[derive(Debug, Clone, Copy)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        install_crypto_provider();
        Self
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl FeedTransport for WsTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn FeedConnection>> {
        // Collection filtering happens server-side via the query
        // string; no subscribe message is sent.
        let (ws, _) = connect_async(endpoint.subscribe_url()).await?;
        Ok(Box::new(WsConnection { ws, closed: false }))
    }
}

struct WsConnection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

#[async_trait::async_trait]
impl FeedConnection for WsConnection {
    async fn recv(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(Frame::Text(text.to_string()))),
                Some(Ok(Message::Binary(bytes))) => return Ok(Some(Frame::Binary(bytes.to_vec()))),
                Some(Ok(Message::Close(_))) | None => return Ok(None),

                // Ignore ping/pong/raw frames
                Some(Ok(_)) => continue,

                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => return Ok(None),
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.ws.close(None).await {
            debug!("[Bluesky] close handshake failed: {}", e);
        }
    }
}
