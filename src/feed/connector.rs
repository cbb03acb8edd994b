use std::sync::Arc;

use log::{error, info, warn};
use rand::{Rng, rngs::StdRng};

use super::transport::{FeedConnection, FeedTransport, Frame};
use crate::{
    endpoints::Endpoint,
    metrics::{METRICS, RuntimeMetrics, decr, incr},
    normalizer::PostCommit,
    schema::RawEvent,
};

// ------------------------------------------------------------
// Load shedding
// ------------------------------------------------------------

/// Source of uniform samples in [0, 1).
///
/// Injected into `SkipGate` so skip decisions can be replayed.
pub trait UnitSource: Send {
    fn next_unit(&mut self) -> f64;
}

impl UnitSource for StdRng {
    fn next_unit(&mut self) -> f64 {
        self.random::<f64>()
    }
}

/// Cycles through a fixed list of samples.
#[derive(Debug, Clone)]
pub struct FixedSequence {
    values: Vec<f64>,
    pos: usize,
}

impl FixedSequence {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, pos: 0 }
    }
}

impl UnitSource for FixedSequence {
    fn next_unit(&mut self) -> f64 {
        if self.values.is_empty() {
            return 1.0;
        }
        let v = self.values[self.pos % self.values.len()];
        self.pos += 1;
        v
    }
}

/// Independent per-event discard with a fixed probability.
pub struct SkipGate {
    probability: f64,
    source: Box<dyn UnitSource>,
}

impl SkipGate {
    pub fn new(probability: f64, source: Box<dyn UnitSource>) -> Self {
        Self {
            probability,
            source,
        }
    }

    /// One Bernoulli trial: `true` means drop this event.
    pub fn should_skip(&mut self) -> bool {
        self.probability > 0.0 && self.source.next_unit() < self.probability
    }
}

// ------------------------------------------------------------
// Connector
// ------------------------------------------------------------

/// Lifecycle of one connector instance.
///
/// Idle -> Connecting -> Streaming -> (Closed | Failed)
///
/// `Closed` and `Failed` are terminal. Retrying means building a
/// new connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorState {
    Idle,
    Connecting,
    Streaming,
    Closed,
    Failed,
}

/// Owns one connection to one Jetstream endpoint.
///
/// RESPONSIBILITIES:
/// - Connection lifecycle
/// - Frame decoding
/// - Optional load shedding (`SkipGate`)
/// - Post-creation filtering
/// - Per-connector post cap
///
/// NOT RESPONSIBLE FOR:
/// - Retrying (the collector builds a new connector)
/// - Normalization and length filtering
/// - The global item budget
///
/// No error leaves this type: connection failures end the stream
/// of posts, bad frames are logged and skipped.
pub struct FeedConnector {
    endpoint: Endpoint,
    transport: Arc<dyn FeedTransport>,
    connection: Option<Box<dyn FeedConnection>>,
    state: ConnectorState,
    max_posts: usize,
    emitted: usize,
    skip: Option<SkipGate>,
    metrics: Arc<RuntimeMetrics>,
}

impl FeedConnector {
    pub fn new(
        endpoint: Endpoint,
        transport: Arc<dyn FeedTransport>,
        max_posts: usize,
    ) -> Self {
        Self {
            endpoint,
            transport,
            connection: None,
            state: ConnectorState::Idle,
            max_posts,
            emitted: 0,
            skip: None,
            metrics: Arc::clone(&METRICS),
        }
    }

    /// Reports into `metrics` instead of the global registry.
    pub fn with_metrics(mut self, metrics: Arc<RuntimeMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_skip(mut self, gate: SkipGate) -> Self {
        self.skip = Some(gate);
        self
    }

    pub fn state(&self) -> ConnectorState {
        self.state
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Posts handed out so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Opens the subscription. Returns whether the connector is streaming.
    ///
    /// Only acts in `Idle`; a failed connect is terminal.
    pub async fn connect(&mut self) -> bool {
        if self.state != ConnectorState::Idle {
            return self.state == ConnectorState::Streaming;
        }

        self.state = ConnectorState::Connecting;
        info!("[Bluesky] Connecting to Jetstream: {}", self.endpoint.subscribe_url());

        match self.transport.connect(&self.endpoint).await {
            Ok(connection) => {
                self.connection = Some(connection);
                self.state = ConnectorState::Streaming;
                incr(&self.metrics.connections_active);
                info!("[Bluesky] Connected to Jetstream WebSocket ({})", self.endpoint);
                true
            }
            Err(e) => {
                self.state = ConnectorState::Failed;
                incr(&self.metrics.connect_failures);
                warn!("[Bluesky] Failed to connect to {}: {:#}", self.endpoint, e);
                false
            }
        }
    }

    /// Next newly created post, or `None` once this connector is done.
    ///
    /// Connects lazily on first use. Done means: the post cap was
    /// reached (connection is closed cleanly), the peer closed, the
    /// connection failed, or the connect itself failed.
    pub async fn next_post(&mut self) -> Option<PostCommit> {
        if self.state == ConnectorState::Idle && !self.connect().await {
            return None;
        }

        loop {
            if self.state != ConnectorState::Streaming {
                return None;
            }
            if self.emitted >= self.max_posts {
                self.close().await;
                return None;
            }

            let connection = self.connection.as_mut()?;
            let frame = match connection.recv().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("[Bluesky] Connection to {} closed", self.endpoint);
                    self.release(ConnectorState::Closed);
                    return None;
                }
                Err(e) => {
                    warn!("[Bluesky] Connection to {} lost: {:#}", self.endpoint, e);
                    self.release(ConnectorState::Failed);
                    return None;
                }
            };

            incr(&self.metrics.frames_received);

            if let Some(post) = self.handle_frame(frame) {
                self.emitted += 1;
                incr(&self.metrics.posts_matched);
                return Some(post);
            }
        }
    }

    /// Closes the connection cleanly if it is still open.
    pub async fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            // Before the await: a cancelled close must not leak the gauge
            decr(&self.metrics.connections_active);
            connection.close().await;
        }
        if matches!(
            self.state,
            ConnectorState::Idle | ConnectorState::Connecting | ConnectorState::Streaming
        ) {
            self.state = ConnectorState::Closed;
        }
    }

    /// Decode, shed, filter. Never fails; problems are logged.
    ///
    /// A post creation missing `did` or `rkey` still counts
    /// against the post cap, it just yields nothing.
    fn handle_frame(&mut self, frame: Frame) -> Option<PostCommit> {
        let decoded = match &frame {
            Frame::Text(text) => serde_json::from_str::<RawEvent>(text),
            Frame::Binary(bytes) => serde_json::from_slice::<RawEvent>(bytes),
        };

        let event = match decoded {
            Ok(event) => event,
            Err(e) => {
                incr(&self.metrics.decode_errors);
                info!("[Bluesky] Received invalid JSON: {}", e);
                return None;
            }
        };

        if let Some(gate) = self.skip.as_mut() {
            if gate.should_skip() {
                incr(&self.metrics.events_skipped);
                return None;
            }
        }

        match PostCommit::from_event(event) {
            Ok(post) => post,
            Err(e) => {
                self.emitted += 1;
                incr(&self.metrics.processing_errors);
                error!("[Bluesky] Error in consumer ({}): {:#}", self.endpoint, e);
                None
            }
        }
    }

    /// Drops a connection the peer already tore down.
    fn release(&mut self, state: ConnectorState) {
        if self.connection.take().is_some() {
            decr(&self.metrics.connections_active);
        }
        self.state = state;
    }
}

impl Drop for FeedConnector {
    fn drop(&mut self) {
        if self.connection.is_some() {
            decr(&self.metrics.connections_active);
        }
    }
}
