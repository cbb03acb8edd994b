//! In-memory replay of recorded Jetstream frames.
//!
//! Serves a fixed script per host instead of opening sockets.
//! Used for offline runs of the binary and throughout the tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};

use super::transport::{FeedConnection, FeedTransport, Frame};
use crate::endpoints::Endpoint;

/// What a replayed connection does once its frames run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayEnd {
    /// Peer closes the connection
    #[default]
    Close,

    /// Connection stays open and never delivers another frame
    Hang,

    /// Connection is reset
    Fail,
}

/// Frames served by one replayed connection.
#[derive(Debug, Clone, Default)]
pub struct ReplayScript {
    frames: Vec<Frame>,
    end: ReplayEnd,
    stall_close: bool,
}

impl ReplayScript {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            end: ReplayEnd::Close,
            stall_close: false,
        }
    }

    /// One text frame per item.
    pub fn text<I, S>(frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(frames.into_iter().map(|f| Frame::Text(f.into())).collect())
    }

    /// One text frame per non-empty line.
    pub fn from_ndjson(data: &str) -> Self {
        Self::text(data.lines().map(str::trim).filter(|l| !l.is_empty()))
    }

    pub fn ending(mut self, end: ReplayEnd) -> Self {
        self.end = end;
        self
    }

    /// Our side's close never completes (a peer that ignores the
    /// close handshake).
    pub fn stalling_close(mut self) -> Self {
        self.stall_close = true;
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[derive(Debug, Default)]
struct ReplayStats {
    connects: AtomicUsize,
    closes: AtomicUsize,
}

/// Transport backed by `ReplayScript`s.
///
/// Lookup order on connect:
/// - refused hosts fail immediately
/// - a host-specific script
/// - the default script
///
/// Every connection gets a fresh copy of its script.
#[derive(Debug, Clone, Default)]
pub struct ReplayTransport {
    default: Option<ReplayScript>,
    per_host: HashMap<String, ReplayScript>,
    refused: HashSet<String>,
    stats: Arc<ReplayStats>,
}

impl ReplayTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, script: ReplayScript) -> Self {
        self.default = Some(script);
        self
    }

    pub fn with_host(mut self, host: impl Into<String>, script: ReplayScript) -> Self {
        self.per_host.insert(host.into(), script);
        self
    }

    pub fn refuse(mut self, host: impl Into<String>) -> Self {
        self.refused.insert(host.into());
        self
    }

    /// Successful connects so far.
    pub fn connects(&self) -> usize {
        self.stats.connects.load(Ordering::SeqCst)
    }

    /// Connections closed from our side so far.
    pub fn closes(&self) -> usize {
        self.stats.closes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl FeedTransport for ReplayTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn FeedConnection>> {
        let host = endpoint.host();
        if self.refused.contains(host) {
            return Err(anyhow!("connection refused by {}", host));
        }

        let script = self
            .per_host
            .get(host)
            .or(self.default.as_ref())
            .ok_or_else(|| anyhow!("no replay script for {}", host))?;

        self.stats.connects.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(ReplayConnection {
            frames: script.frames.iter().cloned().collect(),
            end: script.end,
            stall_close: script.stall_close,
            stats: self.stats.clone(),
            closed: false,
        }))
    }
}

struct ReplayConnection {
    frames: VecDeque<Frame>,
    end: ReplayEnd,
    stall_close: bool,
    stats: Arc<ReplayStats>,
    closed: bool,
}

#[async_trait::async_trait]
impl FeedConnection for ReplayConnection {
    async fn recv(&mut self) -> Result<Option<Frame>> {
        if self.closed {
            return Ok(None);
        }
        if let Some(frame) = self.frames.pop_front() {
            return Ok(Some(frame));
        }
        match self.end {
            ReplayEnd::Close => Ok(None),
            ReplayEnd::Hang => std::future::pending().await,
            ReplayEnd::Fail => Err(anyhow!("connection reset by peer")),
        }
    }

    async fn close(&mut self) {
        if self.stall_close {
            std::future::pending::<()>().await;
        }
        if !self.closed {
            self.closed = true;
            self.stats.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}
