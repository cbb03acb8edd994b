/// Collector module
///
/// Orchestrates feed connectors into one ordered, bounded stream
/// of `NormalizedItem`s.
///
/// Two interchangeable policies implement `CollectionPolicy`:
/// - `SequentialRetry`: one endpoint at a time, fixed backoff,
///   limited attempts, optional load shedding
/// - `FanOut`: one connector per endpoint, merged in completion
///   order, no load shedding
///
/// Both apply the same length gate and the same global `Budget`.
/// Neither ever yields an error: upstream trouble only shortens
/// the stream.
pub mod budget;
pub mod fan_out;
pub mod sequential;

use std::pin::Pin;
use std::sync::Arc;

use futures_util::Stream;
use log::debug;
use serde_json::Value;

use crate::{
    config::{PolicyKind, Preset, RunParameters},
    endpoints::EndpointPool,
    feed::{FeedTransport, WsTransport},
    metrics::{METRICS, incr},
    schema::NormalizedItem,
    util,
};

pub use budget::Budget;
pub use fan_out::FanOut;
pub use sequential::SequentialRetry;

/// Lazy, finite, non-restartable output of one session.
pub type ItemStream = Pin<Box<dyn Stream<Item = NormalizedItem> + Send>>;

/// Strategy that turns run parameters into an item stream.
pub trait CollectionPolicy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Starts a session. Nothing connects until the stream is polled.
    fn collect(&self, params: RunParameters) -> ItemStream;
}

/// Entry point holding the policy chosen at construction time.
#[derive(Clone)]
pub struct Collector {
    policy: Arc<dyn CollectionPolicy>,
}

impl Collector {
    pub fn new(policy: Arc<dyn CollectionPolicy>) -> Self {
        Self { policy }
    }

    pub fn sequential(transport: Arc<dyn FeedTransport>, pool: EndpointPool) -> Self {
        Self::new(Arc::new(SequentialRetry::new(transport, pool)))
    }

    pub fn fan_out(transport: Arc<dyn FeedTransport>, pool: EndpointPool) -> Self {
        Self::new(Arc::new(FanOut::new(transport, pool)))
    }

    pub fn from_kind(
        kind: PolicyKind,
        transport: Arc<dyn FeedTransport>,
        pool: EndpointPool,
    ) -> Self {
        match kind {
            PolicyKind::Sequential => Self::sequential(transport, pool),
            PolicyKind::FanOut => Self::fan_out(transport, pool),
        }
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn collect(&self, params: RunParameters) -> ItemStream {
        self.policy.collect(params)
    }
}

/// Collects live Bluesky posts with lenient caller options.
///
/// Resolves `options` over the standard preset and runs the
/// sequential policy against the public Jetstream hosts.
pub fn query(options: Option<&Value>) -> ItemStream {
    let params = RunParameters::resolve(options, Preset::Standard);
    Collector::sequential(Arc::new(WsTransport::new()), EndpointPool::jetstream()).collect(params)
}

/// Inclusive minimum content length, in characters.
pub(crate) fn long_enough(item: &NormalizedItem, min_post_length: usize) -> bool {
    if util::char_len(&item.content) >= min_post_length {
        true
    } else {
        incr(&METRICS.items_too_short);
        debug!("[Bluesky] Post is too short, skipping");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ReplayTransport;

    fn item(content: &str) -> NormalizedItem {
        NormalizedItem {
            content: content.to_string(),
            author: util::sha1_hex("did:plc:a"),
            created_at: String::new(),
            domain: "bsky.app".into(),
            external_id: "r".into(),
            external_parent_id: String::new(),
            url: String::new(),
        }
    }

    #[test]
    fn length_gate_is_inclusive_and_counts_chars() {
        assert!(long_enough(&item("hello"), 5));
        assert!(!long_enough(&item("hell"), 5));
        assert!(long_enough(&item(""), 0));
        assert!(long_enough(&item("héllo"), 5));
    }

    #[test]
    fn policy_is_selected_by_kind() {
        let transport = Arc::new(ReplayTransport::new());
        let pool = EndpointPool::jetstream();
        let seq = Collector::from_kind(PolicyKind::Sequential, transport.clone(), pool);
        let fan = Collector::from_kind(PolicyKind::FanOut, transport, EndpointPool::jetstream());
        assert_eq!(seq.policy_name(), "sequential");
        assert_eq!(fan.policy_name(), "fan_out");
    }
}
