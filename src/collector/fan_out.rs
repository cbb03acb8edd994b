use std::sync::Arc;

use async_stream::stream;
use log::{debug, info, warn};
use tokio::sync::mpsc;

use super::{Budget, CollectionPolicy, ItemStream, long_enough};
use crate::{
    config::RunParameters,
    endpoints::EndpointPool,
    feed::{FeedConnector, FeedTransport},
    metrics::{METRICS, incr},
    normalizer::{PostCommit, normalize},
};

/// Capacity of the merge channel between connectors and the consumer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// One connector per endpoint, merged in completion order.
///
/// DESIGN:
/// - One spawned task per endpoint, each capped at
///   `max_items_to_collect` posts
/// - All tasks feed one bounded channel; whichever connector has
///   a post ready is served next
/// - The consumer owns the length gate and claims budget slots
/// - Once the budget is met the receiver is dropped and every
///   task closes its connection cleanly
///
/// `skip_probability` is not applied by this policy.
pub struct FanOut {
    transport: Arc<dyn FeedTransport>,
    pool: EndpointPool,
    channel_capacity: usize,
}

impl FanOut {
    pub fn new(transport: Arc<dyn FeedTransport>, pool: EndpointPool) -> Self {
        Self {
            transport,
            pool,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

impl CollectionPolicy for FanOut {
    fn name(&self) -> &'static str {
        "fan_out"
    }

    fn collect(&self, params: RunParameters) -> ItemStream {
        let transport = self.transport.clone();
        let endpoints = self.pool.all().to_vec();
        let capacity = self.channel_capacity;

        Box::pin(stream! {
            let budget = Arc::new(Budget::new(params.max_items_to_collect));

            if !budget.is_exhausted() {
                info!(
                    "[Bluesky] Fanning out to {} Jetstream endpoints",
                    endpoints.len()
                );

                let (tx, mut rx) = mpsc::channel::<PostCommit>(capacity);
                let mut tasks = Vec::with_capacity(endpoints.len());

                for endpoint in endpoints {
                    let connector = FeedConnector::new(
                        endpoint,
                        transport.clone(),
                        params.max_items_to_collect,
                    );
                    tasks.push(tokio::spawn(pump(connector, tx.clone(), budget.clone())));
                }
                drop(tx);

                while let Some(post) = rx.recv().await {
                    let item = normalize(&post);
                    if !long_enough(&item, params.min_post_length) {
                        continue;
                    }
                    if !budget.claim() {
                        break;
                    }

                    incr(&METRICS.items_emitted);
                    debug!("[Bluesky] Found post with content: {:?}", item.content);
                    yield item;

                    if budget.is_exhausted() {
                        break;
                    }
                }

                // Wakes every pump still waiting on its connection
                drop(rx);
                for task in tasks {
                    if let Err(e) = task.await {
                        warn!("[Bluesky] Connector task failed: {}", e);
                    }
                }
            }

            info!(
                "[Bluesky] Found {} items, session is over. Closing connections to Jetstream",
                budget.claimed()
            );
        })
    }
}

/// Forwards one connector's posts until it ends, the budget is met,
/// or the consumer goes away. Always closes the connection.
async fn pump(
    mut connector: FeedConnector,
    tx: mpsc::Sender<PostCommit>,
    budget: Arc<Budget>,
) {
    loop {
        if budget.is_exhausted() {
            break;
        }

        let post = tokio::select! {
            _ = tx.closed() => break,
            post = connector.next_post() => post,
        };

        let Some(post) = post else {
            break;
        };
        if tx.send(post).await.is_err() {
            break;
        }
    }

    debug!("[Bluesky] Connector for {} finished", connector.endpoint());
    connector.close().await;
}
