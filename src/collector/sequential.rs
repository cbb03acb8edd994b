use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use log::{debug, info};
use rand::{SeedableRng, rngs::StdRng};
use tokio::time::sleep;

use super::{Budget, CollectionPolicy, ItemStream, long_enough};
use crate::{
    config::RunParameters,
    endpoints::EndpointPool,
    feed::{FeedConnector, FeedTransport, SkipGate, UnitSource},
    metrics::{METRICS, incr},
    normalizer::normalize,
};

/// Builds a fresh random source for each attempt.
pub type SamplerFactory = Arc<dyn Fn() -> Box<dyn UnitSource> + Send + Sync>;

pub const DEFAULT_ATTEMPTS: usize = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// One endpoint at a time, retried on shortfall.
///
/// Each attempt picks a random endpoint and streams up to
/// `max_items_to_collect` posts from it. When the stream ends
/// before the budget is met, the policy sleeps `backoff` and
/// tries again, up to `attempts` attempts in total.
///
/// Load shedding (`skip_probability`) applies to every decoded
/// event before filtering.
pub struct SequentialRetry {
    transport: Arc<dyn FeedTransport>,
    pool: EndpointPool,
    attempts: usize,
    backoff: Duration,
    sampler: SamplerFactory,
}

impl SequentialRetry {
    pub fn new(transport: Arc<dyn FeedTransport>, pool: EndpointPool) -> Self {
        Self {
            transport,
            pool,
            attempts: DEFAULT_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            sampler: Arc::new(|| Box::new(StdRng::from_os_rng()) as Box<dyn UnitSource>),
        }
    }

    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerFactory) -> Self {
        self.sampler = sampler;
        self
    }
}

impl CollectionPolicy for SequentialRetry {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn collect(&self, params: RunParameters) -> ItemStream {
        let transport = self.transport.clone();
        let pool = self.pool.clone();
        let attempts = self.attempts;
        let backoff = self.backoff;
        let sampler = self.sampler.clone();

        Box::pin(stream! {
            let budget = Budget::new(params.max_items_to_collect);

            for attempt in 1..=attempts {
                if budget.is_exhausted() {
                    break;
                }

                info!(
                    "[Bluesky] Fetching posts from the firehose, in real time (attempt {}/{})",
                    attempt, attempts
                );

                let mut connector = FeedConnector::new(
                    pool.pick(),
                    transport.clone(),
                    params.max_items_to_collect,
                )
                .with_skip(SkipGate::new(params.skip_probability, sampler()));

                while let Some(post) = connector.next_post().await {
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
                connector.close().await;

                if !budget.is_exhausted() && attempt < attempts {
                    info!(
                        "[Bluesky] {} items short, retrying in {:?}",
                        budget.remaining(),
                        backoff
                    );
                    sleep(backoff).await;
                }
            }

            info!(
                "[Bluesky] Found {} items, session is over. Closing connection to Jetstream",
                budget.claimed()
            );
        })
    }
}
