use std::fmt;

use rand::random_range;

use crate::schema::POST_COLLECTION;

/// Public Jetstream instances. All four are equivalent replicas.
pub const JETSTREAM_HOSTS: [&str; 4] = [
    "jetstream1.us-east.bsky.network",
    "jetstream2.us-east.bsky.network",
    "jetstream1.us-west.bsky.network",
    "jetstream2.us-west.bsky.network",
];

/// One upstream Jetstream node, identified by host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Subscription URI, filtered server-side to posts.
    pub fn subscribe_url(&self) -> String {
        format!(
            "wss://{}/subscribe?wantedCollections={}",
            self.host, POST_COLLECTION
        )
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host)
    }
}

/// Static set of interchangeable endpoints.
///
/// There is no health tracking: an endpoint that failed in one
/// session is a valid pick in the next one.
#[derive(Debug, Clone)]
pub struct EndpointPool {
    endpoints: Vec<Endpoint>,
}

impl EndpointPool {
    /// The four public Jetstream hosts.
    pub fn jetstream() -> Self {
        Self::new(JETSTREAM_HOSTS)
    }

    /// Builds a pool from caller-supplied hosts.
    ///
    /// An empty list falls back to the public Jetstream hosts so
    /// that `pick()` always has something to return.
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let endpoints: Vec<Endpoint> = hosts.into_iter().map(Endpoint::new).collect();
        if endpoints.is_empty() {
            return Self::jetstream();
        }
        Self { endpoints }
    }

    /// Uniform random choice of a single endpoint.
    pub fn pick(&self) -> Endpoint {
        let idx = random_range(0..self.endpoints.len());
        self.endpoints[idx].clone()
    }

    /// Every endpoint, for fan-out.
    pub fn all(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl Default for EndpointPool {
    fn default() -> Self {
        Self::jetstream()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_url_targets_posts() {
        let ep = Endpoint::new("jetstream1.us-east.bsky.network");
        assert_eq!(
            ep.subscribe_url(),
            "wss://jetstream1.us-east.bsky.network/subscribe?wantedCollections=app.bsky.feed.post"
        );
    }

    #[test]
    fn pick_returns_pool_member() {
        let pool = EndpointPool::jetstream();
        assert_eq!(pool.len(), 4);
        for _ in 0..32 {
            let ep = pool.pick();
            assert!(pool.all().contains(&ep));
        }
    }

    #[test]
    fn empty_override_falls_back() {
        let pool = EndpointPool::new(Vec::<String>::new());
        assert_eq!(pool.len(), 4);

        let pool = EndpointPool::new(["a.example", "b.example"]);
        assert_eq!(pool.all().len(), 2);
        assert_eq!(pool.all()[1].host(), "b.example");
    }
}
