use bluesky_firehose_collector::{
    Collector, CollectorConfig, EndpointPool,
    feed::{FeedTransport, ReplayScript, ReplayTransport, WsTransport},
    metrics::METRICS,
};

use anyhow::anyhow;
use futures_util::StreamExt;
use log::info;
use rustls::crypto::{CryptoProvider, ring};

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// Runs one collection session and prints every item as a JSON
// line on stdout. Logs go to stderr.
//
// Responsibilities:
// - Initialize cryptography backend (rustls)
// - Load optional configuration
// - Pick transport and policy
// - Drain the item stream
//
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --------------------------------------------------------
    // rustls >= 0.23 requires an explicit CryptoProvider
    // installation, once, before the first TLS handshake.
    // --------------------------------------------------------
    CryptoProvider::install_default(ring::default_provider())
        .map_err(|_| anyhow!("failed to install rustls CryptoProvider"))?;

    let config = load_config("config.json")?;

    let default_level = match config.debug.as_ref().and_then(|d| d.log) {
        Some(true) => "debug",
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let params = config.run_parameters();
    info!(
        "[Bluesky] Session parameters: max_oldness_seconds={} maximum_items_to_collect={} min_post_length={} skip_probability={}",
        params.max_oldness_seconds,
        params.max_items_to_collect,
        params.min_post_length,
        params.skip_probability,
    );

    // --------------------------------------------------------
    // Transport: live Jetstream, or recorded frames
    // --------------------------------------------------------
    let transport: Arc<dyn FeedTransport> = match &config.replay_file {
        Some(path) => {
            info!("[Bluesky] Replaying frames from {}", path);
            let data = fs::read_to_string(path)?;
            Arc::new(ReplayTransport::new().with_default(ReplayScript::from_ndjson(&data)))
        }
        None => Arc::new(WsTransport::new()),
    };

    let collector = Collector::from_kind(
        config.policy,
        transport,
        EndpointPool::new(config.endpoints.clone()),
    );
    info!("[Bluesky] Using {} policy", collector.policy_name());

    // --------------------------------------------------------
    // Periodic metrics (low-noise)
    // --------------------------------------------------------
    let reporter = tokio::spawn(async {
        loop {
            sleep(Duration::from_secs(10)).await;
            info!("[METRICS] {}", METRICS.summary());
        }
    });

    let mut items = collector.collect(params);
    while let Some(item) = items.next().await {
        println!("{}", serde_json::to_string(&item)?);
    }

    reporter.abort();
    info!("[METRICS] {}", METRICS.summary());

    Ok(())
}

// ------------------------------------------------------------
// Configuration loader
// ------------------------------------------------------------
//
// A missing file is not an error: every setting has a default.
//
fn load_config(path: &str) -> anyhow::Result<CollectorConfig> {
    if !Path::new(path).exists() {
        return Ok(CollectorConfig::default());
    }
    let data = fs::read_to_string(path)?;
    let cfg = serde_json::from_str(&data)?;
    Ok(cfg)
}
