// ------------------------------------------------------------
// Module declarations
// ------------------------------------------------------------
//
// Each module represents a well-defined responsibility:
//
// - config:     Run parameters, presets and binary configuration
// - endpoints:  Jetstream endpoint pool
// - schema:     Inbound Jetstream events and outbound items
// - normalizer: Post-creation filter and item normalization
// - feed:       Transport seam, replay transport, feed connector
// - collector:  Orchestration policies and the item budget
// - metrics:    Global runtime counters
// - util:       Hashing and string helpers
//
pub mod collector;
pub mod config;
pub mod endpoints;
pub mod feed;
pub mod metrics;
pub mod normalizer;
pub mod schema;
pub mod util;

pub use collector::{CollectionPolicy, Collector, FanOut, ItemStream, SequentialRetry, query};
pub use config::{CollectorConfig, PolicyKind, Preset, RunParameters};
pub use endpoints::{Endpoint, EndpointPool};
pub use schema::NormalizedItem;
