/// Feed module
///
/// Everything between a Jetstream endpoint and a filtered post:
/// - `transport`: the wire seam (tokio-tungstenite in production)
/// - `replay`:    recorded frames served from memory
/// - `connector`: one connection's lifecycle, decoding and filtering
///
/// Post normalization and all budget decisions live elsewhere.
pub mod connector;
pub mod replay;
pub mod transport;

pub use connector::{ConnectorState, FeedConnector, FixedSequence, SkipGate, UnitSource};
pub use replay::{ReplayEnd, ReplayScript, ReplayTransport};
pub use transport::{FeedConnection, FeedTransport, Frame, WsTransport, install_crypto_provider};
