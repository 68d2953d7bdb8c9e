use crate::error::DataError;
use crate::snapshot::{Asset, Snapshot};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Result of [`VenueAdapter::connect_url`]: the URL to dial, plus an
/// optional venue-specific ping interval override (KuCoin returns the
/// server-specified cadence from its REST preflight, spec §4.1/§4.2).
#[derive(Debug, Clone)]
pub struct ConnectPlan {
    pub url: Url,
    pub ping_interval: Option<Duration>,
}

impl ConnectPlan {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            ping_interval: None,
        }
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = Some(interval);
        self
    }
}

/// Outcome of [`VenueAdapter::parse`]ing one inbound text frame (spec §4.1).
#[derive(Debug, Clone)]
pub enum ParseOutcome {
    /// A ticker snapshot was extracted.
    Snapshot(Snapshot),
    /// The frame was recognised but carries no price (heartbeat, ack,
    /// subscription confirmation, non-ticker channel, etc).
    Ignore,
    /// The frame was malformed JSON or violated the expected schema.
    ParseError(String),
}

/// Encapsulates one venue's wire protocol: URL derivation (with optional
/// preflight), the subscribe frame, and the ticker parser (spec §4.1).
///
/// Implementors are stateless, zero-sized tag structs registered in
/// [`crate::feed::venues::adapter_for`] — there is no dynamic loading.
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    /// Derive the WebSocket URL for `asset`. For most venues this is pure
    /// (no I/O); KuCoin performs a REST preflight to obtain a token and
    /// server endpoint.
    async fn connect_url(&self, asset: Asset) -> Result<ConnectPlan, DataError>;

    /// The subscribe frame to send immediately after connecting, or `None`
    /// for venues where the URL itself encodes the subscription
    /// (Binance, Gemini).
    fn subscribe_message(&self, asset: Asset) -> Option<String>;

    /// Parse one inbound text frame. `received_at_ms` is the runner's wall
    /// clock reading at the moment the frame arrived — `Snapshot::timestamp_ms`
    /// is always stamped with this value, never an exchange-supplied
    /// timestamp, per spec §3. Never panics on malformed input.
    fn parse(&self, frame: &str, asset: Asset, received_at_ms: i64) -> ParseOutcome;

    /// The venue's native pair symbol for `asset` (spec §4.1 table).
    fn symbol_for(&self, asset: Asset) -> Result<&'static str, DataError>;
}
