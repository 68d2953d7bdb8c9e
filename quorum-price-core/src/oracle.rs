//! Chainlink price-feed lead-lag signal (spec §4.5).
//!
//! Grounded on the `stream::unfold` REST-polling shape of
//! `barter-data-server/src/main.rs::binance_open_interest_poller` for the
//! REST probe, and on the [`crate::feed::FeedRunner`] reconnect-loop shape
//! for the WebSocket probe. Which one runs is decided once, at startup, by
//! [`probe_from_env`] — this module is the sole reader of the
//! `CHAINLINK_API_KEY`/`CHAINLINK_API_SECRET` environment variables, since
//! they are normative only for this boundary (spec §6).

use async_trait::async_trait;
use futures::{stream, StreamExt};
use parking_lot::RwLock;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Directional read of a reference-price engine versus an external Chainlink
/// feed (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OracleDirection {
    Long,
    Short,
    Neutral,
}

/// One comparison between the engine's current price and the Chainlink feed
/// value at the same instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OracleSignal {
    pub divergence_bps: f64,
    pub direction: OracleDirection,
    pub strength: f64,
    pub observed_at_ms: i64,
}

impl OracleSignal {
    /// `divergence_bps = (engine_price - oracle_price) / oracle_price * 10_000`;
    /// `strength = min(1.0, |divergence_bps| / 50)` (spec §4.5).
    pub fn compute(engine_price: f64, oracle_price: f64, observed_at_ms: i64) -> Self {
        let divergence_bps = (engine_price - oracle_price) / oracle_price * 10_000.0;
        let direction = if divergence_bps > 5.0 {
            OracleDirection::Long
        } else if divergence_bps < -5.0 {
            OracleDirection::Short
        } else {
            OracleDirection::Neutral
        };
        let strength = (divergence_bps.abs() / 50.0).min(1.0);

        Self {
            divergence_bps,
            direction,
            strength,
            observed_at_ms,
        }
    }
}

/// Abstracts how a raw Chainlink price is obtained, so the engine can swap
/// REST polling for a WebSocket push feed without touching the signal math.
#[async_trait]
pub trait OracleProbe: Send + Sync {
    /// Yields successive `(price, observed_at_ms)` readings. Ends only if the
    /// underlying transport is permanently exhausted; transient errors are
    /// logged and skipped rather than ending the stream.
    fn prices(self: Box<Self>) -> futures::stream::BoxStream<'static, (f64, i64)>;
}

#[derive(Debug, Deserialize)]
struct ChainlinkRestResponse {
    price: f64,
}

/// Polls a Chainlink price feed REST endpoint on a fixed interval.
pub struct ChainlinkRestProbe {
    url: String,
    api_key: Option<String>,
    poll_interval: Duration,
}

impl ChainlinkRestProbe {
    pub fn new(url: String, api_key: Option<String>) -> Self {
        Self {
            url,
            api_key,
            poll_interval: Duration::from_millis(1_000),
        }
    }
}

#[async_trait]
impl OracleProbe for ChainlinkRestProbe {
    fn prices(self: Box<Self>) -> futures::stream::BoxStream<'static, (f64, i64)> {
        let client = reqwest::Client::new();
        let url = self.url;
        let api_key = self.api_key;
        let timer = tokio::time::interval(self.poll_interval);

        stream::unfold((client, url, api_key, timer), move |(client, url, api_key, mut timer)| async move {
            loop {
                timer.tick().await;

                let mut request = client.get(&url);
                if let Some(key) = &api_key {
                    request = request.header("X-Api-Key", key);
                }

                match request.send().await {
                    Ok(response) => match response.json::<ChainlinkRestResponse>().await {
                        Ok(body) => {
                            let now_ms = chrono::Utc::now().timestamp_millis();
                            return Some(((body.price, now_ms), (client, url, api_key, timer)));
                        }
                        Err(e) => {
                            warn!(%e, "chainlink REST probe returned unparseable body, retrying");
                            continue;
                        }
                    },
                    Err(e) => {
                        warn!(%e, "chainlink REST probe request failed, retrying");
                        continue;
                    }
                }
            }
        })
        .boxed()
    }
}

/// Streams a Chainlink price feed over a push WebSocket connection,
/// reconnecting on failure in the same shape as [`crate::feed::FeedRunner`].
pub struct ChainlinkWsProbe {
    url: String,
    api_key: Option<String>,
    api_secret: Option<String>,
}

impl ChainlinkWsProbe {
    pub fn new(url: String, api_key: Option<String>, api_secret: Option<String>) -> Self {
        Self { url, api_key, api_secret }
    }
}

#[derive(Debug, Deserialize)]
struct ChainlinkWsMessage {
    price: f64,
}

#[async_trait]
impl OracleProbe for ChainlinkWsProbe {
    fn prices(self: Box<Self>) -> futures::stream::BoxStream<'static, (f64, i64)> {
        stream::unfold(self, move |probe| async move {
            loop {
                match tokio_tungstenite::connect_async(probe.url.as_str()).await {
                    Ok((mut ws, _)) => {
                        if let (Some(key), Some(secret)) = (&probe.api_key, &probe.api_secret) {
                            let auth = serde_json::json!({"apiKey": key, "apiSecret": secret}).to_string();
                            if futures::SinkExt::send(&mut ws, tokio_tungstenite::tungstenite::Message::Text(auth.into()))
                                .await
                                .is_err()
                            {
                                continue;
                            }
                        }

                        while let Some(frame) = ws.next().await {
                            match frame {
                                Ok(tokio_tungstenite::tungstenite::Message::Text(text)) => {
                                    if let Ok(msg) = serde_json::from_str::<ChainlinkWsMessage>(&text) {
                                        let now_ms = chrono::Utc::now().timestamp_millis();
                                        return Some(((msg.price, now_ms), probe));
                                    }
                                }
                                Ok(_) => {}
                                Err(e) => {
                                    debug!(%e, "chainlink ws probe socket error, reconnecting");
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!(%e, "chainlink ws probe connect failed, retrying");
                    }
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        })
        .boxed()
    }
}

/// Picks a probe transport from environment: `CHAINLINK_WS_URL` selects the
/// push-feed probe, `CHAINLINK_REST_URL` (or its absence) selects REST
/// polling. `CHAINLINK_API_KEY`/`CHAINLINK_API_SECRET` are read here and
/// nowhere else in the crate. Returns `None` if no Chainlink endpoint is
/// configured at all — the oracle signal is an optional collaborator.
pub fn probe_from_env() -> Option<Box<dyn OracleProbe>> {
    let api_key = std::env::var("CHAINLINK_API_KEY").ok();
    let api_secret = std::env::var("CHAINLINK_API_SECRET").ok();

    if let Ok(ws_url) = std::env::var("CHAINLINK_WS_URL") {
        return Some(Box::new(ChainlinkWsProbe::new(ws_url, api_key, api_secret)));
    }
    if let Ok(rest_url) = std::env::var("CHAINLINK_REST_URL") {
        return Some(Box::new(ChainlinkRestProbe::new(rest_url, api_key)));
    }
    None
}

/// Holds the most recent [`OracleSignal`], replaced wholesale on each new
/// reading (same replace-pointer publication pattern as the price report).
pub struct OracleHandle {
    latest: Arc<RwLock<Option<OracleSignal>>>,
}

impl OracleHandle {
    pub fn new() -> Self {
        Self {
            latest: Arc::new(RwLock::new(None)),
        }
    }

    pub fn latest(&self) -> Option<OracleSignal> {
        *self.latest.read()
    }

    /// Spawns a task that drains `probe` and recomputes the signal against
    /// `engine_price_fn`'s reading each time a new oracle price arrives.
    pub fn spawn(&self, probe: Box<dyn OracleProbe>, engine_price_fn: impl Fn() -> Option<f64> + Send + 'static) {
        let latest = Arc::clone(&self.latest);
        tokio::spawn(async move {
            let mut prices = probe.prices();
            while let Some((oracle_price, observed_at_ms)) = prices.next().await {
                if let Some(engine_price) = engine_price_fn() {
                    let signal = OracleSignal::compute(engine_price, oracle_price, observed_at_ms);
                    *latest.write() = Some(signal);
                }
            }
        });
    }
}

impl Default for OracleHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_long_direction_above_threshold() {
        let signal = OracleSignal::compute(97050.0, 97000.0, 0);
        assert_eq!(signal.direction, OracleDirection::Long);
    }

    #[test]
    fn test_signal_short_direction_below_threshold() {
        let signal = OracleSignal::compute(96900.0, 97000.0, 0);
        assert_eq!(signal.direction, OracleDirection::Short);
    }

    #[test]
    fn test_signal_neutral_within_band() {
        let signal = OracleSignal::compute(97000.5, 97000.0, 0);
        assert_eq!(signal.direction, OracleDirection::Neutral);
    }

    #[test]
    fn test_signal_neutral_between_one_and_five_bps() {
        // divergence = 2.5 bps: inside the 1-5bps band, must stay Neutral.
        let signal = OracleSignal::compute(97024.25, 97000.0, 0);
        assert!((signal.divergence_bps - 2.5).abs() < 1e-6);
        assert_eq!(signal.direction, OracleDirection::Neutral);
    }

    #[test]
    fn test_strength_caps_at_one() {
        let signal = OracleSignal::compute(98000.0, 97000.0, 0);
        assert_eq!(signal.strength, 1.0);
    }
}
