//! Per-venue reconnecting WebSocket runner (spec §4.2).
//!
//! Grounded on the connect/ping/read loop shape of
//! `barter-trading-tuis/src/shared/websocket.rs::run_websocket_loop`, adapted
//! to drive a single shared [`FeedState`] slot instead of an mpsc channel of
//! decoded events, and to ring the [`Fanout`] doorbell after each accepted
//! snapshot.

use crate::config::Config;
use crate::feed::adapter::{ParseOutcome, VenueAdapter};
use crate::feed::venues::adapter_for;
use crate::feed::FeedState;
use crate::registry::Fanout;
use crate::snapshot::{Asset, VenueId};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Lifecycle phase of a single venue's runner, observable for diagnostics
/// (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerPhase {
    Idle,
    Connecting,
    Subscribing,
    Streaming,
    Backoff,
    Stopped,
}

/// Drives one venue's connection lifecycle: connect (with timeout),
/// subscribe, stream ticks into the shared [`FeedState`], keepalive ping,
/// and exponential-backoff reconnect on any failure.
pub struct FeedRunner {
    venue: VenueId,
    asset: Asset,
    config: Config,
    states: Arc<RwLock<HashMap<VenueId, FeedState>>>,
    fanout: Arc<Fanout>,
    adapter: Box<dyn VenueAdapter>,
}

impl FeedRunner {
    pub fn new(
        venue: VenueId,
        asset: Asset,
        config: Config,
        states: Arc<RwLock<HashMap<VenueId, FeedState>>>,
        fanout: Arc<Fanout>,
    ) -> Self {
        Self {
            venue,
            asset,
            config,
            states,
            fanout,
            adapter: adapter_for(venue),
        }
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut FeedState) -> R) -> R {
        let mut states = self.states.write();
        let state = states.entry(self.venue).or_default();
        f(state)
    }

    /// Runs the reconnect loop forever. Intended to be spawned as its own
    /// task; cancellation is driven by aborting that task, which drops the
    /// in-flight socket (if any) and guarantees its closure.
    pub async fn run(mut self) {
        let mut backoff_ms = self.config.reconnect_delay.as_millis() as u64;

        loop {
            match self.connect_and_stream(&mut backoff_ms).await {
                Ok(()) => {
                    // Stream ended cleanly (peer closed); reconnect immediately
                    // at the minimum delay since this wasn't an error.
                    backoff_ms = self.config.reconnect_delay.as_millis() as u64;
                }
                Err(reason) => {
                    warn!(venue = %self.venue, %reason, "feed runner disconnected");
                }
            }

            self.with_state(|s| s.mark_disconnected());
            let delay = Duration::from_millis(backoff_ms);
            debug!(venue = %self.venue, ?delay, "backing off before reconnect");
            tokio::time::sleep(delay).await;

            let next = ((backoff_ms as f64) * self.config.reconnect_backoff) as u64;
            backoff_ms = next.min(self.config.max_reconnect_delay.as_millis() as u64);
            self.with_state(|s| s.record_reconnect_attempt(backoff_ms));
        }
    }

    async fn connect_and_stream(&mut self, backoff_ms: &mut u64) -> Result<(), String> {
        let plan = tokio::time::timeout(self.config.connect_timeout, self.adapter.connect_url(self.asset))
            .await
            .map_err(|_| "connect timed out".to_string())?
            .map_err(|e| e.to_string())?;

        let (stream, _response) = tokio::time::timeout(self.config.connect_timeout, tokio_tungstenite::connect_async(plan.url.as_str()))
            .await
            .map_err(|_| "websocket handshake timed out".to_string())?
            .map_err(|e| e.to_string())?;

        info!(venue = %self.venue, "connected");
        self.with_state(|s| s.mark_connected());

        let (mut write, mut read) = stream.split();

        if let Some(sub) = self.adapter.subscribe_message(self.asset) {
            write
                .send(Message::Text(sub.into()))
                .await
                .map_err(|e| e.to_string())?;
        }

        let ping_interval = plan.ping_interval.unwrap_or(self.config.ping_interval);
        let mut ping_timer = tokio::time::interval(ping_interval);
        ping_timer.tick().await; // first tick fires immediately, discard it

        let mut pong_deadline: Option<tokio::time::Instant> = None;
        let mut consecutive_parse_errors: u32 = 0;

        loop {
            tokio::select! {
                _ = ping_timer.tick() => {
                    write.send(Message::Ping(Vec::new().into())).await.map_err(|e| e.to_string())?;
                    pong_deadline = Some(tokio::time::Instant::now() + self.config.ping_response_timeout);
                }
                _ = wait_for_deadline(pong_deadline) => {
                    return Err("unanswered ping within ping-response timeout".to_string());
                }
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            let received_at_ms = Self::now_ms();
                            match self.adapter.parse(&text, self.asset, received_at_ms) {
                                ParseOutcome::Snapshot(snapshot) => {
                                    consecutive_parse_errors = 0;
                                    self.with_state(|s| s.record_snapshot(snapshot));
                                    self.with_state(|s| s.reset_backoff(self.config.reconnect_delay.as_millis() as u64));
                                    *backoff_ms = self.config.reconnect_delay.as_millis() as u64;
                                    self.fanout.ring(self.venue);
                                }
                                ParseOutcome::Ignore => {}
                                ParseOutcome::ParseError(reason) => {
                                    consecutive_parse_errors += 1;
                                    debug!(venue = %self.venue, %reason, consecutive_parse_errors, "ignoring unparseable frame");
                                    self.with_state(|s| s.record_parse_error());
                                    if exceeds_parse_error_threshold(consecutive_parse_errors, self.config.max_consecutive_parse_errors) {
                                        return Err(format!(
                                            "{consecutive_parse_errors} consecutive parse errors exceeds threshold"
                                        ));
                                    }
                                }
                            }
                        }
                        Some(Ok(Message::Pong(_))) => {
                            pong_deadline = None;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            debug!(venue = %self.venue, ?frame, "peer closed connection");
                            return Ok(());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.to_string()),
                        None => return Ok(()),
                    }
                }
            }
        }
    }
}

/// Resolves at `deadline` if set, otherwise never — lets a single
/// `tokio::select!` branch express "time out only while a ping is
/// outstanding" without restructuring the loop around an `Option`.
async fn wait_for_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// `STREAMING → BACKOFF` on N consecutive parse errors > threshold (spec
/// §4.2). Pulled out as a pure function so the boundary is directly
/// testable without driving a real socket.
fn exceeds_parse_error_threshold(consecutive: u32, threshold: u32) -> bool {
    consecutive > threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_law_matches_min_geometric_cap() {
        let config = Config::default();
        let mut backoff_ms = config.reconnect_delay.as_millis() as u64;
        let expected = [1000u64, 1500, 2250, 3375, 5062, 7593, 11389, 17083, 25624, 30000, 30000];
        let mut observed = vec![backoff_ms];
        for _ in 0..(expected.len() - 1) {
            let next = ((backoff_ms as f64) * config.reconnect_backoff) as u64;
            backoff_ms = next.min(config.max_reconnect_delay.as_millis() as u64);
            observed.push(backoff_ms);
        }
        assert_eq!(observed, expected);
    }

    #[test]
    fn test_runner_phase_variants_are_distinct() {
        assert_ne!(RunnerPhase::Idle, RunnerPhase::Streaming);
        assert_ne!(RunnerPhase::Backoff, RunnerPhase::Stopped);
    }

    #[test]
    fn test_parse_error_threshold_trips_only_once_exceeded() {
        let threshold = Config::default().max_consecutive_parse_errors;
        assert!(!exceeds_parse_error_threshold(threshold, threshold));
        assert!(exceeds_parse_error_threshold(threshold + 1, threshold));
    }
}
