//! Per-venue feed runtime: adapters, the runner state machine, and the
//! health state each runner owns and publishes (spec §4.2).

pub mod adapter;
pub mod runner;
pub mod venues;

pub use adapter::{ConnectPlan, ParseOutcome, VenueAdapter};
pub use runner::{FeedRunner, RunnerPhase};

use crate::snapshot::Snapshot;

/// Per-venue health kept by the owning [`FeedRunner`] (spec §3). Mutated
/// only by its runner; read by the [`crate::aggregator`] and by
/// `Feed::feed_stats`.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    pub connected: bool,
    pub last_snapshot: Option<Snapshot>,
    pub last_update_ms: i64,
    pub message_count: u64,
    pub error_count: u64,
    pub reconnect_count: u64,
    pub current_backoff_ms: u64,
}

impl FeedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// `connected ∧ last_snapshot ≠ none ∧ (now − last_update_ms) < max_staleness_ms`
    /// (spec §3).
    pub fn is_healthy(&self, now_ms: i64, max_staleness_ms: u64) -> bool {
        self.connected
            && self.last_snapshot.is_some()
            && (now_ms - self.last_update_ms) < max_staleness_ms as i64
    }

    pub fn record_snapshot(&mut self, snapshot: Snapshot) {
        self.last_update_ms = snapshot.timestamp_ms;
        self.message_count += 1;
        self.last_snapshot = Some(snapshot);
    }

    pub fn record_parse_error(&mut self) {
        self.error_count += 1;
    }

    pub fn mark_connected(&mut self) {
        self.connected = true;
    }

    pub fn mark_disconnected(&mut self) {
        self.connected = false;
    }

    pub fn record_reconnect_attempt(&mut self, next_backoff_ms: u64) {
        self.reconnect_count += 1;
        self.current_backoff_ms = next_backoff_ms;
    }

    pub fn reset_backoff(&mut self, initial_backoff_ms: u64) {
        self.current_backoff_ms = initial_backoff_ms;
    }
}
