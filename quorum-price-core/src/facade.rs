//! Public entry point: [`Feed`] wires the venue runners, the aggregator
//! loop, and the optional oracle probe into one handle (spec §6).

use crate::aggregator::recompute;
use crate::config::Config;
use crate::error::DataError;
use crate::feed::FeedState;
use crate::oracle::{probe_from_env, OracleHandle, OracleSignal};
use crate::registry::Registry;
use crate::report::PriceReport;
use crate::snapshot::{Asset, VenueId};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Per-venue liveness counters surfaced to operators (spec §6).
#[derive(Debug, Clone)]
pub struct FeedStats {
    pub venue: VenueId,
    pub connected: bool,
    pub last_price: Option<f64>,
    pub age_ms: Option<i64>,
    pub message_count: u64,
    pub error_count: u64,
    pub reconnect_count: u64,
}

/// The facade this crate exposes: start a per-asset reference-price feed
/// across a chosen set of venues, then poll its current state.
pub struct Feed {
    asset: Asset,
    venues: Vec<VenueId>,
    config: Config,
    registry: Registry,
    report: Arc<RwLock<Option<Arc<PriceReport>>>>,
    oracle: OracleHandle,
    started: AtomicBool,
    aggregator_handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl Feed {
    /// Validates `config` against `venues` (spec §6's `ConfigInvalid`
    /// failure mode) before constructing anything that could do I/O.
    pub fn new(asset: Asset, venues: Vec<VenueId>, config: Config) -> Result<Self, DataError> {
        config.validate(&venues)?;

        Ok(Self {
            registry: Registry::new(&venues, &config),
            asset,
            venues,
            config,
            report: Arc::new(RwLock::new(None)),
            oracle: OracleHandle::new(),
            started: AtomicBool::new(false),
            aggregator_handle: RwLock::new(None),
        })
    }

    /// Spawns one [`crate::feed::FeedRunner`] per venue, the aggregator loop
    /// that recomputes [`PriceReport`]s on each doorbell ring, and the
    /// oracle probe task if one is configured in the environment. Idempotent.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Feed::start called twice, ignoring");
            return;
        }

        self.registry.start_all(self.asset, &self.venues, self.config.clone());

        let states = self.registry.states();
        let fanout = self.registry.fanout();
        let report = Arc::clone(&self.report);
        let config = self.config.clone();
        let asset = self.asset;

        let handle = tokio::spawn(async move {
            loop {
                let rung = fanout.wait_and_drain().await;
                if rung.is_empty() {
                    continue;
                }
                let now_ms = chrono::Utc::now().timestamp_millis();
                let snapshot: Vec<(VenueId, FeedState)> =
                    states.read().iter().map(|(v, s)| (*v, s.clone())).collect();

                if let Some(new_report) = recompute(asset, &snapshot, &config, now_ms) {
                    info!(
                        price = new_report.price,
                        sources = new_report.source_count,
                        confidence = new_report.confidence,
                        "published price report"
                    );
                    *report.write() = Some(Arc::new(new_report));
                }
            }
        });
        *self.aggregator_handle.write() = Some(handle);

        if let Some(probe) = probe_from_env() {
            let report_for_oracle = Arc::clone(&self.report);
            self.oracle.spawn(probe, move || {
                report_for_oracle.read().as_ref().map(|r| r.price)
            });
        }
    }

    /// Aborts every runner task and the aggregator loop. Safe to call more
    /// than once or before [`Feed::start`].
    pub async fn stop(&self) {
        self.registry.stop_all().await;
        if let Some(handle) = self.aggregator_handle.write().take() {
            handle.abort();
            let _ = handle.await;
        }
        self.started.store(false, Ordering::SeqCst);
    }

    /// Current reference price, or `None` if no report has ever published or
    /// the last one published is stale per [`PriceReport::is_stale`].
    pub fn get_price(&self) -> Option<f64> {
        self.get_report().map(|r| r.price)
    }

    pub fn get_divergence(&self) -> Option<f64> {
        self.get_report().map(|r| r.divergence_pct)
    }

    pub fn get_confidence(&self) -> Option<f64> {
        self.get_report().map(|r| r.confidence)
    }

    /// The latest non-stale [`PriceReport`], if any (spec §9 Open Question
    /// (b): a stale report is treated as equivalent to none, never returned).
    pub fn get_report(&self) -> Option<Arc<PriceReport>> {
        let guard = self.report.read();
        let report = guard.as_ref()?;
        let now_ms = chrono::Utc::now().timestamp_millis();
        if report.is_stale(now_ms, self.config.max_staleness_ms) {
            return None;
        }
        Some(Arc::clone(report))
    }

    pub fn get_oracle_signal(&self) -> Option<OracleSignal> {
        self.oracle.latest()
    }

    /// Per-venue liveness snapshot for operator dashboards.
    pub fn feed_stats(&self) -> Vec<FeedStats> {
        let states = self.registry.states();
        let guard = states.read();
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.venues
            .iter()
            .map(|venue| {
                let state = guard.get(venue).cloned().unwrap_or_default();
                let last_price = state.last_snapshot.as_ref().map(|s| s.price);
                let age_ms = state.last_snapshot.as_ref().map(|_| now_ms - state.last_update_ms);
                FeedStats {
                    venue: *venue,
                    connected: state.connected,
                    last_price,
                    age_ms,
                    message_count: state.message_count,
                    error_count: state.error_count,
                    reconnect_count: state.reconnect_count,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = Config::default();
        config.min_sources = 0;
        let result = Feed::new(Asset::Btc, vec![VenueId::Binance, VenueId::Coinbase], config);
        assert!(result.is_err());
    }

    #[test]
    fn test_get_price_is_none_before_start() {
        let feed = Feed::new(Asset::Btc, vec![VenueId::Binance, VenueId::Coinbase], Config::default()).unwrap();
        assert!(feed.get_price().is_none());
        assert!(feed.get_report().is_none());
    }

    #[test]
    fn test_feed_stats_cover_every_configured_venue() {
        let venues = vec![VenueId::Binance, VenueId::Coinbase, VenueId::Kraken];
        let feed = Feed::new(Asset::Btc, venues.clone(), Config::default()).unwrap();
        let stats = feed.feed_stats();
        assert_eq!(stats.len(), venues.len());
        assert!(stats.iter().all(|s| !s.connected));
        assert!(stats.iter().all(|s| s.last_price.is_none()));
        assert!(stats.iter().all(|s| s.age_ms.is_none()));
    }
}
