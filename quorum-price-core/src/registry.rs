//! Venue runner supervision and the doorbell fanout that wakes the
//! aggregator.

use crate::config::Config;
use crate::feed::{FeedRunner, FeedState};
use crate::snapshot::{Asset, VenueId};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Bounded, drop-oldest wake-token queue. Carries only [`VenueId`]s, never
/// snapshot payloads: the aggregator always re-reads the authoritative
/// [`FeedState`] for the venue it wakes on, so coalescing duplicate or
/// stale tokens loses no information.
pub struct Fanout {
    capacity: usize,
    queue: Mutex<VecDeque<VenueId>>,
    notify: Notify,
}

impl Fanout {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity: capacity.max(1),
            queue: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            notify: Notify::new(),
        })
    }

    /// Called by a [`FeedRunner`] after it records a new snapshot.
    pub fn ring(&self, venue: VenueId) {
        let mut queue = self.queue.lock();
        if queue.len() == self.capacity {
            queue.pop_front();
        }
        queue.push_back(venue);
        drop(queue);
        self.notify.notify_one();
    }

    /// Waits for at least one wake token and drains the queue, returning
    /// the distinct venues that rang since the last drain.
    pub async fn wait_and_drain(&self) -> Vec<VenueId> {
        loop {
            {
                let mut queue = self.queue.lock();
                if !queue.is_empty() {
                    let mut venues: Vec<VenueId> = queue.drain(..).collect();
                    venues.sort();
                    venues.dedup();
                    return venues;
                }
            }
            self.notify.notified().await;
        }
    }
}

/// Owns one [`FeedRunner`] task per subscribed venue and the shared state
/// map they publish into.
pub struct Registry {
    states: Arc<RwLock<HashMap<VenueId, FeedState>>>,
    fanout: Arc<Fanout>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    stopped: Arc<tokio::sync::Notify>,
}

impl Registry {
    pub fn new(venues: &[VenueId], config: &Config) -> Self {
        let mut states = HashMap::with_capacity(venues.len());
        for &venue in venues {
            states.insert(venue, FeedState::new());
        }
        Self {
            states: Arc::new(RwLock::new(states)),
            fanout: Fanout::new(config.fanout_capacity(venues.len())),
            handles: Mutex::new(Vec::with_capacity(venues.len())),
            stopped: Arc::new(tokio::sync::Notify::new()),
        }
    }

    pub fn states(&self) -> Arc<RwLock<HashMap<VenueId, FeedState>>> {
        Arc::clone(&self.states)
    }

    pub fn fanout(&self) -> Arc<Fanout> {
        Arc::clone(&self.fanout)
    }

    /// Spawns one reconnecting [`FeedRunner`] task per venue.
    pub fn start_all(&self, asset: Asset, venues: &[VenueId], config: Config) {
        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            debug!("registry start_all called twice, ignoring");
            return;
        }
        for &venue in venues {
            let runner = FeedRunner::new(venue, asset, config.clone(), Arc::clone(&self.states), Arc::clone(&self.fanout));
            info!(%venue, %asset, "spawning feed runner");
            handles.push(tokio::spawn(runner.run()));
        }
    }

    /// Idempotently aborts every runner task and waits for them to finish
    /// unwinding.
    pub async fn stop_all(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock();
            std::mem::take(&mut *guard)
        };
        if handles.is_empty() {
            return;
        }
        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            let _ = handle.await;
        }
        self.stopped.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fanout_drop_oldest_coalesces_duplicates() {
        let fanout = Fanout::new(2);
        fanout.ring(VenueId::Binance);
        fanout.ring(VenueId::Coinbase);
        fanout.ring(VenueId::Kraken); // evicts Binance, capacity is 2
        let drained = fanout.wait_and_drain().await;
        assert_eq!(drained, vec![VenueId::Coinbase, VenueId::Kraken]);
    }

    #[tokio::test]
    async fn test_fanout_wait_blocks_until_rung() {
        let fanout = Fanout::new(4);
        let fanout2 = Arc::clone(&fanout);
        let task = tokio::spawn(async move { fanout2.wait_and_drain().await });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        fanout.ring(VenueId::Okx);
        let drained = task.await.unwrap();
        assert_eq!(drained, vec![VenueId::Okx]);
    }
}
