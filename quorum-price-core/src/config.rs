use crate::error::DataError;
use crate::snapshot::VenueId;
use std::time::Duration;

/// Tunable thresholds governing feed liveness and aggregation policy (spec §6).
///
/// Validated at construction via [`Config::validate`] — invalid values are
/// rejected before any I/O is attempted, matching the `ConfigInvalid`
/// failure mode in spec §7.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Drop a per-venue snapshot if older than this.
    pub max_staleness_ms: u64,
    /// Outlier rejection threshold vs the pre-reduction median, in percent.
    pub max_deviation_pct: f64,
    /// Minimum accepted venues required to publish a report.
    pub min_sources: usize,
    /// Spread at/below which confidence is 1.0.
    pub tight_spread_pct: f64,
    /// Advisory divergence threshold (not enforced, surfaced for callers).
    pub divergence_warning_pct: f64,
    /// Spread at/above which confidence is 0.5.
    pub divergence_critical_pct: f64,
    /// WebSocket handshake timeout.
    pub connect_timeout: Duration,
    /// Default application-level keepalive cadence (per-venue override possible).
    pub ping_interval: Duration,
    /// Time to wait for a ping response before treating the link as dead.
    pub ping_response_timeout: Duration,
    /// Consecutive unparseable frames on one connection before it is torn
    /// down and reconnected.
    pub max_consecutive_parse_errors: u32,
    /// Initial reconnect backoff.
    pub reconnect_delay: Duration,
    /// Reconnect backoff ceiling.
    pub max_reconnect_delay: Duration,
    /// Multiplier applied to the backoff on each failed attempt.
    pub reconnect_backoff: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_staleness_ms: 2_000,
            max_deviation_pct: 1.0,
            min_sources: 2,
            tight_spread_pct: 0.1,
            divergence_warning_pct: 0.3,
            divergence_critical_pct: 0.5,
            connect_timeout: Duration::from_secs(5),
            ping_interval: Duration::from_secs(20),
            ping_response_timeout: Duration::from_secs(10),
            max_consecutive_parse_errors: 5,
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            reconnect_backoff: 1.5,
        }
    }
}

impl Config {
    /// Checks the thresholds are sane and the venue list is non-empty with no
    /// duplicate tags. Does not perform any I/O.
    pub fn validate(&self, venues: &[VenueId]) -> Result<(), DataError> {
        if venues.is_empty() {
            return Err(DataError::ConfigInvalid("venue list is empty".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for venue in venues {
            if !seen.insert(venue) {
                return Err(DataError::ConfigInvalid(format!("duplicate venue: {venue}")));
            }
        }

        if self.min_sources == 0 {
            return Err(DataError::ConfigInvalid("min_sources must be >= 1".into()));
        }
        if self.min_sources > venues.len() {
            return Err(DataError::ConfigInvalid(format!(
                "min_sources ({}) exceeds configured venue count ({})",
                self.min_sources,
                venues.len()
            )));
        }
        if self.max_staleness_ms == 0 {
            return Err(DataError::ConfigInvalid("max_staleness_ms must be > 0".into()));
        }
        if self.max_deviation_pct <= 0.0 {
            return Err(DataError::ConfigInvalid("max_deviation_pct must be > 0".into()));
        }
        if self.tight_spread_pct < 0.0
            || self.divergence_warning_pct < 0.0
            || self.divergence_critical_pct < 0.0
        {
            return Err(DataError::ConfigInvalid("spread thresholds must be non-negative".into()));
        }
        if self.tight_spread_pct >= self.divergence_critical_pct {
            return Err(DataError::ConfigInvalid(
                "tight_spread_pct must be < divergence_critical_pct".into(),
            ));
        }
        if self.reconnect_backoff <= 1.0 {
            return Err(DataError::ConfigInvalid("reconnect_backoff must be > 1.0".into()));
        }
        if self.max_reconnect_delay < self.reconnect_delay {
            return Err(DataError::ConfigInvalid(
                "max_reconnect_delay must be >= reconnect_delay".into(),
            ));
        }
        if self.max_consecutive_parse_errors == 0 {
            return Err(DataError::ConfigInvalid(
                "max_consecutive_parse_errors must be >= 1".into(),
            ));
        }

        Ok(())
    }

    /// Fanout doorbell capacity: at least twice the venue count (spec §4.3).
    pub fn fanout_capacity(&self, venue_count: usize) -> usize {
        (venue_count * 2).max(2)
    }
}
