use crate::error::DataError;
use crate::snapshot::{Asset, VenueId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One aggregation result (spec §3). Immutable once constructed; only
/// produced by [`crate::aggregator::recompute`] on a successful reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceReport {
    pub asset: Asset,
    pub price: f64,
    pub sources_used: Vec<VenueId>,
    pub source_count: usize,
    pub divergence_pct: f64,
    pub confidence: f64,
    pub usdt_premium_pct: f64,
    pub generated_at_ms: i64,
    pub integrity_hash: String,
}

impl PriceReport {
    /// Builds a report, computing `integrity_hash` over the canonical
    /// serialization described in spec §4.4 step 9. `sources_used` must
    /// already be sorted lexicographically by the caller (the aggregator
    /// sorts by venue tag before calling this).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        asset: Asset,
        price: f64,
        sources_used: Vec<VenueId>,
        divergence_pct: f64,
        confidence: f64,
        usdt_premium_pct: f64,
        generated_at_ms: i64,
    ) -> Result<Self, DataError> {
        if !(0.5..=1.0).contains(&confidence) {
            return Err(DataError::ConfigInvalid(format!(
                "confidence {confidence} outside [0.5, 1.0]"
            )));
        }
        let source_count = sources_used.len();

        let integrity_hash = canonical_hash(
            asset,
            price,
            &sources_used,
            source_count,
            divergence_pct,
            confidence,
            usdt_premium_pct,
            generated_at_ms,
        );

        Ok(Self {
            asset,
            price,
            sources_used,
            source_count,
            divergence_pct,
            confidence,
            usdt_premium_pct,
            generated_at_ms,
            integrity_hash,
        })
    }

    /// Whether this report is too old to be considered current (spec §9 Open
    /// Question (b): a conservative implementation treats a report older
    /// than `2 * max_staleness_ms` as equivalent to "none".
    pub fn is_stale(&self, now_ms: i64, max_staleness_ms: u64) -> bool {
        now_ms - self.generated_at_ms > 2 * max_staleness_ms as i64
    }
}

#[allow(clippy::too_many_arguments)]
fn canonical_hash(
    asset: Asset,
    price: f64,
    sources_used: &[VenueId],
    source_count: usize,
    divergence_pct: f64,
    confidence: f64,
    usdt_premium_pct: f64,
    generated_at_ms: i64,
) -> String {
    let sources_joined = sources_used
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");

    let canonical = format!(
        "{asset}|{price:.8}|{sources_joined}|{source_count}|{divergence_pct:.8}|{confidence:.8}|{usdt_premium_pct:.8}|{generated_at_ms}"
    );

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_out_of_range_is_rejected() {
        let result = PriceReport::new(Asset::Btc, 97000.0, vec![VenueId::Binance], 0.0, 0.4, 0.0, 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_idempotent_hash_for_identical_inputs() {
        let sources = vec![VenueId::Binance, VenueId::Coinbase];
        let report_a = PriceReport::new(Asset::Btc, 97000.0, sources.clone(), 0.0, 1.0, 0.0, 1_700_000_000_000).unwrap();
        let report_b = PriceReport::new(Asset::Btc, 97000.0, sources, 0.0, 1.0, 0.0, 1_700_000_000_000).unwrap();
        assert_eq!(report_a.integrity_hash, report_b.integrity_hash);
    }

    #[test]
    fn test_hash_changes_with_price() {
        let sources = vec![VenueId::Binance, VenueId::Coinbase];
        let report_a = PriceReport::new(Asset::Btc, 97000.0, sources.clone(), 0.0, 1.0, 0.0, 0).unwrap();
        let report_b = PriceReport::new(Asset::Btc, 97000.01, sources, 0.0, 1.0, 0.0, 0).unwrap();
        assert_ne!(report_a.integrity_hash, report_b.integrity_hash);
    }

    #[test]
    fn test_staleness_rule() {
        let report = PriceReport::new(Asset::Btc, 97000.0, vec![VenueId::Binance], 0.0, 1.0, 0.0, 1_000).unwrap();
        assert!(!report.is_stale(1_000 + 3_999, 2_000));
        assert!(report.is_stale(1_000 + 4_001, 2_000));
    }
}
