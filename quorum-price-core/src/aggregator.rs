//! Median-reduction aggregation across venues (spec §4.4).
//!
//! Deterministic, per-asset: gather live snapshots, segregate by quote unit,
//! derive a USDT premium, normalize, reject outliers, then reduce to a
//! median price annotated with divergence and confidence statistics.

use crate::config::Config;
use crate::feed::FeedState;
use crate::report::PriceReport;
use crate::snapshot::{Asset, QuoteUnit, VenueId};

/// Recomputes the [`PriceReport`] for `asset` from the current `FeedState`
/// of each venue. Returns `None` if fewer than `config.min_sources` venues
/// survive staleness filtering and outlier rejection — spec §4.4 step 6, the
/// `FeedDegraded` case in spec §7 (no new report is published; callers keep
/// whatever report they already had).
pub fn recompute(
    asset: Asset,
    states: &[(VenueId, FeedState)],
    config: &Config,
    now_ms: i64,
) -> Option<PriceReport> {
    // Step 1: gather, dropping stale snapshots.
    let live: Vec<(VenueId, f64, QuoteUnit)> = states
        .iter()
        .filter_map(|(venue, state)| {
            let snapshot = state.last_snapshot.as_ref()?;
            if snapshot.asset != asset {
                return None;
            }
            if snapshot.age_ms(now_ms) > config.max_staleness_ms as i64 {
                return None;
            }
            Some((*venue, snapshot.price, snapshot.quote_unit))
        })
        .collect();

    // Step 2: segregate by quote unit.
    let usd_prices: Vec<f64> = live
        .iter()
        .filter(|(_, _, q)| *q == QuoteUnit::Usd)
        .map(|(_, p, _)| *p)
        .collect();
    let usdt_prices: Vec<f64> = live
        .iter()
        .filter(|(_, _, q)| *q == QuoteUnit::Usdt)
        .map(|(_, p, _)| *p)
        .collect();

    // Step 3: USDT premium.
    let premium_pct = if !usd_prices.is_empty() && !usdt_prices.is_empty() {
        let usd_med = median(&usd_prices);
        let usdt_med = median(&usdt_prices);
        (usdt_med - usd_med) / usd_med * 100.0
    } else {
        0.0
    };

    // Step 4: normalize.
    let normalized: Vec<(VenueId, f64)> = live
        .iter()
        .map(|(venue, price, quote)| {
            let normalized_price = match quote {
                QuoteUnit::Usd => *price,
                QuoteUnit::Usdt => *price / (1.0 + premium_pct / 100.0),
            };
            (*venue, normalized_price)
        })
        .collect();

    if normalized.is_empty() {
        return None;
    }

    // Step 5: outlier rejection vs the pre-reduction median.
    let pre_reduction_prices: Vec<f64> = normalized.iter().map(|(_, p)| *p).collect();
    let m0 = median(&pre_reduction_prices);
    let remaining: Vec<(VenueId, f64)> = normalized
        .into_iter()
        .filter(|(_, p)| (p - m0).abs() / m0 * 100.0 <= config.max_deviation_pct)
        .collect();

    // Step 6: abort if too few survive.
    if remaining.len() < config.min_sources {
        return None;
    }

    // Step 7: reduce.
    let remaining_prices: Vec<f64> = remaining.iter().map(|(_, p)| *p).collect();
    let price = median(&remaining_prices);

    // Step 8: statistics.
    let max = remaining_prices.iter().cloned().fold(f64::MIN, f64::max);
    let min = remaining_prices.iter().cloned().fold(f64::MAX, f64::min);
    let divergence_pct = (max - min) / price * 100.0;

    let spread_pct = if remaining_prices.len() < 2 {
        0.0
    } else {
        sample_stdev(&remaining_prices) / price * 100.0
    };

    let confidence = confidence_from_spread(spread_pct, config);

    // Step 9: publish.
    let mut sources_used: Vec<VenueId> = remaining.iter().map(|(v, _)| *v).collect();
    sources_used.sort();

    PriceReport::new(
        asset,
        price,
        sources_used,
        divergence_pct,
        confidence,
        premium_pct,
        now_ms,
    )
    .ok()
}

fn confidence_from_spread(spread_pct: f64, config: &Config) -> f64 {
    if spread_pct <= config.tight_spread_pct {
        1.0
    } else if spread_pct >= config.divergence_critical_pct {
        0.5
    } else {
        let span = config.divergence_critical_pct - config.tight_spread_pct;
        (1.0 - (spread_pct - config.tight_spread_pct) / span * 0.5).max(0.5)
    }
}

/// Median of an f64 slice. The median of an even-length set is the
/// arithmetic mean of the two middle order statistics (spec §4.4 step 7).
pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("NaN price"));
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Sample standard deviation (ddof = 1). Returns 0.0 for fewer than two
/// values.
pub fn sample_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;

    fn state_with(venue: VenueId, asset: Asset, quote: QuoteUnit, price: f64, ts: i64) -> (VenueId, FeedState) {
        let mut state = FeedState::new();
        state.record_snapshot(Snapshot::new(venue, asset, quote, price, None, None, ts).unwrap());
        (venue, state)
    }

    #[test]
    fn test_happy_median_scenario() {
        // spec §8 scenario 1
        let config = Config::default();
        let now = 10_000;
        let states = vec![
            state_with(VenueId::Coinbase, Asset::Btc, QuoteUnit::Usd, 97000.00, now),
            state_with(VenueId::Kraken, Asset::Btc, QuoteUnit::Usd, 97000.00, now),
            state_with(VenueId::Gemini, Asset::Btc, QuoteUnit::Usd, 97000.00, now),
            state_with(VenueId::Binance, Asset::Btc, QuoteUnit::Usdt, 97164.90, now),
            state_with(VenueId::Okx, Asset::Btc, QuoteUnit::Usdt, 97164.90, now),
            state_with(VenueId::Bybit, Asset::Btc, QuoteUnit::Usdt, 97164.90, now),
            state_with(VenueId::KuCoin, Asset::Btc, QuoteUnit::Usdt, 97164.90, now),
            state_with(VenueId::GateIo, Asset::Btc, QuoteUnit::Usdt, 97164.90, now),
        ];

        let report = recompute(Asset::Btc, &states, &config, now).unwrap();
        assert!((report.price - 97000.00).abs() < 1e-6);
        assert!((report.usdt_premium_pct - 0.1700515).abs() < 1e-5);
        assert!(report.divergence_pct < 1e-6);
        assert_eq!(report.confidence, 1.0);
        assert_eq!(report.source_count, 8);
    }

    #[test]
    fn test_single_outlier_is_rejected() {
        // spec §8 scenario 2
        let config = Config::default();
        let now = 10_000;
        let states = vec![
            state_with(VenueId::Coinbase, Asset::Btc, QuoteUnit::Usd, 97000.0, now),
            state_with(VenueId::Kraken, Asset::Btc, QuoteUnit::Usd, 97000.0, now),
            state_with(VenueId::Gemini, Asset::Btc, QuoteUnit::Usd, 97000.0, now),
            state_with(VenueId::Binance, Asset::Btc, QuoteUnit::Usdt, 97165.0, now),
            state_with(VenueId::Okx, Asset::Btc, QuoteUnit::Usdt, 97165.0, now),
            state_with(VenueId::Bybit, Asset::Btc, QuoteUnit::Usdt, 97165.0, now),
            state_with(VenueId::KuCoin, Asset::Btc, QuoteUnit::Usdt, 97165.0, now),
            state_with(VenueId::GateIo, Asset::Btc, QuoteUnit::Usdt, 100000.0, now),
        ];

        let report = recompute(Asset::Btc, &states, &config, now).unwrap();
        assert!((report.price - 97000.00).abs() < 0.5);
        assert_eq!(report.confidence, 1.0);
        assert_eq!(report.source_count, 7);
        assert!(!report.sources_used.contains(&VenueId::GateIo));
    }

    #[test]
    fn test_stale_venue_is_dropped() {
        // spec §8 scenario 3
        let config = Config::default();
        let now = 10_000;
        let mut states = vec![
            state_with(VenueId::Coinbase, Asset::Btc, QuoteUnit::Usd, 97000.0, now),
            state_with(VenueId::Kraken, Asset::Btc, QuoteUnit::Usd, 97000.0, now),
            state_with(VenueId::Gemini, Asset::Btc, QuoteUnit::Usd, 97000.0, now),
            state_with(VenueId::Binance, Asset::Btc, QuoteUnit::Usdt, 97165.0, now),
            state_with(VenueId::Okx, Asset::Btc, QuoteUnit::Usdt, 97165.0, now),
            state_with(VenueId::Bybit, Asset::Btc, QuoteUnit::Usdt, 97165.0, now),
            state_with(VenueId::KuCoin, Asset::Btc, QuoteUnit::Usdt, 97165.0, now),
        ];
        states.push(state_with(VenueId::GateIo, Asset::Btc, QuoteUnit::Usdt, 97165.0, now - 3_000));

        let report = recompute(Asset::Btc, &states, &config, now).unwrap();
        assert_eq!(report.source_count, 7);
        assert!(!report.sources_used.contains(&VenueId::GateIo));
    }

    #[test]
    fn test_below_minimum_sources_publishes_nothing() {
        // spec §8 scenario 4
        let config = Config::default();
        let now = 10_000;
        let states = vec![state_with(VenueId::Binance, Asset::Btc, QuoteUnit::Usdt, 97000.0, now)];
        assert!(recompute(Asset::Btc, &states, &config, now).is_none());
    }

    #[test]
    fn test_negative_premium_scenario() {
        // spec §8 scenario 5
        let config = Config::default();
        let now = 10_000;
        let states = vec![
            state_with(VenueId::Coinbase, Asset::Btc, QuoteUnit::Usd, 97000.0, now),
            state_with(VenueId::Kraken, Asset::Btc, QuoteUnit::Usd, 97000.0, now),
            state_with(VenueId::Binance, Asset::Btc, QuoteUnit::Usdt, 96900.0, now),
            state_with(VenueId::Okx, Asset::Btc, QuoteUnit::Usdt, 96900.0, now),
            state_with(VenueId::Bybit, Asset::Btc, QuoteUnit::Usdt, 96900.0, now),
        ];

        let report = recompute(Asset::Btc, &states, &config, now).unwrap();
        assert!((report.usdt_premium_pct - (-0.1031)).abs() < 1e-3);
        assert!((report.price - 97000.0).abs() < 1.0);
    }

    #[test]
    fn test_confidence_mid_band() {
        let config = Config::default();
        // spread_pct = 0.30 -> confidence = 1.0 - (0.30-0.1)/(0.5-0.1)*0.5 = 0.75
        let confidence = confidence_from_spread(0.30, &config);
        assert!((confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_median_even_length_averages_middle_pair() {
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), 2.5);
    }

    #[test]
    fn test_agreement_yields_zero_divergence_full_confidence() {
        let config = Config::default();
        let now = 10_000;
        let states = vec![
            state_with(VenueId::Binance, Asset::Btc, QuoteUnit::Usdt, 50000.0, now),
            state_with(VenueId::Okx, Asset::Btc, QuoteUnit::Usdt, 50000.0, now),
            state_with(VenueId::Bybit, Asset::Btc, QuoteUnit::Usdt, 50000.0, now),
        ];
        let report = recompute(Asset::Btc, &states, &config, now).unwrap();
        assert_eq!(report.divergence_pct, 0.0);
        assert_eq!(report.confidence, 1.0);
    }

    #[test]
    fn test_idempotent_recompute_same_inputs() {
        let config = Config::default();
        let now = 10_000;
        let states = vec![
            state_with(VenueId::Binance, Asset::Btc, QuoteUnit::Usdt, 50000.0, now),
            state_with(VenueId::Okx, Asset::Btc, QuoteUnit::Usdt, 50010.0, now),
            state_with(VenueId::Bybit, Asset::Btc, QuoteUnit::Usdt, 49995.0, now),
        ];
        let report_a = recompute(Asset::Btc, &states, &config, now).unwrap();
        let report_b = recompute(Asset::Btc, &states, &config, now).unwrap();
        assert_eq!(report_a.integrity_hash, report_b.integrity_hash);
    }
}
