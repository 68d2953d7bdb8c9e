use crate::error::DataError;
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Asset supported by the aggregation engine (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Asset {
    #[display("BTC")]
    Btc,
    #[display("ETH")]
    Eth,
    #[display("SOL")]
    Sol,
    #[display("XRP")]
    Xrp,
}

/// Settlement currency of a venue's pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum QuoteUnit {
    #[display("USD")]
    Usd,
    #[display("USDT")]
    Usdt,
}

/// One of the eight venues this engine can stream from (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
pub enum VenueId {
    #[display("binance")]
    Binance,
    #[display("coinbase")]
    Coinbase,
    #[display("kraken")]
    Kraken,
    #[display("okx")]
    Okx,
    #[display("bybit")]
    Bybit,
    #[display("gemini")]
    Gemini,
    #[display("kucoin")]
    KuCoin,
    #[display("gateio")]
    GateIo,
}

impl VenueId {
    pub const ALL: [VenueId; 8] = [
        VenueId::Binance,
        VenueId::Coinbase,
        VenueId::Kraken,
        VenueId::Okx,
        VenueId::Bybit,
        VenueId::Gemini,
        VenueId::KuCoin,
        VenueId::GateIo,
    ];

    /// Parse a venue tag as used in config / CLI input. Case-insensitive.
    pub fn from_tag(tag: &str) -> Result<Self, DataError> {
        match tag.to_ascii_lowercase().as_str() {
            "binance" => Ok(VenueId::Binance),
            "coinbase" => Ok(VenueId::Coinbase),
            "kraken" => Ok(VenueId::Kraken),
            "okx" => Ok(VenueId::Okx),
            "bybit" => Ok(VenueId::Bybit),
            "gemini" => Ok(VenueId::Gemini),
            "kucoin" => Ok(VenueId::KuCoin),
            "gateio" | "gate.io" | "gate" => Ok(VenueId::GateIo),
            other => Err(DataError::ConfigInvalid(format!("unknown venue tag: {other}"))),
        }
    }
}

/// Immutable per-tick record from one venue (spec §3).
///
/// Only constructible via [`Snapshot::new`], which enforces the invariants
/// `price > 0` and `bid <= ask` when both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub venue: VenueId,
    pub asset: Asset,
    pub quote_unit: QuoteUnit,
    pub price: f64,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub timestamp_ms: i64,
}

impl Snapshot {
    pub fn new(
        venue: VenueId,
        asset: Asset,
        quote_unit: QuoteUnit,
        price: f64,
        bid: Option<f64>,
        ask: Option<f64>,
        timestamp_ms: i64,
    ) -> Result<Self, DataError> {
        if !(price > 0.0) {
            return Err(DataError::ProtocolParse {
                venue: venue.to_string(),
                reason: format!("non-positive price: {price}"),
            });
        }

        if let (Some(bid), Some(ask)) = (bid, ask) {
            if bid > ask {
                return Err(DataError::ProtocolParse {
                    venue: venue.to_string(),
                    reason: format!("bid {bid} > ask {ask}"),
                });
            }
        }

        Ok(Self {
            venue,
            asset,
            quote_unit,
            price,
            bid,
            ask,
            timestamp_ms,
        })
    }

    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.timestamp_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_rejects_non_positive_price() {
        let result = Snapshot::new(VenueId::Binance, Asset::Btc, QuoteUnit::Usdt, 0.0, None, None, 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_snapshot_rejects_crossed_book() {
        let result = Snapshot::new(
            VenueId::Binance,
            Asset::Btc,
            QuoteUnit::Usdt,
            100.0,
            Some(101.0),
            Some(99.0),
            0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_snapshot_accepts_valid_tick() {
        let snap = Snapshot::new(
            VenueId::Binance,
            Asset::Btc,
            QuoteUnit::Usdt,
            97000.0,
            Some(96999.0),
            Some(97001.0),
            1_000,
        )
        .unwrap();
        assert_eq!(snap.age_ms(1_500), 500);
    }

    #[test]
    fn test_venue_from_tag_case_insensitive() {
        assert_eq!(VenueId::from_tag("BINANCE").unwrap(), VenueId::Binance);
        assert_eq!(VenueId::from_tag("Gate.IO").unwrap(), VenueId::GateIo);
        assert!(VenueId::from_tag("deribit").is_err());
    }
}
