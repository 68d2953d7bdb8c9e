use crate::error::DataError;
use crate::feed::adapter::{ConnectPlan, ParseOutcome, VenueAdapter};
use crate::feed::venues::util::field_num;
use crate::snapshot::{Asset, QuoteUnit, Snapshot, VenueId};
use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

const BASE_URL_BYBIT: &str = "wss://stream.bybit.com/v5/public/spot";

/// Subscribe-after-connect venue (spec §4.1). Bybit's spot tickers topic
/// sends a full snapshot on subscribe and deltas afterwards; both carry
/// `lastPrice`/`bid1Price`/`ask1Price` so both are handled identically.
pub struct Bybit;

fn symbol(asset: Asset) -> Result<&'static str, DataError> {
    match asset {
        Asset::Btc => Ok("BTCUSDT"),
        Asset::Eth => Ok("ETHUSDT"),
        Asset::Sol => Ok("SOLUSDT"),
        Asset::Xrp => Ok("XRPUSDT"),
    }
}

#[async_trait]
impl VenueAdapter for Bybit {
    async fn connect_url(&self, _asset: Asset) -> Result<ConnectPlan, DataError> {
        let url = Url::parse(BASE_URL_BYBIT).map_err(|e| DataError::ConfigInvalid(e.to_string()))?;
        Ok(ConnectPlan::new(url))
    }

    fn subscribe_message(&self, asset: Asset) -> Option<String> {
        let pair = symbol(asset).ok()?;
        Some(
            json!({
                "op": "subscribe",
                "args": [format!("tickers.{pair}")],
            })
            .to_string(),
        )
    }

    fn parse(&self, frame: &str, asset: Asset, received_at_ms: i64) -> ParseOutcome {
        let value: Value = match serde_json::from_str(frame) {
            Ok(v) => v,
            Err(e) => return ParseOutcome::ParseError(e.to_string()),
        };

        let is_tickers_topic = value
            .get("topic")
            .and_then(Value::as_str)
            .map(|t| t.starts_with("tickers."))
            .unwrap_or(false);
        if !is_tickers_topic {
            return ParseOutcome::Ignore;
        }

        let Some(entry) = value.get("data") else {
            return ParseOutcome::Ignore;
        };

        let Some(price) = field_num(entry, "lastPrice") else {
            return ParseOutcome::Ignore;
        };
        let bid = field_num(entry, "bid1Price");
        let ask = field_num(entry, "ask1Price");

        match Snapshot::new(VenueId::Bybit, asset, QuoteUnit::Usdt, price, bid, ask, received_at_ms) {
            Ok(snapshot) => ParseOutcome::Snapshot(snapshot),
            Err(e) => ParseOutcome::ParseError(e.to_string()),
        }
    }

    fn symbol_for(&self, asset: Asset) -> Result<&'static str, DataError> {
        symbol(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_tickers_topic() {
        let frame = r#"{"topic":"tickers.BTCUSDT","type":"snapshot","data":{"symbol":"BTCUSDT","lastPrice":"97000.50","bid1Price":"96999.00","ask1Price":"97001.00"}}"#;
        let outcome = Bybit.parse(frame, Asset::Btc, 1_000);
        assert!(matches!(outcome, ParseOutcome::Snapshot(_)));
    }

    #[test]
    fn test_ignores_pong_frame() {
        let frame = r#"{"op":"pong","success":true}"#;
        assert!(matches!(Bybit.parse(frame, Asset::Btc, 0), ParseOutcome::Ignore));
    }
}
