use crate::error::DataError;
use crate::feed::adapter::{ConnectPlan, ParseOutcome, VenueAdapter};
use crate::feed::venues::util::field_num;
use crate::snapshot::{Asset, QuoteUnit, Snapshot, VenueId};
use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

const BASE_URL_KRAKEN: &str = "wss://ws.kraken.com/v2";

/// Subscribe-after-connect venue (spec §4.1). Kraken v2's `ticker` channel
/// emits both `snapshot` and `update` message types; both carry the same
/// fields and are treated identically here.
pub struct Kraken;

fn symbol(asset: Asset) -> Result<&'static str, DataError> {
    match asset {
        Asset::Btc => Ok("BTC/USD"),
        Asset::Eth => Ok("ETH/USD"),
        Asset::Sol => Ok("SOL/USD"),
        Asset::Xrp => Ok("XRP/USD"),
    }
}

#[async_trait]
impl VenueAdapter for Kraken {
    async fn connect_url(&self, _asset: Asset) -> Result<ConnectPlan, DataError> {
        let url = Url::parse(BASE_URL_KRAKEN).map_err(|e| DataError::ConfigInvalid(e.to_string()))?;
        Ok(ConnectPlan::new(url))
    }

    fn subscribe_message(&self, asset: Asset) -> Option<String> {
        let pair = symbol(asset).ok()?;
        Some(
            json!({
                "method": "subscribe",
                "params": {
                    "channel": "ticker",
                    "symbol": [pair],
                },
            })
            .to_string(),
        )
    }

    fn parse(&self, frame: &str, asset: Asset, received_at_ms: i64) -> ParseOutcome {
        let value: Value = match serde_json::from_str(frame) {
            Ok(v) => v,
            Err(e) => return ParseOutcome::ParseError(e.to_string()),
        };

        if value.get("channel").and_then(Value::as_str) != Some("ticker") {
            return ParseOutcome::Ignore;
        }

        let Some(entry) = value.get("data").and_then(Value::as_array).and_then(|a| a.first()) else {
            return ParseOutcome::Ignore;
        };

        let Some(price) = field_num(entry, "last") else {
            return ParseOutcome::Ignore;
        };
        let bid = field_num(entry, "bid");
        let ask = field_num(entry, "ask");

        match Snapshot::new(VenueId::Kraken, asset, QuoteUnit::Usd, price, bid, ask, received_at_ms) {
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
    fn test_parses_snapshot_and_update_messages() {
        for kind in ["snapshot", "update"] {
            let frame = format!(
                r#"{{"channel":"ticker","type":"{kind}","data":[{{"symbol":"BTC/USD","last":97000.5,"bid":96999.0,"ask":97001.0}}]}}"#
            );
            let outcome = Kraken.parse(&frame, Asset::Btc, 1_000);
            assert!(matches!(outcome, ParseOutcome::Snapshot(_)), "kind={kind}");
        }
    }

    #[test]
    fn test_ignores_heartbeat_channel() {
        let frame = r#"{"channel":"heartbeat"}"#;
        assert!(matches!(Kraken.parse(frame, Asset::Btc, 0), ParseOutcome::Ignore));
    }
}
