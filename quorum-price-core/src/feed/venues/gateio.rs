use crate::error::DataError;
use crate::feed::adapter::{ConnectPlan, ParseOutcome, VenueAdapter};
use crate::feed::venues::util::field_num;
use crate::snapshot::{Asset, QuoteUnit, Snapshot, VenueId};
use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

const BASE_URL_GATEIO: &str = "wss://api.gateio.ws/ws/v4/";

/// Subscribe-after-connect venue (spec §4.1).
pub struct GateIo;

fn symbol(asset: Asset) -> Result<&'static str, DataError> {
    match asset {
        Asset::Btc => Ok("BTC_USDT"),
        Asset::Eth => Ok("ETH_USDT"),
        Asset::Sol => Ok("SOL_USDT"),
        Asset::Xrp => Ok("XRP_USDT"),
    }
}

#[async_trait]
impl VenueAdapter for GateIo {
    async fn connect_url(&self, _asset: Asset) -> Result<ConnectPlan, DataError> {
        let url = Url::parse(BASE_URL_GATEIO).map_err(|e| DataError::ConfigInvalid(e.to_string()))?;
        Ok(ConnectPlan::new(url))
    }

    fn subscribe_message(&self, asset: Asset) -> Option<String> {
        let pair = symbol(asset).ok()?;
        Some(
            json!({
                "time": 0,
                "channel": "spot.tickers",
                "event": "subscribe",
                "payload": [pair],
            })
            .to_string(),
        )
    }

    fn parse(&self, frame: &str, asset: Asset, received_at_ms: i64) -> ParseOutcome {
        let value: Value = match serde_json::from_str(frame) {
            Ok(v) => v,
            Err(e) => return ParseOutcome::ParseError(e.to_string()),
        };

        if value.get("channel").and_then(Value::as_str) != Some("spot.tickers")
            || value.get("event").and_then(Value::as_str) != Some("update")
        {
            return ParseOutcome::Ignore;
        }

        let Some(entry) = value.get("result") else {
            return ParseOutcome::Ignore;
        };

        let Some(price) = field_num(entry, "last") else {
            return ParseOutcome::Ignore;
        };
        let bid = field_num(entry, "highest_bid");
        let ask = field_num(entry, "lowest_ask");

        match Snapshot::new(VenueId::GateIo, asset, QuoteUnit::Usdt, price, bid, ask, received_at_ms) {
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
    fn test_parses_update_event() {
        let frame = r#"{"time":1700000000,"channel":"spot.tickers","event":"update","result":{"currency_pair":"BTC_USDT","last":"97000.50","highest_bid":"96999.00","lowest_ask":"97001.00"}}"#;
        let outcome = GateIo.parse(frame, Asset::Btc, 1_000);
        assert!(matches!(outcome, ParseOutcome::Snapshot(_)));
    }

    #[test]
    fn test_ignores_subscribe_ack() {
        let frame = r#"{"time":1700000000,"channel":"spot.tickers","event":"subscribe","result":{"status":"success"}}"#;
        assert!(matches!(GateIo.parse(frame, Asset::Btc, 0), ParseOutcome::Ignore));
    }
}
