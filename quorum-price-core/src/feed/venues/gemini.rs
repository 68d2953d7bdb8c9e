use crate::error::DataError;
use crate::feed::adapter::{ConnectPlan, ParseOutcome, VenueAdapter};
use crate::feed::venues::util::field_num;
use crate::snapshot::{Asset, QuoteUnit, Snapshot, VenueId};
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

/// Stream-URL venue: the symbol is embedded in the path, no subscribe frame
/// is sent (spec §4.1).
pub struct Gemini;

fn symbol(asset: Asset) -> Result<&'static str, DataError> {
    match asset {
        Asset::Btc => Ok("BTCUSD"),
        Asset::Eth => Ok("ETHUSD"),
        Asset::Sol => Ok("SOLUSD"),
        Asset::Xrp => Ok("XRPUSD"),
    }
}

#[async_trait]
impl VenueAdapter for Gemini {
    async fn connect_url(&self, asset: Asset) -> Result<ConnectPlan, DataError> {
        let pair = symbol(asset)?;
        let url = Url::parse(&format!("wss://api.gemini.com/v1/marketdata/{pair}"))
            .map_err(|e| DataError::ConfigInvalid(e.to_string()))?;
        Ok(ConnectPlan::new(url))
    }

    fn subscribe_message(&self, _asset: Asset) -> Option<String> {
        None
    }

    fn parse(&self, frame: &str, asset: Asset, received_at_ms: i64) -> ParseOutcome {
        let value: Value = match serde_json::from_str(frame) {
            Ok(v) => v,
            Err(e) => return ParseOutcome::ParseError(e.to_string()),
        };

        let Some(events) = value.get("events").and_then(Value::as_array) else {
            return ParseOutcome::Ignore;
        };

        let trade = events
            .iter()
            .find(|e| e.get("type").and_then(Value::as_str) == Some("trade"));
        let Some(trade) = trade else {
            return ParseOutcome::Ignore;
        };

        let Some(price) = field_num(trade, "price") else {
            return ParseOutcome::Ignore;
        };

        match Snapshot::new(VenueId::Gemini, asset, QuoteUnit::Usd, price, None, None, received_at_ms) {
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
    fn test_parses_trade_event() {
        let frame = r#"{"type":"update","eventId":1,"events":[{"type":"trade","price":"97000.50","amount":"0.01"}]}"#;
        let outcome = Gemini.parse(frame, Asset::Btc, 1_000);
        assert!(matches!(outcome, ParseOutcome::Snapshot(_)));
    }

    #[test]
    fn test_ignores_change_only_update() {
        let frame = r#"{"type":"update","eventId":2,"events":[{"type":"change","side":"bid","price":"96990.00","remaining":"1.2"}]}"#;
        assert!(matches!(Gemini.parse(frame, Asset::Btc, 0), ParseOutcome::Ignore));
    }
}
