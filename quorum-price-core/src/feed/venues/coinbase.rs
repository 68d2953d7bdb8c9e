use crate::error::DataError;
use crate::feed::adapter::{ConnectPlan, ParseOutcome, VenueAdapter};
use crate::feed::venues::util::field_num;
use crate::snapshot::{Asset, QuoteUnit, Snapshot, VenueId};
use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

const BASE_URL_COINBASE: &str = "wss://ws-feed.exchange.coinbase.com";

/// Subscribe-after-connect venue (spec §4.1).
pub struct Coinbase;

fn symbol(asset: Asset) -> Result<&'static str, DataError> {
    match asset {
        Asset::Btc => Ok("BTC-USD"),
        Asset::Eth => Ok("ETH-USD"),
        Asset::Sol => Ok("SOL-USD"),
        Asset::Xrp => Ok("XRP-USD"),
    }
}

#[async_trait]
impl VenueAdapter for Coinbase {
    async fn connect_url(&self, _asset: Asset) -> Result<ConnectPlan, DataError> {
        let url = Url::parse(BASE_URL_COINBASE).map_err(|e| DataError::ConfigInvalid(e.to_string()))?;
        Ok(ConnectPlan::new(url))
    }

    fn subscribe_message(&self, asset: Asset) -> Option<String> {
        let pair = symbol(asset).ok()?;
        Some(
            json!({
                "type": "subscribe",
                "product_ids": [pair],
                "channels": ["ticker"],
            })
            .to_string(),
        )
    }

    fn parse(&self, frame: &str, asset: Asset, received_at_ms: i64) -> ParseOutcome {
        let value: Value = match serde_json::from_str(frame) {
            Ok(v) => v,
            Err(e) => return ParseOutcome::ParseError(e.to_string()),
        };

        if value.get("type").and_then(Value::as_str) != Some("ticker") {
            return ParseOutcome::Ignore;
        }

        let Some(price) = field_num(&value, "price") else {
            return ParseOutcome::Ignore;
        };
        let bid = field_num(&value, "best_bid");
        let ask = field_num(&value, "best_ask");

        match Snapshot::new(VenueId::Coinbase, asset, QuoteUnit::Usd, price, bid, ask, received_at_ms) {
            Ok(snapshot) => ParseOutcome::Snapshot(snapshot),
            Err(e) => ParseOutcome::ParseError(e.to_string()),
        }
    }

    fn symbol_for(&self, asset: Asset) -> Result<&'static str, DataError> {
        symbol(asset)
    }
}
