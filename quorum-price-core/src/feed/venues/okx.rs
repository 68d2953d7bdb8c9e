use crate::error::DataError;
use crate::feed::adapter::{ConnectPlan, ParseOutcome, VenueAdapter};
use crate::feed::venues::util::field_num;
use crate::snapshot::{Asset, QuoteUnit, Snapshot, VenueId};
use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

const BASE_URL_OKX: &str = "wss://ws.okx.com:8443/ws/v5/public";

/// Subscribe-after-connect venue (spec §4.1).
pub struct Okx;

fn symbol(asset: Asset) -> Result<&'static str, DataError> {
    match asset {
        Asset::Btc => Ok("BTC-USDT"),
        Asset::Eth => Ok("ETH-USDT"),
        Asset::Sol => Ok("SOL-USDT"),
        Asset::Xrp => Ok("XRP-USDT"),
    }
}

#[async_trait]
impl VenueAdapter for Okx {
    async fn connect_url(&self, _asset: Asset) -> Result<ConnectPlan, DataError> {
        let url = Url::parse(BASE_URL_OKX).map_err(|e| DataError::ConfigInvalid(e.to_string()))?;
        Ok(ConnectPlan::new(url))
    }

    fn subscribe_message(&self, asset: Asset) -> Option<String> {
        let pair = symbol(asset).ok()?;
        Some(
            json!({
                "op": "subscribe",
                "args": [{
                    "channel": "tickers",
                    "instId": pair,
                }],
            })
            .to_string(),
        )
    }

    fn parse(&self, frame: &str, asset: Asset, received_at_ms: i64) -> ParseOutcome {
        let value: Value = match serde_json::from_str(frame) {
            Ok(v) => v,
            Err(e) => return ParseOutcome::ParseError(e.to_string()),
        };

        if value
            .get("arg")
            .and_then(|a| a.get("channel"))
            .and_then(Value::as_str)
            != Some("tickers")
        {
            return ParseOutcome::Ignore;
        }

        let Some(entry) = value.get("data").and_then(Value::as_array).and_then(|a| a.first()) else {
            return ParseOutcome::Ignore;
        };

        let Some(price) = field_num(entry, "last") else {
            return ParseOutcome::Ignore;
        };
        let bid = field_num(entry, "bidPx");
        let ask = field_num(entry, "askPx");

        match Snapshot::new(VenueId::Okx, asset, QuoteUnit::Usdt, price, bid, ask, received_at_ms) {
            Ok(snapshot) => ParseOutcome::Snapshot(snapshot),
            Err(e) => ParseOutcome::ParseError(e.to_string()),
        }
    }

    fn symbol_for(&self, asset: Asset) -> Result<&'static str, DataError> {
        symbol(asset)
    }
}
