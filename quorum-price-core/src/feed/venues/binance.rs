use crate::error::DataError;
use crate::feed::adapter::{ConnectPlan, ParseOutcome, VenueAdapter};
use crate::feed::venues::util::field_num;
use crate::snapshot::{Asset, QuoteUnit, Snapshot, VenueId};
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

/// Stream-URL venue: the symbol is embedded in the URL, no subscribe frame
/// is sent (spec §4.1).
pub struct Binance;

fn symbol(asset: Asset) -> Result<&'static str, DataError> {
    match asset {
        Asset::Btc => Ok("btcusdt"),
        Asset::Eth => Ok("ethusdt"),
        Asset::Sol => Ok("solusdt"),
        Asset::Xrp => Ok("xrpusdt"),
    }
}

#[async_trait]
impl VenueAdapter for Binance {
    async fn connect_url(&self, asset: Asset) -> Result<ConnectPlan, DataError> {
        let pair = symbol(asset)?;
        let url = Url::parse(&format!("wss://stream.binance.com:9443/ws/{pair}@ticker"))
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

        let Some(price) = field_num(&value, "c") else {
            return ParseOutcome::Ignore;
        };
        let bid = field_num(&value, "b");
        let ask = field_num(&value, "a");

        match Snapshot::new(VenueId::Binance, asset, QuoteUnit::Usdt, price, bid, ask, received_at_ms) {
            Ok(snapshot) => ParseOutcome::Snapshot(snapshot),
            Err(e) => ParseOutcome::ParseError(e.to_string()),
        }
    }

    fn symbol_for(&self, asset: Asset) -> Result<&'static str, DataError> {
        symbol(asset)
    }
}
