use crate::error::DataError;
use crate::feed::adapter::{ConnectPlan, ParseOutcome, VenueAdapter};
use crate::feed::venues::util::field_num;
use crate::snapshot::{Asset, QuoteUnit, Snapshot, VenueId};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

const BULLET_PUBLIC_URL: &str = "https://api.kucoin.com/api/v1/bullet-public";

/// REST-preflight venue (spec §4.1/§4.2): a `bullet-public` POST hands back a
/// one-shot token and a server endpoint with its own ping cadence, which
/// overrides the default keepalive interval for this runner.
pub struct KuCoin;

fn symbol(asset: Asset) -> Result<&'static str, DataError> {
    match asset {
        Asset::Btc => Ok("BTC-USDT"),
        Asset::Eth => Ok("ETH-USDT"),
        Asset::Sol => Ok("SOL-USDT"),
        Asset::Xrp => Ok("XRP-USDT"),
    }
}

#[derive(Debug, Deserialize)]
struct BulletPublicResponse {
    data: BulletPublicData,
}

#[derive(Debug, Deserialize)]
struct BulletPublicData {
    token: String,
    #[serde(rename = "instanceServers")]
    instance_servers: Vec<InstanceServer>,
}

#[derive(Debug, Deserialize)]
struct InstanceServer {
    endpoint: String,
    #[serde(rename = "pingInterval")]
    ping_interval_ms: u64,
}

#[async_trait]
impl VenueAdapter for KuCoin {
    async fn connect_url(&self, _asset: Asset) -> Result<ConnectPlan, DataError> {
        let response = reqwest::Client::new()
            .post(BULLET_PUBLIC_URL)
            .send()
            .await
            .map_err(|e| DataError::Preflight {
                venue: "kucoin".to_string(),
                reason: e.to_string(),
            })?
            .json::<BulletPublicResponse>()
            .await
            .map_err(|e| DataError::Preflight {
                venue: "kucoin".to_string(),
                reason: e.to_string(),
            })?;

        let server = response.data.instance_servers.first().ok_or_else(|| DataError::Preflight {
            venue: "kucoin".to_string(),
            reason: "bullet-public response carried no instance servers".to_string(),
        })?;

        let mut url = Url::parse(&server.endpoint).map_err(|e| DataError::Preflight {
            venue: "kucoin".to_string(),
            reason: e.to_string(),
        })?;
        url.set_query(Some(&format!("token={}", response.data.token)));

        // KuCoin documents the pre-halved interval; the real timeout is
        // roughly double what it returns.
        let ping_interval = Duration::from_millis(server.ping_interval_ms);
        Ok(ConnectPlan::new(url).with_ping_interval(ping_interval))
    }

    fn subscribe_message(&self, asset: Asset) -> Option<String> {
        let pair = symbol(asset).ok()?;
        Some(format!(
            r#"{{"type":"subscribe","topic":"/market/ticker:{pair}","response":true}}"#
        ))
    }

    fn parse(&self, frame: &str, asset: Asset, received_at_ms: i64) -> ParseOutcome {
        let value: Value = match serde_json::from_str(frame) {
            Ok(v) => v,
            Err(e) => return ParseOutcome::ParseError(e.to_string()),
        };

        if value.get("type").and_then(Value::as_str) != Some("message")
            || value.get("subject").and_then(Value::as_str) != Some("trade.ticker")
        {
            return ParseOutcome::Ignore;
        }

        let Some(entry) = value.get("data") else {
            return ParseOutcome::Ignore;
        };

        let Some(price) = field_num(entry, "price") else {
            return ParseOutcome::Ignore;
        };
        let bid = field_num(entry, "bestBid");
        let ask = field_num(entry, "bestAsk");

        match Snapshot::new(VenueId::KuCoin, asset, QuoteUnit::Usdt, price, bid, ask, received_at_ms) {
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
    fn test_parses_trade_ticker_message() {
        let frame = r#"{"topic":"/market/ticker:BTC-USDT","type":"message","subject":"trade.ticker","data":{"bestAsk":"97001.0","bestBid":"96999.0","price":"97000.50","sequence":"1","size":"0.1","time":1700000000000}}"#;
        let outcome = KuCoin.parse(frame, Asset::Btc, 1_000);
        assert!(matches!(outcome, ParseOutcome::Snapshot(_)));
    }

    #[test]
    fn test_ignores_ack_message() {
        let frame = r#"{"id":"1","type":"ack"}"#;
        assert!(matches!(KuCoin.parse(frame, Asset::Btc, 0), ParseOutcome::Ignore));
    }

    #[test]
    fn test_subscribe_message_contains_pair_topic() {
        let msg = KuCoin.subscribe_message(Asset::Btc).unwrap();
        assert!(msg.contains("/market/ticker:BTC-USDT"));
    }
}
