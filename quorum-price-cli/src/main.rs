use quorum_price_core::{Asset, Config, Feed, VenueId};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    init_logging();

    let asset = read_asset();
    let venues = read_venues();
    let config = Config::default();

    info!(%asset, venue_count = venues.len(), "starting quorum-price");

    let feed = match Feed::new(asset, venues, config) {
        Ok(feed) => feed,
        Err(e) => {
            error!(%e, "invalid configuration, exiting");
            std::process::exit(1);
        }
    };

    feed.start();

    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(2));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                print_status(&feed);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received ctrl-c, shutting down");
                break;
            }
        }
    }

    feed.stop().await;
}

fn print_status(feed: &Feed) {
    match feed.get_report() {
        Some(report) => {
            println!(
                "{} ${:.2}  divergence={:.4}%  confidence={:.2}  sources={}",
                report.asset, report.price, report.divergence_pct, report.confidence, report.source_count
            );
        }
        None => println!("no current report (waiting for enough live venues)"),
    }

    if let Some(signal) = feed.get_oracle_signal() {
        println!(
            "  oracle: {:?} divergence_bps={:.2} strength={:.2}",
            signal.direction, signal.divergence_bps, signal.strength
        );
    }
}

/// Reads the `ASSET` environment variable (`BTC`/`ETH`/`SOL`/`XRP`), defaulting
/// to BTC. Loading config from the environment is this binary's job, not the
/// library's (spec §1).
fn read_asset() -> Asset {
    match std::env::var("ASSET").unwrap_or_default().to_ascii_uppercase().as_str() {
        "ETH" => Asset::Eth,
        "SOL" => Asset::Sol,
        "XRP" => Asset::Xrp,
        _ => Asset::Btc,
    }
}

/// Reads a comma-separated `VENUES` environment variable, defaulting to all
/// eight supported venues.
fn read_venues() -> Vec<VenueId> {
    match std::env::var("VENUES") {
        Ok(raw) => raw
            .split(',')
            .filter_map(|tag| match VenueId::from_tag(tag.trim()) {
                Ok(venue) => Some(venue),
                Err(e) => {
                    error!(%e, tag, "ignoring unrecognised venue tag");
                    None
                }
            })
            .collect(),
        Err(_) => VenueId::ALL.to_vec(),
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
