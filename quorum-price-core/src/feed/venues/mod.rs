//! Per-venue [`VenueAdapter`](super::adapter::VenueAdapter) implementations
//! and the static registry that dispatches on [`VenueId`].

mod binance;
mod bybit;
mod coinbase;
mod gateio;
mod gemini;
mod kraken;
mod kucoin;
mod okx;
mod util;

use crate::feed::adapter::VenueAdapter;
use crate::snapshot::VenueId;

/// Looks up the stateless adapter for a venue. There is no dynamic loading;
/// this is a fixed table over the venue enum.
pub fn adapter_for(venue: VenueId) -> Box<dyn VenueAdapter> {
    match venue {
        VenueId::Binance => Box::new(binance::Binance),
        VenueId::Coinbase => Box::new(coinbase::Coinbase),
        VenueId::Kraken => Box::new(kraken::Kraken),
        VenueId::Okx => Box::new(okx::Okx),
        VenueId::Bybit => Box::new(bybit::Bybit),
        VenueId::Gemini => Box::new(gemini::Gemini),
        VenueId::KuCoin => Box::new(kucoin::KuCoin),
        VenueId::GateIo => Box::new(gateio::GateIo),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Asset;

    #[test]
    fn test_every_venue_has_a_registered_adapter_with_a_symbol() {
        for venue in VenueId::ALL {
            let adapter = adapter_for(venue);
            assert!(adapter.symbol_for(Asset::Btc).is_ok(), "venue={venue}");
        }
    }
}
