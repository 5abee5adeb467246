//! Binance spot venue profile.

use std::time::Duration;

use delta_core::ExchangeConfig;

use crate::venue::{Endpoints, VenueProfile};

const LIVE: Endpoints = Endpoints { rest_url: "https://api.binance.com", ws_url: "wss://stream.binance.com:9443/ws" };

const TESTNET: Endpoints = Endpoints { rest_url: "https://testnet.binance.vision", ws_url: "wss://testnet.binance.vision/ws" };

/// Binance drops streams that stay silent past three minutes of pings.
const KEEPALIVE: Duration = Duration::from_secs(180);

/// Build the Binance profile from the exchange config.
pub fn profile(config: &ExchangeConfig) -> VenueProfile {
    VenueProfile::select("binance", LIVE, TESTNET, config.sandbox, KEEPALIVE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sandbox_selects_testnet() {
        let cfg = ExchangeConfig::new("binance", "bn").with_sandbox(true);
        let p = profile(&cfg);
        assert!(p.sandbox);
        assert_eq!(p.endpoints.rest_url, "https://testnet.binance.vision");

        let p = profile(&cfg.with_sandbox(false));
        assert_eq!(p.endpoints, LIVE);
    }
}
