//! Coinbase venue profile.

use std::time::Duration;

use delta_core::ExchangeConfig;

use crate::venue::{Endpoints, VenueProfile};

const LIVE: Endpoints =
    Endpoints { rest_url: "https://api.coinbase.com", ws_url: "wss://advanced-trade-ws.coinbase.com" };

const SANDBOX: Endpoints = Endpoints {
    rest_url: "https://api-public.sandbox.exchange.coinbase.com",
    ws_url: "wss://ws-feed-public.sandbox.exchange.coinbase.com",
};

const KEEPALIVE: Duration = Duration::from_secs(30);

/// Build the Coinbase profile from the exchange config.
pub fn profile(config: &ExchangeConfig) -> VenueProfile {
    VenueProfile::select("coinbase", LIVE, SANDBOX, config.sandbox, KEEPALIVE)
}
