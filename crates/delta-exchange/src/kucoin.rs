//! KuCoin venue profile.

use std::time::Duration;

use delta_core::ExchangeConfig;

use crate::venue::{Endpoints, VenueProfile};

const LIVE: Endpoints = Endpoints { rest_url: "https://api.kucoin.com", ws_url: "wss://ws-api-spot.kucoin.com" };

const SANDBOX: Endpoints =
    Endpoints { rest_url: "https://openapi-sandbox.kucoin.com", ws_url: "wss://ws-api-sandbox.kucoin.com" };

/// KuCoin advertises an 18 s ping interval in its bullet token response.
const KEEPALIVE: Duration = Duration::from_secs(18);

/// Build the KuCoin profile from the exchange config.
pub fn profile(config: &ExchangeConfig) -> VenueProfile {
    VenueProfile::select("kucoin", LIVE, SANDBOX, config.sandbox, KEEPALIVE)
}
