//! Kraken venue profile.
//!
//! Kraken spot has no public sandbox; sandbox mode points at the futures
//! demo environment, which is the only test venue Kraken runs.

use std::time::Duration;

use delta_core::ExchangeConfig;

use crate::venue::{Endpoints, VenueProfile};

const LIVE: Endpoints = Endpoints { rest_url: "https://api.kraken.com", ws_url: "wss://ws.kraken.com/v2" };

const DEMO: Endpoints =
    Endpoints { rest_url: "https://demo-futures.kraken.com", ws_url: "wss://demo-futures.kraken.com/ws/v1" };

const KEEPALIVE: Duration = Duration::from_secs(30);

/// Build the Kraken profile from the exchange config.
pub fn profile(config: &ExchangeConfig) -> VenueProfile {
    VenueProfile::select("kraken", LIVE, DEMO, config.sandbox, KEEPALIVE)
}
