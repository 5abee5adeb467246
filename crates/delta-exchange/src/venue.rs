//! Venue profile: the per-exchange data a backend needs.
//!
//! Each venue module (`binance`, `coinbase`, ...) provides a
//! `profile(config) -> VenueProfile` function; the generic
//! [`VenueBackend`](crate::backend::VenueBackend) does the rest.

use std::time::Duration;

/// Live and sandbox endpoints for one venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoints {
    pub rest_url: &'static str,
    pub ws_url: &'static str,
}

/// Everything the generic backend needs to know about one venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueProfile {
    /// Short label used in logs (e.g. `"binance"`).
    pub label: &'static str,
    /// Endpoints selected for this instance (live or sandbox).
    pub endpoints: Endpoints,
    /// Whether `endpoints` are the sandbox ones.
    pub sandbox: bool,
    /// Keep-alive interval the venue expects on an idle session.
    pub keepalive: Duration,
}

impl VenueProfile {
    /// Pick live or sandbox endpoints.
    pub fn select(label: &'static str, live: Endpoints, sandbox: Endpoints, use_sandbox: bool, keepalive: Duration) -> Self {
        Self { label, endpoints: if use_sandbox { sandbox } else { live }, sandbox: use_sandbox, keepalive }
    }
}
