//! Typed error definitions for the delta system.
//!
//! [`DeltaError`] covers configuration and process-level failures. Lifecycle
//! errors raised by exchange backends live in `delta-exchange`. All variants
//! implement `std::error::Error` via `thiserror`, so they compose with
//! `anyhow::Result` in the binary.

use thiserror::Error;

/// Venue tag that has no backend implementation.
///
/// Returned by `ExchangeType::from_str` and wrapped by both [`DeltaError`]
/// and the lifecycle errors in `delta-exchange`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported exchange type: {tag}")]
pub struct UnsupportedExchange {
    pub tag: String,
}

/// Domain-specific errors for the delta system.
#[derive(Debug, Error)]
pub enum DeltaError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    UnsupportedExchange(#[from] UnsupportedExchange),

    /// Telemetry export failure (never fatal to the caller).
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// HTTP surface failure (bind, serve, or shutdown).
    #[error("http error: {0}")]
    Http(String),
}
