//! # delta-exchange
//!
//! Exchange backends and their lifecycle supervision.
//!
//! ## Architecture
//!
//! Each venue module provides a `profile(config) -> VenueProfile` function
//! describing its endpoints and keep-alive. The generic
//! [`backend::VenueBackend`] turns a profile into an [`Exchange`];
//! [`registry::create_exchange`] picks the venue from the config tag; and
//! [`supervisor::LifecycleSupervisor`] starts and stops the whole set.
//!
//! ## Supported venues
//!
//! | Venue    | Module     | Sandbox                  |
//! |----------|------------|--------------------------|
//! | Binance  | `binance`  | Spot testnet             |
//! | Coinbase | `coinbase` | Exchange public sandbox  |
//! | KuCoin   | `kucoin`   | OpenAPI sandbox          |
//! | Kraken   | `kraken`   | Futures demo             |

pub mod backend;
pub mod binance;
pub mod coinbase;
pub mod error;
pub mod kraken;
pub mod kucoin;
pub mod registry;
pub mod session;
pub mod supervisor;
pub mod venue;

use async_trait::async_trait;
use delta_core::{Deadline, ExchangeType};

pub use error::{AggregateError, LifecycleError, Operation};
pub use supervisor::{ExchangeStatus, LifecycleSupervisor, SupervisorState};

/// Lifecycle capability implemented by every exchange backend.
///
/// `Send + Sync` because the supervisor drives each backend from its own
/// task while the health endpoint reads [`is_running`](Exchange::is_running)
/// concurrently.
///
/// # Contract
///
/// - [`start`](Exchange::start) on a running backend fails with
///   [`LifecycleError::AlreadyRunning`] and changes nothing.
/// - [`stop`](Exchange::stop) on a stopped backend is an immediate `Ok`.
/// - A stop that reports a teardown error still leaves the backend stopped.
/// - Both calls bound their blocking work by the given [`Deadline`].
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Configured display name.
    fn name(&self) -> &str;
    /// Venue this backend talks to.
    fn exchange_type(&self) -> ExchangeType;
    /// Connect and begin venue operations.
    async fn start(&self, deadline: Deadline) -> Result<(), LifecycleError>;
    /// Gracefully tear down venue operations.
    async fn stop(&self, deadline: Deadline) -> Result<(), LifecycleError>;
    /// Current running state.
    fn is_running(&self) -> bool;
}
