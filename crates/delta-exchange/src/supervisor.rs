//! Lifecycle supervisor: starts and stops every configured exchange.
//!
//! # Architecture
//!
//! ```text
//! start_all(deadline) ──► spawn start per enabled exchange (config order)
//!                     ──► join in config order, collect AggregateError
//! stop_all(deadline)  ──► spawn stop per exchange (reverse config order)
//!                     ──► join until deadline; unfinished = ShutdownTimeout
//! ```
//!
//! Stop tasks that overrun the deadline are detached rather than aborted, so a
//! slow venue still finishes its teardown and settles to not-running after
//! the supervisor has given up waiting.

use std::sync::{Arc, Mutex};

use delta_core::{Deadline, ExchangeConfig, ExchangeType, attrs, telemetry::Telemetry};
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use serde::Serialize;
use tokio::task::JoinError;
use tracing::{error, info, warn};

use crate::Exchange;
use crate::error::{AggregateError, LifecycleError, Operation};
use crate::registry::create_exchange;

/// Supervisor-level state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of one exchange, for the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeStatus {
    pub name: String,
    #[serde(rename = "type")]
    pub exchange_type: ExchangeType,
    pub enabled: bool,
    pub running: bool,
}

struct Entry {
    exchange: Arc<dyn Exchange>,
    enabled: bool,
}

pub struct LifecycleSupervisor {
    entries: Vec<Entry>,
    state: Mutex<SupervisorState>,
    telemetry: Arc<dyn Telemetry>,
}

impl LifecycleSupervisor {
    pub fn new(telemetry: Arc<dyn Telemetry>) -> Self {
        Self { entries: Vec::new(), state: Mutex::new(SupervisorState::Idle), telemetry }
    }

    /// Build one backend per config entry, in order.
    ///
    /// Any unsupported tag fails the whole construction: a misconfigured
    /// exchange is never silently dropped.
    pub fn from_configs(configs: &[ExchangeConfig], telemetry: Arc<dyn Telemetry>) -> Result<Self, LifecycleError> {
        let mut supervisor = Self::new(telemetry.clone());
        for (idx, config) in configs.iter().enumerate() {
            let exchange = create_exchange(config, telemetry.clone())?;
            info!(
                "exchange[{idx}]: created '{}' (type={}, enabled={}, sandbox={})",
                exchange.name(),
                exchange.exchange_type(),
                config.enabled,
                config.sandbox,
            );
            supervisor.add(exchange, config.enabled);
        }
        Ok(supervisor)
    }

    /// Register a backend. Insertion order is startup order.
    pub fn add(&mut self, exchange: Arc<dyn Exchange>, enabled: bool) {
        self.entries.push(Entry { exchange, enabled });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn state(&self) -> SupervisorState {
        self.state.lock().map(|s| *s).unwrap_or(SupervisorState::Stopped)
    }

    fn set_state(&self, next: SupervisorState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    /// Move `from -> to` atomically; returns the current state on mismatch.
    fn transition(&self, from: SupervisorState, to: SupervisorState) -> Result<(), SupervisorState> {
        let mut state = self.state.lock().map_err(|_| SupervisorState::Stopped)?;
        if *state != from {
            return Err(*state);
        }
        *state = to;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Exchange>> {
        self.entries.iter().find(|e| e.exchange.name() == name).map(|e| e.exchange.clone())
    }

    pub fn statuses(&self) -> Vec<ExchangeStatus> {
        self.entries
            .iter()
            .map(|e| ExchangeStatus {
                name: e.exchange.name().to_string(),
                exchange_type: e.exchange.exchange_type(),
                enabled: e.enabled,
                running: e.exchange.is_running(),
            })
            .collect()
    }

    /// `true` when every enabled exchange reports running.
    pub fn all_enabled_running(&self) -> bool {
        self.entries.iter().filter(|e| e.enabled).all(|e| e.exchange.is_running())
    }

    /// Start every enabled exchange concurrently.
    ///
    /// One exchange failing does not stop the others; the returned
    /// [`AggregateError`] names each failure. The supervisor moves to
    /// `Running` whatever the outcome. Callable once, from `Idle`.
    pub async fn start_all(&self, deadline: Deadline) -> Result<(), LifecycleError> {
        self.transition(SupervisorState::Idle, SupervisorState::Starting)
            .map_err(|state| LifecycleError::InvalidState { op: Operation::Start, state })?;

        let enabled: Vec<_> = self.entries.iter().filter(|e| e.enabled).collect();
        info!("starting {} of {} exchange(s)", enabled.len(), self.entries.len());

        let handles: Vec<_> = enabled
            .iter()
            .map(|e| {
                let exchange = e.exchange.clone();
                let handle = tokio::spawn(async move { exchange.start(deadline).await });
                (e.exchange.name().to_string(), handle)
            })
            .collect();

        let mut failures = AggregateError::new(Operation::Start);
        for (name, handle) in handles {
            let result = handle.await.unwrap_or_else(|e| {
                Err(LifecycleError::Task { name: name.clone(), op: Operation::Start, reason: e.to_string() })
            });
            match result {
                Ok(()) => info!("exchange '{name}' started"),
                Err(e) => {
                    self.telemetry.error(&format!("failed to start exchange '{name}'"), &e);
                    self.telemetry.record_event(
                        "ExchangeStartFailed",
                        attrs! { "name" => name.as_str(), "error" => e.to_string() },
                    );
                    failures.push(name, e);
                }
            }
        }

        // A shutdown that began meanwhile keeps its state.
        let _ = self.transition(SupervisorState::Starting, SupervisorState::Running);
        info!("start complete - {} running, {} failed", enabled.len() - failures.len(), failures.len());
        failures.into_result().map_err(LifecycleError::from)
    }

    /// Stop every exchange concurrently, running or not.
    ///
    /// Every exchange is attempted; no failure aborts the others. If the
    /// deadline passes first, returns [`LifecycleError::ShutdownTimeout`]
    /// naming the exchanges that have not confirmed. An exchange that was
    /// already stopped when its stop was issued counts as confirmed. Failures
    /// that did complete are logged and reported as an aggregate otherwise.
    pub async fn stop_all(&self, deadline: Deadline) -> Result<(), LifecycleError> {
        let previous = {
            let mut state = self.state.lock().map_err(|_| LifecycleError::InvalidState {
                op: Operation::Stop,
                state: SupervisorState::Stopped,
            })?;
            match *state {
                SupervisorState::Stopping | SupervisorState::Stopped => {
                    return Err(LifecycleError::InvalidState { op: Operation::Stop, state: *state });
                }
                prev => {
                    *state = SupervisorState::Stopping;
                    prev
                }
            }
        };
        info!(
            "stopping {} exchange(s) from state {previous}, {:?} left before deadline",
            self.entries.len(),
            deadline.remaining()
        );

        let mut pending: Vec<String> = Vec::with_capacity(self.entries.len());
        let mut in_flight = FuturesUnordered::new();
        for e in self.entries.iter().rev() {
            let name = e.exchange.name().to_string();
            // An enabled exchange may still be mid-start if startup overran.
            let unconfirmed =
                e.exchange.is_running() || (e.enabled && previous == SupervisorState::Starting);
            if unconfirmed {
                pending.push(name.clone());
            }
            let exchange = e.exchange.clone();
            let handle = tokio::spawn(async move { exchange.stop(deadline).await });
            in_flight.push(async move { (name, handle.await) });
        }

        let mut failures = AggregateError::new(Operation::Stop);
        let timed_out = loop {
            match deadline.run(in_flight.next()).await {
                Ok(Some((name, joined))) => self.settle_stop(name, joined, &mut pending, &mut failures),
                Ok(None) => break false,
                Err(_) => {
                    while let Some(Some((name, joined))) = in_flight.next().now_or_never() {
                        self.settle_stop(name, joined, &mut pending, &mut failures);
                    }
                    break !pending.is_empty();
                }
            }
        };
        // Dropping the join handles detaches the stragglers; they keep running.
        drop(in_flight);

        self.set_state(SupervisorState::Stopped);

        if timed_out {
            error!("shutdown deadline elapsed with {} exchange(s) unconfirmed: {}", pending.len(), pending.join(", "));
            self.telemetry.record_event(
                "ShutdownTimeout",
                attrs! { "pending" => pending.join(","), "failed" => failures.len() },
            );
            if !failures.is_empty() {
                warn!("{failures}");
            }
            return Err(LifecycleError::ShutdownTimeout { pending });
        }

        info!("stop complete - {} exchange(s), {} failed", self.entries.len(), failures.len());
        failures.into_result().map_err(LifecycleError::from)
    }

    fn settle_stop(
        &self,
        name: String,
        joined: Result<Result<(), LifecycleError>, JoinError>,
        pending: &mut Vec<String>,
        failures: &mut AggregateError,
    ) {
        pending.retain(|n| n != &name);
        let result = joined.unwrap_or_else(|e| {
            Err(LifecycleError::Task { name: name.clone(), op: Operation::Stop, reason: e.to_string() })
        });
        if let Err(e) = result {
            self.telemetry.error(&format!("failed to stop exchange '{name}'"), &e);
            self.telemetry.record_event(
                "ExchangeStopFailed",
                attrs! { "name" => name.as_str(), "error" => e.to_string() },
            );
            failures.push(name, e);
        }
    }
}
