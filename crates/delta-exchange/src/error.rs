//! Lifecycle errors raised by exchange backends and the supervisor.

use delta_core::error::UnsupportedExchange;
use thiserror::Error;

use crate::supervisor::SupervisorState;

/// Which lifecycle call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    Stop,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::Stop => f.write_str("stop"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// `start` on a backend that is already running. Local precondition
    /// failure; the backend state is unchanged.
    #[error("{name} exchange already running")]
    AlreadyRunning { name: String },

    /// Venue tag with no backend implementation.
    #[error(transparent)]
    UnsupportedExchange(#[from] UnsupportedExchange),

    /// A single backend call overran its deadline.
    #[error("{name}: {op} did not complete before the deadline")]
    Timeout { name: String, op: Operation },

    /// Venue-specific setup or teardown failure.
    #[error("{name}: {reason}")]
    Venue { name: String, reason: String },

    /// The lifecycle task itself died (panic or runtime shutdown).
    #[error("{name}: {op} task failed: {reason}")]
    Task { name: String, op: Operation, reason: String },

    /// Shutdown deadline elapsed before every backend confirmed stopped.
    /// Their stop calls keep running in the background.
    #[error("shutdown deadline elapsed; not confirmed stopped: {}", .pending.join(", "))]
    ShutdownTimeout { pending: Vec<String> },

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("cannot {op} all exchanges while supervisor is {state}")]
    InvalidState { op: Operation, state: SupervisorState },
}

/// One backend's failure inside an [`AggregateError`].
#[derive(Debug)]
pub struct BackendFailure {
    pub name: String,
    pub error: LifecycleError,
}

/// One or more independent per-backend failures from a fan-out call.
#[derive(Debug)]
pub struct AggregateError {
    pub op: Operation,
    pub failures: Vec<BackendFailure>,
}

impl AggregateError {
    pub fn new(op: Operation) -> Self {
        Self { op, failures: Vec::new() }
    }

    pub fn push(&mut self, name: impl Into<String>, error: LifecycleError) {
        self.failures.push(BackendFailure { name: name.into(), error });
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Names of the failing backends, in the order they were recorded.
    pub fn names(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.name.as_str()).collect()
    }

    /// `Ok(())` when nothing failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed for {} exchange(s)", self.op, self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}[{}] {}", failure.name, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_display_names_every_backend() {
        let mut agg = AggregateError::new(Operation::Start);
        agg.push("bn", LifecycleError::AlreadyRunning { name: "bn".into() });
        agg.push("kr", LifecycleError::Venue { name: "kr".into(), reason: "refused".into() });
        assert_eq!(agg.names(), vec!["bn", "kr"]);
        assert_eq!(
            agg.to_string(),
            "start failed for 2 exchange(s): [bn] bn exchange already running; [kr] kr: refused"
        );
    }

    #[test]
    fn empty_aggregate_is_ok() {
        assert!(AggregateError::new(Operation::Stop).into_result().is_ok());
    }

    #[test]
    fn shutdown_timeout_lists_pending() {
        let err = LifecycleError::ShutdownTimeout { pending: vec!["a".into(), "b".into()] };
        assert_eq!(err.to_string(), "shutdown deadline elapsed; not confirmed stopped: a, b");
    }
}
