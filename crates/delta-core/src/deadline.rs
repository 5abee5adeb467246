//! Deadline passed into every blocking lifecycle call.
//!
//! A [`Deadline`] is an absolute `tokio::time::Instant`. It is `Copy`, so one
//! shutdown deadline can be shared by every backend and the HTTP surface
//! without any coordination. Because it is built on tokio's clock it honours
//! `tokio::time::pause()` in tests.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, error::Elapsed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self { at: Instant::now() + timeout }
    }

    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Time left, saturating at zero.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Run `fut` until it completes or the deadline passes.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Elapsed> {
        tokio::time::timeout_at(self.at, fut).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn remaining_counts_down() {
        let d = Deadline::after(Duration::from_secs(5));
        assert_eq!(d.remaining(), Duration::from_secs(5));
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(d.remaining(), Duration::from_secs(2));
        assert!(!d.is_expired());
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(d.remaining(), Duration::ZERO);
        assert!(d.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn run_times_out() {
        let d = Deadline::after(Duration::from_millis(50));
        let res = d.run(tokio::time::sleep(Duration::from_secs(1))).await;
        assert!(res.is_err());
        let ok = Deadline::after(Duration::from_secs(1)).run(async { 7 }).await;
        assert_eq!(ok.unwrap(), 7);
    }
}
