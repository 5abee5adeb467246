//! Venue session: the background task a running backend owns.
//!
//! The task carries no venue traffic. It exists so that start and stop have
//! real work to set up and tear down under a deadline. Each `VenueSession`
//! runs as a tokio task that:
//! 1. Logs the endpoint it is bound to (live or sandbox).
//! 2. Counts a local tick at the venue's keep-alive interval (debug log only).
//! 3. Exits when the shutdown channel flips to `true`.
//!
//! Closing signals the task and waits for it up to the caller's deadline; a
//! task that does not exit in time is aborted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use delta_core::Deadline;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{LifecycleError, Operation};
use crate::venue::VenueProfile;

pub struct VenueSession {
    name: String,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    keepalives: Arc<AtomicU64>,
}

impl VenueSession {
    /// Spawn the session task.
    pub fn open(name: &str, profile: &VenueProfile) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let keepalives = Arc::new(AtomicU64::new(0));

        info!(
            "[{name}] session open - rest={} ws={} sandbox={}",
            profile.endpoints.rest_url, profile.endpoints.ws_url, profile.sandbox
        );

        let task = tokio::spawn(keepalive_loop(
            name.to_string(),
            profile.endpoints.ws_url,
            profile.keepalive,
            keepalives.clone(),
            shutdown_rx,
        ));

        Self { name: name.to_string(), shutdown_tx, task, keepalives }
    }

    /// Session around an arbitrary task, for exercising teardown paths.
    #[cfg(test)]
    pub(crate) fn with_task(name: &str, task: JoinHandle<()>) -> Self {
        Self {
            name: name.to_string(),
            shutdown_tx: watch::channel(false).0,
            task,
            keepalives: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Local ticks counted so far.
    pub fn keepalives(&self) -> u64 {
        self.keepalives.load(Ordering::Relaxed)
    }

    /// Signal the task and wait for it to exit before `deadline`.
    pub async fn close(self, deadline: Deadline) -> Result<(), LifecycleError> {
        let Self { name, shutdown_tx, mut task, .. } = self;
        let _ = shutdown_tx.send(true);

        match deadline.run(&mut task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(LifecycleError::Venue { name, reason: format!("session task failed: {e}") }),
            Err(_) => {
                warn!("[{name}] session did not exit before deadline, aborting");
                task.abort();
                Err(LifecycleError::Timeout { name, op: Operation::Stop })
            }
        }
    }
}

async fn keepalive_loop(
    name: String,
    endpoint: &'static str,
    every: Duration,
    keepalives: Arc<AtomicU64>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let n = keepalives.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("[{name}] keep-alive #{n} -> {endpoint}");
            }
            res = shutdown_rx.changed() => {
                if res.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    info!("[{name}] session closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::Endpoints;

    fn profile() -> VenueProfile {
        let ep = Endpoints { rest_url: "https://rest.test", ws_url: "wss://ws.test" };
        VenueProfile::select("test", ep, ep, false, Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_ticks_until_closed() {
        let session = VenueSession::open("t", &profile());
        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(session.keepalives(), 3);
        session.close(Deadline::after(Duration::from_secs(1))).await.unwrap();
    }
}
