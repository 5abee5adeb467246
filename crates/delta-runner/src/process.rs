//! Process supervisor: top-level control loop.
//!
//! ```text
//! run(signal)
//!   ├─ spawn http.start(port) ───────────────┐ returns early ⇒ fatal, exit 1
//!   ├─ spawn lifecycle.start_all(deadline)   │
//!   └─ wait: signal | http exit ─────────────┘
//!        │
//!        ▼ one shared shutdown deadline
//!   join(http.shutdown, lifecycle.stop_all) ⇒ any error ⇒ exit 1, else 0
//! ```

use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use delta_core::Deadline;
use delta_core::telemetry::Telemetry;
use delta_exchange::LifecycleSupervisor;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::http::HttpSurface;

/// Outcome of a supervised run, mapped to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Everything shut down inside the deadline.
    Clean,
    /// HTTP surface died, or shutdown reported an error.
    Failed,
}

impl ExitStatus {
    pub fn code(&self) -> u8 {
        match self {
            Self::Clean => 0,
            Self::Failed => 1,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

pub struct ProcessSupervisor<H: HttpSurface> {
    http: Arc<H>,
    lifecycle: Arc<LifecycleSupervisor>,
    telemetry: Arc<dyn Telemetry>,
    port: u16,
    startup_timeout: Duration,
    shutdown_timeout: Duration,
}

impl<H: HttpSurface> ProcessSupervisor<H> {
    pub fn new(
        http: Arc<H>,
        lifecycle: Arc<LifecycleSupervisor>,
        telemetry: Arc<dyn Telemetry>,
        port: u16,
    ) -> Self {
        Self {
            http,
            lifecycle,
            telemetry,
            port,
            startup_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Run until `shutdown_signal` resolves or the HTTP surface fails.
    pub async fn run<S>(self, shutdown_signal: S) -> ExitStatus
    where
        S: Future<Output = ()>,
    {
        let mut http_task = {
            let http = self.http.clone();
            let port = self.port;
            tokio::spawn(async move { http.start(port).await })
        };

        let mut start_task = {
            let lifecycle = self.lifecycle.clone();
            let telemetry = self.telemetry.clone();
            let deadline = Deadline::after(self.startup_timeout);
            tokio::spawn(async move {
                match lifecycle.start_all(deadline).await {
                    Ok(()) => telemetry.info(&format!("all {} exchange(s) started", lifecycle.len())),
                    // Not fatal: the health endpoint reports degraded.
                    Err(e) => telemetry.error("Exchange startup incomplete", &e),
                }
            })
        };

        self.telemetry.info("Server started successfully. Press Ctrl+C to shutdown.");

        tokio::pin!(shutdown_signal);
        tokio::select! {
            joined = &mut http_task => {
                match joined {
                    Ok(Ok(())) => self.telemetry.error("Server failed to start", &"server exited before shutdown"),
                    Ok(Err(e)) => self.telemetry.error("Server failed to start", &e),
                    Err(e) => self.telemetry.error("Server failed to start", &e),
                }
                self.abandon(start_task).await;
                return ExitStatus::Failed;
            }
            _ = &mut shutdown_signal => {}
        }

        self.telemetry.info("Shutdown signal received");
        let deadline = Deadline::after(self.shutdown_timeout);
        self.settle_startup(&mut start_task).await;

        let (http_result, lifecycle_result) =
            tokio::join!(self.http.shutdown(deadline), self.lifecycle.stop_all(deadline));

        let mut status = ExitStatus::Clean;
        if let Err(e) = http_result {
            self.telemetry.error("Server forced to shutdown", &e);
            http_task.abort();
            status = ExitStatus::Failed;
        }
        if let Err(e) = lifecycle_result {
            self.telemetry.error("Exchange shutdown incomplete", &e);
            status = ExitStatus::Failed;
        }

        if status == ExitStatus::Clean {
            match deadline.run(http_task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => {
                    self.telemetry.error("Server exited with error", &e);
                    status = ExitStatus::Failed;
                }
                Ok(Err(e)) => {
                    self.telemetry.error("Server task failed", &e);
                    status = ExitStatus::Failed;
                }
                Err(_) => warn!("server task still draining after shutdown"),
            }
        }

        info!("Server exited (status={})", status.code());
        status
    }

    /// HTTP died before the signal: stop backends within one shutdown window.
    async fn abandon(&self, mut start_task: JoinHandle<()>) {
        let deadline = Deadline::after(self.shutdown_timeout);
        self.settle_startup(&mut start_task).await;
        if let Err(e) = self.lifecycle.stop_all(deadline).await {
            self.telemetry.error("Exchange shutdown incomplete", &e);
        }
    }

    /// Let an in-flight startup settle so stop sees the final set. Capped at
    /// half the shutdown window; the rest is left for stopping.
    async fn settle_startup(&self, start_task: &mut JoinHandle<()>) {
        let cap = Deadline::after(self.shutdown_timeout / 2);
        match cap.run(start_task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("exchange startup task failed: {e}"),
            Err(_) => warn!("exchange startup still running after {:?}, stopping anyway", self.shutdown_timeout / 2),
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
