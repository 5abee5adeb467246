//! Generic exchange backend.
//!
//! Provides [`VenueBackend`] - a data-driven implementation of [`Exchange`]
//! shared by every venue. A venue module only supplies a [`VenueProfile`];
//! the backend owns the running flag, the session task, and the telemetry
//! around each transition.
//!
//! # State
//!
//! ```text
//! not-running ──start()──► running ──stop()──► not-running
//!      │                      │
//!      └─stop(): no-op Ok     └─start(): AlreadyRunning
//! ```
//!
//! `running` is an atomic so `is_running()` can be read by the health path
//! while a transition is in flight; transitions themselves are serialized by
//! the `session` mutex.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use delta_core::{Deadline, ExchangeConfig, ExchangeType, attrs, telemetry::Telemetry};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::Exchange;
use crate::error::{LifecycleError, Operation};
use crate::session::VenueSession;
use crate::venue::VenueProfile;

pub struct VenueBackend {
    config: ExchangeConfig,
    exchange_type: ExchangeType,
    profile: VenueProfile,
    telemetry: Arc<dyn Telemetry>,
    running: AtomicBool,
    session: Mutex<Option<VenueSession>>,
}

impl VenueBackend {
    pub fn new(
        config: ExchangeConfig,
        exchange_type: ExchangeType,
        profile: VenueProfile,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self { config, exchange_type, profile, telemetry, running: AtomicBool::new(false), session: Mutex::new(None) }
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn profile(&self) -> &VenueProfile {
        &self.profile
    }
}

#[async_trait]
impl Exchange for VenueBackend {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn exchange_type(&self) -> ExchangeType {
        self.exchange_type
    }

    async fn start(&self, deadline: Deadline) -> Result<(), LifecycleError> {
        let mut session = self.session.lock().await;
        if self.running.load(Ordering::Acquire) {
            return Err(LifecycleError::AlreadyRunning { name: self.name().to_string() });
        }

        let name = self.name();
        info!("[{name}] starting {} exchange", self.exchange_type);
        if !self.config.credentials.is_complete() {
            warn!("[{name}] no API credentials configured, private endpoints unavailable");
        }

        let opened = deadline.run(async { VenueSession::open(name, &self.profile) }).await;
        let Ok(opened) = opened else {
            return Err(LifecycleError::Timeout { name: name.to_string(), op: Operation::Start });
        };

        *session = Some(opened);
        self.running.store(true, Ordering::Release);
        info!("[{name}] exchange started successfully");
        self.telemetry.record_event(
            "ExchangeStarted",
            attrs! { "name" => name, "type" => self.exchange_type.as_str(), "sandbox" => self.profile.sandbox },
        );
        Ok(())
    }

    async fn stop(&self, deadline: Deadline) -> Result<(), LifecycleError> {
        let mut session = self.session.lock().await;
        if !self.running.load(Ordering::Acquire) {
            return Ok(());
        }

        let name = self.name();
        info!("[{name}] stopping exchange");

        let result = match session.take() {
            Some(s) => s.close(deadline).await,
            None => Ok(()),
        };

        // Marked stopped even when teardown reported an error.
        self.running.store(false, Ordering::Release);
        match &result {
            Ok(()) => info!("[{name}] exchange stopped"),
            Err(e) => warn!("[{name}] exchange stopped with teardown error: {e}"),
        }
        self.telemetry.record_event(
            "ExchangeStopped",
            attrs! { "name" => name, "type" => self.exchange_type.as_str(), "clean" => result.is_ok() },
        );
        result
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use delta_core::telemetry::MemoryTelemetry;

    use super::*;
    use crate::registry::create_exchange;

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(5))
    }

    fn backends(telemetry: Arc<MemoryTelemetry>) -> Vec<Arc<dyn Exchange>> {
        ExchangeType::ALL
            .iter()
            .map(|ty| {
                let cfg = ExchangeConfig::new(ty.as_str(), format!("{ty}-test"));
                create_exchange(&cfg, telemetry.clone()).unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn stop_before_start_is_noop() {
        let telemetry = Arc::new(MemoryTelemetry::new());
        for ex in backends(telemetry.clone()) {
            ex.stop(deadline()).await.unwrap();
            assert!(!ex.is_running(), "{}", ex.name());
        }
        assert_eq!(telemetry.count("ExchangeStopped"), 0);
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        for ex in backends(Arc::new(MemoryTelemetry::new())) {
            ex.start(deadline()).await.unwrap();
            let err = ex.start(deadline()).await.unwrap_err();
            assert!(matches!(err, LifecycleError::AlreadyRunning { ref name } if name == ex.name()));
            assert!(ex.is_running());
            ex.stop(deadline()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let telemetry = Arc::new(MemoryTelemetry::new());
        for ex in backends(telemetry.clone()) {
            ex.start(deadline()).await.unwrap();
            ex.stop(deadline()).await.unwrap();
            assert!(!ex.is_running());
            ex.stop(deadline()).await.unwrap();
            assert!(!ex.is_running());
        }
        assert_eq!(telemetry.count("ExchangeStarted"), 4);
        assert_eq!(telemetry.count("ExchangeStopped"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_marks_stopped_when_teardown_overruns() {
        let telemetry = Arc::new(MemoryTelemetry::new());
        let cfg = ExchangeConfig::new("kraken", "kr");
        let ex = VenueBackend::new(cfg.clone(), ExchangeType::Kraken, crate::kraken::profile(&cfg), telemetry.clone());
        ex.start(deadline()).await.unwrap();

        // Session task that never honours the shutdown signal.
        let hung = VenueSession::with_task("kr", tokio::spawn(std::future::pending::<()>()));
        let previous = ex.session.lock().await.replace(hung);
        if let Some(previous) = previous {
            previous.close(deadline()).await.unwrap();
        }

        let err = ex.stop(Deadline::after(Duration::from_secs(2))).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Timeout { op: Operation::Stop, ref name } if name == "kr"));
        assert!(!ex.is_running());
        let (_, attrs) = telemetry.events().into_iter().find(|(t, _)| t == "ExchangeStopped").unwrap();
        assert_eq!(attrs["clean"], false);

        // Still a no-op afterwards.
        ex.stop(deadline()).await.unwrap();
    }

    #[tokio::test]
    async fn restart_after_stop() {
        let ex = &backends(Arc::new(MemoryTelemetry::new()))[0];
        ex.start(deadline()).await.unwrap();
        ex.stop(deadline()).await.unwrap();
        ex.start(deadline()).await.unwrap();
        assert!(ex.is_running());
    }
}
