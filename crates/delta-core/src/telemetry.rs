//! Telemetry capability injected into every component.
//!
//! [`Telemetry`] is the narrow interface lifecycle code reports through:
//! log lines, errors and structured custom events. It is passed around as
//! `Arc<dyn Telemetry>` rather than living in a global.
//!
//! [`TracingTelemetry`] writes everything to `tracing`. When export is
//! configured it also ships custom events in JSON batches to an events
//! endpoint from a background task:
//!
//! ```text
//! record_event() ──try_send──► mpsc(1024) ──► exporter task ──POST batch──► events API
//!                                              (flush on interval, size, or shutdown)
//! ```
//!
//! Export failures are logged and dropped; callers never see them.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::TelemetryConfig;
use crate::error::DeltaError;

/// Custom event attributes.
pub type Attributes = Map<String, Value>;

const QUEUE_CAPACITY: usize = 1024;
const MAX_BATCH: usize = 200;
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);
/// The events API takes a license key in `Api-Key`; `X-Insert-Key` is only for insert keys.
const LICENSE_KEY_HEADER: &str = "Api-Key";

/// Reporting capability used by lifecycle code.
#[async_trait]
pub trait Telemetry: Send + Sync {
    fn info(&self, message: &str);

    /// Log an error and record it as an `ErrorEvent`.
    fn error(&self, message: &str, err: &dyn std::fmt::Display);

    /// Record a structured custom event.
    fn record_event(&self, event_type: &str, attributes: Attributes);

    /// Liveness signal, sent on every health check.
    fn heartbeat(&self) {
        self.info("Sending heartbeat");
        let mut attrs = Attributes::new();
        attrs.insert("type".into(), "heartbeat".into());
        attrs.insert("status".into(), "healthy".into());
        self.record_event("HeartbeatEvent", attrs);
    }

    /// Flush anything buffered. Called once at process exit.
    async fn shutdown(&self);
}

/// Build an [`Attributes`] map from `key => value` pairs.
#[macro_export]
macro_rules! attrs {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = $crate::telemetry::Attributes::new();
        $( map.insert(($key).to_string(), ::serde_json::Value::from($value)); )*
        map
    }};
}

// ---------------------------------------------------------------------------
// TracingTelemetry
// ---------------------------------------------------------------------------

/// `tracing`-backed telemetry with optional event export.
pub struct TracingTelemetry {
    app_name: String,
    exporter: Option<EventExporter>,
}

impl TracingTelemetry {
    /// Log-only telemetry.
    pub fn new(app_name: impl Into<String>) -> Self {
        Self { app_name: app_name.into(), exporter: None }
    }

    /// Build from config; starts the exporter task when export is enabled.
    ///
    /// Must be called inside a tokio runtime when export is enabled.
    pub fn from_config(config: &TelemetryConfig) -> Result<Self, DeltaError> {
        if !config.export_enabled() {
            if !config.license_key.is_empty() {
                warn!("telemetry license key set without account id, event export disabled");
            }
            return Ok(Self::new(config.app_name.clone()));
        }

        let exporter = EventExporter::spawn(
            config.effective_events_url(),
            config.license_key.clone(),
            config.flush_interval(),
        )?;
        info!("telemetry export enabled for app '{}'", config.app_name);
        Ok(Self { app_name: config.app_name.clone(), exporter: Some(exporter) })
    }

    pub fn export_enabled(&self) -> bool {
        self.exporter.is_some()
    }

    fn build_event(&self, event_type: &str, attributes: Attributes) -> Value {
        let mut event = attributes;
        event.insert("eventType".into(), event_type.into());
        event.insert("appName".into(), self.app_name.clone().into());
        event.insert("timestamp".into(), chrono::Utc::now().timestamp().into());
        Value::Object(event)
    }
}

#[async_trait]
impl Telemetry for TracingTelemetry {
    fn info(&self, message: &str) {
        info!("{message}");
    }

    fn error(&self, message: &str, err: &dyn std::fmt::Display) {
        let err = err.to_string();
        error!("{message}: {err}");
        let mut attrs = Attributes::new();
        attrs.insert("message".into(), message.into());
        attrs.insert("error".into(), err.into());
        self.record_event("ErrorEvent", attrs);
    }

    fn record_event(&self, event_type: &str, attributes: Attributes) {
        debug!(event_type, ?attributes, "telemetry event");
        if let Some(exporter) = &self.exporter {
            exporter.enqueue(self.build_event(event_type, attributes));
        }
    }

    async fn shutdown(&self) {
        if let Some(exporter) = &self.exporter {
            exporter.shutdown().await;
        }
    }
}

// ---------------------------------------------------------------------------
// EventExporter
// ---------------------------------------------------------------------------

struct EventExporter {
    tx: mpsc::Sender<Value>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl EventExporter {
    fn spawn(url: String, license_key: String, flush_interval: Duration) -> Result<Self, DeltaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DeltaError::Telemetry(format!("http client: {e}")))?;

        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(export_loop(client, url, license_key, flush_interval, rx, shutdown_rx));

        Ok(Self { tx, shutdown_tx, task: Mutex::new(Some(task)) })
    }

    fn enqueue(&self, event: Value) {
        if let Err(e) = self.tx.try_send(event) {
            warn!("telemetry queue rejected event: {e}");
        }
    }

    async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let task = self.task.lock().ok().and_then(|mut t| t.take());
        if let Some(task) = task {
            if tokio::time::timeout(SHUTDOWN_FLUSH_TIMEOUT, task).await.is_err() {
                warn!("telemetry flush did not finish within {SHUTDOWN_FLUSH_TIMEOUT:?}");
            }
        }
    }
}

async fn export_loop(
    client: reqwest::Client,
    url: String,
    license_key: String,
    flush_interval: Duration,
    mut rx: mpsc::Receiver<Value>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut batch: Vec<Value> = Vec::with_capacity(MAX_BATCH);
    let mut ticker = tokio::time::interval(flush_interval);

    loop {
        tokio::select! {
            maybe = rx.recv() => match maybe {
                Some(event) => {
                    batch.push(event);
                    if batch.len() >= MAX_BATCH {
                        post_batch(&client, &url, &license_key, &mut batch).await;
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                post_batch(&client, &url, &license_key, &mut batch).await;
            }
            _ = shutdown_rx.changed() => break,
        }
    }

    while let Ok(event) = rx.try_recv() {
        batch.push(event);
    }
    post_batch(&client, &url, &license_key, &mut batch).await;
    debug!("telemetry exporter exited");
}

async fn post_batch(client: &reqwest::Client, url: &str, license_key: &str, batch: &mut Vec<Value>) {
    if batch.is_empty() {
        return;
    }
    let events = std::mem::take(batch);
    let count = events.len();
    let result = client
        .post(url)
        .header(LICENSE_KEY_HEADER, license_key)
        .json(&events)
        .send()
        .await
        .and_then(|resp| resp.error_for_status());
    match result {
        Ok(_) => debug!("telemetry exported {count} event(s)"),
        Err(e) => warn!("telemetry export of {count} event(s) failed: {e}"),
    }
}

// ---------------------------------------------------------------------------
// MemoryTelemetry
// ---------------------------------------------------------------------------

/// Telemetry that keeps every event in memory. Used by tests and by embedders
/// that want to inspect lifecycle events directly.
#[derive(Default)]
pub struct MemoryTelemetry {
    events: Mutex<Vec<(String, Attributes)>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded `(event_type, attributes)` pairs.
    pub fn events(&self) -> Vec<(String, Attributes)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Recorded event types, in order.
    pub fn event_types(&self) -> Vec<String> {
        self.events().into_iter().map(|(t, _)| t).collect()
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.events().iter().filter(|(t, _)| t == event_type).count()
    }
}

#[async_trait]
impl Telemetry for MemoryTelemetry {
    fn info(&self, message: &str) {
        info!("{message}");
    }

    fn error(&self, message: &str, err: &dyn std::fmt::Display) {
        error!("{message}: {err}");
        let mut attrs = Attributes::new();
        attrs.insert("message".into(), message.into());
        attrs.insert("error".into(), err.to_string().into());
        self.record_event("ErrorEvent", attrs);
    }

    fn record_event(&self, event_type: &str, attributes: Attributes) {
        if let Ok(mut events) = self.events.lock() {
            events.push((event_type.to_string(), attributes));
        }
    }

    async fn shutdown(&self) {}
}
