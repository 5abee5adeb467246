//! Health HTTP surface.
//!
//! Routes:
//!
//! | Path      | Purpose                                                   |
//! |-----------|-----------------------------------------------------------|
//! | `/health` | JSON status with per-exchange running state (always 200)  |
//! | `/readyz` | 200 once every enabled exchange runs, 503 otherwise       |
//!
//! Middleware: panic recovery, permissive CORS, request logging, request
//! timeout.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use delta_core::Deadline;
use delta_core::error::DeltaError;
use delta_core::telemetry::Telemetry;
use delta_exchange::{ExchangeStatus, LifecycleSupervisor, SupervisorState};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};

/// HTTP surface driven by the process supervisor.
#[async_trait]
pub trait HttpSurface: Send + Sync + 'static {
    /// Bind and serve. Returns only on failure or after a shutdown.
    async fn start(&self, port: u16) -> Result<(), DeltaError>;
    /// Stop accepting, drain in-flight requests before `deadline`.
    async fn shutdown(&self, deadline: Deadline) -> Result<(), DeltaError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub supervisor: SupervisorState,
    pub dry_run: bool,
    pub exchanges: Vec<ExchangeStatus>,
}

/// Shared state for the health handlers.
pub struct HealthState {
    pub started_at: DateTime<Utc>,
    pub supervisor: Arc<LifecycleSupervisor>,
    pub telemetry: Arc<dyn Telemetry>,
    pub dry_run: bool,
}

impl HealthState {
    pub fn new(supervisor: Arc<LifecycleSupervisor>, telemetry: Arc<dyn Telemetry>, dry_run: bool) -> Self {
        Self { started_at: Utc::now(), supervisor, telemetry, dry_run }
    }

    pub fn report(&self) -> HealthResponse {
        let status = if self.supervisor.all_enabled_running() { HealthStatus::Healthy } else { HealthStatus::Degraded };
        HealthResponse {
            status,
            timestamp: Utc::now(),
            uptime_seconds: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
            supervisor: self.supervisor.state(),
            dry_run: self.dry_run,
            exchanges: self.supervisor.statuses(),
        }
    }
}

/// Build the router with all middleware applied.
pub fn router(state: Arc<HealthState>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/readyz", get(readiness_handler))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CatchPanicLayer::new())
}

async fn health_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    state.telemetry.info("Health check requested");
    state.telemetry.heartbeat();
    (StatusCode::OK, Json(state.report()))
}

async fn readiness_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let ready = state.supervisor.state() == SupervisorState::Running && state.supervisor.all_enabled_running();
    if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE }
}

/// Axum server with a graceful-shutdown handle.
pub struct HealthServer {
    state: Arc<HealthState>,
    request_timeout: Duration,
    shutdown_tx: watch::Sender<bool>,
    stopped_tx: watch::Sender<bool>,
    serving: AtomicBool,
}

impl HealthServer {
    pub fn new(state: Arc<HealthState>, request_timeout: Duration) -> Self {
        Self {
            state,
            request_timeout,
            shutdown_tx: watch::channel(false).0,
            stopped_tx: watch::channel(false).0,
            serving: AtomicBool::new(false),
        }
    }

    /// Serve on an already-bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), DeltaError> {
        self.serving.store(true, Ordering::SeqCst);
        let app = router(self.state.clone(), self.request_timeout);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
            })
            .await
            .map_err(|e| DeltaError::Http(format!("server error: {e}")));

        self.stopped_tx.send_replace(true);
        result
    }
}

#[async_trait]
impl HttpSurface for HealthServer {
    async fn start(&self, port: u16) -> Result<(), DeltaError> {
        info!("Starting health server on port {port}");
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| DeltaError::Http(format!("failed to bind port {port}: {e}")))?;
        self.serve(listener).await
    }

    async fn shutdown(&self, deadline: Deadline) -> Result<(), DeltaError> {
        info!("Shutting down health server");
        self.shutdown_tx.send_replace(true);
        if !self.serving.load(Ordering::SeqCst) {
            return Ok(());
        }

        let mut stopped_rx = self.stopped_tx.subscribe();
        match deadline.run(stopped_rx.wait_for(|stopped| *stopped)).await {
            Ok(_) => Ok(()),
            Err(_) => Err(DeltaError::Http("in-flight requests did not drain before the deadline".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use delta_core::ExchangeConfig;
    use delta_core::telemetry::MemoryTelemetry;
    use tower::ServiceExt;

    use super::*;

    fn state(telemetry: Arc<MemoryTelemetry>) -> Arc<HealthState> {
        let configs = vec![
            ExchangeConfig::new("binance", "bn"),
            ExchangeConfig::new("kraken", "kr").with_enabled(false),
        ];
        let sup = Arc::new(LifecycleSupervisor::from_configs(&configs, telemetry.clone()).unwrap());
        Arc::new(HealthState::new(sup, telemetry, true))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn health_reports_exchanges_and_sends_heartbeat() {
        let telemetry = Arc::new(MemoryTelemetry::new());
        let st = state(telemetry.clone());

        let (code, body) = get_json(router(st.clone(), Duration::from_secs(5)), "/health").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["supervisor"], "idle");
        assert_eq!(body["dry_run"], true);
        assert_eq!(body["exchanges"][0]["name"], "bn");
        assert_eq!(body["exchanges"][0]["type"], "binance");
        assert_eq!(body["exchanges"][0]["running"], false);
        assert_eq!(body["exchanges"][1]["enabled"], false);
        assert_eq!(telemetry.count("HeartbeatEvent"), 1);

        st.supervisor.start_all(Deadline::after(Duration::from_secs(5))).await.unwrap();
        let (_, body) = get_json(router(st.clone(), Duration::from_secs(5)), "/health").await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["exchanges"][0]["running"], true);
        assert_eq!(body["exchanges"][1]["running"], false);
    }

    #[tokio::test]
    async fn readiness_follows_supervisor() {
        let st = state(Arc::new(MemoryTelemetry::new()));
        let (code, _) = get_json(router(st.clone(), Duration::from_secs(5)), "/readyz").await;
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);

        st.supervisor.start_all(Deadline::after(Duration::from_secs(5))).await.unwrap();
        let (code, _) = get_json(router(st.clone(), Duration::from_secs(5)), "/readyz").await;
        assert_eq!(code, StatusCode::OK);
    }

    #[tokio::test]
    async fn serve_exits_on_shutdown() {
        let server = Arc::new(HealthServer::new(state(Arc::new(MemoryTelemetry::new())), Duration::from_secs(5)));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let task = {
            let server = server.clone();
            tokio::spawn(async move { server.serve(listener).await })
        };
        tokio::task::yield_now().await;

        server.shutdown(Deadline::after(Duration::from_secs(5))).await.unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn shutdown_before_start_is_ok() {
        let server = HealthServer::new(state(Arc::new(MemoryTelemetry::new())), Duration::from_secs(5));
        server.shutdown(Deadline::after(Duration::from_millis(10))).await.unwrap();
    }

    #[tokio::test]
    async fn start_fails_when_port_taken() {
        let taken = TcpListener::bind("0.0.0.0:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let server = HealthServer::new(state(Arc::new(MemoryTelemetry::new())), Duration::from_secs(5));
        let err = server.start(port).await.unwrap_err();
        assert!(matches!(err, DeltaError::Http(ref m) if m.contains("bind")));
    }
}
