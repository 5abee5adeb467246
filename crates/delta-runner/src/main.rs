//! # delta-runner
//!
//! Main entry point for the delta exchange supervisor.
//!
//! Loads configuration (optional JSON file, `.env`, environment), builds one
//! backend per configured exchange, serves the health endpoint, and manages
//! startup and bounded graceful shutdown.
//!
//! # Usage
//!
//! ```bash
//! delta-runner config.json --log-level info
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use delta_core::telemetry::{Telemetry, TracingTelemetry};
use delta_exchange::LifecycleSupervisor;
use delta_runner::http::{HealthServer, HealthState};
use delta_runner::process::{ProcessSupervisor, termination_signal};
use tracing::info;

/// Delta exchange supervisor.
#[derive(Parser)]
#[command(name = "delta-runner", about = "Delta exchange lifecycle supervisor")]
struct Cli {
    /// Configuration file path (JSON). Environment variables override it.
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides `LOG_LEVEL`.
    #[arg(short, long)]
    log_level: Option<String>,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,

    /// Emit console logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Health server port. Overrides `PORT`.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // 1. Load configuration
    let (mut config, dotenv) = delta_core::config::load_config(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    // 2. Initialize logging
    let log_level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let log_dir = cli.log_dir.as_deref().or(config.logging.log_dir.as_deref());
    delta_core::logging::init_logging(log_level, log_dir, "delta-runner", cli.json_logs || config.logging.json);
    dotenv.log();

    info!(
        "delta-runner starting - port={}, dry_run={}, min_profit_threshold={}, max_trade_amount={}",
        config.server.port,
        config.trading.dry_run,
        config.trading.min_profit_threshold,
        config.trading.max_trade_amount,
    );

    // 3. Telemetry
    let telemetry: Arc<dyn Telemetry> = Arc::new(TracingTelemetry::from_config(&config.telemetry)?);
    telemetry.info("Delta Bot starting up");

    // 4. Build exchange backends
    let lifecycle = Arc::new(LifecycleSupervisor::from_configs(&config.exchanges, telemetry.clone())?);
    info!(
        "{} exchange(s) configured, {} enabled",
        lifecycle.len(),
        config.enabled_exchanges().count()
    );

    // 5. Run until signal
    let state = Arc::new(HealthState::new(lifecycle.clone(), telemetry.clone(), config.trading.dry_run));
    let server = Arc::new(HealthServer::new(state, config.server.request_timeout()));
    let status = ProcessSupervisor::new(server, lifecycle, telemetry.clone(), config.server.port)
        .with_startup_timeout(config.server.startup_timeout())
        .with_shutdown_timeout(config.server.shutdown_timeout())
        .run(termination_signal())
        .await;

    telemetry.shutdown().await;
    Ok(status.into())
}
