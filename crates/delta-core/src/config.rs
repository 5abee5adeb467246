//! Configuration loading for the delta process.
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. Built-in defaults.
//! 2. An optional JSON config file.
//! 3. Environment variables (a `.env` file in the working directory is loaded
//!    first, if present).
//!
//! # Example config
//!
//! ```json
//! {
//!   "server": { "port": 8080, "shutdown_timeout_secs": 30 },
//!   "trading": { "dry_run": true, "min_profit_threshold": 0.5, "max_trade_amount": 1000 },
//!   "exchanges": [
//!     { "type": "binance", "name": "binance-main", "sandbox": true },
//!     { "type": "kraken", "name": "kraken-main", "enabled": false }
//!   ]
//! }
//! ```
//!
//! # Environment variables
//!
//! | Variable                          | Field                              |
//! |-----------------------------------|------------------------------------|
//! | `PORT`                            | `server.port`                      |
//! | `SHUTDOWN_TIMEOUT_SECS`           | `server.shutdown_timeout_secs`     |
//! | `LOG_LEVEL`                       | `logging.level`                    |
//! | `NEW_RELIC_LICENSE_KEY`           | `telemetry.license_key`            |
//! | `NEW_RELIC_APP_NAME`              | `telemetry.app_name`               |
//! | `NEW_RELIC_ACCOUNT_ID`            | `telemetry.account_id`             |
//! | `DRY_RUN`                         | `trading.dry_run`                  |
//! | `MIN_PROFIT_THRESHOLD`            | `trading.min_profit_threshold`     |
//! | `MAX_TRADE_AMOUNT`                | `trading.max_trade_amount`         |
//! | `<VENUE>_API_KEY` / `_SECRET_KEY` | credentials of entries left empty  |
//!
//! Empty environment values are treated as unset.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::DeltaError;
use crate::types::ExchangeConfig;

/// Top-level application config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub telemetry: TelemetryConfig,
    pub trading: TradingConfig,
    /// One entry per exchange backend, in startup order.
    pub exchanges: Vec<ExchangeConfig>,
}

/// HTTP surface and shutdown settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Shared deadline for the whole graceful shutdown.
    pub shutdown_timeout_secs: u64,
    /// Deadline for each exchange start.
    pub startup_timeout_secs: u64,
    /// Per-request timeout on the health surface.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080, shutdown_timeout_secs: 30, startup_timeout_secs: 30, request_timeout_secs: 30 }
    }
}

impl ServerConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: Option<String>,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into(), log_dir: None, json: false }
    }
}

/// External event export. Export is active only when both the license key
/// and the account id are set.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub license_key: String,
    pub account_id: String,
    pub app_name: String,
    /// Override for the events endpoint (tests, EU region).
    pub events_url: Option<String>,
    pub flush_interval_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            license_key: String::new(),
            account_id: String::new(),
            app_name: "delta-bot".into(),
            events_url: None,
            flush_interval_secs: 5,
        }
    }
}

impl std::fmt::Debug for TelemetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryConfig")
            .field("license_key", &if self.license_key.is_empty() { "<empty>" } else { "<redacted>" })
            .field("account_id", &self.account_id)
            .field("app_name", &self.app_name)
            .field("events_url", &self.events_url)
            .field("flush_interval_secs", &self.flush_interval_secs)
            .finish()
    }
}

impl TelemetryConfig {
    pub fn export_enabled(&self) -> bool {
        !self.license_key.is_empty() && !self.account_id.is_empty()
    }

    /// Events API endpoint for this account.
    pub fn effective_events_url(&self) -> String {
        self.events_url.clone().unwrap_or_else(|| {
            format!("https://insights-collector.newrelic.com/v1/accounts/{}/events", self.account_id)
        })
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs.max(1))
    }
}

/// Strategy parameters. Loaded and reported but not interpreted by any
/// backend yet.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub dry_run: bool,
    pub min_profit_threshold: f64,
    pub max_trade_amount: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self { dry_run: true, min_profit_threshold: 0.5, max_trade_amount: 1000.0 }
    }
}

impl AppConfig {
    /// Parse a JSON document.
    pub fn from_json(content: &str) -> Result<Self, DeltaError> {
        serde_json::from_str(content).map_err(|e| DeltaError::Config(format!("invalid JSON config: {e}")))
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// `lookup` abstracts `std::env::var` so tests can feed a fixed map.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), DeltaError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("PORT") {
            self.server.port = parse_env("PORT", &v)?;
        }
        if let Some(v) = get("SHUTDOWN_TIMEOUT_SECS") {
            self.server.shutdown_timeout_secs = parse_env("SHUTDOWN_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.logging.level = v.to_lowercase();
        }
        if let Some(v) = get("NEW_RELIC_LICENSE_KEY") {
            self.telemetry.license_key = v;
        }
        if let Some(v) = get("NEW_RELIC_APP_NAME") {
            self.telemetry.app_name = v;
        }
        if let Some(v) = get("NEW_RELIC_ACCOUNT_ID") {
            self.telemetry.account_id = v;
        }
        if let Some(v) = get("DRY_RUN") {
            self.trading.dry_run = parse_bool("DRY_RUN", &v)?;
        }
        if let Some(v) = get("MIN_PROFIT_THRESHOLD") {
            self.trading.min_profit_threshold = parse_env("MIN_PROFIT_THRESHOLD", &v)?;
        }
        if let Some(v) = get("MAX_TRADE_AMOUNT") {
            self.trading.max_trade_amount = parse_env("MAX_TRADE_AMOUNT", &v)?;
        }

        for exchange in &mut self.exchanges {
            // Unknown tags are reported by `validate`.
            let Ok(ty) = exchange.exchange_type() else { continue };
            let prefix = ty.env_prefix();
            if exchange.credentials.api_key.is_empty() {
                if let Some(v) = get(&format!("{prefix}_API_KEY")) {
                    exchange.credentials.api_key = v;
                }
            }
            if exchange.credentials.secret.is_empty() {
                if let Some(v) = get(&format!("{prefix}_SECRET_KEY")) {
                    exchange.credentials.secret = v;
                }
            }
        }

        Ok(())
    }

    /// Reject configurations that must not start: unknown venue tags,
    /// empty or duplicate display names, and a zero shutdown window.
    pub fn validate(&self) -> Result<(), DeltaError> {
        if self.server.shutdown_timeout_secs == 0 {
            return Err(DeltaError::Config("server.shutdown_timeout_secs must be > 0".into()));
        }

        let mut names = HashSet::new();
        for (idx, exchange) in self.exchanges.iter().enumerate() {
            exchange.exchange_type()?;
            if exchange.name.trim().is_empty() {
                return Err(DeltaError::Config(format!("exchanges[{idx}]: name must not be empty")));
            }
            if !names.insert(exchange.name.as_str()) {
                return Err(DeltaError::Config(format!("exchanges[{idx}]: duplicate name '{}'", exchange.name)));
            }
        }
        Ok(())
    }

    pub fn enabled_exchanges(&self) -> impl Iterator<Item = &ExchangeConfig> {
        self.exchanges.iter().filter(|e| e.enabled)
    }
}

/// Outcome of loading the `.env` file.
///
/// Config is loaded before the subscriber exists, so the caller logs this
/// once logging is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DotenvStatus {
    Loaded(PathBuf),
    Missing,
    Invalid(String),
}

impl DotenvStatus {
    fn from_result(result: Result<PathBuf, dotenvy::Error>) -> Self {
        match result {
            Ok(path) => Self::Loaded(path),
            Err(e) if e.not_found() => Self::Missing,
            Err(e) => Self::Invalid(e.to_string()),
        }
    }

    pub fn log(&self) {
        match self {
            Self::Loaded(path) => info!("loaded environment from {}", path.display()),
            Self::Missing => info!("no .env file found, using process environment"),
            Self::Invalid(e) => warn!(".env file could not be loaded: {e}"),
        }
    }
}

/// Load configuration: `.env`, then the optional JSON file, then the process
/// environment. The result is validated.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<(AppConfig, DotenvStatus)> {
    let dotenv = DotenvStatus::from_result(dotenvy::dotenv());

    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p)
                .map_err(|e| DeltaError::Config(format!("cannot read {}: {e}", p.display())))?;
            AppConfig::from_json(&content)?
        }
        None => AppConfig::default(),
    };

    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok((config, dotenv))
}

fn parse_env<T>(key: &str, value: &str) -> Result<T, DeltaError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| DeltaError::Config(format!("failed to parse {key}={value:?}: {e}")))
}

/// Accepts the usual spellings: `1/0`, `t/f`, `true/false`, `yes/no`, `on/off`.
fn parse_bool(key: &str, value: &str) -> Result<bool, DeltaError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Ok(true),
        "0" | "f" | "false" | "no" | "off" => Ok(false),
        _ => Err(DeltaError::Config(format!("failed to parse {key}={value:?}: expected a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_file_or_env() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[])).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.telemetry.app_name, "delta-bot");
        assert!(cfg.trading.dry_run);
        assert_eq!(cfg.trading.min_profit_threshold, 0.5);
        assert_eq!(cfg.trading.max_trade_amount, 1000.0);
        assert!(!cfg.telemetry.export_enabled());
        assert!(cfg.exchanges.is_empty());
    }

    #[test]
    fn env_overrides_file() {
        let mut cfg = AppConfig::from_json(r#"{"server":{"port":9000},"trading":{"dry_run":true}}"#).unwrap();
        cfg.apply_env(env(&[("PORT", "9100"), ("DRY_RUN", "false"), ("LOG_LEVEL", "DEBUG"), ("MAX_TRADE_AMOUNT", "")]))
            .unwrap();
        assert_eq!(cfg.server.port, 9100);
        assert!(!cfg.trading.dry_run);
        assert_eq!(cfg.logging.level, "debug");
        // empty value is ignored
        assert_eq!(cfg.trading.max_trade_amount, 1000.0);
    }

    #[test]
    fn bad_env_value_is_config_error() {
        let mut cfg = AppConfig::default();
        let err = cfg.apply_env(env(&[("DRY_RUN", "maybe")])).unwrap_err();
        assert!(matches!(err, DeltaError::Config(ref m) if m.contains("DRY_RUN")));

        let err = cfg.apply_env(env(&[("MIN_PROFIT_THRESHOLD", "lots")])).unwrap_err();
        assert!(matches!(err, DeltaError::Config(_)));
    }

    #[test]
    fn credentials_filled_from_env_only_when_empty() {
        let mut cfg = AppConfig::from_json(
            r#"{"exchanges":[
                {"type":"binance","name":"bn"},
                {"type":"kraken","name":"kr","api_key":"file-key","secret":"file-secret"}
            ]}"#,
        )
        .unwrap();
        cfg.apply_env(env(&[
            ("BINANCE_API_KEY", "env-key"),
            ("BINANCE_SECRET_KEY", "env-secret"),
            ("KRAKEN_API_KEY", "ignored"),
        ]))
        .unwrap();
        assert_eq!(cfg.exchanges[0].credentials.api_key, "env-key");
        assert_eq!(cfg.exchanges[0].credentials.secret, "env-secret");
        assert_eq!(cfg.exchanges[1].credentials.api_key, "file-key");
    }

    #[test]
    fn validate_rejects_unknown_tag_and_duplicates() {
        let cfg = AppConfig::from_json(r#"{"exchanges":[{"type":"ftx","name":"gone"}]}"#).unwrap();
        assert!(matches!(cfg.validate(), Err(DeltaError::UnsupportedExchange(ref e)) if e.tag == "ftx"));

        let cfg = AppConfig::from_json(
            r#"{"exchanges":[{"type":"binance","name":"a"},{"type":"coinbase","name":"a"}]}"#,
        )
        .unwrap();
        assert!(matches!(cfg.validate(), Err(DeltaError::Config(_))));
    }

    #[test]
    fn telemetry_export_requires_key_and_account() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[("NEW_RELIC_LICENSE_KEY", "abc")])).unwrap();
        assert!(!cfg.telemetry.export_enabled());
        cfg.apply_env(env(&[("NEW_RELIC_ACCOUNT_ID", "42")])).unwrap();
        assert!(cfg.telemetry.export_enabled());
        assert_eq!(
            cfg.telemetry.effective_events_url(),
            "https://insights-collector.newrelic.com/v1/accounts/42/events"
        );
        assert!(!format!("{:?}", cfg.telemetry).contains("abc"));
    }

    #[test]
    fn dotenv_outcome_is_kept_for_later_logging() {
        let loaded = DotenvStatus::from_result(Ok(PathBuf::from("/srv/delta/.env")));
        assert_eq!(loaded, DotenvStatus::Loaded(PathBuf::from("/srv/delta/.env")));

        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        assert_eq!(DotenvStatus::from_result(Err(dotenvy::Error::Io(missing))), DotenvStatus::Missing);

        let malformed = DotenvStatus::from_result(Err(dotenvy::Error::LineParse("PORT 80".into(), 4)));
        assert!(matches!(malformed, DotenvStatus::Invalid(ref m) if m.contains("PORT 80")));
    }
}
