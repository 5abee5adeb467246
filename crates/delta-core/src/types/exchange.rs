//! Per-exchange configuration.

use serde::Deserialize;

use super::enums::ExchangeType;
use crate::error::UnsupportedExchange;

/// API credential pair for one venue.
///
/// Never printed: `Debug` redacts both halves so a config dump in a log line
/// cannot leak keys.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), secret: secret.into() }
    }

    /// `true` when both key and secret are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.api_key.is_empty() && !self.secret.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |s: &str| if s.is_empty() { "<empty>" } else { "<redacted>" };
        f.debug_struct("Credentials")
            .field("api_key", &redact(&self.api_key))
            .field("secret", &redact(&self.secret))
            .finish()
    }
}

/// A single exchange entry from the `exchanges` array.
///
/// ```json
/// { "type": "binance", "name": "binance-main", "api_key": "...",
///   "secret": "...", "sandbox": false, "enabled": true }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// Venue tag (`"binance"`, `"coinbase"`, `"kucoin"`, `"kraken"`).
    ///
    /// Kept as the raw string so the registry can report an unsupported tag
    /// verbatim.
    #[serde(rename = "type")]
    pub exchange: String,

    /// Display name, unique within one process.
    pub name: String,

    #[serde(flatten)]
    pub credentials: Credentials,

    /// Use the venue's sandbox/testnet endpoints.
    #[serde(default)]
    pub sandbox: bool,

    /// Disabled entries are constructed but never started.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ExchangeConfig {
    pub fn new(exchange: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            name: name.into(),
            credentials: Credentials::default(),
            sandbox: false,
            enabled: true,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Parse the venue tag.
    pub fn exchange_type(&self) -> Result<ExchangeType, UnsupportedExchange> {
        self.exchange.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_with_defaults() {
        let cfg: ExchangeConfig =
            serde_json::from_str(r#"{"type":"coinbase","name":"cb","api_key":"k","secret":"s"}"#).unwrap();
        assert_eq!(cfg.exchange_type().unwrap(), ExchangeType::Coinbase);
        assert!(cfg.enabled);
        assert!(!cfg.sandbox);
        assert!(cfg.credentials.is_complete());
    }

    #[test]
    fn debug_redacts_credentials() {
        let cfg = ExchangeConfig::new("binance", "bn").with_credentials(Credentials::new("AKIA123", "s3cr3t"));
        let dump = format!("{cfg:?}");
        assert!(!dump.contains("AKIA123"));
        assert!(!dump.contains("s3cr3t"));
        assert!(dump.contains("<redacted>"));
    }
}
