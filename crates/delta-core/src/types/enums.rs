//! Enumerations used throughout the delta system.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnsupportedExchange;

// ---------------------------------------------------------------------------
// Exchange identifiers
// ---------------------------------------------------------------------------

/// Supported trading venues.
///
/// Config files carry the venue as a free-form tag; it is parsed into this
/// enum at backend construction so an unknown tag surfaces as
/// [`UnsupportedExchange`] with the offending tag attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeType {
    Binance,
    Coinbase,
    Kucoin,
    Kraken,
}

impl ExchangeType {
    /// Every supported venue, in declaration order.
    pub const ALL: [ExchangeType; 4] = [Self::Binance, Self::Coinbase, Self::Kucoin, Self::Kraken];

    /// Lowercase tag used in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Coinbase => "coinbase",
            Self::Kucoin => "kucoin",
            Self::Kraken => "kraken",
        }
    }

    /// Prefix for credential environment variables (`BINANCE_API_KEY`, ...).
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Self::Binance => "BINANCE",
            Self::Coinbase => "COINBASE",
            Self::Kucoin => "KUCOIN",
            Self::Kraken => "KRAKEN",
        }
    }
}

impl std::fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeType {
    type Err = UnsupportedExchange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Ok(Self::Binance),
            "coinbase" => Ok(Self::Coinbase),
            "kucoin" => Ok(Self::Kucoin),
            "kraken" => Ok(Self::Kraken),
            _ => Err(UnsupportedExchange { tag: s.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_tags() {
        for ty in ExchangeType::ALL {
            assert_eq!(ty.as_str().parse::<ExchangeType>().unwrap(), ty);
        }
        assert_eq!(" KuCoin ".parse::<ExchangeType>().unwrap(), ExchangeType::Kucoin);
    }

    #[test]
    fn parse_unknown_tag_keeps_tag() {
        match "bitmex".parse::<ExchangeType>() {
            Err(UnsupportedExchange { tag }) => assert_eq!(tag, "bitmex"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
