//! Exchange registry: factory for creating backends from config.

use std::sync::Arc;

use delta_core::{ExchangeConfig, ExchangeType, telemetry::Telemetry};

use crate::Exchange;
use crate::backend::VenueBackend;
use crate::error::LifecycleError;

/// Create an [`Exchange`] based on the `type` tag in the config.
///
/// Every venue shares [`VenueBackend`]; the venue module's `profile()`
/// supplies what differs. Either a fully built backend or an error is
/// returned, never both.
pub fn create_exchange(
    config: &ExchangeConfig,
    telemetry: Arc<dyn Telemetry>,
) -> Result<Arc<dyn Exchange>, LifecycleError> {
    let exchange_type = config.exchange_type()?;

    let profile = match exchange_type {
        ExchangeType::Binance => crate::binance::profile(config),
        ExchangeType::Coinbase => crate::coinbase::profile(config),
        ExchangeType::Kucoin => crate::kucoin::profile(config),
        ExchangeType::Kraken => crate::kraken::profile(config),
    };

    Ok(Arc::new(VenueBackend::new(config.clone(), exchange_type, profile, telemetry)))
}

#[cfg(test)]
mod tests {
    use delta_core::telemetry::MemoryTelemetry;

    use super::*;

    #[test]
    fn creates_every_supported_venue() {
        let telemetry: Arc<dyn Telemetry> = Arc::new(MemoryTelemetry::new());
        for ty in ExchangeType::ALL {
            let name = format!("{ty} display");
            let cfg = ExchangeConfig::new(ty.as_str(), name.clone());
            let ex = create_exchange(&cfg, telemetry.clone()).unwrap();
            assert_eq!(ex.name(), name);
            assert_eq!(ex.exchange_type(), ty);
            assert!(!ex.is_running());
        }
    }

    #[test]
    fn unknown_tag_is_rejected_with_tag() {
        let cfg = ExchangeConfig::new("mtgox", "old");
        match create_exchange(&cfg, Arc::new(MemoryTelemetry::new())) {
            Err(LifecycleError::UnsupportedExchange(e)) => assert_eq!(e.tag, "mtgox"),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(ex) => panic!("unexpected backend {}", ex.name()),
        }
    }

    #[test]
    fn tag_matching_is_case_insensitive() {
        let cfg = ExchangeConfig::new("Coinbase", "cb");
        let ex = create_exchange(&cfg, Arc::new(MemoryTelemetry::new())).unwrap();
        assert_eq!(ex.exchange_type(), ExchangeType::Coinbase);
    }
}
