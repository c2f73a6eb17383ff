//! Engine configuration
//!
//! All values are fixed for the lifetime of an engine instance; there is no
//! runtime reconfiguration of window size or filter.

use std::time::Duration;

use types::event::StockEvent;
use types::ids::Symbol;

use crate::channel::ChannelCapacity;

/// Default tumbling window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(3000);

/// Prices must be strictly above this to be aggregated.
pub const DEFAULT_PRICE_THRESHOLD: f64 = 1000.0;

/// Extracts the grouping key from an event.
pub type KeyExtractor = fn(&StockEvent) -> &Symbol;

/// Groups events by their ticker symbol.
pub fn symbol_key(event: &StockEvent) -> &Symbol {
    event.symbol()
}

/// Errors raised when an `EngineConfig` is unusable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("window duration must be non-zero")]
    ZeroWindow,

    #[error("price threshold must be finite, got {0}")]
    NonFiniteThreshold(f64),

    #[error("bounded channel capacity must be at least 1")]
    ZeroCapacity,
}

/// Configuration for the windowed aggregation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Length of each tumbling window.
    pub window: Duration,
    /// Qualifying predicate is `price > price_threshold`.
    pub price_threshold: f64,
    /// Grouping key extractor.
    pub key: KeyExtractor,
    /// Capacity policy of the event channel feeding the engine.
    pub channel_capacity: ChannelCapacity,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            price_threshold: DEFAULT_PRICE_THRESHOLD,
            key: symbol_key,
            channel_capacity: ChannelCapacity::Unbounded,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.is_zero() {
            return Err(ConfigError::ZeroWindow);
        }
        if !self.price_threshold.is_finite() {
            return Err(ConfigError::NonFiniteThreshold(self.price_threshold));
        }
        if self.channel_capacity == ChannelCapacity::Bounded(0) {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }

    /// Whether a price passes the filter. Non-finite prices never qualify.
    pub fn is_qualifying(&self, price: f64) -> bool {
        price.is_finite() && price > self.price_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.window, Duration::from_millis(3000));
        assert_eq!(config.price_threshold, 1000.0);
        assert_eq!(config.channel_capacity, ChannelCapacity::Unbounded);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_threshold_is_strict() {
        let config = EngineConfig::default();
        assert!(!config.is_qualifying(1000.0));
        assert!(config.is_qualifying(1000.01));
        assert!(!config.is_qualifying(-5.0));
        assert!(!config.is_qualifying(f64::NAN));
        assert!(!config.is_qualifying(f64::INFINITY));
    }

    #[test]
    fn test_default_key_is_symbol() {
        let config = EngineConfig::default();
        let event = StockEvent::new(Symbol::new("GOOG"), 1500.0).unwrap();
        assert_eq!((config.key)(&event).as_str(), "GOOG");
    }

    #[test]
    fn test_validation_errors() {
        let config = EngineConfig {
            window: Duration::ZERO,
            ..EngineConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroWindow));

        let config = EngineConfig {
            price_threshold: f64::NAN,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonFiniteThreshold(_))
        ));

        let config = EngineConfig {
            channel_capacity: ChannelCapacity::Bounded(0),
            ..EngineConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroCapacity));
    }
}
