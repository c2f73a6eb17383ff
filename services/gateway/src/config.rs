//! Gateway configuration from the environment
//!
//! Read once at startup. Missing or unparsable values fall back to their
//! defaults with a warning.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use stream_engine::config::{DEFAULT_PRICE_THRESHOLD, DEFAULT_WINDOW};
use stream_engine::{ChannelCapacity, EngineConfig};
use types::ids::Symbol;

/// Ticker used when a price update names no symbol.
pub const DEFAULT_SYMBOL: &str = "GOOG";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub http_port: u16,
    pub default_symbol: Symbol,
    pub engine: EngineConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            default_symbol: Symbol::new(DEFAULT_SYMBOL),
            engine: EngineConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let http_port = parse_or(&lookup, "HTTP_PORT", 8080u16);

        let default_symbol = lookup("DEFAULT_SYMBOL")
            .and_then(|raw| match Symbol::try_new(raw.as_str()) {
                Ok(symbol) => Some(symbol),
                Err(e) => {
                    tracing::warn!(value = %raw, error = %e, "Invalid DEFAULT_SYMBOL, using default");
                    None
                }
            })
            .unwrap_or_else(|| Symbol::new(DEFAULT_SYMBOL));

        let window_ms = match parse_or(&lookup, "WINDOW_MS", DEFAULT_WINDOW.as_millis() as u64) {
            0 => {
                tracing::warn!("WINDOW_MS must be non-zero, using default");
                DEFAULT_WINDOW.as_millis() as u64
            }
            ms => ms,
        };

        let price_threshold = parse_or(&lookup, "PRICE_THRESHOLD", DEFAULT_PRICE_THRESHOLD);
        let price_threshold = if price_threshold.is_finite() {
            price_threshold
        } else {
            tracing::warn!("PRICE_THRESHOLD must be finite, using default");
            DEFAULT_PRICE_THRESHOLD
        };

        let channel_capacity = match parse_or(&lookup, "CHANNEL_CAPACITY", 0usize) {
            0 => ChannelCapacity::Unbounded,
            n => ChannelCapacity::Bounded(n),
        };

        Self {
            http_port,
            default_symbol,
            engine: EngineConfig {
                window: Duration::from_millis(window_ms),
                price_threshold,
                channel_capacity,
                ..EngineConfig::default()
            },
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.http_port))
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Unparsable setting, using default");
            default
        }),
        None => default,
    }
}
