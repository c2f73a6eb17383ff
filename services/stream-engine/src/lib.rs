//! Stream Engine
//!
//! Consumes live price events and emits, once per tumbling window, a
//! per-symbol count and average of the qualifying prices seen in that window.
//!
//! # Architecture
//!
//! ```text
//!   Producers (gateway handlers)
//!        │  EventSender (cloneable)
//!    ┌───▼────┐
//!    │Channel │  ← unbounded, or bounded with waiting send
//!    └───┬────┘
//!        │
//!    ┌───▼────┐
//!    │Engine  │  ← select! over shutdown / window timer / next event
//!    └───┬────┘
//!        │  WindowResult (fire-and-forget)
//!    ┌───▼─────────┐
//!    │Distributor  │  ← own task, failure isolation per subscriber
//!    └───┬─────────┘
//!   ┌────┴─────┐
//! ┌─▼──┐    ┌──▼─┐
//! │Sub │    │Sub │
//! └────┘    └────┘
//! ```

pub mod channel;
pub mod config;
pub mod distributor;
pub mod engine;
pub mod metrics;
pub mod pipeline;
pub mod window;

pub use channel::{event_channel, ChannelCapacity, ChannelClosed, EventReceiver, EventSender};
pub use config::{ConfigError, EngineConfig};
pub use distributor::{DistributorHandle, ResultDistributor, Subscriber, SubscriberError};
pub use engine::{AggregationEngine, EngineReport, StopReason};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use pipeline::Pipeline;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
