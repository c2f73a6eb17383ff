use std::sync::Arc;

use stream_engine::{EngineMetrics, EventSender};
use types::ids::Symbol;

#[derive(Clone)]
pub struct AppState {
    pub events: EventSender,
    pub metrics: Arc<EngineMetrics>,
    pub default_symbol: Symbol, // Ticker for updates posted without a symbol
}

impl AppState {
    pub fn new(events: EventSender, metrics: Arc<EngineMetrics>, default_symbol: Symbol) -> Self {
        Self {
            events,
            metrics,
            default_symbol,
        }
    }
}
