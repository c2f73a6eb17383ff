use serde::{Deserialize, Serialize};
use types::ids::{EventId, Symbol};

/// Acknowledgement for an enqueued price update. Aggregation happens later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceAccepted {
    pub event_id: EventId,
    pub symbol: Symbol,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
