//! Aggregation results emitted when a tumbling window closes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::Symbol;

/// Per-symbol summary of one closed window.
///
/// Only produced for keys with at least one qualifying event, so
/// `count >= 1` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    pub symbol: Symbol,
    pub count: u64,
    pub average: f64,
    /// Monotonic window number, starting at 1.
    pub window_id: u64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_json_shape() {
        let now = Utc::now();
        let result = WindowResult {
            symbol: Symbol::new("GOOG"),
            count: 3,
            average: 1200.0,
            window_id: 7,
            window_start: now,
            window_end: now,
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["symbol"], "GOOG");
        assert_eq!(value["count"], 3);
        assert_eq!(value["average"], 1200.0);
        assert_eq!(value["window_id"], 7);
    }
}
