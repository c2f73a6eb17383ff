//! Error types for event validation
//!
//! Validation happens at the ingestion boundary so that malformed input
//! never reaches the aggregation core.

use thiserror::Error;

/// Reasons a price update cannot become a `StockEvent`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventError {
    #[error("symbol must not be empty")]
    EmptySymbol,

    #[error("price must be a finite number, got {0}")]
    NonFinitePrice(f64),

    #[error("invalid price: {0:?}")]
    InvalidPrice(String),
}
