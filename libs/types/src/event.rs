//! Inbound price events
//!
//! A `StockEvent` is created once at the ingestion boundary and consumed
//! exactly once by the aggregation engine. Fields are private so an event
//! cannot be altered after construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::EventError;
use crate::ids::{EventId, Symbol};

/// A single price observation for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockEvent {
    event_id: EventId,
    symbol: Symbol,
    price: f64,
    /// Wall-clock time the gateway accepted the update. Informational only;
    /// window assignment uses the time the engine observes the event.
    received_at: DateTime<Utc>,
}

impl StockEvent {
    /// Create an event, rejecting non-finite prices.
    pub fn new(symbol: Symbol, price: f64) -> Result<Self, EventError> {
        if !price.is_finite() {
            return Err(EventError::NonFinitePrice(price));
        }
        Ok(Self {
            event_id: EventId::new(),
            symbol,
            price,
            received_at: Utc::now(),
        })
    }

    /// Build an event from a raw symbol and a textual decimal price body.
    pub fn parse(symbol: &str, body: &str) -> Result<Self, EventError> {
        let symbol = Symbol::try_new(symbol)?;
        let text = body.trim();
        let price: f64 = text
            .parse()
            .map_err(|_| EventError::InvalidPrice(text.to_string()))?;
        Self::new(symbol, price)
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}
