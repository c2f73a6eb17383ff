//! Identifier types for the aggregation pipeline
//!
//! Event IDs use UUID v7 so that log lines for the same event can be
//! correlated and sorted chronologically.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::EventError;

/// Unique identifier for an ingested price event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Create a new EventId with current timestamp
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ticker symbol (e.g., "GOOG", "AAPL")
///
/// Also serves as the window grouping key. Surrounding whitespace is
/// stripped; an empty symbol is never constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Create a new Symbol
    ///
    /// # Panics
    /// Panics if the symbol is empty after trimming
    pub fn new(symbol: impl Into<String>) -> Self {
        match Self::try_new(symbol) {
            Ok(symbol) => symbol,
            Err(_) => panic!("Symbol must not be empty"),
        }
    }

    /// Try to create a Symbol, rejecting empty input
    pub fn try_new(symbol: impl Into<String>) -> Result<Self, EventError> {
        let s = symbol.into();
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EventError::EmptySymbol);
        }
        if trimmed.len() == s.len() {
            Ok(Self(s))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    /// Get the symbol string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Symbol {
    type Error = EventError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_new(s)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
