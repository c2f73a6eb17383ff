//! Types library for the price aggregation service
//!
//! Shared data model used by the stream engine and the ingestion gateway.
//!
//! # Modules
//! - `ids`: Identifiers (EventId, Symbol)
//! - `event`: Inbound price events
//! - `window`: Per-window aggregation results
//! - `errors`: Validation error taxonomy

pub mod errors;
pub mod event;
pub mod ids;
pub mod window;
