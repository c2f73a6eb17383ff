//! Tumbling window state
//!
//! Holds the per-key accumulators of the currently open window and turns
//! them into `WindowResult`s when the window closes. This type is purely
//! synchronous and does no I/O; the engine decides *when* windows close.
//!
//! Accumulators are created lazily on the first qualifying event for a key
//! and are dropped the moment the window is flushed, so nothing carries
//! over from one window to the next. Keys live in a BTreeMap so results of
//! one window always come out in symbol order.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use types::event::StockEvent;
use types::ids::Symbol;
use types::window::WindowResult;

use crate::config::EngineConfig;

/// Running count and mean for one key within one window.
///
/// The mean is updated incrementally rather than derived from a running sum,
/// so it stays finite for any sequence of finite prices.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowAccumulator {
    count: u64,
    mean: f64,
}

impl WindowAccumulator {
    fn add(&mut self, price: f64) {
        self.count += 1;
        let n = self.count as f64;
        // Both terms are bounded by f64::MAX / n, so the step cannot overflow.
        self.mean += price / n - self.mean / n;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Arithmetic mean, `None` while empty.
    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.mean)
        }
    }
}

/// Lifecycle of the aggregation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowPhase {
    /// No window opened yet, or shut down.
    Idle,
    /// Accepting events into the current window.
    WindowOpen,
    /// Current window is being turned into results.
    Flushing,
}

/// What happened to an observed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Added to its key's accumulator.
    Accumulated,
    /// Failed the price filter and was discarded.
    Filtered,
}

/// Per-window, per-key aggregation state.
pub struct WindowedAggregator {
    config: EngineConfig,
    phase: WindowPhase,
    /// Id of the open window; 0 before the first window opens.
    window_id: u64,
    window_start: Option<DateTime<Utc>>,
    accumulators: BTreeMap<Symbol, WindowAccumulator>,
}

impl WindowedAggregator {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            phase: WindowPhase::Idle,
            window_id: 0,
            window_start: None,
            accumulators: BTreeMap::new(),
        }
    }

    /// Open the first window at `now`. No-op if a window is already open.
    pub fn open(&mut self, now: DateTime<Utc>) {
        if self.phase == WindowPhase::WindowOpen {
            return;
        }
        self.window_id += 1;
        self.window_start = Some(now);
        self.phase = WindowPhase::WindowOpen;
        debug!(window_id = self.window_id, "Window opened");
    }

    /// Apply the filter and, if the event qualifies, fold it into its key's
    /// accumulator. An idle aggregator opens a window first.
    pub fn observe(&mut self, event: &StockEvent) -> Observation {
        if self.phase != WindowPhase::WindowOpen {
            self.open(Utc::now());
        }

        let price = event.price();
        if !self.config.is_qualifying(price) {
            trace!(
                event_id = %event.event_id(),
                price,
                threshold = self.config.price_threshold,
                "Event filtered"
            );
            return Observation::Filtered;
        }

        let key = (self.config.key)(event);
        match self.accumulators.get_mut(key) {
            Some(acc) => acc.add(price),
            None => {
                let mut acc = WindowAccumulator::default();
                acc.add(price);
                self.accumulators.insert(key.clone(), acc);
            }
        }
        Observation::Accumulated
    }

    /// Close the open window at `now` and start the next one at the same
    /// instant.
    ///
    /// Returns one result per key that saw at least one qualifying event,
    /// ordered by key. An empty window yields an empty vector.
    pub fn close(&mut self, now: DateTime<Utc>) -> Vec<WindowResult> {
        if self.phase == WindowPhase::Idle {
            self.open(now);
            return Vec::new();
        }

        self.phase = WindowPhase::Flushing;
        let window_id = self.window_id;
        let window_start = self.window_start.unwrap_or(now);

        let results: Vec<WindowResult> = std::mem::take(&mut self.accumulators)
            .into_iter()
            .filter_map(|(symbol, acc)| {
                acc.average().map(|average| WindowResult {
                    symbol,
                    count: acc.count(),
                    average,
                    window_id,
                    window_start,
                    window_end: now,
                })
            })
            .collect();

        debug!(window_id, results = results.len(), "Window closed");

        self.window_id += 1;
        self.window_start = Some(now);
        self.phase = WindowPhase::WindowOpen;

        results
    }

    /// Drop the open window without emitting anything. Returns how many keys
    /// had accumulated state.
    pub fn discard(&mut self) -> usize {
        let discarded = self.accumulators.len();
        self.accumulators.clear();
        self.window_start = None;
        self.phase = WindowPhase::Idle;
        discarded
    }

    pub fn phase(&self) -> WindowPhase {
        self.phase
    }

    /// Id of the currently open window (0 before the first one).
    pub fn window_id(&self) -> u64 {
        self.window_id
    }

    /// Number of keys with state in the open window.
    pub fn open_keys(&self) -> usize {
        self.accumulators.len()
    }

    /// Accumulator for `symbol` in the open window.
    pub fn accumulator(&self, symbol: &Symbol) -> Option<&WindowAccumulator> {
        self.accumulators.get(symbol)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(symbol: &str, price: f64) -> StockEvent {
        StockEvent::new(Symbol::new(symbol), price).unwrap()
    }

    fn open_aggregator() -> WindowedAggregator {
        let mut agg = WindowedAggregator::new(EngineConfig::default());
        agg.open(Utc::now());
        agg
    }

    #[test]
    fn test_accumulator_average() {
        let mut acc = WindowAccumulator::default();
        assert_eq!(acc.average(), None);

        acc.add(1100.0);
        acc.add(1300.0);
        assert_eq!(acc.count(), 2);
        assert_eq!(acc.average(), Some(1200.0));
    }

    #[test]
    fn test_average_of_huge_prices_stays_finite() {
        let mut agg = open_aggregator();
        agg.observe(&event("GOOG", 1.0e308));
        agg.observe(&event("GOOG", 1.0e308));
        agg.observe(&event("GOOG", f64::MAX));

        let results = agg.close(Utc::now());
        assert_eq!(results[0].count, 3);
        assert!(results[0].average.is_finite());
        assert!(results[0].average >= 1.0e308);
    }

    #[test]
    fn test_phase_transitions() {
        let mut agg = WindowedAggregator::new(EngineConfig::default());
        assert_eq!(agg.phase(), WindowPhase::Idle);
        assert_eq!(agg.window_id(), 0);

        agg.open(Utc::now());
        assert_eq!(agg.phase(), WindowPhase::WindowOpen);
        assert_eq!(agg.window_id(), 1);

        agg.close(Utc::now());
        assert_eq!(agg.phase(), WindowPhase::WindowOpen);
        assert_eq!(agg.window_id(), 2);

        agg.discard();
        assert_eq!(agg.phase(), WindowPhase::Idle);
    }

    #[test]
    fn test_three_qualifying_events() {
        let mut agg = open_aggregator();
        for price in [1100.0, 1200.0, 1300.0] {
            assert_eq!(agg.observe(&event("GOOG", price)), Observation::Accumulated);
        }

        let results = agg.close(Utc::now());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].symbol.as_str(), "GOOG");
        assert_eq!(results[0].count, 3);
        assert!((results[0].average - 1200.0).abs() < 1e-9);
        assert_eq!(results[0].window_id, 1);
    }

    #[test]
    fn test_filtered_event_ignored() {
        let mut agg = open_aggregator();
        assert_eq!(agg.observe(&event("GOOG", 900.0)), Observation::Filtered);
        assert_eq!(agg.observe(&event("GOOG", 1500.0)), Observation::Accumulated);

        let results = agg.close(Utc::now());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].count, 1);
        assert_eq!(results[0].average, 1500.0);
    }

    #[test]
    fn test_threshold_boundary_not_qualifying() {
        let mut agg = open_aggregator();
        assert_eq!(agg.observe(&event("GOOG", 1000.0)), Observation::Filtered);
        assert_eq!(agg.open_keys(), 0);
        assert!(agg.close(Utc::now()).is_empty());
    }

    #[test]
    fn test_empty_window_emits_nothing() {
        let mut agg = open_aggregator();
        assert!(agg.close(Utc::now()).is_empty());
        assert!(agg.close(Utc::now()).is_empty());
        assert_eq!(agg.window_id(), 3);
    }

    #[test]
    fn test_two_symbols_independent() {
        let mut agg = open_aggregator();
        agg.observe(&event("GOOG", 1100.0));
        agg.observe(&event("AAPL", 2000.0));
        agg.observe(&event("GOOG", 1300.0));
        agg.observe(&event("AAPL", 500.0));

        let results = agg.close(Utc::now());
        assert_eq!(results.len(), 2);

        // BTreeMap order: AAPL before GOOG
        assert_eq!(results[0].symbol.as_str(), "AAPL");
        assert_eq!(results[0].count, 1);
        assert_eq!(results[0].average, 2000.0);
        assert_eq!(results[1].symbol.as_str(), "GOOG");
        assert_eq!(results[1].count, 2);
        assert_eq!(results[1].average, 1200.0);
    }

    #[test]
    fn test_no_state_leaks_across_windows() {
        let mut agg = open_aggregator();
        agg.observe(&event("GOOG", 2000.0));
        agg.observe(&event("GOOG", 4000.0));
        let first = agg.close(Utc::now());
        assert_eq!(first[0].count, 2);
        assert_eq!(agg.open_keys(), 0);
        assert!(agg.accumulator(&Symbol::new("GOOG")).is_none());

        agg.observe(&event("GOOG", 1500.0));
        let second = agg.close(Utc::now());
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].count, 1);
        assert_eq!(second[0].average, 1500.0);
        assert_eq!(second[0].window_id, first[0].window_id + 1);
    }

    #[test]
    fn test_window_bounds_are_contiguous() {
        let mut agg = open_aggregator();
        agg.observe(&event("GOOG", 1500.0));
        let first = agg.close(Utc::now());

        agg.observe(&event("GOOG", 1500.0));
        let second = agg.close(Utc::now());

        assert_eq!(first[0].window_end, second[0].window_start);
        assert!(second[0].window_end >= second[0].window_start);
    }

    #[test]
    fn test_discard_drops_partial_window() {
        let mut agg = open_aggregator();
        agg.observe(&event("GOOG", 1500.0));
        agg.observe(&event("AAPL", 1500.0));

        assert_eq!(agg.discard(), 2);
        assert_eq!(agg.open_keys(), 0);
    }

    #[test]
    fn test_observe_opens_idle_window() {
        let mut agg = WindowedAggregator::new(EngineConfig::default());
        agg.observe(&event("GOOG", 1500.0));
        assert_eq!(agg.phase(), WindowPhase::WindowOpen);
        assert_eq!(agg.window_id(), 1);
    }

    #[test]
    fn test_custom_threshold() {
        let config = EngineConfig {
            price_threshold: 0.0,
            ..EngineConfig::default()
        };
        let mut agg = WindowedAggregator::new(config);
        agg.open(Utc::now());
        assert_eq!(agg.observe(&event("GOOG", 0.5)), Observation::Accumulated);
        assert_eq!(agg.observe(&event("GOOG", 0.0)), Observation::Filtered);
    }
}

// ── Property-Based Tests ────────────────────────────────────────────
