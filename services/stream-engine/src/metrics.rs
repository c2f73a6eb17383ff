//! Counters for the aggregation pipeline
//!
//! Lock-free `AtomicU64` counters shared between the gateway, the engine and
//! the distributor through an `Arc`. A serializable snapshot is exposed for
//! the stats endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Pipeline-wide metrics.
pub struct EngineMetrics {
    // Ingestion
    pub events_received: AtomicU64,
    pub events_accepted: AtomicU64,
    pub events_filtered: AtomicU64,

    // Windows
    pub windows_closed: AtomicU64,
    pub empty_windows: AtomicU64,
    pub results_emitted: AtomicU64,
    pub partial_windows_discarded: AtomicU64,

    // Fan-out
    pub results_delivered: AtomicU64,
    pub subscriber_failures: AtomicU64,
    pub delivery_ns: Mutex<LatencyTracker>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            events_received: AtomicU64::new(0),
            events_accepted: AtomicU64::new(0),
            events_filtered: AtomicU64::new(0),
            windows_closed: AtomicU64::new(0),
            empty_windows: AtomicU64::new(0),
            results_emitted: AtomicU64::new(0),
            partial_windows_discarded: AtomicU64::new(0),
            results_delivered: AtomicU64::new(0),
            subscriber_failures: AtomicU64::new(0),
            delivery_ns: Mutex::new(LatencyTracker::new(1000)),
        }
    }

    /// Record an event pulled off the channel and whether it qualified.
    pub fn record_event(&self, qualifying: bool) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
        if qualifying {
            self.events_accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.events_filtered.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a window flush and how many results it produced.
    pub fn record_window_closed(&self, results: usize) {
        self.windows_closed.fetch_add(1, Ordering::Relaxed);
        if results == 0 {
            self.empty_windows.fetch_add(1, Ordering::Relaxed);
        } else {
            self.results_emitted.fetch_add(results as u64, Ordering::Relaxed);
        }
    }

    /// Record a partially filled window dropped at shutdown.
    pub fn record_partial_discard(&self) {
        self.partial_windows_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one result fanned out, with per-subscriber failure count and
    /// total delivery time.
    pub fn record_delivery(&self, failures: usize, latency_ns: u64) {
        self.results_delivered.fetch_add(1, Ordering::Relaxed);
        self.subscriber_failures
            .fetch_add(failures as u64, Ordering::Relaxed);
        if let Ok(mut tracker) = self.delivery_ns.lock() {
            tracker.record(latency_ns);
        }
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let (delivery_p50_ns, delivery_p99_ns) = match self.delivery_ns.lock() {
            Ok(tracker) => (tracker.percentile(50), tracker.percentile(99)),
            Err(_) => (None, None),
        };

        MetricsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_accepted: self.events_accepted.load(Ordering::Relaxed),
            events_filtered: self.events_filtered.load(Ordering::Relaxed),
            windows_closed: self.windows_closed.load(Ordering::Relaxed),
            empty_windows: self.empty_windows.load(Ordering::Relaxed),
            results_emitted: self.results_emitted.load(Ordering::Relaxed),
            partial_windows_discarded: self
                .partial_windows_discarded
                .load(Ordering::Relaxed),
            results_delivered: self.results_delivered.load(Ordering::Relaxed),
            subscriber_failures: self.subscriber_failures.load(Ordering::Relaxed),
            delivery_p50_ns,
            delivery_p99_ns,
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable view of `EngineMetrics`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub events_received: u64,
    pub events_accepted: u64,
    pub events_filtered: u64,
    pub windows_closed: u64,
    pub empty_windows: u64,
    pub results_emitted: u64,
    pub partial_windows_discarded: u64,
    pub results_delivered: u64,
    pub subscriber_failures: u64,
    pub delivery_p50_ns: Option<u64>,
    pub delivery_p99_ns: Option<u64>,
}

/// Tracks latency samples for percentile calculation.
pub struct LatencyTracker {
    samples: Vec<u64>,
    max_samples: usize,
}

impl LatencyTracker {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: Vec::with_capacity(max_samples),
            max_samples,
        }
    }

    /// Record a latency sample.
    pub fn record(&mut self, value: u64) {
        if self.samples.len() >= self.max_samples {
            self.samples.remove(0);
        }
        self.samples.push(value);
    }

    /// Get a percentile value (0-100).
    pub fn percentile(&self, p: usize) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sorted = self.samples.clone();
        sorted.sort_unstable();

        let idx = (p as f64 / 100.0 * (sorted.len() - 1) as f64) as usize;
        Some(sorted[idx.min(sorted.len() - 1)])
    }

    /// Number of samples recorded.
    pub fn count(&self) -> usize {
        self.samples.len()
    }
}
