//! Windowed aggregation engine
//!
//! Single task that owns the event receiver and all window state. Event
//! arrival, window expiry and shutdown are merged into one `select!`, so
//! accumulator updates and window flushes can never interleave and no lock
//! guards the accumulators.
//!
//! Windows are tumbling and use processing time: an event belongs to the
//! window that is open when the engine pulls it off the channel. The timer
//! deadline advances by exactly one window length per expiry, so window
//! boundaries do not drift with processing delays. If the loop falls more
//! than a whole window behind, missed windows are skipped and the deadline is
//! re-anchored to the current instant.
//!
//! On shutdown or channel closure the partially filled window is discarded
//! without emitting results.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use types::event::StockEvent;

use crate::channel::{event_channel, EventReceiver, EventSender};
use crate::config::{ConfigError, EngineConfig};
use crate::distributor::DistributorHandle;
use crate::metrics::EngineMetrics;
use crate::window::{Observation, WindowedAggregator};

/// Why the processing loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The shutdown future resolved.
    Shutdown,
    /// Every event sender was dropped.
    ChannelClosed,
}

/// Summary of one engine run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineReport {
    pub windows_closed: u64,
    pub results_emitted: u64,
    pub events_accepted: u64,
    pub events_filtered: u64,
    /// Keys that had state in the window open at stop time.
    pub discarded_keys: usize,
    pub stop_reason: StopReason,
}

/// The aggregation engine. Construct with [`AggregationEngine::new`], then
/// drive it with [`AggregationEngine::run`].
pub struct AggregationEngine {
    aggregator: WindowedAggregator,
    events: EventReceiver,
    distributor: DistributorHandle,
    metrics: Arc<EngineMetrics>,
    window: Duration,
}

impl AggregationEngine {
    /// Build an engine together with the channel that feeds it.
    ///
    /// The returned sender is the producer side; clone it for each producer.
    pub fn new(
        config: EngineConfig,
        distributor: DistributorHandle,
        metrics: Arc<EngineMetrics>,
    ) -> Result<(Self, EventSender), ConfigError> {
        config.validate()?;
        let (sender, events) = event_channel(config.channel_capacity)?;
        let window = config.window;

        info!(
            window_ms = window.as_millis() as u64,
            price_threshold = config.price_threshold,
            capacity = ?config.channel_capacity,
            "AggregationEngine initialized"
        );

        let engine = Self {
            aggregator: WindowedAggregator::new(config),
            events,
            distributor,
            metrics,
            window,
        };
        Ok((engine, sender))
    }

    /// Run the processing loop until `shutdown` resolves or the channel
    /// closes.
    pub async fn run<F>(self, shutdown: F) -> EngineReport
    where
        F: Future<Output = ()>,
    {
        let Self {
            mut aggregator,
            mut events,
            distributor,
            metrics,
            window,
        } = self;

        let mut report = EngineReport {
            windows_closed: 0,
            results_emitted: 0,
            events_accepted: 0,
            events_filtered: 0,
            discarded_keys: 0,
            stop_reason: StopReason::Shutdown,
        };

        let mut deadline = Instant::now() + window;
        aggregator.open(Utc::now());
        let timer = tokio::time::sleep_until(deadline);
        tokio::pin!(timer);
        tokio::pin!(shutdown);

        info!(window_id = aggregator.window_id(), "Engine processing loop started");

        let stop_reason = loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!("Engine received shutdown signal");
                    break StopReason::Shutdown;
                }

                () = &mut timer => {
                    flush_window(&mut aggregator, &distributor, &metrics, &mut report);
                    let (next, skipped) = next_deadline(deadline, window, Instant::now());
                    if skipped > 0 {
                        warn!(
                            skipped_windows = skipped,
                            "Engine fell behind the window timer; re-anchoring to now"
                        );
                    }
                    deadline = next;
                    timer.as_mut().reset(deadline);
                }

                next = events.recv() => match next {
                    Some(event) => {
                        observe_event(&mut aggregator, &event, &metrics, &mut report);
                    }
                    None => {
                        info!("Event channel closed; engine stopping");
                        break StopReason::ChannelClosed;
                    }
                },
            }
        };

        events.close();

        let discarded = aggregator.discard();
        if discarded > 0 {
            metrics.record_partial_discard();
            warn!(
                discarded_keys = discarded,
                "Discarding partially filled window without emission"
            );
        }

        report.discarded_keys = discarded;
        report.stop_reason = stop_reason;

        info!(
            windows_closed = report.windows_closed,
            results_emitted = report.results_emitted,
            events_accepted = report.events_accepted,
            events_filtered = report.events_filtered,
            stop_reason = ?report.stop_reason,
            "Engine stopped"
        );

        report
    }
}

/// Deadline of the window after the one that expired at `deadline`, seen at
/// `now`.
///
/// Normally this is exactly one window later. If the loop was held up past
/// that point too, the missed windows are skipped instead of firing back to
/// back, and the count of skipped windows is returned alongside.
fn next_deadline(deadline: Instant, window: Duration, now: Instant) -> (Instant, u64) {
    let next = deadline + window;
    if next > now {
        return (next, 0);
    }
    let behind = now.duration_since(deadline).as_nanos();
    let skipped = (behind / window.as_nanos()) as u64;
    (now + window, skipped)
}

fn observe_event(
    aggregator: &mut WindowedAggregator,
    event: &StockEvent,
    metrics: &EngineMetrics,
    report: &mut EngineReport,
) {
    match aggregator.observe(event) {
        Observation::Accumulated => {
            report.events_accepted += 1;
            metrics.record_event(true);
        }
        Observation::Filtered => {
            report.events_filtered += 1;
            metrics.record_event(false);
        }
    }
}

fn flush_window(
    aggregator: &mut WindowedAggregator,
    distributor: &DistributorHandle,
    metrics: &EngineMetrics,
    report: &mut EngineReport,
) {
    let window_id = aggregator.window_id();
    let results = aggregator.close(Utc::now());
    report.windows_closed += 1;
    metrics.record_window_closed(results.len());

    if results.is_empty() {
        debug!(window_id, "Empty window; nothing to emit");
        return;
    }

    info!(window_id, results = results.len(), "Emitting window results");
    for result in results {
        report.results_emitted += 1;
        // A stopped distributor is logged by the handle; the engine keeps going.
        let _ = distributor.publish(result);
    }
}
