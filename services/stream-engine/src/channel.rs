//! Event channel between producers and the aggregation engine
//!
//! Multi-producer, single-consumer conduit for `StockEvent`s. Each producer's
//! events are delivered in the order it sent them; no ordering is promised
//! across producers. Nothing is ever dropped: the unbounded flavour accepts
//! everything, the bounded flavour makes `send` wait for a free slot.
//!
//! Dropping every `EventSender` closes the channel, which the engine treats
//! as end-of-input.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use types::event::StockEvent;

use crate::config::ConfigError;

/// Capacity policy for the event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelCapacity {
    /// Never blocks producers.
    Unbounded,
    /// Producers wait in `send` while the channel holds this many events.
    Bounded(usize),
}

/// The engine is gone; the rejected event is handed back.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("event channel closed")]
pub struct ChannelClosed(pub StockEvent);

/// Failure of a non-waiting send.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrySendError {
    #[error("event channel full")]
    Full(StockEvent),

    #[error("event channel closed")]
    Closed(StockEvent),
}

impl TrySendError {
    /// Recover the event that could not be sent.
    pub fn into_event(self) -> StockEvent {
        match self {
            TrySendError::Full(event) | TrySendError::Closed(event) => event,
        }
    }
}

#[derive(Debug, Clone)]
enum SenderInner {
    Unbounded(mpsc::UnboundedSender<StockEvent>),
    Bounded(mpsc::Sender<StockEvent>),
}

#[derive(Debug)]
enum ReceiverInner {
    Unbounded(mpsc::UnboundedReceiver<StockEvent>),
    Bounded(mpsc::Receiver<StockEvent>),
}

/// Producer handle. Clone one per producer.
#[derive(Debug, Clone)]
pub struct EventSender {
    inner: SenderInner,
}

/// Consumer handle, owned by the engine.
#[derive(Debug)]
pub struct EventReceiver {
    inner: ReceiverInner,
}

/// Create an event channel with the given capacity policy.
pub fn event_channel(
    capacity: ChannelCapacity,
) -> Result<(EventSender, EventReceiver), ConfigError> {
    let (inner_tx, inner_rx) = match capacity {
        ChannelCapacity::Unbounded => {
            let (tx, rx) = mpsc::unbounded_channel();
            (SenderInner::Unbounded(tx), ReceiverInner::Unbounded(rx))
        }
        ChannelCapacity::Bounded(0) => return Err(ConfigError::ZeroCapacity),
        ChannelCapacity::Bounded(n) => {
            let (tx, rx) = mpsc::channel(n);
            (SenderInner::Bounded(tx), ReceiverInner::Bounded(rx))
        }
    };

    info!(?capacity, "Event channel created");

    Ok((
        EventSender { inner: inner_tx },
        EventReceiver { inner: inner_rx },
    ))
}

impl EventSender {
    /// Enqueue an event, waiting for space if the channel is bounded and full.
    pub async fn send(&self, event: StockEvent) -> Result<(), ChannelClosed> {
        let event_id = event.event_id();
        match &self.inner {
            SenderInner::Unbounded(tx) => tx.send(event).map_err(|e| ChannelClosed(e.0))?,
            SenderInner::Bounded(tx) => tx.send(event).await.map_err(|e| ChannelClosed(e.0))?,
        }
        debug!(%event_id, "Event enqueued");
        Ok(())
    }

    /// Enqueue without waiting. `Full` is only possible on a bounded channel.
    pub fn try_send(&self, event: StockEvent) -> Result<(), TrySendError> {
        match &self.inner {
            SenderInner::Unbounded(tx) => tx.send(event).map_err(|e| TrySendError::Closed(e.0)),
            SenderInner::Bounded(tx) => tx.try_send(event).map_err(|e| match e {
                mpsc::error::TrySendError::Full(event) => TrySendError::Full(event),
                mpsc::error::TrySendError::Closed(event) => TrySendError::Closed(event),
            }),
        }
    }

    /// Whether the receiving side has gone away.
    pub fn is_closed(&self) -> bool {
        match &self.inner {
            SenderInner::Unbounded(tx) => tx.is_closed(),
            SenderInner::Bounded(tx) => tx.is_closed(),
        }
    }
}

impl EventReceiver {
    /// Next event, or `None` once every sender is dropped and the queue is drained.
    pub async fn recv(&mut self) -> Option<StockEvent> {
        match &mut self.inner {
            ReceiverInner::Unbounded(rx) => rx.recv().await,
            ReceiverInner::Bounded(rx) => rx.recv().await,
        }
    }

    /// Stop accepting new events. Already queued events can still be received.
    pub fn close(&mut self) {
        match &mut self.inner {
            ReceiverInner::Unbounded(rx) => rx.close(),
            ReceiverInner::Bounded(rx) => rx.close(),
        }
    }

    /// Number of events waiting to be consumed.
    pub fn len(&self) -> usize {
        match &self.inner {
            ReceiverInner::Unbounded(rx) => rx.len(),
            ReceiverInner::Bounded(rx) => rx.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
