//! Result fan-out to independent subscribers
//!
//! The distributor owns an ordered list of subscribers and calls each of them
//! with every `WindowResult`, in registration order. One subscriber failing,
//! by returning an error or by panicking, is logged and counted but never
//! keeps the others from seeing the same result. Nothing is retried.
//!
//! Once spawned, the distributor runs on its own task and is driven through a
//! `DistributorHandle`. Publishing through the handle is fire-and-forget: the
//! engine enqueues a result and moves on; the worker drains the queue one
//! result at a time in emission order.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use types::window::WindowResult;

use crate::metrics::EngineMetrics;

/// Failure reported by a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriberError {
    #[error("subscriber failed: {0}")]
    Failed(String),

    #[error("subscriber panicked: {0}")]
    Panicked(String),
}

impl SubscriberError {
    pub fn failed(msg: impl Into<String>) -> Self {
        SubscriberError::Failed(msg.into())
    }
}

/// The distributor worker has stopped and can no longer take commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("result distributor stopped")]
pub struct DistributorClosed;

/// A consumer of window results.
pub trait Subscriber: Send {
    /// Name used in logs when this subscriber fails.
    fn name(&self) -> &str;

    fn on_result(&mut self, result: &WindowResult) -> Result<(), SubscriberError>;
}

/// Adapts a closure into a `Subscriber`.
pub struct FnSubscriber<F> {
    name: String,
    handler: F,
}

impl<F> FnSubscriber<F>
where
    F: FnMut(&WindowResult) -> Result<(), SubscriberError> + Send,
{
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl<F> Subscriber for FnSubscriber<F>
where
    F: FnMut(&WindowResult) -> Result<(), SubscriberError> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_result(&mut self, result: &WindowResult) -> Result<(), SubscriberError> {
        (self.handler)(result)
    }
}

/// Outcome of fanning out a single result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Subscribers that handled the result.
    pub delivered: usize,
    /// Names of subscribers that failed, in invocation order.
    pub failed: Vec<String>,
}

impl DeliveryReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Ordered set of subscribers.
#[derive(Default)]
pub struct ResultDistributor {
    subscribers: Vec<Box<dyn Subscriber>>,
}

impl ResultDistributor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscriber. Invocation order follows registration order.
    pub fn register<S: Subscriber + 'static>(&mut self, subscriber: S) {
        self.register_boxed(Box::new(subscriber));
    }

    pub fn register_boxed(&mut self, subscriber: Box<dyn Subscriber>) {
        info!(
            subscriber = subscriber.name(),
            position = self.subscribers.len(),
            "Subscriber registered"
        );
        self.subscribers.push(subscriber);
    }

    /// Register a plain function or closure.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: FnMut(&WindowResult) -> Result<(), SubscriberError> + Send + 'static,
    {
        self.register(FnSubscriber::new(name, handler));
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Registered subscriber names in invocation order.
    pub fn names(&self) -> Vec<&str> {
        self.subscribers.iter().map(|s| s.name()).collect()
    }

    /// Hand `result` to every subscriber, isolating failures.
    pub fn publish(&mut self, result: &WindowResult) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for subscriber in self.subscribers.iter_mut() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_result(result)))
                .unwrap_or_else(|payload| Err(SubscriberError::Panicked(panic_message(payload))));

            match outcome {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(
                        subscriber = subscriber.name(),
                        symbol = %result.symbol,
                        window_id = result.window_id,
                        error = %err,
                        "Subscriber failed; continuing with remaining subscribers"
                    );
                    report.failed.push(subscriber.name().to_string());
                }
            }
        }

        report
    }

    /// Move the distributor onto its own task.
    ///
    /// The worker stops once every `DistributorHandle` has been dropped and
    /// the queue is drained.
    pub fn spawn(self, metrics: Arc<EngineMetrics>) -> (DistributorHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(self.run(rx, metrics));
        (DistributorHandle { tx }, worker)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>, metrics: Arc<EngineMetrics>) {
        info!(subscribers = self.len(), "Result distributor started");

        while let Some(command) = rx.recv().await {
            match command {
                Command::Publish(result) => {
                    let started = Instant::now();
                    let report = self.publish(&result);
                    let elapsed = started.elapsed().as_nanos() as u64;
                    metrics.record_delivery(report.failed.len(), elapsed);
                    debug!(
                        symbol = %result.symbol,
                        window_id = result.window_id,
                        delivered = report.delivered,
                        failed = report.failed.len(),
                        "Result distributed"
                    );
                }
                Command::Register(subscriber) => self.register_boxed(subscriber),
            }
        }

        info!("Result distributor stopped");
    }
}

enum Command {
    Publish(WindowResult),
    Register(Box<dyn Subscriber>),
}

/// Cloneable front door to a spawned distributor.
#[derive(Debug, Clone)]
pub struct DistributorHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl DistributorHandle {
    /// Queue a result for delivery without waiting for subscribers.
    pub fn publish(&self, result: WindowResult) -> Result<(), DistributorClosed> {
        self.tx.send(Command::Publish(result)).map_err(|_| {
            error!("Result dropped: distributor is not running");
            DistributorClosed
        })
    }

    /// Add a subscriber to the running distributor. It sees every result
    /// queued after this call.
    pub fn register<S: Subscriber + 'static>(&self, subscriber: S) -> Result<(), DistributorClosed> {
        self.tx
            .send(Command::Register(Box::new(subscriber)))
            .map_err(|_| DistributorClosed)
    }

    pub fn register_fn<F>(&self, name: impl Into<String>, handler: F) -> Result<(), DistributorClosed>
    where
        F: FnMut(&WindowResult) -> Result<(), SubscriberError> + Send + 'static,
    {
        self.register(FnSubscriber::new(name, handler))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
