//! Wiring of channel, engine and distributor into running tasks

use std::future::Future;
use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tracing::info;

use crate::channel::EventSender;
use crate::config::{ConfigError, EngineConfig};
use crate::distributor::{DistributorHandle, ResultDistributor};
use crate::engine::{AggregationEngine, EngineReport};
use crate::metrics::EngineMetrics;

/// A running aggregation pipeline.
pub struct Pipeline {
    sender: EventSender,
    distributor: DistributorHandle,
    metrics: Arc<EngineMetrics>,
    engine_task: JoinHandle<EngineReport>,
    distributor_task: JoinHandle<()>,
}

impl Pipeline {
    /// Spawn the distributor worker and the engine loop.
    ///
    /// The engine stops when `shutdown` resolves or when every event sender,
    /// including the one held by this pipeline, has been dropped.
    pub fn start<F>(
        config: EngineConfig,
        distributor: ResultDistributor,
        shutdown: F,
    ) -> Result<Self, ConfigError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let metrics = Arc::new(EngineMetrics::new());
        let (handle, distributor_task) = distributor.spawn(metrics.clone());
        let (engine, sender) = AggregationEngine::new(config, handle.clone(), metrics.clone())?;
        let engine_task = tokio::spawn(engine.run(shutdown));

        info!("Aggregation pipeline started");

        Ok(Self {
            sender,
            distributor: handle,
            metrics,
            engine_task,
            distributor_task,
        })
    }

    /// Producer handle for the event channel.
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Handle for registering subscribers after startup.
    pub fn distributor(&self) -> DistributorHandle {
        self.distributor.clone()
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        self.metrics.clone()
    }

    /// Wait for the engine to stop, then for the distributor to drain every
    /// result it was handed.
    ///
    /// Other clones of the sender or distributor handle keep the respective
    /// task alive, so drop them first.
    pub async fn join(self) -> Result<EngineReport, JoinError> {
        let Self {
            sender,
            distributor,
            engine_task,
            distributor_task,
            ..
        } = self;
        drop(sender);
        drop(distributor);

        let report = engine_task.await?;
        distributor_task.await?;
        Ok(report)
    }
}
