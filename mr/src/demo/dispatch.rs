//! Coordinator handing one task to each worker

use std::time::Duration;

use eyre::{Context, Result};
use tokio::sync::mpsc;
use tracing::debug;

use super::{DemoReport, collect, drain, drain_failures, stop_all};
use crate::actor::Schedule;
use crate::config::DispatchConfig;
use crate::envelope::{keys, meta};
use crate::patterns::{Dispatcher, Listener};
use crate::runtime::Runtime;

/// Dispatch the configured task and wait for every worker to receive it
pub async fn run(runtime: &Runtime, config: &DispatchConfig, run_for: Duration) -> Result<DemoReport> {
    debug!(coordinator = %config.coordinator, workers = config.workers.len(), "dispatch::run: called");
    let timeout = runtime.config().receive_timeout();
    let mut failures = runtime.subscribe_failures();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut actors = Vec::new();

    for address in &config.workers {
        let mut worker = runtime.actor(address.clone());
        worker.add_behavior(Listener::with_sink(timeout, tx.clone()), Schedule::Cyclic)?;
        worker
            .start()
            .context(format!("Failed to start worker {}", address))?;
        actors.push(worker);
    }
    drop(tx);

    let mut coordinator = runtime.actor(config.coordinator.clone());
    coordinator.add_behavior(
        Dispatcher::broadcast(&config.workers, meta([(keys::TASK, config.task.as_str())])),
        Schedule::OneShot,
    )?;
    coordinator.start().context("Failed to start coordinator")?;
    actors.push(coordinator);

    let mut deliveries = collect(&mut rx, config.workers.len(), run_for).await;
    stop_all(&mut actors).await;
    deliveries.extend(drain(&mut rx));

    Ok(DemoReport {
        deliveries,
        batches: Vec::new(),
        failures: drain_failures(&mut failures),
    })
}
