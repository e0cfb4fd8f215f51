//! Broker, periodic publisher and subscribers

use std::time::Duration;

use eyre::{Context, Result};
use tokio::sync::mpsc;
use tracing::debug;

use super::{DemoReport, drain, drain_failures, stop_all};
use crate::actor::Schedule;
use crate::config::PubSubConfig;
use crate::patterns::{Broker, Listener, Publisher, Subscriber};
use crate::runtime::Runtime;

/// Run the publish/subscribe demo for `run_for`
pub async fn run(runtime: &Runtime, config: &PubSubConfig, run_for: Duration) -> Result<DemoReport> {
    debug!(broker = %config.broker, subscribers = config.subscribers.len(), "pubsub::run: called");
    let timeout = runtime.config().receive_timeout();
    let mut failures = runtime.subscribe_failures();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut actors = Vec::new();

    let mut broker = runtime.actor(config.broker.clone());
    broker.add_behavior(Broker::new(timeout), Schedule::Cyclic)?;
    broker.start().context("Failed to start broker")?;
    actors.push(broker);

    let mut handles = Vec::new();
    for sub in &config.subscribers {
        let mut actor = runtime.actor(sub.address.clone());
        let listener = Listener::with_sink(timeout, tx.clone());
        handles.push(actor.add_behavior(
            Subscriber::new(config.broker.clone(), sub.topics.clone(), listener),
            Schedule::Cyclic,
        )?);
        actor
            .start()
            .context(format!("Failed to start subscriber {}", sub.address))?;
        actors.push(actor);
    }
    drop(tx);

    // Subscriptions must be queued at the broker before the first publish
    for handle in &handles {
        handle.started().await;
    }

    let mut publisher = runtime.actor(config.publisher.clone());
    publisher.add_behavior(
        Publisher::new(config.broker.clone(), config.topics.clone()),
        Schedule::Periodic(config.publish_period()),
    )?;
    publisher.start().context("Failed to start publisher")?;
    actors.push(publisher);

    tokio::time::sleep(run_for).await;
    stop_all(&mut actors).await;

    Ok(DemoReport {
        deliveries: drain(&mut rx),
        batches: Vec::new(),
        failures: drain_failures(&mut failures),
    })
}
