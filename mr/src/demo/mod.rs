//! Demo setups wired from configuration
//!
//! Each demo starts its actors on a fresh [`Runtime`], lets them run, stops
//! them and returns what was observed.

mod balance;
mod dispatch;
mod pubsub;

use std::time::Duration;

use clap::ValueEnum;
use eyre::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use crate::actor::Actor;
use crate::config::Config;
use crate::envelope::Envelope;
use crate::patterns::Response;
use crate::runtime::{BehaviorFailure, Runtime};

pub use balance::run as run_balance;
pub use dispatch::run as run_dispatch;
pub use pubsub::run as run_pubsub;

/// Available demos
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DemoKind {
    /// Broker, periodic publisher and topic subscribers
    Pubsub,
    /// Round-robin forwarder, responders and batch aggregator
    Balance,
    /// Coordinator dispatching one task to every worker
    Dispatch,
}

impl std::fmt::Display for DemoKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pubsub => "pubsub",
            Self::Balance => "balance",
            Self::Dispatch => "dispatch",
        };
        write!(f, "{}", name)
    }
}

/// What a demo run observed
#[derive(Debug, Default)]
pub struct DemoReport {
    /// Envelopes received by the listening actors, in arrival order
    pub deliveries: Vec<Envelope>,
    /// Batches flushed by an aggregator
    pub batches: Vec<Vec<Response>>,
    /// Step failures reported while the demo ran
    pub failures: Vec<BehaviorFailure>,
}

/// Validate the configuration and run one demo to completion
pub async fn run(kind: DemoKind, config: &Config) -> Result<DemoReport> {
    debug!(%kind, "demo::run: called");
    config.validate()?;
    let runtime = Runtime::new(config.runtime.clone());
    let run_for = config.demos.run_for();
    let report = match kind {
        DemoKind::Pubsub => run_pubsub(&runtime, &config.demos.pubsub, run_for).await?,
        DemoKind::Balance => run_balance(&runtime, &config.demos.balance, run_for).await?,
        DemoKind::Dispatch => run_dispatch(&runtime, &config.demos.dispatch, run_for).await?,
    };
    info!(
        %kind,
        deliveries = report.deliveries.len(),
        batches = report.batches.len(),
        failures = report.failures.len(),
        "Demo finished"
    );
    Ok(report)
}

async fn stop_all(actors: &mut [Actor]) {
    for actor in actors.iter_mut() {
        actor.stop().await;
    }
}

fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut items = Vec::new();
    while let Ok(item) = rx.try_recv() {
        items.push(item);
    }
    items
}

fn drain_failures(rx: &mut broadcast::Receiver<BehaviorFailure>) -> Vec<BehaviorFailure> {
    let mut failures = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(failure) => failures.push(failure),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                debug!(skipped, "drain_failures: lagged");
            }
            Err(_) => return failures,
        }
    }
}

/// Collect from `rx` until `want` items arrived or `deadline` passed
async fn collect<T>(rx: &mut mpsc::UnboundedReceiver<T>, want: usize, deadline: Duration) -> Vec<T> {
    let mut items = Vec::with_capacity(want);
    let until = tokio::time::Instant::now() + deadline;
    while items.len() < want {
        match tokio::time::timeout_at(until, rx.recv()).await {
            Ok(Some(item)) => items.push(item),
            Ok(None) | Err(_) => break,
        }
    }
    items
}
