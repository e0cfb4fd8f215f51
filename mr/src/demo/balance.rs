//! Round-robin forwarder feeding responders and a batch aggregator

use std::time::Duration;

use eyre::{Context, Result};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;

use super::{DemoReport, collect, drain, drain_failures, stop_all};
use crate::actor::Schedule;
use crate::config::BalanceConfig;
use crate::envelope::meta;
use crate::patterns::{Aggregator, Forwarder, Responder};
use crate::runtime::Runtime;

/// Send `config.requests` requests through the forwarder and collect batches
///
/// Returns once every full batch has been flushed or `run_for` has passed.
pub async fn run(runtime: &Runtime, config: &BalanceConfig, run_for: Duration) -> Result<DemoReport> {
    debug!(forwarder = %config.forwarder, responders = config.responders.len(), "balance::run: called");
    let timeout = runtime.config().receive_timeout();
    let mut failures = runtime.subscribe_failures();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut actors = Vec::new();

    let mut aggregator = runtime.actor(config.aggregator.clone());
    aggregator.add_behavior(
        Aggregator::new(
            config.batch_threshold,
            timeout,
            Box::new(move |batch| {
                let _ = tx.send(batch);
            }),
        )?,
        Schedule::Cyclic,
    )?;
    aggregator.start().context("Failed to start aggregator")?;
    actors.push(aggregator);

    for address in &config.responders {
        let mut responder = runtime.actor(address.clone());
        responder.add_behavior(Responder::new(config.aggregator.clone(), timeout), Schedule::Cyclic)?;
        responder
            .start()
            .context(format!("Failed to start responder {}", address))?;
        actors.push(responder);
    }

    let mut forwarder = runtime.actor(config.forwarder.clone());
    forwarder.add_behavior(Forwarder::new(config.responders.clone(), timeout)?, Schedule::Cyclic)?;
    forwarder.start().context("Failed to start forwarder")?;
    actors.push(forwarder);

    for n in 0..config.requests {
        runtime
            .send(
                &config.client,
                &config.forwarder,
                meta([("data", json!(format!("request-{n}"))), ("id", json!(n.to_string()))]),
            )
            .context("Failed to send request")?;
    }

    let want = config.requests / config.batch_threshold;
    let mut batches = collect(&mut rx, want, run_for).await;
    stop_all(&mut actors).await;
    batches.extend(drain(&mut rx));

    Ok(DemoReport {
        deliveries: Vec::new(),
        batches,
        failures: drain_failures(&mut failures),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_balance_flushes_two_batches_of_five() {
        let runtime = Runtime::default();
        let config = BalanceConfig::default();
        let report = run(&runtime, &config, Duration::from_secs(5)).await.unwrap();

        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!(report.batches.len(), 2);
        assert!(report.batches.iter().all(|b| b.len() == 5));

        // Ten requests over two responders: five each
        let mut per_responder: HashMap<String, usize> = HashMap::new();
        for record in report.batches.iter().flatten() {
            if let Value::String(responder) = &record.responder {
                *per_responder.entry(responder.clone()).or_default() += 1;
            }
        }
        assert_eq!(per_responder.get("responder1@localhost"), Some(&5));
        assert_eq!(per_responder.get("responder2@localhost"), Some(&5));

        // Legacy ids are carried through as request ids
        let mut ids: Vec<String> = report
            .batches
            .iter()
            .flatten()
            .filter_map(|r| r.request_id.as_str().map(str::to_string))
            .collect();
        ids.sort_by_key(|id| id.parse::<usize>().unwrap_or_default());
        assert_eq!(ids, (0..10).map(|n| n.to_string()).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_balance_partial_batch_not_flushed() {
        let runtime = Runtime::default();
        let config = BalanceConfig {
            requests: 7,
            ..BalanceConfig::default()
        };
        let report = run(&runtime, &config, Duration::from_millis(500)).await.unwrap();
        assert_eq!(report.batches.len(), 1);
    }
}
