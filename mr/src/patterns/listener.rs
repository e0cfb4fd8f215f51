//! Receive loops for the consuming end of a pattern

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::actor::{Behavior, BehaviorContext};
use crate::address::Address;
use crate::envelope::{Envelope, actions, meta};
use crate::error::{MeshError, MeshResult};

/// Cyclic behavior that logs every envelope it receives
///
/// With a sink attached, each envelope is also forwarded to it.
pub struct Listener {
    timeout: Duration,
    sink: Option<mpsc::UnboundedSender<Envelope>>,
}

impl Listener {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, sink: None }
    }

    pub fn with_sink(timeout: Duration, sink: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            timeout,
            sink: Some(sink),
        }
    }

    fn record(&mut self, at: &Address, envelope: Envelope) {
        info!(
            actor = %at,
            from = %envelope.sender(),
            metadata = %serde_json::Value::Object(envelope.metadata().clone()),
            "Received"
        );
        if let Some(sink) = &self.sink
            && sink.send(envelope).is_err()
        {
            debug!(actor = %at, "Listener: sink closed, detaching");
            self.sink = None;
        }
    }
}

#[async_trait]
impl Behavior for Listener {
    async fn step(&mut self, ctx: &mut BehaviorContext) -> MeshResult<()> {
        if let Some(envelope) = ctx.receive(self.timeout).await {
            self.record(ctx.address(), envelope);
        }
        Ok(())
    }
}

/// Listener that first subscribes to its topics at a broker
pub struct Subscriber {
    broker: Address,
    topics: Vec<String>,
    listener: Listener,
}

impl Subscriber {
    pub fn new(broker: Address, topics: Vec<String>, listener: Listener) -> Self {
        debug!(%broker, ?topics, "Subscriber::new: called");
        Self {
            broker,
            topics,
            listener,
        }
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }
}

#[async_trait]
impl Behavior for Subscriber {
    async fn on_start(&mut self, ctx: &mut BehaviorContext) -> MeshResult<()> {
        for topic in &self.topics {
            ctx.send(
                &self.broker,
                meta([("action", actions::SUBSCRIBE), ("topic", topic.as_str())]),
            )
            .map_err(|e| match e {
                MeshError::AddressNotFound(broker) => MeshError::Undeliverable {
                    failed: vec![broker],
                    reason: format!("cannot subscribe to '{topic}'"),
                },
                other => other,
            })?;
            debug!(actor = %ctx.address(), %topic, "Subscriber: sent subscribe");
        }
        Ok(())
    }

    async fn step(&mut self, ctx: &mut BehaviorContext) -> MeshResult<()> {
        self.listener.step(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Schedule;
    use crate::runtime::Runtime;

    #[tokio::test]
    async fn test_listener_forwards_to_sink() {
        let runtime = Runtime::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut actor = runtime.actor("l@localhost");
        actor
            .add_behavior(Listener::with_sink(Duration::from_millis(50), tx), Schedule::Cyclic)
            .unwrap();
        actor.start().unwrap();

        runtime
            .send(&"a".into(), actor.address(), meta([("task", "process_data")]))
            .unwrap();
        let env = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(env.get_str("task"), Some("process_data"));
        actor.stop().await;
    }

    #[tokio::test]
    async fn test_listener_survives_closed_sink() {
        let runtime = Runtime::default();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut actor = runtime.actor("l@localhost");
        let handle = actor
            .add_behavior(Listener::with_sink(Duration::from_millis(50), tx), Schedule::Cyclic)
            .unwrap();
        actor.start().unwrap();

        runtime.send(&"a".into(), actor.address(), meta([("n", 1)])).unwrap();
        runtime.send(&"a".into(), actor.address(), meta([("n", 2)])).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_ne!(handle.state(), crate::actor::BehaviorState::Terminated);
        actor.stop().await;
    }

    #[tokio::test]
    async fn test_subscriber_sends_subscribe_per_topic() {
        let runtime = Runtime::default();
        let mut broker = runtime.actor("broker@localhost");
        broker.start().unwrap();

        let mut sub = runtime.actor("s@localhost");
        sub.add_behavior(
            Subscriber::new(
                broker.address().clone(),
                vec!["news".to_string(), "sports".to_string()],
                Listener::new(Duration::from_millis(50)),
            ),
            Schedule::Cyclic,
        )
        .unwrap();
        sub.start().unwrap();

        for topic in ["news", "sports"] {
            let env = broker.receive(Duration::from_secs(2)).await.unwrap();
            assert_eq!(env.sender().as_str(), "s@localhost");
            assert_eq!(env.action(), Some("subscribe"));
            assert_eq!(env.topic(), Some(topic));
        }

        sub.stop().await;
        broker.stop().await;
    }

    #[tokio::test]
    async fn test_subscriber_reports_missing_broker() {
        let runtime = Runtime::default();
        let mut failures = runtime.subscribe_failures();
        let mut sub = runtime.actor("s@localhost");
        sub.add_behavior(
            Subscriber::new(
                "broker@localhost".into(),
                vec!["news".to_string()],
                Listener::new(Duration::from_millis(50)),
            ),
            Schedule::Cyclic,
        )
        .unwrap();
        sub.start().unwrap();

        let failure = tokio::time::timeout(Duration::from_secs(2), failures.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(failure.error, MeshError::Undeliverable { .. }));
        sub.stop().await;
    }
}
