//! Periodic publisher feeding a broker

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use crate::actor::{Behavior, BehaviorContext};
use crate::address::Address;
use crate::envelope::{actions, meta};
use crate::error::{MeshError, MeshResult};

/// Publishes one update per topic on every run
///
/// Meant to be scheduled as `Schedule::Periodic`.
pub struct Publisher {
    broker: Address,
    topics: Vec<String>,
    published: u64,
}

impl Publisher {
    pub fn new(broker: Address, topics: Vec<String>) -> Self {
        debug!(%broker, ?topics, "Publisher::new: called");
        Self {
            broker,
            topics,
            published: 0,
        }
    }

    /// Updates sent so far
    pub fn published(&self) -> u64 {
        self.published
    }
}

#[async_trait]
impl Behavior for Publisher {
    async fn step(&mut self, ctx: &mut BehaviorContext) -> MeshResult<()> {
        let now = Utc::now().to_rfc3339();
        let mut unsent = Vec::new();
        for topic in &self.topics {
            let data = format!("Update for {topic} at {now}");
            let metadata = meta([
                ("action", actions::PUBLISH),
                ("topic", topic.as_str()),
                ("data", data.as_str()),
            ]);
            match ctx.send(&self.broker, metadata) {
                Ok(()) => self.published += 1,
                Err(e) => {
                    warn!(broker = %self.broker, %topic, error = %e, "Publish failed");
                    unsent.push(topic.as_str());
                }
            }
        }
        if !unsent.is_empty() {
            return Err(MeshError::Undeliverable {
                failed: vec![self.broker.clone()],
                reason: format!("cannot publish {}", unsent.join(", ")),
            });
        }
        debug!(published = self.published, "Publisher::step: done");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Schedule;
    use crate::envelope::Envelope;
    use crate::runtime::{Runtime, Transport};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[tokio::test]
    async fn test_publishes_every_topic_each_period() {
        let runtime = Runtime::default();
        let mut broker = runtime.actor("broker@localhost");
        broker.start().unwrap();

        let mut publisher = runtime.actor("pub@localhost");
        publisher
            .add_behavior(
                Publisher::new(
                    broker.address().clone(),
                    vec!["news".to_string(), "weather".to_string()],
                ),
                Schedule::Periodic(Duration::from_millis(100)),
            )
            .unwrap();
        publisher.start().unwrap();

        // The first tick fires immediately
        let first = broker.receive(Duration::from_secs(2)).await.unwrap();
        let second = broker.receive(Duration::from_secs(2)).await.unwrap();
        assert_eq!(first.action(), Some("publish"));
        assert_eq!(first.topic(), Some("news"));
        assert_eq!(second.topic(), Some("weather"));
        assert!(first.get_str("data").unwrap().starts_with("Update for news at "));

        let third = broker.receive(Duration::from_secs(2)).await.unwrap();
        assert_eq!(third.topic(), Some("news"));

        publisher.stop().await;
        broker.stop().await;
    }

    #[tokio::test]
    async fn test_missing_broker_reported() {
        let runtime = Runtime::default();
        let mut failures = runtime.subscribe_failures();
        let mut publisher = runtime.actor("pub@localhost");
        publisher
            .add_behavior(
                Publisher::new("broker@localhost".into(), vec!["news".to_string()]),
                Schedule::Periodic(Duration::from_millis(50)),
            )
            .unwrap();
        publisher.start().unwrap();

        let failure = tokio::time::timeout(Duration::from_secs(2), failures.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failure.actor.as_str(), "pub@localhost");
        publisher.stop().await;
    }

    struct RejectTopic {
        topic: &'static str,
        seen: Mutex<Vec<Envelope>>,
    }

    impl Transport for RejectTopic {
        fn deliver(&self, envelope: Envelope) -> MeshResult<()> {
            if envelope.topic() == Some(self.topic) {
                return Err(MeshError::AddressNotFound(envelope.recipient().clone()));
            }
            self.seen.lock().unwrap().push(envelope);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_topic_does_not_skip_the_rest() {
        let remote = Arc::new(RejectTopic {
            topic: "news",
            seen: Mutex::new(Vec::new()),
        });
        let runtime = Runtime::with_transport(Default::default(), remote.clone());
        let mut failures = runtime.subscribe_failures();

        let mut publisher = runtime.actor("pub@here");
        publisher
            .add_behavior(
                Publisher::new(
                    "broker@there".into(),
                    vec!["news".to_string(), "weather".to_string(), "sports".to_string()],
                ),
                Schedule::OneShot,
            )
            .unwrap();
        publisher.start().unwrap();

        let failure = tokio::time::timeout(Duration::from_secs(2), failures.recv())
            .await
            .unwrap()
            .unwrap();
        match failure.error {
            MeshError::Undeliverable { failed, reason } => {
                assert_eq!(failed, vec![Address::from("broker@there")]);
                assert!(reason.contains("news"));
                assert!(!reason.contains("weather"));
            }
            other => panic!("unexpected error {other:?}"),
        }

        let topics: Vec<String> = remote
            .seen
            .lock()
            .unwrap()
            .iter()
            .filter_map(|env| env.topic().map(str::to_string))
            .collect();
        assert_eq!(topics, vec!["weather", "sports"]);
        publisher.stop().await;
    }
}
