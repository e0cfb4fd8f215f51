//! Topic-based publish/subscribe routing

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::actor::{Behavior, BehaviorContext};
use crate::address::Address;
use crate::envelope::{Envelope, Metadata, actions, keys};
use crate::error::{MeshError, MeshResult};

/// Topic → ordered subscriber list
///
/// Subscribing twice registers twice, and a publish then delivers twice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRegistry {
    topics: HashMap<String, Vec<Address>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `subscriber` to the topic's list
    pub fn subscribe(&mut self, topic: &str, subscriber: Address) {
        debug!(%topic, %subscriber, "SubscriptionRegistry::subscribe: called");
        self.topics.entry(topic.to_string()).or_default().push(subscriber);
    }

    /// Remove every registration of `subscriber` for `topic`
    ///
    /// Returns how many registrations were removed.
    pub fn unsubscribe(&mut self, topic: &str, subscriber: &Address) -> usize {
        debug!(%topic, %subscriber, "SubscriptionRegistry::unsubscribe: called");
        let Some(subscribers) = self.topics.get_mut(topic) else {
            return 0;
        };
        let before = subscribers.len();
        subscribers.retain(|a| a != subscriber);
        let removed = before - subscribers.len();
        if subscribers.is_empty() {
            self.topics.remove(topic);
        }
        removed
    }

    /// Current subscribers of `topic` in registration order
    pub fn publish(&self, topic: &str) -> &[Address] {
        self.topics.get(topic).map(Vec::as_slice).unwrap_or_default()
    }

    /// Known topics, sorted
    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = self.topics.keys().map(String::as_str).collect();
        topics.sort_unstable();
        topics
    }

    /// Total registrations across all topics
    pub fn len(&self) -> usize {
        self.topics.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

/// Cyclic behavior that routes subscribe/unsubscribe/publish envelopes
pub struct Broker {
    registry: SubscriptionRegistry,
    timeout: Duration,
}

impl Broker {
    pub fn new(timeout: Duration) -> Self {
        Self::with_registry(SubscriptionRegistry::new(), timeout)
    }

    /// Start from previously saved subscriptions
    pub fn with_registry(registry: SubscriptionRegistry, timeout: Duration) -> Self {
        debug!(registrations = registry.len(), ?timeout, "Broker::with_registry: called");
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Apply one envelope to the registry and return the deliveries it causes
    ///
    /// Subscribe and unsubscribe produce no deliveries. Unknown actions are
    /// ignored.
    pub fn route(&mut self, envelope: &Envelope) -> MeshResult<Vec<(Address, Metadata)>> {
        let Some(action) = envelope.action() else {
            debug!(sender = %envelope.sender(), "Broker::route: no action, ignoring");
            return Ok(Vec::new());
        };
        if ![actions::SUBSCRIBE, actions::UNSUBSCRIBE, actions::PUBLISH].contains(&action) {
            debug!(sender = %envelope.sender(), %action, "Broker::route: unknown action, ignoring");
            return Ok(Vec::new());
        }

        let topic = envelope.topic().ok_or_else(|| MeshError::MissingMetadata {
            action: action.to_string(),
            key: keys::TOPIC.to_string(),
            sender: envelope.sender().clone(),
        })?;

        match action {
            actions::SUBSCRIBE => {
                self.registry.subscribe(topic, envelope.sender().clone());
                info!(%topic, subscriber = %envelope.sender(), "Subscribed");
                Ok(Vec::new())
            }
            actions::UNSUBSCRIBE => {
                let removed = self.registry.unsubscribe(topic, envelope.sender());
                info!(%topic, subscriber = %envelope.sender(), removed, "Unsubscribed");
                Ok(Vec::new())
            }
            _ => {
                let data = envelope.get(keys::DATA).cloned().unwrap_or(Value::Null);
                let deliveries = self
                    .registry
                    .publish(topic)
                    .iter()
                    .map(|subscriber| {
                        let mut metadata = Metadata::new();
                        metadata.insert(keys::TOPIC.to_string(), Value::from(topic));
                        metadata.insert(keys::DATA.to_string(), data.clone());
                        (subscriber.clone(), metadata)
                    })
                    .collect::<Vec<_>>();
                debug!(%topic, fanout = deliveries.len(), "Broker::route: publish");
                Ok(deliveries)
            }
        }
    }
}

#[async_trait]
impl Behavior for Broker {
    async fn step(&mut self, ctx: &mut BehaviorContext) -> MeshResult<()> {
        let Some(envelope) = ctx.receive(self.timeout).await else {
            return Ok(());
        };

        let mut failed = Vec::new();
        for (subscriber, metadata) in self.route(&envelope)? {
            if let Err(e) = ctx.send(&subscriber, metadata) {
                warn!(%subscriber, error = %e, "Failed to deliver publication");
                failed.push(subscriber);
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(MeshError::Undeliverable {
                failed,
                reason: "subscriber not live".to_string(),
            })
        }
    }
}
