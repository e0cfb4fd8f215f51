//! Worker that answers forwarded requests towards an aggregator

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::actor::{Behavior, BehaviorContext};
use crate::address::Address;
use crate::envelope::{Metadata, keys};
use crate::error::MeshResult;

/// Cyclic behavior turning each request into a response for the aggregator
pub struct Responder {
    aggregator: Address,
    timeout: Duration,
    delay: Duration,
}

impl Responder {
    pub fn new(aggregator: Address, timeout: Duration) -> Self {
        debug!(%aggregator, ?timeout, "Responder::new: called");
        Self {
            aggregator,
            timeout,
            delay: Duration::ZERO,
        }
    }

    /// Simulated processing time before each response
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Build the response metadata for a request handled by `by`
    pub fn respond(by: &Address, request: &Metadata) -> Metadata {
        let payload = match request.get(keys::REQUEST) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => Value::Null.to_string(),
        };
        let mut metadata = Metadata::new();
        metadata.insert(
            keys::RESPONSE.to_string(),
            Value::from(format!("Processed by {by}: {payload}")),
        );
        metadata.insert(
            keys::REQUEST_ID.to_string(),
            request.get(keys::REQUEST_ID).cloned().unwrap_or(Value::Null),
        );
        metadata.insert(keys::RESPONDER.to_string(), Value::from(by.as_str()));
        metadata
    }
}

#[async_trait]
impl Behavior for Responder {
    async fn step(&mut self, ctx: &mut BehaviorContext) -> MeshResult<()> {
        let Some(envelope) = ctx.receive(self.timeout).await else {
            return Ok(());
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let metadata = Self::respond(ctx.address(), envelope.metadata());
        let request_id = metadata.get(keys::REQUEST_ID).cloned().unwrap_or_default();
        ctx.send(&self.aggregator, metadata)?;
        info!(actor = %ctx.address(), %request_id, "Processed request");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Schedule;
    use crate::envelope::meta;
    use crate::runtime::Runtime;
    use serde_json::json;

    #[test]
    fn test_respond_format() {
        let metadata = Responder::respond(
            &"r1@localhost".into(),
            &meta([("request", json!("job-1")), ("request_id", json!("7"))]),
        );
        assert_eq!(metadata["response"], json!("Processed by r1@localhost: job-1"));
        assert_eq!(metadata["request_id"], json!("7"));
        assert_eq!(metadata["responder"], json!("r1@localhost"));
    }

    #[test]
    fn test_respond_non_string_request() {
        let metadata = Responder::respond(&"r1".into(), &meta([("request", json!({"n": 1}))]));
        assert_eq!(metadata["response"], json!(r#"Processed by r1: {"n":1}"#));
        assert_eq!(metadata["request_id"], Value::Null);
    }

    #[tokio::test]
    async fn test_responds_to_aggregator() {
        let runtime = Runtime::default();
        let mut agg = runtime.actor("agg@localhost");
        agg.start().unwrap();
        let mut responder = runtime.actor("r1@localhost");
        responder
            .add_behavior(
                Responder::new(agg.address().clone(), Duration::from_millis(50)).with_delay(Duration::from_millis(5)),
                Schedule::Cyclic,
            )
            .unwrap();
        responder.start().unwrap();

        runtime
            .send(
                &"fwd@localhost".into(),
                responder.address(),
                meta([("request", "job"), ("request_id", "abc")]),
            )
            .unwrap();

        let env = agg.receive(Duration::from_secs(2)).await.unwrap();
        assert_eq!(env.sender().as_str(), "r1@localhost");
        assert_eq!(env.get_str("response"), Some("Processed by r1@localhost: job"));
        assert_eq!(env.get_str("request_id"), Some("abc"));

        responder.stop().await;
        agg.stop().await;
    }
}
