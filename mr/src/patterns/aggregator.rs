//! Response aggregation with a size-triggered flush

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::actor::{Behavior, BehaviorContext};
use crate::envelope::{Envelope, keys};
use crate::error::{MeshError, MeshResult};

/// Batch size used by the reference balance setup
pub const DEFAULT_BATCH_THRESHOLD: usize = 5;

/// One aggregated response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub response: Value,
    pub request_id: Value,
    pub responder: Value,
    pub timestamp: DateTime<Utc>,
}

impl Response {
    /// Record the response carried by `envelope`, stamped with the current time
    pub fn from_envelope(envelope: &Envelope) -> Self {
        let field = |key| envelope.get(key).cloned().unwrap_or(Value::Null);
        Self {
            response: field(keys::RESPONSE),
            request_id: field(keys::REQUEST_ID),
            responder: field(keys::RESPONDER),
            timestamp: Utc::now(),
        }
    }
}

/// Arrival-ordered buffer that empties itself at the threshold
#[derive(Debug)]
pub struct AggregationBuffer {
    threshold: usize,
    records: Vec<Response>,
}

impl AggregationBuffer {
    pub fn new(threshold: usize) -> MeshResult<Self> {
        if threshold == 0 {
            return Err(MeshError::config("aggregation threshold must be positive"));
        }
        Ok(Self {
            threshold,
            records: Vec::new(),
        })
    }

    /// Append a record; returns the whole batch once the threshold is reached
    ///
    /// Duplicate request ids are kept.
    pub fn push(&mut self, record: Response) -> Option<Vec<Response>> {
        self.records.push(record);
        if self.records.len() >= self.threshold {
            Some(std::mem::take(&mut self.records))
        } else {
            None
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records waiting for the next flush
    pub fn pending(&self) -> &[Response] {
        &self.records
    }
}

/// Receives a flushed batch
pub type BatchHandler = Box<dyn FnMut(Vec<Response>) + Send>;

/// Cyclic behavior buffering responses and handing full batches to a handler
///
/// Records left in the buffer when the actor stops are dropped.
pub struct Aggregator {
    buffer: AggregationBuffer,
    handler: BatchHandler,
    timeout: Duration,
}

impl Aggregator {
    pub fn new(threshold: usize, timeout: Duration, handler: BatchHandler) -> MeshResult<Self> {
        debug!(%threshold, ?timeout, "Aggregator::new: called");
        Ok(Self {
            buffer: AggregationBuffer::new(threshold)?,
            handler,
            timeout,
        })
    }

    pub fn buffer(&self) -> &AggregationBuffer {
        &self.buffer
    }

    /// Buffer one response, flushing to the handler if the batch is full
    pub fn accept(&mut self, envelope: &Envelope) {
        let record = Response::from_envelope(envelope);
        debug!(responder = %record.responder, request_id = %record.request_id, "Aggregated response");
        if let Some(batch) = self.buffer.push(record) {
            info!(size = batch.len(), "Processing batch");
            (self.handler)(batch);
        }
    }
}

#[async_trait]
impl Behavior for Aggregator {
    async fn step(&mut self, ctx: &mut BehaviorContext) -> MeshResult<()> {
        if let Some(envelope) = ctx.receive(self.timeout).await {
            self.accept(&envelope);
        }
        Ok(())
    }

    async fn on_end(&mut self, _ctx: &mut BehaviorContext) {
        if !self.buffer.is_empty() {
            debug!(dropped = self.buffer.len(), "Aggregator::on_end: unflushed responses");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::meta;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn response(n: usize) -> Envelope {
        Envelope::new(
            "resp@localhost".into(),
            "agg@localhost".into(),
            meta([
                ("response", json!(format!("r{n}"))),
                ("request_id", json!(n)),
                ("responder", json!("resp@localhost")),
            ]),
        )
    }

    fn collecting(threshold: usize) -> (Aggregator, Arc<Mutex<Vec<Vec<Response>>>>) {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let sink = batches.clone();
        let agg = Aggregator::new(
            threshold,
            Duration::from_millis(10),
            Box::new(move |batch| sink.lock().unwrap().push(batch)),
        )
        .unwrap();
        (agg, batches)
    }

    #[test]
    fn test_zero_threshold_rejected() {
        assert!(AggregationBuffer::new(0).unwrap_err().is_configuration());
        assert!(Aggregator::new(0, Duration::from_secs(1), Box::new(|_| {})).is_err());
    }

    #[test]
    fn test_flush_scenario_r1_to_r6() {
        let (mut agg, batches) = collecting(DEFAULT_BATCH_THRESHOLD);
        for n in 1..=5 {
            agg.accept(&response(n));
        }
        {
            let batches = batches.lock().unwrap();
            assert_eq!(batches.len(), 1);
            let ids: Vec<&Value> = batches[0].iter().map(|r| &r.response).collect();
            assert_eq!(ids, vec!["r1", "r2", "r3", "r4", "r5"]);
        }
        assert!(agg.buffer().is_empty());

        agg.accept(&response(6));
        assert_eq!(agg.buffer().len(), 1);
        assert_eq!(agg.buffer().pending()[0].response, json!("r6"));
        assert_eq!(batches.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_huge_threshold_accepted() {
        let mut buffer = AggregationBuffer::new(usize::MAX).unwrap();
        assert_eq!(buffer.threshold(), usize::MAX);
        assert!(buffer.push(Response::from_envelope(&response(1))).is_none());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_record_serializes_with_timestamp_key() {
        let record = Response::from_envelope(&response(1));
        let value = serde_json::to_value(&record).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 4);
        for key in ["response", "request_id", "responder", "timestamp"] {
            assert!(keys.contains(&key), "missing {key}");
        }
    }

    #[test]
    fn test_no_dedup_by_request_id() {
        let mut buffer = AggregationBuffer::new(2).unwrap();
        let same = Response::from_envelope(&response(1));
        assert!(buffer.push(same.clone()).is_none());
        let batch = buffer.push(same).unwrap();
        assert_eq!(batch[0].request_id, batch[1].request_id);
    }

    #[test]
    fn test_missing_fields_are_null() {
        let env = Envelope::new("a".into(), "b".into(), meta([("response", "ok")]));
        let record = Response::from_envelope(&env);
        assert_eq!(record.response, json!("ok"));
        assert_eq!(record.request_id, Value::Null);
        assert_eq!(record.responder, Value::Null);
    }

    #[test]
    fn test_timestamps_in_arrival_order() {
        let mut buffer = AggregationBuffer::new(3).unwrap();
        buffer.push(Response::from_envelope(&response(1)));
        buffer.push(Response::from_envelope(&response(2)));
        let batch = buffer.push(Response::from_envelope(&response(3))).unwrap();
        assert!(batch.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
}
