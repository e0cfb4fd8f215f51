//! Round-robin request forwarding over a fixed worker pool

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::actor::{Behavior, BehaviorContext};
use crate::address::Address;
use crate::envelope::{Envelope, Metadata, keys};
use crate::error::{MeshError, MeshResult};

/// Rotating cursor over a non-empty worker list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundRobin {
    workers: Vec<Address>,
    next_index: usize,
}

impl RoundRobin {
    pub fn new(workers: Vec<Address>) -> MeshResult<Self> {
        Self::starting_at(workers, 0)
    }

    /// Start the rotation at `index` (taken modulo the worker count)
    pub fn starting_at(workers: Vec<Address>, index: usize) -> MeshResult<Self> {
        debug!(workers = workers.len(), %index, "RoundRobin::starting_at: called");
        if workers.is_empty() {
            return Err(MeshError::config("round-robin needs at least one worker"));
        }
        let next_index = index % workers.len();
        Ok(Self { workers, next_index })
    }

    /// Pick the current worker and advance the cursor
    pub fn next(&mut self) -> Address {
        let worker = self.workers[self.next_index].clone();
        self.next_index = (self.next_index + 1) % self.workers.len();
        worker
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn workers(&self) -> &[Address] {
        &self.workers
    }
}

/// Cyclic behavior forwarding each incoming request to the next worker
pub struct Forwarder {
    cursor: RoundRobin,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(workers: Vec<Address>, timeout: Duration) -> MeshResult<Self> {
        Ok(Self {
            cursor: RoundRobin::new(workers)?,
            timeout,
        })
    }

    pub fn cursor(&self) -> &RoundRobin {
        &self.cursor
    }

    /// Choose the target for `envelope` and build the forwarded metadata
    ///
    /// The cursor advances whether or not the caller manages to deliver.
    pub fn forward(&mut self, envelope: &Envelope) -> (Address, Metadata) {
        let worker = self.cursor.next();
        let request = envelope.get(keys::DATA).cloned().unwrap_or(Value::Null);
        let request_id = envelope
            .get(keys::REQUEST_ID)
            .or_else(|| envelope.get(keys::ID))
            .cloned()
            .unwrap_or_else(|| Value::from(Uuid::now_v7().to_string()));

        let mut metadata = Metadata::new();
        metadata.insert(keys::REQUEST.to_string(), request);
        metadata.insert(keys::REQUEST_ID.to_string(), request_id);
        (worker, metadata)
    }
}

#[async_trait]
impl Behavior for Forwarder {
    async fn step(&mut self, ctx: &mut BehaviorContext) -> MeshResult<()> {
        let Some(envelope) = ctx.receive(self.timeout).await else {
            return Ok(());
        };
        let (worker, metadata) = self.forward(&envelope);
        ctx.send(&worker, metadata)?;
        info!(from = %envelope.sender(), to = %worker, "Forwarded request");
        Ok(())
    }
}
