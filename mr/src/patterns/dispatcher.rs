//! One-shot dispatch of a fixed set of envelopes

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::actor::{Behavior, BehaviorContext};
use crate::address::Address;
use crate::envelope::Metadata;
use crate::error::{MeshError, MeshResult};

/// Sends every queued envelope once, then is done
///
/// Meant to be scheduled as `Schedule::OneShot`. Every recipient is tried
/// even if an earlier one is not live.
pub struct Dispatcher {
    outbox: Vec<(Address, Metadata)>,
}

impl Dispatcher {
    pub fn new(outbox: Vec<(Address, Metadata)>) -> Self {
        debug!(envelopes = outbox.len(), "Dispatcher::new: called");
        Self { outbox }
    }

    /// Send the same metadata to each recipient
    pub fn broadcast(recipients: &[Address], metadata: Metadata) -> Self {
        Self::new(recipients.iter().map(|to| (to.clone(), metadata.clone())).collect())
    }
}

#[async_trait]
impl Behavior for Dispatcher {
    async fn step(&mut self, ctx: &mut BehaviorContext) -> MeshResult<()> {
        let mut failed = Vec::new();
        for (to, metadata) in std::mem::take(&mut self.outbox) {
            match ctx.send(&to, metadata) {
                Ok(()) => info!(from = %ctx.address(), %to, "Dispatched"),
                Err(e) => {
                    warn!(%to, error = %e, "Dispatch failed");
                    failed.push(to);
                }
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(MeshError::Undeliverable {
                failed,
                reason: "recipient not live".to_string(),
            })
        }
    }
}
