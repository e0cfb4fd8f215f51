//! BehaviorContext - what a running behavior can see and do

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::address::Address;
use crate::envelope::{Envelope, Metadata};
use crate::error::MeshResult;
use crate::mailbox::Mailbox;
use crate::runtime::Runtime;

/// Per-behavior view of the owning actor
///
/// Gives access to the actor's own mailbox (receive) and to the runtime
/// (send). Each behavior gets its own context.
pub struct BehaviorContext {
    runtime: Runtime,
    mailbox: Arc<Mailbox>,
    finished: bool,
}

impl BehaviorContext {
    pub(crate) fn new(runtime: Runtime, mailbox: Arc<Mailbox>) -> Self {
        Self {
            runtime,
            mailbox,
            finished: false,
        }
    }

    /// Address of the owning actor
    pub fn address(&self) -> &Address {
        self.mailbox.owner()
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Receive from the owning actor's mailbox
    ///
    /// `None` means no envelope arrived in time, or the actor is stopping.
    pub async fn receive(&self, timeout: Duration) -> Option<Envelope> {
        self.mailbox.receive(timeout).await
    }

    /// Send metadata to `to`, with this actor as the sender
    pub fn send(&self, to: &Address, metadata: Metadata) -> MeshResult<()> {
        self.runtime.send(self.address(), to, metadata)
    }

    /// Ask the scheduler not to run this behavior again
    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// True once the owning actor has been asked to stop
    pub fn is_stopping(&self) -> bool {
        self.mailbox.is_stopped()
    }

    pub(crate) fn stop_signal(&self) -> watch::Receiver<bool> {
        self.mailbox.stop_signal()
    }
}
