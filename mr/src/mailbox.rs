//! Mailbox - per-actor FIFO inbox with timeout-bounded receive
//!
//! Enqueue goes through a [`MailboxSender`], which is cheap to clone and is
//! what the runtime directory hands out to senders. Dequeue is owned by the
//! actor's behaviors and suspends until an envelope arrives, the timeout
//! elapses, or the owning actor is stopped.

use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tracing::debug;

use crate::address::Address;
use crate::envelope::Envelope;
use crate::error::{MeshError, MeshResult};

/// Resolve once the stop flag is raised (or its sender is gone)
pub(crate) async fn stopped(mut stop: watch::Receiver<bool>) {
    loop {
        let raised = *stop.borrow_and_update();
        if raised {
            return;
        }
        if stop.changed().await.is_err() {
            return;
        }
    }
}

/// Unbounded FIFO inbox owned by a single actor
pub struct Mailbox {
    owner: Address,
    tx: mpsc::UnboundedSender<Envelope>,
    rx: Mutex<mpsc::UnboundedReceiver<Envelope>>,
    stop: watch::Receiver<bool>,
}

impl Mailbox {
    /// Create a mailbox for `owner`, bound to the owner's stop flag
    pub fn new(owner: Address, stop: watch::Receiver<bool>) -> Self {
        debug!(%owner, "Mailbox::new: called");
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            owner,
            tx,
            rx: Mutex::new(rx),
            stop,
        }
    }

    /// Address of the owning actor
    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// Get an enqueue handle for this mailbox
    pub fn sender(&self) -> MailboxSender {
        MailboxSender {
            owner: self.owner.clone(),
            tx: self.tx.clone(),
        }
    }

    /// True once the owning actor has been asked to stop
    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    pub(crate) fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop.clone()
    }

    /// Remove and return the oldest envelope, waiting up to `timeout`
    ///
    /// Returns `None` when nothing arrives in time or when the owner is
    /// stopped. Returns as soon as an envelope is available.
    pub async fn receive(&self, timeout: Duration) -> Option<Envelope> {
        debug!(owner = %self.owner, ?timeout, "Mailbox::receive: called");
        if self.is_stopped() {
            debug!(owner = %self.owner, "Mailbox::receive: owner stopped");
            return None;
        }

        let next = async {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        };

        tokio::select! {
            biased;
            _ = stopped(self.stop.clone()) => {
                debug!(owner = %self.owner, "Mailbox::receive: interrupted by stop");
                None
            }
            result = tokio::time::timeout(timeout, next) => match result {
                Ok(envelope) => envelope,
                Err(_) => {
                    debug!(owner = %self.owner, "Mailbox::receive: timed out");
                    None
                }
            }
        }
    }

    /// Take the oldest envelope if one is queued right now
    ///
    /// Returns `None` if the mailbox is empty or another behavior is
    /// currently receiving.
    pub fn try_receive(&self) -> Option<Envelope> {
        debug!(owner = %self.owner, "Mailbox::try_receive: called");
        let mut rx = self.rx.try_lock().ok()?;
        rx.try_recv().ok()
    }
}

/// Enqueue side of a mailbox
#[derive(Debug, Clone)]
pub struct MailboxSender {
    owner: Address,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl MailboxSender {
    /// Address of the mailbox owner
    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// Append an envelope; never blocks
    pub fn deliver(&self, envelope: Envelope) -> MeshResult<()> {
        debug!(owner = %self.owner, sender = %envelope.sender(), "MailboxSender::deliver: called");
        self.tx
            .send(envelope)
            .map_err(|_| MeshError::AddressNotFound(self.owner.clone()))
    }

    /// True if both handles feed the same mailbox
    pub fn same_mailbox(&self, other: &MailboxSender) -> bool {
        self.tx.same_channel(&other.tx)
    }
}
