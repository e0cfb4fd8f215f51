//! Runtime - process-wide owner of the actor directory

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::config::RuntimeConfig;
use super::directory::Directory;
use crate::actor::Actor;
use crate::address::Address;
use crate::envelope::{Envelope, Metadata};
use crate::error::{MeshError, MeshResult};
use crate::mailbox::MailboxSender;

/// Delivery path for addresses that have no actor in this process
///
/// The runtime only consults a transport after a local lookup misses.
pub trait Transport: Send + Sync {
    /// Hand an envelope to the remote side. Must not block.
    fn deliver(&self, envelope: Envelope) -> MeshResult<()>;
}

/// An error returned by a behavior's step, as seen by the failure sink
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorFailure {
    pub actor: Address,
    pub behavior: String,
    pub error: MeshError,
}

struct RuntimeInner {
    config: RuntimeConfig,
    directory: Directory,
    failures: broadcast::Sender<BehaviorFailure>,
    transport: Option<Arc<dyn Transport>>,
}

/// Handle to the actor runtime
///
/// Cheap to clone. Every actor created from a runtime registers in its
/// directory on start and leaves it on stop; `send` only reaches actors
/// that are currently registered.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Create a new runtime with the given configuration
    pub fn new(config: RuntimeConfig) -> Self {
        debug!(?config, "Runtime::new: called");
        Self::build(config, None)
    }

    /// Create a runtime that forwards misses to a transport
    pub fn with_transport(config: RuntimeConfig, transport: Arc<dyn Transport>) -> Self {
        debug!(?config, "Runtime::with_transport: called");
        Self::build(config, Some(transport))
    }

    fn build(config: RuntimeConfig, transport: Option<Arc<dyn Transport>>) -> Self {
        let (failures, _) = broadcast::channel(config.failure_channel_capacity.max(1));
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                directory: Directory::new(),
                failures,
                transport,
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Create a new (not yet started) actor bound to this runtime
    pub fn actor(&self, address: impl Into<Address>) -> Actor {
        Actor::new(self.clone(), address.into())
    }

    /// Find the live mailbox for an address
    pub fn lookup(&self, address: &Address) -> Option<MailboxSender> {
        self.inner.directory.lookup(address)
    }

    /// True if an actor is currently registered under `address`
    pub fn is_live(&self, address: &Address) -> bool {
        self.lookup(address).is_some()
    }

    /// Addresses of all live actors, sorted
    pub fn addresses(&self) -> Vec<Address> {
        self.inner.directory.addresses()
    }

    /// Build an envelope and deliver it
    pub fn send(&self, from: &Address, to: &Address, metadata: Metadata) -> MeshResult<()> {
        debug!(%from, %to, "Runtime::send: called");
        self.deliver(Envelope::new(from.clone(), to.clone(), metadata))
    }

    /// Deliver an already addressed envelope
    ///
    /// Fails with `AddressNotFound` when the recipient is neither live here
    /// nor accepted by the transport. Never retries.
    pub fn deliver(&self, envelope: Envelope) -> MeshResult<()> {
        let recipient = envelope.recipient().clone();
        match self.lookup(&recipient) {
            Some(mailbox) => mailbox.deliver(envelope),
            None => match &self.inner.transport {
                Some(transport) => {
                    debug!(%recipient, "Runtime::deliver: handing off to transport");
                    transport.deliver(envelope)
                }
                None => {
                    debug!(%recipient, "Runtime::deliver: address not found");
                    Err(MeshError::AddressNotFound(recipient))
                }
            },
        }
    }

    /// Subscribe to behavior failures
    ///
    /// Only failures reported after subscribing are received.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<BehaviorFailure> {
        self.inner.failures.subscribe()
    }

    pub(crate) fn report_failure(&self, failure: BehaviorFailure) {
        warn!(
            actor = %failure.actor,
            behavior = %failure.behavior,
            error = %failure.error,
            "Behavior step failed"
        );
        // No subscribers is fine
        let _ = self.inner.failures.send(failure);
    }

    pub(crate) fn directory(&self) -> &Directory {
        &self.inner.directory
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::meta;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingTransport {
        seen: Mutex<Vec<Envelope>>,
    }

    impl Transport for RecordingTransport {
        fn deliver(&self, envelope: Envelope) -> MeshResult<()> {
            self.seen.lock().unwrap().push(envelope);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_send_to_unknown_address_fails() {
        let runtime = Runtime::default();
        let err = runtime
            .send(&"a@localhost".into(), &"ghost@localhost".into(), Metadata::new())
            .unwrap_err();
        assert_eq!(err, MeshError::AddressNotFound("ghost@localhost".into()));
    }

    #[tokio::test]
    async fn test_send_reaches_started_actor_only() {
        let runtime = Runtime::default();
        let mut actor = runtime.actor("b@localhost");

        // Not live until started
        assert!(runtime.send(&"a".into(), actor.address(), Metadata::new()).is_err());

        actor.start().unwrap();
        assert!(runtime.is_live(actor.address()));
        runtime
            .send(&"a".into(), actor.address(), meta([("content", "Hello World!")]))
            .unwrap();

        let env = actor.receive(Duration::from_millis(200)).await.unwrap();
        assert_eq!(env.sender().as_str(), "a");
        assert_eq!(env.get_str("content"), Some("Hello World!"));

        actor.stop().await;
        assert!(!runtime.is_live(actor.address()));
        assert!(runtime.send(&"a".into(), actor.address(), Metadata::new()).is_err());
    }

    #[tokio::test]
    async fn test_misses_go_to_transport() {
        let transport = Arc::new(RecordingTransport::default());
        let runtime = Runtime::with_transport(RuntimeConfig::default(), transport.clone());

        runtime
            .send(&"a@localhost".into(), &"remote@elsewhere".into(), meta([("k", "v")]))
            .unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].recipient().as_str(), "remote@elsewhere");
    }

    #[tokio::test]
    async fn test_failure_sink() {
        let runtime = Runtime::default();
        let mut failures = runtime.subscribe_failures();

        runtime.report_failure(BehaviorFailure {
            actor: "a".into(),
            behavior: "test".to_string(),
            error: MeshError::config("boom"),
        });

        let failure = failures.recv().await.unwrap();
        assert_eq!(failure.behavior, "test");
        assert!(failure.error.is_configuration());
    }
}
