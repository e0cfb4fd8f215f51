//! Actor - named unit of execution owning one mailbox and its behaviors

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::behavior::{Behavior, BehaviorState, Schedule};
use super::context::BehaviorContext;
use super::scheduler;
use crate::address::Address;
use crate::envelope::{Envelope, Metadata};
use crate::error::{MeshError, MeshResult};
use crate::mailbox::Mailbox;
use crate::runtime::Runtime;

/// Actor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    Created,
    Running,
    Stopped,
}

/// Observer for one behavior added to an actor
#[derive(Debug, Clone)]
pub struct BehaviorHandle {
    name: String,
    schedule: Schedule,
    state: watch::Receiver<BehaviorState>,
}

impl BehaviorHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Current lifecycle state
    pub fn state(&self) -> BehaviorState {
        *self.state.borrow()
    }

    /// Wait until `on_start` has completed (or the behavior is gone)
    pub async fn started(&self) {
        self.wait_for(|s| matches!(s, BehaviorState::Running | BehaviorState::Terminated))
            .await
    }

    /// Wait until the behavior is terminated
    pub async fn terminated(&self) {
        self.wait_for(|s| s == BehaviorState::Terminated).await
    }

    async fn wait_for(&self, done: impl Fn(BehaviorState) -> bool) {
        let mut rx = self.state.clone();
        loop {
            let current = *rx.borrow_and_update();
            if done(current) {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

struct PendingBehavior {
    behavior: Box<dyn Behavior>,
    schedule: Schedule,
    state: watch::Sender<BehaviorState>,
}

/// An actor and its behaviors
///
/// Created through [`Runtime::actor`]. Behaviors added before `start` are
/// scheduled when the actor starts; behaviors added while running are
/// scheduled immediately. The actor is reachable by `send` only between
/// `start` and `stop`.
pub struct Actor {
    address: Address,
    runtime: Runtime,
    mailbox: Arc<Mailbox>,
    stop_tx: watch::Sender<bool>,
    state: ActorState,
    pending: Vec<PendingBehavior>,
    tasks: Vec<JoinHandle<()>>,
    behaviors: Vec<BehaviorHandle>,
}

impl Actor {
    pub(crate) fn new(runtime: Runtime, address: Address) -> Self {
        debug!(%address, "Actor::new: called");
        let (stop_tx, stop_rx) = watch::channel(false);
        let mailbox = Arc::new(Mailbox::new(address.clone(), stop_rx));
        Self {
            address,
            runtime,
            mailbox,
            stop_tx,
            state: ActorState::Created,
            pending: Vec::new(),
            tasks: Vec::new(),
            behaviors: Vec::new(),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn state(&self) -> ActorState {
        self.state
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Handles for every behavior added so far, in insertion order
    pub fn behaviors(&self) -> &[BehaviorHandle] {
        &self.behaviors
    }

    /// Add a behavior with the given scheduling policy
    ///
    /// Fails with `Configuration` for a zero period and with `ActorStopped`
    /// once the actor has been stopped.
    pub fn add_behavior<B>(&mut self, behavior: B, schedule: Schedule) -> MeshResult<BehaviorHandle>
    where
        B: Behavior + 'static,
    {
        debug!(address = %self.address, behavior = %behavior.name(), ?schedule, "Actor::add_behavior: called");
        if let Schedule::Periodic(period) = schedule
            && period.is_zero()
        {
            return Err(MeshError::config(format!(
                "periodic behavior '{}' needs a non-zero period",
                behavior.name()
            )));
        }
        if self.state == ActorState::Stopped {
            return Err(MeshError::ActorStopped(self.address.clone()));
        }

        let (state_tx, state_rx) = watch::channel(BehaviorState::Created);
        let handle = BehaviorHandle {
            name: behavior.name().to_string(),
            schedule,
            state: state_rx,
        };
        let pending = PendingBehavior {
            behavior: Box::new(behavior),
            schedule,
            state: state_tx,
        };

        if self.state == ActorState::Running {
            self.spawn(pending);
        } else {
            self.pending.push(pending);
        }
        self.behaviors.push(handle.clone());
        Ok(handle)
    }

    /// Register in the runtime directory and schedule pending behaviors
    pub fn start(&mut self) -> MeshResult<()> {
        debug!(address = %self.address, state = ?self.state, "Actor::start: called");
        match self.state {
            ActorState::Running => return Ok(()),
            ActorState::Stopped => return Err(MeshError::ActorStopped(self.address.clone())),
            ActorState::Created => {}
        }

        self.runtime.directory().register(self.mailbox.sender())?;
        self.state = ActorState::Running;
        info!(address = %self.address, behaviors = self.pending.len(), "Actor started");

        for pending in std::mem::take(&mut self.pending) {
            self.spawn(pending);
        }
        Ok(())
    }

    fn spawn(&mut self, pending: PendingBehavior) {
        let ctx = BehaviorContext::new(self.runtime.clone(), self.mailbox.clone());
        let task = tokio::spawn(scheduler::drive(pending.behavior, pending.schedule, ctx, pending.state));
        self.tasks.push(task);
    }

    /// Stop the actor and wait for its behaviors to terminate
    ///
    /// The actor leaves the directory first, then pending receives return
    /// empty and no further step is started. Calling stop twice is a no-op.
    pub async fn stop(&mut self) {
        debug!(address = %self.address, state = ?self.state, "Actor::stop: called");
        if self.state == ActorState::Stopped {
            return;
        }
        if self.state == ActorState::Running {
            self.runtime.directory().deregister(&self.mailbox.sender());
        }
        self.stop_tx.send_replace(true);
        self.state = ActorState::Stopped;

        for pending in self.pending.drain(..) {
            pending.state.send_replace(BehaviorState::Terminated);
        }

        let tasks = std::mem::take(&mut self.tasks);
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                warn!(address = %self.address, error = %e, "Behavior task ended abnormally");
            }
        }
        info!(address = %self.address, "Actor stopped");
    }

    /// Wait until every behavior added so far has terminated
    pub async fn join_behaviors(&self) {
        futures::future::join_all(self.behaviors.iter().map(BehaviorHandle::terminated)).await;
    }

    /// Send from this actor to `to`
    pub fn send(&self, to: &Address, metadata: Metadata) -> MeshResult<()> {
        self.runtime.send(&self.address, to, metadata)
    }

    /// Receive from this actor's own mailbox
    ///
    /// Meant for external drivers; competes with the actor's own behaviors.
    pub async fn receive(&self, timeout: Duration) -> Option<Envelope> {
        self.mailbox.receive(timeout).await
    }
}

impl Drop for Actor {
    fn drop(&mut self) {
        if self.state == ActorState::Running {
            debug!(address = %self.address, "Actor::drop: stopping running actor");
            self.runtime.directory().deregister(&self.mailbox.sender());
            self.stop_tx.send_replace(true);
        }
    }
}
