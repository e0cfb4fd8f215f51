//! Mailroom - in-process actor mailboxes and routing patterns
//!
//! Actors own one mailbox each and host behaviors that are scheduled as
//! one-shot, cyclic or periodic tasks. Actors talk only by sending
//! [`Envelope`]s through a [`Runtime`], which keeps the directory of live
//! addresses.
//!
//! # Modules
//!
//! - [`actor`] - Actors, behaviors and their scheduling
//! - [`mailbox`] - Per-actor FIFO inbox with timeout-bounded receive
//! - [`runtime`] - Address directory, delivery and failure reporting
//! - [`patterns`] - Broker, Forwarder, Aggregator and demo participants
//! - [`demo`] - Demo setups wired from configuration
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod actor;
pub mod address;
pub mod cli;
pub mod config;
pub mod demo;
pub mod envelope;
pub mod error;
pub mod mailbox;
pub mod patterns;
pub mod runtime;

// Re-export commonly used types
pub use actor::{Actor, ActorState, Behavior, BehaviorContext, BehaviorHandle, BehaviorState, Schedule};
pub use address::Address;
pub use config::Config;
pub use envelope::{Envelope, Metadata, meta};
pub use error::{MeshError, MeshResult};
pub use mailbox::{Mailbox, MailboxSender};
pub use patterns::{
    AggregationBuffer, Aggregator, Broker, Dispatcher, Forwarder, Listener, Publisher, Responder, Response,
    RoundRobin, Subscriber, SubscriptionRegistry,
};
pub use runtime::{BehaviorFailure, Runtime, RuntimeConfig, Transport};
