//! Actor runtime
//!
//! The runtime is the explicit, process-wide home of the address directory.
//! It is created once by the host, hands out [`Actor`](crate::actor::Actor)s,
//! and delivers envelopes by looking up the recipient's live mailbox.

mod config;
mod core;
mod directory;

pub use config::RuntimeConfig;
pub use self::core::{BehaviorFailure, Runtime, Transport};
pub use directory::Directory;
