//! Actors and the behaviors they host

#[allow(clippy::module_inception)]
mod actor;
mod behavior;
mod context;
mod scheduler;

pub use actor::{Actor, ActorState, BehaviorHandle};
pub use behavior::{Behavior, BehaviorState, Schedule};
pub use context::BehaviorContext;
