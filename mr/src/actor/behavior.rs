//! Behavior trait and scheduling policies

use std::time::Duration;

use async_trait::async_trait;

use super::context::BehaviorContext;
use crate::error::MeshResult;

/// How the scheduler re-runs a behavior's step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Step runs exactly once
    OneShot,
    /// Step runs back-to-back until the actor stops
    Cyclic,
    /// Step starts at most once per period; an overrun starts the next step
    /// right away without catching up on missed ticks
    Periodic(Duration),
}

/// Lifecycle of a scheduled behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorState {
    Created,
    Scheduled,
    Running,
    Terminated,
}

/// A unit of control logic hosted by an actor
///
/// `step` does one bounded unit of work (usually one receive plus the
/// reaction to it) and returns. Repetition belongs to the scheduler.
#[async_trait]
pub trait Behavior: Send {
    /// Name used in logs and failure reports
    fn name(&self) -> &str {
        std::any::type_name::<Self>().rsplit("::").next().unwrap_or_default()
    }

    /// Runs once before the first step
    async fn on_start(&mut self, _ctx: &mut BehaviorContext) -> MeshResult<()> {
        Ok(())
    }

    /// One unit of work
    async fn step(&mut self, ctx: &mut BehaviorContext) -> MeshResult<()>;

    /// Runs once after the last step
    async fn on_end(&mut self, _ctx: &mut BehaviorContext) {}
}
