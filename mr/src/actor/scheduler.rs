//! Per-behavior scheduling loop

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::behavior::{Behavior, BehaviorState, Schedule};
use super::context::BehaviorContext;
use crate::error::{MeshError, MeshResult};
use crate::mailbox::stopped;
use crate::runtime::BehaviorFailure;

enum Outcome {
    Done,
    Failed(MeshError),
    Panicked,
}

async fn guarded<F>(fut: F) -> Outcome
where
    F: Future<Output = MeshResult<()>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(())) => Outcome::Done,
        Ok(Err(e)) => Outcome::Failed(e),
        Err(_) => Outcome::Panicked,
    }
}

fn report(ctx: &BehaviorContext, name: &str, error: MeshError) {
    ctx.runtime().report_failure(BehaviorFailure {
        actor: ctx.address().clone(),
        behavior: name.to_string(),
        error,
    });
}

/// Run one behavior until it terminates
///
/// Errors from a step are reported and the next cycle proceeds. A panic
/// terminates only this behavior. A panic in `on_end` is reported too.
pub(crate) async fn drive(
    mut behavior: Box<dyn Behavior>,
    schedule: Schedule,
    mut ctx: BehaviorContext,
    state: watch::Sender<BehaviorState>,
) {
    let name = behavior.name().to_string();
    debug!(actor = %ctx.address(), behavior = %name, ?schedule, "drive: called");
    state.send_replace(BehaviorState::Scheduled);

    if ctx.is_stopping() {
        debug!(behavior = %name, "drive: actor stopped before first run");
        state.send_replace(BehaviorState::Terminated);
        return;
    }

    match guarded(behavior.on_start(&mut ctx)).await {
        Outcome::Done => {}
        Outcome::Failed(e) => report(&ctx, &name, e),
        Outcome::Panicked => {
            report(&ctx, &name, MeshError::BehaviorPanicked(name.clone()));
            state.send_replace(BehaviorState::Terminated);
            return;
        }
    }

    let mut ticker = match schedule {
        Schedule::Periodic(period) => {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some(interval)
        }
        Schedule::OneShot | Schedule::Cyclic => None,
    };

    let mut panicked = false;
    loop {
        if ctx.is_stopping() || ctx.is_finished() {
            break;
        }

        if let Some(ticker) = ticker.as_mut() {
            tokio::select! {
                biased;
                _ = stopped(ctx.stop_signal()) => break,
                _ = ticker.tick() => {}
            }
        }

        state.send_replace(BehaviorState::Running);
        match guarded(behavior.step(&mut ctx)).await {
            Outcome::Done => {}
            Outcome::Failed(e) => report(&ctx, &name, e),
            Outcome::Panicked => {
                report(&ctx, &name, MeshError::BehaviorPanicked(name.clone()));
                panicked = true;
                break;
            }
        }

        match schedule {
            Schedule::OneShot => break,
            Schedule::Cyclic => {
                state.send_replace(BehaviorState::Scheduled);
                tokio::task::yield_now().await;
            }
            Schedule::Periodic(_) => {
                state.send_replace(BehaviorState::Scheduled);
            }
        }
    }

    if !panicked && AssertUnwindSafe(behavior.on_end(&mut ctx)).catch_unwind().await.is_err() {
        report(&ctx, &name, MeshError::BehaviorPanicked(name.clone()));
    }
    state.send_replace(BehaviorState::Terminated);
    info!(actor = %ctx.address(), behavior = %name, "Behavior terminated");
}
