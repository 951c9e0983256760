// SPDX-License-Identifier: GPL-3.0-only

//! Fixed-interval scheduler with a single-flight guard
//!
//! The scheduler owns the [`CaptureCycle`] while idle. A tick moves it into a
//! freshly spawned cycle task, which hands it back when done. A tick that
//! finds the cycle gone is dropped, so cycles never overlap and never queue.

use super::Shared;
use super::cycle::{CaptureCycle, CycleOutcome};
use super::state::PipelineState;
use futures::future::OptionFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info};

type CycleTask = JoinHandle<(CaptureCycle, CycleOutcome)>;

/// Resolves once stop has been requested
async fn stop_requested(stop_rx: &mut watch::Receiver<bool>) {
    loop {
        if *stop_rx.borrow_and_update() {
            return;
        }
        if stop_rx.changed().await.is_err() {
            return;
        }
    }
}

/// Scheduler task body
///
/// Returns the cycle context, or `None` when a cycle task panicked and took
/// it down.
pub(super) async fn run(
    cycle: CaptureCycle,
    shared: Arc<Shared>,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) -> Option<CaptureCycle> {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(interval_ms = interval.as_millis() as u64, "Capture scheduler started");

    let mut idle = Some(cycle);

    let permission = Arc::clone(&shared.permission);
    let asked = tokio::select! {
        biased;
        _ = stop_requested(&mut stop_rx) => None,
        state = permission.request_if_needed() => Some(state),
    };
    match asked {
        Some(state) => shared.set_permission(state),
        None => {
            debug!("Stopped while waiting for camera permission");
            return finish(idle, None, &shared).await;
        }
    }

    let mut in_flight: Option<CycleTask> = None;

    loop {
        tokio::select! {
            biased;

            _ = stop_requested(&mut stop_rx) => {
                debug!("Stop requested");
                break;
            }

            joined = OptionFuture::from(in_flight.as_mut()), if in_flight.is_some() => {
                in_flight = None;
                match joined {
                    Some(Ok((cycle, outcome))) => {
                        shared.publish_outcome(&outcome);
                        idle = Some(cycle);
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Capture cycle task failed, scheduler cannot continue");
                        shared.set_state(PipelineState::Stopped);
                        return None;
                    }
                    None => {}
                }
            }

            _ = ticker.tick() => {
                match idle.take() {
                    Some(mut cycle) => {
                        let facing = shared.snapshot.borrow().facing;
                        shared.cycle_started();
                        let publisher = Arc::clone(&shared);
                        in_flight = Some(tokio::spawn(async move {
                            let outcome = cycle
                                .run(facing, |artifact| publisher.publish_preview(artifact))
                                .await;
                            (cycle, outcome)
                        }));
                    }
                    None => {
                        debug!("Tick dropped, cycle still in flight");
                        shared.tick_dropped();
                    }
                }
            }
        }
    }

    finish(idle, in_flight, &shared).await
}

/// Let the in-flight cycle complete, then release everything
async fn finish(
    mut idle: Option<CaptureCycle>,
    in_flight: Option<CycleTask>,
    shared: &Shared,
) -> Option<CaptureCycle> {
    if let Some(task) = in_flight {
        debug!("Waiting for in-flight cycle before stopping");
        match task.await {
            Ok((cycle, outcome)) => {
                shared.publish_outcome(&outcome);
                idle = Some(cycle);
            }
            Err(e) => error!(error = %e, "Capture cycle task failed during stop"),
        }
    }

    if let Some(cycle) = idle.as_mut() {
        cycle.shutdown().await;
    }

    shared.set_state(PipelineState::Stopped);
    info!("Capture scheduler stopped");
    idle
}
