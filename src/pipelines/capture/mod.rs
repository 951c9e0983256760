// SPDX-License-Identifier: GPL-3.0-only

//! Periodic capture-and-upload pipeline
//!
//! ```text
//! tick → permission → capture → persist/rotate → upload → reconcile
//! ```
//!
//! # States
//!
//! ```text
//!            start                tick
//! Stopped ──────────▶ Idle ──────────────▶ CycleInFlight
//!    ▲                  ▲                       │
//!    │                  └───── cycle done ──────┘
//!    └────── stop (after the in-flight cycle) ──┘
//! ```
//!
//! Ticks that arrive while a cycle is in flight are dropped. Stop prevents any
//! further cycle immediately, lets the running one finish, then releases the
//! camera. The presentation layer only ever sees [`PipelineSnapshot`]s.

pub mod cycle;
mod scheduler;
pub mod state;

pub use cycle::{CaptureCycle, CycleOutcome};
pub use state::{
    CaptureFailure, CycleResult, CycleStats, DeviceStatus, PipelineSnapshot, PipelineState,
    SkipReason,
};

use crate::backends::camera::CameraFacing;
use crate::backends::permission::{PermissionGate, PermissionState};
use crate::errors::PipelineError;
use crate::storage::Artifact;
use chrono::Local;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// State shared between the pipeline, its handles and the scheduler task
struct Shared {
    snapshot: watch::Sender<PipelineSnapshot>,
    stop: watch::Sender<bool>,
    permission: Arc<PermissionGate>,
}

impl Shared {
    fn set_state(&self, state: PipelineState) {
        self.snapshot.send_if_modified(|s| {
            let changed = s.state != state;
            s.state = state;
            changed
        });
    }

    fn set_permission(&self, permission: PermissionState) {
        self.snapshot.send_if_modified(|s| {
            let changed = s.permission != permission;
            s.permission = permission;
            changed
        });
    }

    fn cycle_started(&self) {
        self.snapshot.send_modify(|s| {
            s.state = PipelineState::CycleInFlight;
            s.stats.cycles_started += 1;
        });
    }

    fn tick_dropped(&self) {
        self.snapshot.send_modify(|s| s.stats.dropped_ticks += 1);
    }

    /// Show a freshly persisted artifact while its cycle is still running
    fn publish_preview(&self, artifact: &Artifact) {
        self.snapshot.send_modify(|s| s.preview = Some(artifact.clone()));
    }

    fn publish_outcome(&self, outcome: &CycleOutcome) {
        info!(facing = %outcome.facing, result = %outcome.result, "Capture cycle finished");

        self.snapshot.send_modify(|s| {
            s.state = PipelineState::Idle;
            s.permission = outcome.permission;
            // A cycle that ran before a facing change says nothing about the new camera
            if let Some(status) = &outcome.device_status {
                if s.facing == outcome.facing {
                    s.set_device_status(status.clone());
                }
            }
            s.preview = outcome.preview.clone();
            s.stats.record(&outcome.result);
            s.last_result = Some(outcome.result.clone());
            s.last_cycle_at = Some(Local::now());
        });
    }

    fn set_facing(&self, facing: CameraFacing) {
        self.snapshot.send_if_modified(|s| {
            if s.facing == facing {
                return false;
            }
            s.facing = facing;
            // The held device belongs to the old facing
            s.device_ready = false;
            s.device_status = DeviceStatus::Unknown;
            true
        });
    }
}

/// Cloneable control surface for presenters
#[derive(Clone)]
pub struct PipelineHandle {
    shared: Arc<Shared>,
}

impl PipelineHandle {
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Receive a new snapshot on every change
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.shared.snapshot.subscribe()
    }

    pub fn state(&self) -> PipelineState {
        self.shared.snapshot.borrow().state
    }

    pub fn facing(&self) -> CameraFacing {
        self.shared.snapshot.borrow().facing
    }

    /// Select the camera for the next cycle
    ///
    /// An in-flight cycle keeps the device it started with.
    pub fn set_facing(&self, facing: CameraFacing) {
        info!(%facing, "Camera facing selected");
        self.shared.set_facing(facing);
    }

    pub fn toggle_facing(&self) -> CameraFacing {
        let facing = self.facing().toggled();
        self.set_facing(facing);
        facing
    }

    /// Ask for camera access again after a denial
    pub async fn retry_permission(&self) -> PermissionState {
        let state = self.shared.permission.retry().await;
        self.shared.set_permission(state);
        state
    }

    /// Stop scheduling new cycles without waiting
    ///
    /// [`CapturePipeline::stop`] also waits for the in-flight cycle.
    pub fn request_stop(&self) {
        self.shared.stop.send_replace(true);
    }
}

impl std::fmt::Debug for PipelineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Owner of the capture cycle and its scheduler
pub struct CapturePipeline {
    shared: Arc<Shared>,
    /// Present while stopped
    cycle: Option<CaptureCycle>,
    scheduler: Option<JoinHandle<Option<CaptureCycle>>>,
}

impl CapturePipeline {
    pub fn new(cycle: CaptureCycle, facing: CameraFacing) -> Self {
        let permission = Arc::clone(cycle.permission());
        let mut snapshot = PipelineSnapshot::new(facing, permission.current_state());
        snapshot.preview = cycle.store().current_preview().cloned();

        let (snapshot, _) = watch::channel(snapshot);
        let (stop, _) = watch::channel(false);

        Self {
            shared: Arc::new(Shared {
                snapshot,
                stop,
                permission,
            }),
            cycle: Some(cycle),
            scheduler: None,
        }
    }

    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Begin ticking every `interval`, first tick one interval from now
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, interval: Duration) -> Result<(), PipelineError> {
        if interval.is_zero() {
            return Err(PipelineError::InvalidInterval);
        }
        self.reclaim()?;

        let cycle = self.cycle.take().ok_or(PipelineError::Unavailable)?;
        self.shared.stop.send_replace(false);
        let stop_rx = self.shared.stop.subscribe();
        self.shared.set_state(PipelineState::Idle);

        self.scheduler = Some(tokio::spawn(scheduler::run(
            cycle,
            Arc::clone(&self.shared),
            interval,
            stop_rx,
        )));
        Ok(())
    }

    /// Stop ticking, wait for the in-flight cycle, release the camera
    ///
    /// Stopping a stopped pipeline does nothing.
    pub async fn stop(&mut self) -> Result<(), PipelineError> {
        self.shared.stop.send_replace(true);

        let Some(task) = self.scheduler.take() else {
            return Ok(());
        };

        match task.await {
            Ok(Some(cycle)) => {
                self.cycle = Some(cycle);
                Ok(())
            }
            Ok(None) => Err(PipelineError::Unavailable),
            Err(e) => {
                warn!(error = %e, "Capture scheduler task failed");
                self.shared.set_state(PipelineState::Stopped);
                Err(PipelineError::Unavailable)
            }
        }
    }

    /// Run a single cycle right away, outside the scheduler
    ///
    /// Requests permission first if it was never asked. Only valid while
    /// stopped.
    pub async fn run_once(&mut self) -> Result<CycleResult, PipelineError> {
        self.reclaim()?;
        let cycle = self.cycle.as_mut().ok_or(PipelineError::Unavailable)?;

        let permission = self.shared.permission.request_if_needed().await;
        self.shared.set_permission(permission);

        let facing = self.shared.snapshot.borrow().facing;
        self.shared.cycle_started();
        let shared = Arc::clone(&self.shared);
        let outcome = cycle
            .run(facing, |artifact| shared.publish_preview(artifact))
            .await;
        cycle.shutdown().await;

        self.shared.publish_outcome(&outcome);
        self.shared.set_state(PipelineState::Stopped);
        Ok(outcome.result)
    }

    /// Take the cycle back from a scheduler that already exited
    fn reclaim(&mut self) -> Result<(), PipelineError> {
        let Some(task) = self.scheduler.take() else {
            return Ok(());
        };
        if !task.is_finished() {
            self.scheduler = Some(task);
            return Err(PipelineError::AlreadyRunning);
        }

        match task.now_or_never() {
            Some(Ok(Some(cycle))) => {
                self.cycle = Some(cycle);
                Ok(())
            }
            _ => Err(PipelineError::Unavailable),
        }
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.handle().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.shared.snapshot.subscribe()
    }

    pub fn state(&self) -> PipelineState {
        self.shared.snapshot.borrow().state
    }

    pub fn set_facing(&self, facing: CameraFacing) {
        self.handle().set_facing(facing);
    }

    pub fn toggle_facing(&self) -> CameraFacing {
        self.handle().toggle_facing()
    }

    pub async fn retry_permission(&self) -> PermissionState {
        self.handle().retry_permission().await
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        // Dropping without stop() still prevents further cycles
        self.shared.stop.send_replace(true);
    }
}

impl std::fmt::Debug for CapturePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturePipeline")
            .field("state", &self.state())
            .field("running", &self.is_running())
            .field("cycle", &self.cycle)
            .finish()
    }
}
