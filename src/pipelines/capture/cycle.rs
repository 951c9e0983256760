// SPDX-License-Identifier: GPL-3.0-only

//! One capture cycle
//!
//! ```text
//! permission → device → capture → persist → preview → (eager cleanup)
//!            → upload → (deferred cleanup)
//! ```
//!
//! The new preview is handed out before any cleanup, so a presenter never
//! points at a file that retention already removed.
//!
//! Every failure is turned into a [`CycleResult`]; nothing here returns an
//! error to the scheduler.

use super::state::{CaptureFailure, CycleResult, DeviceStatus, SkipReason};
use crate::backends::camera::{CameraDevice, CameraFacing, CameraSource, FlashPolicy};
use crate::backends::permission::{PermissionGate, PermissionState};
use crate::remote::UploadClient;
use crate::storage::{Artifact, ArtifactStore, CleanupStage};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a finished cycle reports back to the scheduler
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub facing: CameraFacing,
    pub permission: PermissionState,
    pub result: CycleResult,
    /// `None` when the cycle never looked at the device
    pub device_status: Option<DeviceStatus>,
    pub preview: Option<Artifact>,
}

/// Everything a cycle needs, owned by exactly one task at a time
pub struct CaptureCycle {
    camera: Arc<dyn CameraSource>,
    store: ArtifactStore,
    uploader: UploadClient,
    permission: Arc<PermissionGate>,
    flash: FlashPolicy,
    /// Device resolved for the facing of the previous cycle
    device: Option<CameraDevice>,
}

impl CaptureCycle {
    pub fn new(
        camera: Arc<dyn CameraSource>,
        store: ArtifactStore,
        uploader: UploadClient,
        permission: Arc<PermissionGate>,
        flash: FlashPolicy,
    ) -> Self {
        Self {
            camera,
            store,
            uploader,
            permission,
            flash,
            device: None,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn permission(&self) -> &Arc<PermissionGate> {
        &self.permission
    }

    /// Device currently held, if any
    pub fn device(&self) -> Option<&CameraDevice> {
        self.device.as_ref()
    }

    /// Run one cycle for `facing`
    ///
    /// `on_preview` receives the new artifact as soon as it is on disk.
    pub async fn run<F>(&mut self, facing: CameraFacing, mut on_preview: F) -> CycleOutcome
    where
        F: FnMut(&Artifact) + Send,
    {
        let permission = self.permission.current_state();
        let mut outcome = CycleOutcome {
            facing,
            permission,
            result: CycleResult::Skipped(SkipReason::NoPermission),
            device_status: None,
            preview: self.store.current_preview().cloned(),
        };

        if !permission.is_granted() {
            debug!(%permission, "Skipping cycle without camera permission");
            return outcome;
        }

        let Some(device) = self.resolve_device(facing).await else {
            info!(%facing, "No camera device for facing, skipping cycle");
            outcome.result = CycleResult::Skipped(SkipReason::NoDevice);
            outcome.device_status = Some(DeviceStatus::NotFound(facing));
            return outcome;
        };
        outcome.device_status = Some(DeviceStatus::Ready {
            name: device.name.clone(),
        });

        let raw = match self.camera.capture(&device, self.flash).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(device = %device.name, error = %e, "Capture failed");
                if e.invalidates_device() {
                    self.release_device();
                }
                outcome.device_status = Some(DeviceStatus::Failed(e.clone()));
                outcome.result = CycleResult::CaptureFailed(CaptureFailure::Device(e));
                return outcome;
            }
        };
        let flash_fired = raw.flash_fired;

        let artifact = match self.store.persist(raw).await {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(error = %e, "Failed to persist capture");
                outcome.result = CycleResult::CaptureFailed(CaptureFailure::Storage(e));
                return outcome;
            }
        };
        debug!(path = %artifact.path.display(), flash_fired, "Capture persisted");
        outcome.preview = Some(artifact.clone());
        on_preview(&artifact);
        self.store.cleanup(CleanupStage::AfterPersist).await;

        outcome.result = match self.uploader.submit(&artifact).await {
            Ok(response) => CycleResult::Success {
                artifact: artifact.clone(),
                response,
            },
            Err(error) => {
                warn!(path = %artifact.path.display(), error = %error, "Upload failed");
                CycleResult::UploadFailed {
                    artifact: artifact.clone(),
                    error,
                }
            }
        };

        self.store.cleanup(CleanupStage::AfterUpload).await;
        outcome
    }

    /// Cached device for `facing`, resolving it when the facing changed
    async fn resolve_device(&mut self, facing: CameraFacing) -> Option<CameraDevice> {
        if self.device.as_ref().is_some_and(|d| d.facing != facing) {
            debug!(%facing, "Facing changed, re-resolving camera");
            self.release_device();
        }

        if self.device.is_none() {
            self.device = self.camera.find_device(facing).await;
            if let Some(device) = &self.device {
                info!(%facing, name = %device.name, path = %device.path, "Camera resolved");
            }
        }

        self.device.clone()
    }

    /// Release the held device
    pub fn release_device(&mut self) {
        if let Some(device) = self.device.take() {
            self.camera.release(&device);
        }
    }

    /// Release the device and flush pending retention deletes
    pub async fn shutdown(&mut self) {
        self.release_device();
        self.store.reconcile().await;
    }
}

impl std::fmt::Debug for CaptureCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureCycle")
            .field("store", &self.store)
            .field("uploader", &self.uploader)
            .field("flash", &self.flash)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}
