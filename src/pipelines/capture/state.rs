// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline state, cycle results and the snapshot handed to presenters

use crate::backends::camera::CameraFacing;
use crate::backends::permission::PermissionState;
use crate::errors::{DeviceError, StorageError, UploadError};
use crate::remote::ServerResponse;
use crate::storage::Artifact;
use chrono::{DateTime, Local};
use std::fmt;

/// Lifecycle of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Stopped,
    /// Waiting for the next tick
    Idle,
    /// A cycle task owns the cycle context
    CycleInFlight,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Stopped => write!(f, "stopped"),
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::CycleInFlight => write!(f, "capturing"),
        }
    }
}

/// Why a cycle did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoPermission,
    NoDevice,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoPermission => write!(f, "no permission"),
            SkipReason::NoDevice => write!(f, "no camera device"),
        }
    }
}

/// A cycle that produced no new artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureFailure {
    Device(DeviceError),
    Storage(StorageError),
}

impl fmt::Display for CaptureFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureFailure::Device(e) => write!(f, "{}", e),
            CaptureFailure::Storage(e) => write!(f, "{}", e),
        }
    }
}

/// Outcome of one capture cycle
///
/// Only reported; it never changes the tick cadence.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleResult {
    Skipped(SkipReason),
    CaptureFailed(CaptureFailure),
    UploadFailed {
        artifact: Artifact,
        error: UploadError,
    },
    Success {
        artifact: Artifact,
        response: ServerResponse,
    },
}

impl CycleResult {
    /// Artifact persisted by this cycle, if any
    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            CycleResult::UploadFailed { artifact, .. } | CycleResult::Success { artifact, .. } => {
                Some(artifact)
            }
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CycleResult::Success { .. })
    }
}

impl fmt::Display for CycleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleResult::Skipped(reason) => write!(f, "skipped ({})", reason),
            CycleResult::CaptureFailed(e) => write!(f, "capture failed: {}", e),
            CycleResult::UploadFailed { error, .. } => write!(f, "upload failed: {}", error),
            CycleResult::Success { response, .. } => match response.is_intruder() {
                Some(true) => write!(f, "uploaded, intruder detected"),
                Some(false) => write!(f, "uploaded, no intruder"),
                None => write!(f, "uploaded (HTTP {})", response.status),
            },
        }
    }
}

/// What the pipeline knows about the camera for the current facing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceStatus {
    /// No cycle has resolved a device yet
    #[default]
    Unknown,
    Ready { name: String },
    NotFound(CameraFacing),
    Failed(DeviceError),
}

impl DeviceStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, DeviceStatus::Ready { .. })
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceStatus::Unknown => write!(f, "camera not resolved"),
            DeviceStatus::Ready { name } => write!(f, "{}", name),
            DeviceStatus::NotFound(facing) => write!(f, "no {} camera", facing),
            DeviceStatus::Failed(e) => write!(f, "{}", e),
        }
    }
}

/// Counters since the pipeline was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleStats {
    pub cycles_started: u64,
    pub cycles_completed: u64,
    pub successes: u64,
    pub skipped: u64,
    pub capture_failures: u64,
    pub upload_failures: u64,
    /// Ticks that arrived while a cycle was in flight
    pub dropped_ticks: u64,
}

impl CycleStats {
    pub fn record(&mut self, result: &CycleResult) {
        self.cycles_completed += 1;
        match result {
            CycleResult::Skipped(_) => self.skipped += 1,
            CycleResult::CaptureFailed(_) => self.capture_failures += 1,
            CycleResult::UploadFailed { .. } => self.upload_failures += 1,
            CycleResult::Success { .. } => self.successes += 1,
        }
    }
}

/// Read-only view of the pipeline for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSnapshot {
    pub state: PipelineState,
    pub permission: PermissionState,
    pub device_ready: bool,
    pub device_status: DeviceStatus,
    /// Facing the next cycle will use
    pub facing: CameraFacing,
    pub preview: Option<Artifact>,
    pub last_result: Option<CycleResult>,
    pub last_cycle_at: Option<DateTime<Local>>,
    pub stats: CycleStats,
}

impl PipelineSnapshot {
    pub fn new(facing: CameraFacing, permission: PermissionState) -> Self {
        Self {
            state: PipelineState::Stopped,
            permission,
            device_ready: false,
            device_status: DeviceStatus::Unknown,
            facing,
            preview: None,
            last_result: None,
            last_cycle_at: None,
            stats: CycleStats::default(),
        }
    }

    pub(crate) fn set_device_status(&mut self, status: DeviceStatus) {
        self.device_ready = status.is_ready();
        self.device_status = status;
    }
}
