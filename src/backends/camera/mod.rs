// SPDX-License-Identifier: MPL-2.0

//! Camera source abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   Capture cycle     │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  CameraSource Trait │  ← find_device / capture / release
//! └──────────┬──────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//!   ┌──────┐  ┌────────┐
//!   │ V4L2 │  │  File  │
//!   └──────┘  └────────┘
//! ```

pub mod file_source;
pub mod flash;
pub mod types;
#[cfg(target_os = "linux")]
pub mod v4l2;
#[cfg(target_os = "linux")]
pub mod v4l2_utils;

pub use file_source::FileCameraSource;
pub use types::*;
#[cfg(target_os = "linux")]
pub use v4l2::V4l2CameraSource;

use crate::errors::DeviceError;
use async_trait::async_trait;

/// Single-shot camera access
///
/// Implementations must be cheap to call repeatedly: the pipeline resolves a
/// device once per facing change and then captures on every cycle.
#[async_trait]
pub trait CameraSource: Send + Sync {
    /// Resolve the device for a facing, or `None` when no camera matches
    async fn find_device(&self, facing: CameraFacing) -> Option<CameraDevice>;

    /// Capture one frame from a previously resolved device
    ///
    /// Latency is bounded but unpredictable (warm-up, flash, driver I/O).
    async fn capture(
        &self,
        device: &CameraDevice,
        flash: FlashPolicy,
    ) -> Result<RawCapture, DeviceError>;

    /// Release any resources held for `device`
    ///
    /// Called when the facing changes and when the pipeline stops.
    fn release(&self, _device: &CameraDevice) {}

    /// List every device this source can serve
    async fn list_devices(&self) -> Vec<CameraDevice> {
        let mut devices = Vec::new();
        for facing in [CameraFacing::Front, CameraFacing::Back] {
            if let Some(device) = self.find_device(facing).await {
                devices.push(device);
            }
        }
        devices
    }
}
