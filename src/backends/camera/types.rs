// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which physical camera is selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    /// User-facing camera (selected at startup)
    #[default]
    Front,
    /// World-facing camera
    Back,
}

impl CameraFacing {
    /// The other camera
    pub fn toggled(self) -> Self {
        match self {
            CameraFacing::Front => CameraFacing::Back,
            CameraFacing::Back => CameraFacing::Front,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CameraFacing::Front => "front",
            CameraFacing::Back => "back",
        }
    }
}

impl std::fmt::Display for CameraFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CameraFacing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" | "user" => Ok(CameraFacing::Front),
            "back" | "rear" | "environment" => Ok(CameraFacing::Back),
            other => Err(format!("unknown camera facing '{}' (expected front or back)", other)),
        }
    }
}

/// Flash behaviour for a single capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashPolicy {
    /// Never fire
    Off,
    /// Always fire
    On,
    /// Fire only when the scene is dark
    #[default]
    Auto,
}

impl std::fmt::Display for FlashPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlashPolicy::Off => write!(f, "off"),
            FlashPolicy::On => write!(f, "on"),
            FlashPolicy::Auto => write!(f, "auto"),
        }
    }
}

impl std::str::FromStr for FlashPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(FlashPolicy::Off),
            "on" => Ok(FlashPolicy::On),
            "auto" => Ok(FlashPolicy::Auto),
            other => Err(format!("unknown flash policy '{}' (expected off, on or auto)", other)),
        }
    }
}

/// Device information from V4L2 capability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Name of the device (V4L2 card)
    pub card: String,
    /// Driver name (V4L2 driver)
    pub driver: String,
    /// Device path (e.g., /dev/video0)
    pub path: String,
    /// Real device path (resolved symlinks)
    pub real_path: String,
}

/// A resolved camera device
///
/// Produced by [`CameraSource::find_device`](super::CameraSource::find_device)
/// and owned by the capture cycle until the facing changes or the pipeline stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub name: String,
    pub path: String,
    pub facing: CameraFacing,
    pub device_info: Option<DeviceInfo>,
}

/// One frame as handed over by the camera driver
#[derive(Debug, Clone)]
pub struct RawCapture {
    /// Encoded JPEG bytes; may be empty when `native_path` holds the image
    pub data: Vec<u8>,
    /// Scratch file written by the driver; the artifact store consumes it
    pub native_path: Option<PathBuf>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub flash_fired: bool,
    pub captured_at: DateTime<Local>,
}

impl RawCapture {
    /// Capture held entirely in memory
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            native_path: None,
            width: None,
            height: None,
            flash_fired: false,
            captured_at: Local::now(),
        }
    }

    /// Capture the driver already wrote to a scratch file
    pub fn from_native_path(path: impl Into<PathBuf>) -> Self {
        Self {
            data: Vec::new(),
            native_path: Some(path.into()),
            width: None,
            height: None,
            flash_fired: false,
            captured_at: Local::now(),
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_flash_fired(mut self, fired: bool) -> Self {
        self.flash_fired = fired;
        self
    }
}
