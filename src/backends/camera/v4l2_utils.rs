// SPDX-License-Identifier: GPL-3.0-only

//! Shared V4L2 utility functions
//!
//! Device enumeration and capability probing used by the V4L2 camera source
//! and the `devices` CLI command.

use super::types::DeviceInfo;
use std::path::Path;
use tracing::debug;
use v4l::FourCC;
use v4l::prelude::*;
use v4l::video::Capture;

/// FourCC of the only pixel format the daemon captures in
pub fn mjpeg() -> FourCC {
    FourCC::new(b"MJPG")
}

/// Build DeviceInfo from a V4L2 device node
///
/// Resolves symlinks (udev `by-id` paths) and queries the driver via
/// `VIDIOC_QUERYCAP`. Returns `None` when the node cannot be opened.
pub fn build_device_info(v4l2_path: &str) -> Option<DeviceInfo> {
    let dev = Device::with_path(v4l2_path).ok()?;
    let caps = dev.query_caps().ok()?;

    let real_path = std::fs::canonicalize(v4l2_path)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| v4l2_path.to_string());

    debug!(path = v4l2_path, driver = %caps.driver, card = %caps.card, "Queried V4L2 device");

    Some(DeviceInfo {
        card: caps.card,
        driver: caps.driver,
        path: v4l2_path.to_string(),
        real_path,
    })
}

/// Whether the node can deliver MJPEG frames
///
/// This also filters out UVC metadata nodes, which expose no image formats.
pub fn supports_mjpeg(v4l2_path: &Path) -> bool {
    let Ok(dev) = Device::with_path(v4l2_path) else {
        return false;
    };
    dev.enum_formats()
        .map(|formats| formats.iter().any(|f| f.fourcc == mjpeg()))
        .unwrap_or(false)
}

/// All MJPEG-capable capture nodes, ordered by `/dev/videoN` index
pub fn enumerate_capture_nodes() -> Vec<DeviceInfo> {
    let mut nodes = v4l::context::enum_devices();
    nodes.sort_by_key(|node| node.index());

    nodes
        .iter()
        .filter(|node| supports_mjpeg(node.path()))
        .filter_map(|node| build_device_info(&node.path().to_string_lossy()))
        .collect()
}
