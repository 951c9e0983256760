// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera source
//!
//! Opens the device node only for the duration of a capture: set MJPEG, stream
//! a few warm-up frames so auto-exposure settles, optionally light the flash,
//! keep one frame, close. Nothing stays open between cycles, so releasing a
//! device is a no-op and a hot-plugged camera is picked up on the next lookup.

use super::flash::{FlashDevice, TorchGuard, estimate_luminance, should_fire};
use super::types::{CameraDevice, CameraFacing, DeviceInfo, FlashPolicy, RawCapture};
use super::v4l2_utils::{build_device_info, enumerate_capture_nodes, mjpeg};
use super::CameraSource;
use crate::constants::capture::{FLASH_SETTLE, STREAM_BUFFERS, WARMUP_FRAMES};
use crate::errors::DeviceError;
use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

/// Camera source backed by Linux V4L2 device nodes
///
/// V4L2 has no notion of facing. Explicitly configured nodes win; otherwise the
/// first MJPEG-capable node is the front camera and the second one the back
/// camera.
#[derive(Debug, Clone)]
pub struct V4l2CameraSource {
    front_node: Option<String>,
    back_node: Option<String>,
    flash: Arc<Vec<FlashDevice>>,
}

impl V4l2CameraSource {
    pub fn new(front_node: Option<String>, back_node: Option<String>) -> Self {
        let flash = FlashDevice::discover();
        info!(
            front = ?front_node,
            back = ?back_node,
            flash_leds = flash.len(),
            "Creating V4L2 camera source"
        );
        Self {
            front_node,
            back_node,
            flash: Arc::new(flash),
        }
    }

    fn lookup(&self, facing: CameraFacing) -> Option<DeviceInfo> {
        let configured = match facing {
            CameraFacing::Front => self.front_node.as_deref(),
            CameraFacing::Back => self.back_node.as_deref(),
        };

        if let Some(path) = configured {
            return build_device_info(path);
        }

        let index = match facing {
            CameraFacing::Front => 0,
            CameraFacing::Back => 1,
        };
        enumerate_capture_nodes().into_iter().nth(index)
    }
}

#[async_trait]
impl CameraSource for V4l2CameraSource {
    async fn find_device(&self, facing: CameraFacing) -> Option<CameraDevice> {
        let source = self.clone();
        let info = tokio::task::spawn_blocking(move || source.lookup(facing))
            .await
            .ok()
            .flatten()?;

        debug!(%facing, path = %info.path, card = %info.card, "Resolved V4L2 device");

        Some(CameraDevice {
            name: info.card.clone(),
            path: info.path.clone(),
            facing,
            device_info: Some(info),
        })
    }

    async fn capture(
        &self,
        device: &CameraDevice,
        flash: FlashPolicy,
    ) -> Result<RawCapture, DeviceError> {
        let path = device.path.clone();
        let leds = Arc::clone(&self.flash);

        tokio::task::spawn_blocking(move || capture_blocking(&path, flash, &leds))
            .await
            .map_err(|e| DeviceError::CaptureFailed(format!("capture task failed: {}", e)))?
    }

    fn release(&self, device: &CameraDevice) {
        debug!(path = %device.path, "Released V4L2 device");
    }
}

fn capture_blocking(
    path: &str,
    policy: FlashPolicy,
    leds: &[FlashDevice],
) -> Result<RawCapture, DeviceError> {
    let dev = Device::with_path(path).map_err(open_error)?;

    let mut format = dev.format().map_err(open_error)?;
    format.fourcc = mjpeg();
    let format = dev.set_format(&format).map_err(open_error)?;
    if format.fourcc != mjpeg() {
        return Err(DeviceError::CaptureFailed(format!(
            "device only offers {} instead of MJPG",
            format.fourcc
        )));
    }

    let mut stream = Stream::with_buffers(&dev, Type::VideoCapture, STREAM_BUFFERS)
        .map_err(stream_error)?;

    let mut warmup_frame = None;
    for _ in 0..WARMUP_FRAMES {
        warmup_frame = Some(next_frame(&mut stream)?);
    }

    let luminance = warmup_frame.as_deref().and_then(estimate_luminance);
    let fire = should_fire(policy, luminance);
    if fire && leds.is_empty() {
        debug!(%policy, "Flash requested but no controllable LED, capturing without");
    }
    let fire = fire && !leds.is_empty();

    let data = if fire {
        let _torch = TorchGuard::light(leds);
        std::thread::sleep(FLASH_SETTLE);
        // Buffers queued before the LED lit are still dark
        for _ in 0..STREAM_BUFFERS {
            next_frame(&mut stream)?;
        }
        next_frame(&mut stream)?
    } else {
        next_frame(&mut stream)?
    };

    debug!(
        path,
        bytes = data.len(),
        width = format.width,
        height = format.height,
        luminance = ?luminance,
        flash = fire,
        "Captured MJPEG frame"
    );

    Ok(RawCapture::from_bytes(data)
        .with_dimensions(format.width, format.height)
        .with_flash_fired(fire))
}

fn next_frame(stream: &mut Stream<'_>) -> Result<Vec<u8>, DeviceError> {
    let (buf, meta) = stream.next().map_err(stream_error)?;
    let used = (meta.bytesused as usize).min(buf.len());
    if used == 0 {
        warn!("Driver returned an empty buffer");
        return Err(DeviceError::CaptureFailed("empty frame".to_string()));
    }
    Ok(buf[..used].to_vec())
}

fn open_error(e: io::Error) -> DeviceError {
    match e.kind() {
        io::ErrorKind::NotFound => DeviceError::Disconnected,
        io::ErrorKind::ResourceBusy => DeviceError::Busy,
        _ => DeviceError::OpenFailed(e.to_string()),
    }
}

fn stream_error(e: io::Error) -> DeviceError {
    match e.kind() {
        io::ErrorKind::NotFound => DeviceError::Disconnected,
        io::ErrorKind::ResourceBusy => DeviceError::Busy,
        _ => DeviceError::CaptureFailed(e.to_string()),
    }
}
