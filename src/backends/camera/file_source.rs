// SPDX-License-Identifier: GPL-3.0-only

//! Still-image camera source
//!
//! Serves an image file per facing as if it were a camera. Used for demos, for
//! running the daemon on machines without a webcam, and for tests. Non-JPEG
//! images are re-encoded so the upload content type stays `image/jpeg`.

use super::types::{CameraDevice, CameraFacing, FlashPolicy, RawCapture};
use super::CameraSource;
use crate::constants::capture::JPEG_QUALITY;
use crate::errors::DeviceError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Camera source that reads still images from disk
#[derive(Debug, Clone, Default)]
pub struct FileCameraSource {
    front: Option<PathBuf>,
    back: Option<PathBuf>,
}

impl FileCameraSource {
    pub fn new(front: Option<PathBuf>, back: Option<PathBuf>) -> Self {
        Self { front, back }
    }

    /// Same image for both facings
    pub fn single(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            front: Some(path.clone()),
            back: Some(path),
        }
    }

    fn path_for(&self, facing: CameraFacing) -> Option<&Path> {
        match facing {
            CameraFacing::Front => self.front.as_deref(),
            CameraFacing::Back => self.back.as_deref(),
        }
    }
}

#[async_trait]
impl CameraSource for FileCameraSource {
    async fn find_device(&self, facing: CameraFacing) -> Option<CameraDevice> {
        let path = self.path_for(facing)?;
        let metadata = tokio::fs::metadata(path).await.ok()?;
        if !metadata.is_file() {
            return None;
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Some(CameraDevice {
            name,
            path: path.display().to_string(),
            facing,
            device_info: None,
        })
    }

    async fn capture(
        &self,
        device: &CameraDevice,
        flash: FlashPolicy,
    ) -> Result<RawCapture, DeviceError> {
        let bytes = tokio::fs::read(&device.path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DeviceError::Disconnected,
            _ => DeviceError::OpenFailed(e.to_string()),
        })?;

        debug!(path = %device.path, bytes = bytes.len(), %flash, "Reading still image");

        tokio::task::spawn_blocking(move || to_jpeg_capture(bytes))
            .await
            .map_err(|e| DeviceError::CaptureFailed(format!("decode task failed: {}", e)))?
    }
}

/// Decode any supported image and produce a JPEG capture
fn to_jpeg_capture(bytes: Vec<u8>) -> Result<RawCapture, DeviceError> {
    let format = image::guess_format(&bytes)
        .map_err(|e| DeviceError::CaptureFailed(format!("unrecognised image: {}", e)))?;
    let decoded = image::load_from_memory_with_format(&bytes, format)
        .map_err(|e| DeviceError::CaptureFailed(format!("decode failed: {}", e)))?;
    let (width, height) = (decoded.width(), decoded.height());

    if format == image::ImageFormat::Jpeg {
        return Ok(RawCapture::from_bytes(bytes).with_dimensions(width, height));
    }

    let rgb = decoded.to_rgb8();
    let mut encoded = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut encoded);
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, JPEG_QUALITY);
    encoder
        .encode(rgb.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .map_err(|e| DeviceError::CaptureFailed(format!("JPEG encoding failed: {}", e)))?;

    Ok(RawCapture::from_bytes(encoded).with_dimensions(width, height))
}
