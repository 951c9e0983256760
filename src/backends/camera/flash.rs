// SPDX-License-Identifier: GPL-3.0-only

//! Flash LED control and flash decisions
//!
//! Discovers flash LEDs exposed at `/sys/class/leds/*:flash` and drives them in
//! torch mode (the `brightness` file), which is group-writable on most phones
//! running mainline Linux. Also decides whether `FlashPolicy::Auto` should fire
//! based on the brightness of a warm-up frame.

use super::types::FlashPolicy;
use crate::constants::capture::{BRIGHTNESS_SAMPLES, DARK_SCENE_LUMINANCE};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const LEDS_DIR: &str = "/sys/class/leds";

/// A flash LED device discovered via sysfs
#[derive(Debug, Clone)]
pub struct FlashDevice {
    /// Sysfs path, e.g. `/sys/class/leds/white:flash`
    path: PathBuf,
    /// Maximum brightness value (from `max_brightness` file)
    max_brightness: u32,
    /// Directory basename
    name: String,
}

impl FlashDevice {
    /// Scan `/sys/class/leds/` for writable `*:flash` entries
    pub fn discover() -> Vec<FlashDevice> {
        Self::discover_in(Path::new(LEDS_DIR))
    }

    /// Scan an arbitrary sysfs-like directory
    pub fn discover_in(leds_dir: &Path) -> Vec<FlashDevice> {
        let Ok(entries) = std::fs::read_dir(leds_dir) else {
            debug!(dir = %leds_dir.display(), "No LED class directory, flash disabled");
            return Vec::new();
        };

        let mut devices = Vec::new();

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name_str) = name.to_str() else {
                continue;
            };

            // Match entries like "white:flash", "yellow:flash"
            if !name_str.ends_with(":flash") {
                continue;
            }

            let led_path = entry.path();
            let max_brightness_path = led_path.join("max_brightness");

            let max_brightness = match std::fs::read_to_string(&max_brightness_path) {
                Ok(s) => match s.trim().parse::<u32>() {
                    Ok(v) if v > 0 => v,
                    _ => {
                        warn!(
                            path = %max_brightness_path.display(),
                            "Invalid max_brightness value"
                        );
                        continue;
                    }
                },
                Err(e) => {
                    warn!(
                        path = %max_brightness_path.display(),
                        error = %e,
                        "Cannot read max_brightness"
                    );
                    continue;
                }
            };

            let brightness_path = led_path.join("brightness");
            if let Err(e) = std::fs::OpenOptions::new()
                .write(true)
                .open(&brightness_path)
            {
                warn!(
                    path = %brightness_path.display(),
                    error = %e,
                    "Flash LED found but not writable"
                );
                continue;
            }

            info!(name = name_str, max_brightness, "Discovered flash LED");

            devices.push(FlashDevice {
                path: led_path,
                max_brightness,
                name: name_str.to_string(),
            });
        }

        // Deterministic ordering (white before yellow)
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        devices
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set raw brightness value (0 = off, max_brightness = full)
    pub fn set_brightness(&self, value: u32) -> io::Result<()> {
        let clamped = value.min(self.max_brightness);
        std::fs::write(self.path.join("brightness"), clamped.to_string())
    }

    pub fn off(&self) -> io::Result<()> {
        self.set_brightness(0)
    }

    /// Turn on at a fraction of max brightness (0.0 = off, 1.0 = full)
    pub fn torch(&self, intensity: f32) -> io::Result<()> {
        let clamped = intensity.clamp(0.0, 1.0);
        let value = (clamped * self.max_brightness as f32).round() as u32;
        self.set_brightness(value)
    }
}

/// Keeps the given LEDs lit until dropped
///
/// Dropping the guard always turns the LEDs off, including on the error paths
/// of a capture.
pub struct TorchGuard<'a> {
    devices: &'a [FlashDevice],
}

impl<'a> TorchGuard<'a> {
    pub fn light(devices: &'a [FlashDevice]) -> Self {
        for dev in devices {
            if let Err(e) = dev.torch(1.0) {
                warn!(device = %dev.name, error = %e, "Failed to turn on flash LED");
            }
        }
        Self { devices }
    }
}

impl Drop for TorchGuard<'_> {
    fn drop(&mut self) {
        for dev in self.devices {
            if let Err(e) = dev.off() {
                warn!(device = %dev.name, error = %e, "Failed to turn off flash LED");
            }
        }
    }
}

/// Average BT.601 luminance (0.0-1.0) of an encoded image
///
/// Samples at most [`BRIGHTNESS_SAMPLES`] pixels. Returns `None` when the image
/// cannot be decoded.
pub fn estimate_luminance(encoded: &[u8]) -> Option<f32> {
    let image = image::load_from_memory(encoded).ok()?.to_rgb8();
    let pixels = image.as_raw();
    let count = pixels.len() / 3;
    if count == 0 {
        return None;
    }

    let stride = (count / BRIGHTNESS_SAMPLES).max(1);
    let mut total = 0.0f64;
    let mut samples = 0usize;

    for px in pixels.chunks_exact(3).step_by(stride) {
        let r = px[0] as f64 / 255.0;
        let g = px[1] as f64 / 255.0;
        let b = px[2] as f64 / 255.0;
        total += 0.299 * r + 0.587 * g + 0.114 * b;
        samples += 1;
    }

    Some((total / samples as f64) as f32)
}

/// Whether the flash should fire for a capture
///
/// `luminance` is the brightness of a preceding frame, if one was available.
/// `Auto` without a usable frame does not fire.
pub fn should_fire(policy: FlashPolicy, luminance: Option<f32>) -> bool {
    match policy {
        FlashPolicy::Off => false,
        FlashPolicy::On => true,
        FlashPolicy::Auto => luminance.is_some_and(|l| l < DARK_SCENE_LUMINANCE),
    }
}
