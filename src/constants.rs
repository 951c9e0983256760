// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Remote classifier API
pub mod api {
    /// Default server address (the classifier's development server)
    pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
    /// Multipart upload route, relative to the base URL
    pub const PREDICT_ROUTE: &str = "/api/predict/";
    /// Reports listing route, relative to the base URL
    pub const REPORTS_ROUTE: &str = "/api/reports/";
    /// Hosts the server uses when it builds image URLs for itself
    pub const LOOPBACK_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "[::1]"];
    /// Default request timeout
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
}

/// Multipart form layout expected by the classifier
pub mod upload {
    pub const FIELD_NAME: &str = "image";
    pub const FILE_NAME: &str = "photo.jpg";
    pub const CONTENT_TYPE: &str = "image/jpeg";
}

/// Local artifact naming
pub mod storage {
    /// Directory name under the user cache directory
    pub const APP_DIR_NAME: &str = "intruder-cam";
    /// File name shared by every capture under the overwrite-fixed policy
    pub const FIXED_FILE_NAME: &str = "photo.jpg";
    /// Prefix of unique capture file names under the rotate-unique policy
    pub const UNIQUE_PREFIX: &str = "capture";
    /// Extension of stored captures
    pub const EXTENSION: &str = "jpg";
}

/// Scheduler and UI timing
pub mod timing {
    use super::Duration;

    /// Default delay between capture cycles
    pub const DEFAULT_CAPTURE_INTERVAL_MS: u64 = 5000;
    /// Status clock refresh rate in the terminal presenter
    pub const CLOCK_REFRESH: Duration = Duration::from_secs(1);
}

/// V4L2 capture tuning
pub mod capture {
    use super::Duration;

    /// Frames discarded after opening the device so exposure can settle
    pub const WARMUP_FRAMES: usize = 5;
    /// Number of mmap buffers requested from the driver
    pub const STREAM_BUFFERS: u32 = 4;
    /// Time the torch LED is given to reach full brightness
    pub const FLASH_SETTLE: Duration = Duration::from_millis(150);
    /// Mean BT.601 luminance (0.0-1.0) under which `Auto` flash fires
    pub const DARK_SCENE_LUMINANCE: f32 = 0.18;
    /// Maximum number of pixels sampled for brightness estimation
    pub const BRIGHTNESS_SAMPLES: usize = 10_000;
    /// JPEG quality used when re-encoding still images
    pub const JPEG_QUALITY: u8 = 92;
}

/// Get the application version string
pub fn app_version() -> &'static str {
    env!("GIT_VERSION")
}

/// User agent sent with every HTTP request
pub fn user_agent() -> String {
    format!("intruder-cam/{}", app_version())
}
