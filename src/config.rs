// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::{CameraFacing, FlashPolicy};
use crate::constants::{api, timing};
use crate::errors::ConfigError;
use crate::remote::{ApiBase, UploadForm};
use crate::storage::{RetentionPolicy, default_storage_dir, is_plain_file_name};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CameraSourceConfig {
    /// V4L2 device nodes; unset nodes are picked by enumeration order
    V4l2 {
        #[serde(default)]
        front: Option<String>,
        #[serde(default)]
        back: Option<String>,
    },
    /// Still images on disk
    File {
        #[serde(default)]
        front: Option<PathBuf>,
        #[serde(default)]
        back: Option<PathBuf>,
    },
}

impl Default for CameraSourceConfig {
    fn default() -> Self {
        CameraSourceConfig::V4l2 {
            front: None,
            back: None,
        }
    }
}

impl std::str::FromStr for CameraSourceConfig {
    type Err = ConfigError;

    /// `v4l2`, `v4l2:/dev/video0`, `v4l2:/dev/video0,/dev/video2`,
    /// `file:still.jpg` or `file:front.jpg,back.jpg`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (kind, rest) = s.split_once(':').unwrap_or((s, ""));
        let mut parts = rest.split(',').map(str::trim).filter(|p| !p.is_empty());
        let first = parts.next().map(str::to_string);
        let second = parts.next().map(str::to_string);
        if parts.next().is_some() {
            return Err(ConfigError::InvalidSource(format!(
                "'{}': at most a front and a back entry",
                s
            )));
        }

        match kind {
            "v4l2" => Ok(CameraSourceConfig::V4l2 {
                front: first,
                back: second,
            }),
            "file" => {
                let Some(front) = first else {
                    return Err(ConfigError::InvalidSource(format!(
                        "'{}': file source needs an image path",
                        s
                    )));
                };
                let front = PathBuf::from(front);
                let back = second.map(PathBuf::from).unwrap_or_else(|| front.clone());
                Ok(CameraSourceConfig::File {
                    front: Some(front),
                    back: Some(back),
                })
            }
            other => Err(ConfigError::InvalidSource(format!(
                "unknown source kind '{}' (expected v4l2 or file)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Classifier server, e.g. `http://192.168.1.20:8000`
    pub base_url: String,
    /// Delay between capture cycles
    pub capture_interval_ms: u64,
    /// Camera used at startup
    pub facing: CameraFacing,
    pub flash: FlashPolicy,
    pub retention: RetentionPolicy,
    /// Artifact directory (default: user cache dir)
    pub storage_dir: Option<PathBuf>,
    pub source: CameraSourceConfig,
    pub upload: UploadForm,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: api::DEFAULT_BASE_URL.to_string(),
            capture_interval_ms: timing::DEFAULT_CAPTURE_INTERVAL_MS,
            facing: CameraFacing::default(), // Default to the front camera
            flash: FlashPolicy::default(),   // Auto
            retention: RetentionPolicy::default(), // Rotate, delete after upload
            storage_dir: None,
            source: CameraSourceConfig::default(),
            upload: UploadForm::default(),
            request_timeout_secs: api::DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Read a JSON config file; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Reject configurations the daemon cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api_base()?;
        if self.capture_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if let RetentionPolicy::OverwriteFixed { file_name } = &self.retention {
            if !is_plain_file_name(file_name) {
                return Err(ConfigError::InvalidRetention(format!(
                    "'{}' is not a plain file name",
                    file_name
                )));
            }
        }
        Ok(())
    }

    pub fn api_base(&self) -> Result<ApiBase, ConfigError> {
        ApiBase::parse(&self.base_url)
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.storage_dir.clone().unwrap_or_else(default_storage_dir)
    }
}
