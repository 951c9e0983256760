// SPDX-License-Identifier: MPL-2.0

//! Error types for the capture daemon
//!
//! Every error is `Clone` and carries string payloads so it can be stored in a
//! [`CycleResult`](crate::pipelines::capture::CycleResult) and handed to the
//! presentation layer inside a snapshot.

use std::fmt;
use std::path::{Path, PathBuf};

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera permission errors
    Permission(PermissionError),
    /// Camera device errors
    Device(DeviceError),
    /// Local artifact storage errors
    Storage(StorageError),
    /// Upload / remote API errors
    Upload(UploadError),
    /// Startup configuration errors
    Config(ConfigError),
    /// Pipeline lifecycle misuse
    Pipeline(PipelineError),
}

/// Camera permission errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    /// The user or the system refused access
    Denied,
    /// The request itself failed (prompt could not be shown, node check failed)
    RequestFailed(String),
}

/// Camera device errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The device could not be opened
    OpenFailed(String),
    /// The device is used by another process
    Busy,
    /// The device disappeared while in use
    Disconnected,
    /// The single-shot capture failed
    CaptureFailed(String),
}

/// Artifact storage errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Writing a new artifact failed (disk full, permissions, bad path)
    Write { path: PathBuf, reason: String },
    /// Copying a native capture into the store failed
    Copy { path: PathBuf, reason: String },
    /// Reading an artifact back failed
    Read { path: PathBuf, reason: String },
    /// Deleting an artifact failed for a reason other than "not found"
    Delete { path: PathBuf, reason: String },
}

/// Upload and remote API errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// Connectivity problem or timeout
    Network(String),
    /// Non-2xx response
    Server { status: u16, body: String },
    /// 2xx response whose body is not the expected JSON
    InvalidResponse(String),
    /// The artifact could not be turned into a request body
    Payload(String),
}

/// Startup configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Base URL does not parse or is not http(s)
    InvalidBaseUrl(String),
    /// Capture interval must be greater than zero
    ZeroInterval,
    /// Config file could not be read or parsed
    File { path: PathBuf, reason: String },
    /// Camera source string is not understood
    InvalidSource(String),
    /// Retention policy cannot be applied
    InvalidRetention(String),
}

/// Pipeline lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// `start` called while the scheduler is running
    AlreadyRunning,
    /// Zero tick interval
    InvalidInterval,
    /// The cycle context was lost (a cycle task panicked)
    Unavailable,
}

impl StorageError {
    pub fn write(path: &Path, err: impl fmt::Display) -> Self {
        StorageError::Write {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }

    pub fn copy(path: &Path, err: impl fmt::Display) -> Self {
        StorageError::Copy {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }

    pub fn read(path: &Path, err: impl fmt::Display) -> Self {
        StorageError::Read {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }

    pub fn delete(path: &Path, err: impl fmt::Display) -> Self {
        StorageError::Delete {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }

    /// Path the failed operation was about
    pub fn path(&self) -> &Path {
        match self {
            StorageError::Write { path, .. }
            | StorageError::Copy { path, .. }
            | StorageError::Read { path, .. }
            | StorageError::Delete { path, .. } => path,
        }
    }
}

impl DeviceError {
    /// Whether a cached device handle must be dropped after this error
    pub fn invalidates_device(&self) -> bool {
        matches!(
            self,
            DeviceError::OpenFailed(_) | DeviceError::Disconnected
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Permission(e) => write!(f, "Permission error: {}", e),
            AppError::Device(e) => write!(f, "Camera error: {}", e),
            AppError::Storage(e) => write!(f, "Storage error: {}", e),
            AppError::Upload(e) => write!(f, "Upload error: {}", e),
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::Pipeline(e) => write!(f, "Pipeline error: {}", e),
        }
    }
}

impl fmt::Display for PermissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionError::Denied => write!(f, "Camera access denied"),
            PermissionError::RequestFailed(msg) => {
                write!(f, "Camera permission request failed: {}", msg)
            }
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::OpenFailed(msg) => write!(f, "Failed to open camera: {}", msg),
            DeviceError::Busy => write!(f, "Camera is busy"),
            DeviceError::Disconnected => write!(f, "Camera disconnected"),
            DeviceError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Write { path, reason } => {
                write!(f, "Failed to write {}: {}", path.display(), reason)
            }
            StorageError::Copy { path, reason } => {
                write!(f, "Failed to copy into {}: {}", path.display(), reason)
            }
            StorageError::Read { path, reason } => {
                write!(f, "Failed to read {}: {}", path.display(), reason)
            }
            StorageError::Delete { path, reason } => {
                write!(f, "Failed to delete {}: {}", path.display(), reason)
            }
        }
    }
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::Network(msg) => write!(f, "Network error: {}", msg),
            UploadError::Server { status, body } => {
                write!(f, "Server responded with status {}: {}", status, body)
            }
            UploadError::InvalidResponse(msg) => write!(f, "Invalid server response: {}", msg),
            UploadError::Payload(msg) => write!(f, "Failed to build upload payload: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidBaseUrl(msg) => write!(f, "Invalid base URL: {}", msg),
            ConfigError::ZeroInterval => write!(f, "Capture interval must be greater than zero"),
            ConfigError::File { path, reason } => {
                write!(f, "Failed to load config {}: {}", path.display(), reason)
            }
            ConfigError::InvalidSource(msg) => write!(f, "Invalid camera source: {}", msg),
            ConfigError::InvalidRetention(msg) => write!(f, "Invalid retention policy: {}", msg),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::AlreadyRunning => write!(f, "Pipeline is already running"),
            PipelineError::InvalidInterval => write!(f, "Tick interval must be greater than zero"),
            PipelineError::Unavailable => {
                write!(f, "Pipeline cannot restart after a cycle task panicked")
            }
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for PermissionError {}
impl std::error::Error for DeviceError {}
impl std::error::Error for StorageError {}
impl std::error::Error for UploadError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for PipelineError {}

// Conversions from sub-errors to AppError
impl From<PermissionError> for AppError {
    fn from(err: PermissionError) -> Self {
        AppError::Permission(err)
    }
}

impl From<DeviceError> for AppError {
    fn from(err: DeviceError) -> Self {
        AppError::Device(err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        AppError::Upload(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::Pipeline(err)
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            UploadError::Server {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else if err.is_decode() {
            UploadError::InvalidResponse(err.to_string())
        } else {
            UploadError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_keeps_path() {
        let err = StorageError::write(Path::new("/tmp/x.jpg"), "disk full");
        assert_eq!(err.path(), Path::new("/tmp/x.jpg"));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_device_errors_that_drop_the_handle() {
        assert!(DeviceError::Disconnected.invalidates_device());
        assert!(DeviceError::OpenFailed("EIO".into()).invalidates_device());
        assert!(!DeviceError::Busy.invalidates_device());
        assert!(!DeviceError::CaptureFailed("timeout".into()).invalidates_device());
    }

    #[test]
    fn test_app_error_wraps_sub_errors() {
        let err: AppError = UploadError::Server {
            status: 502,
            body: "bad gateway".into(),
        }
        .into();
        assert!(matches!(err, AppError::Upload(UploadError::Server { status: 502, .. })));
        assert!(err.to_string().starts_with("Upload error"));
    }
}
