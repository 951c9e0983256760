// SPDX-License-Identifier: MPL-2.0

//! Intruder Cam - periodic camera capture for a remote intruder classifier
//!
//! This library provides the capture daemon: a camera is sampled on a fixed
//! interval, every frame is stored locally under a retention policy, posted to
//! a classification server, and the local storage is reconciled afterwards.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera sources and camera authorization
//! - [`pipelines`]: The scheduled capture-and-upload pipeline
//! - [`storage`]: Artifact naming, retention and the filesystem seam
//! - [`remote`]: Upload and reports clients over the HTTP seam
//! - [`config`]: Startup configuration
//!
//! # Example
//!
//! ```ignore
//! let mut pipeline = CapturePipeline::new(cycle, CameraFacing::Front);
//! pipeline.start(Duration::from_secs(5))?;
//! // ...
//! pipeline.stop().await?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipelines;
pub mod remote;
pub mod storage;

// Re-export commonly used types
pub use backends::camera::{CameraFacing, CameraSource, FlashPolicy};
pub use backends::permission::{PermissionGate, PermissionProvider, PermissionState};
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use pipelines::capture::{
    CaptureCycle, CapturePipeline, CycleResult, PipelineHandle, PipelineSnapshot, PipelineState,
};
pub use storage::{Artifact, ArtifactStore, RetentionPolicy};
