// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera access
//!
//! This module provides the hardware-facing collaborators of the capture
//! pipeline:
//! - Camera capture via V4L2 or still images on disk
//! - Camera authorization via device node access checks
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              Capture pipeline                │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐   │
//! │  │ Permission  │    │     Camera       │   │
//! │  │   (nodes)   │    │  (V4L2 / File)   │   │
//! │  └─────────────┘    └──────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Camera sources, device lookup and single-shot capture
//! - [`permission`]: Authorization state and providers

pub mod camera;
pub mod permission;
