// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines
//!
//! # Pipeline Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │    Timer     │ ──▶ │ Capture Pipeline  │ ──▶ │  Classifier  │
//! │   (tokio)    │     │  - Permission     │     │  (HTTP API)  │
//! │              │     │  - Capture        │     │              │
//! │              │     │  - Persist/rotate │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! # Design Principles
//!
//! 1. **Single flight**: a cycle owns its context; overlapping ticks are dropped
//! 2. **Failures are results**: nothing in a cycle aborts the scheduler
//! 3. **Deterministic teardown**: stop waits for the running cycle, then
//!    releases the camera
//!
//! # Modules
//!
//! - [`capture`]: Periodic capture, persist and upload

pub mod capture;
