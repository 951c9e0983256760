// SPDX-License-Identifier: MPL-2.0

//! Common test utilities
//!
//! In-memory collaborators for the capture pipeline: a camera whose captures
//! take a configurable (virtual) time, a filesystem kept in a map, and an HTTP
//! transport that records every request. None of them touch real I/O, so the
//! scheduler tests can run with tokio's paused clock.

#![allow(dead_code)]

use async_trait::async_trait;
use intruder_cam::backends::camera::{
    CameraDevice, CameraFacing, CameraSource, FlashPolicy, RawCapture,
};
use intruder_cam::backends::permission::{PermissionProvider, PermissionState};
use intruder_cam::errors::{DeviceError, PermissionError, UploadError};
use intruder_cam::remote::{
    ApiBase, HttpTransport, MultipartPayload, ServerResponse, UploadClient, UploadForm,
};
use intruder_cam::storage::{ArtifactStore, Filesystem, RetentionPolicy};
use intruder_cam::{CaptureCycle, CapturePipeline, PermissionGate};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE_URL: &str = "http://classifier.test:8000";
pub const STORAGE_DIR: &str = "/captures";

/// Camera with scripted devices and capture latency
pub struct MockCamera {
    available: Mutex<HashSet<CameraFacing>>,
    delay: Mutex<Duration>,
    fail_next: Mutex<Option<DeviceError>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    frames: AtomicUsize,
    pub find_calls: AtomicUsize,
    pub captures: Mutex<Vec<CameraFacing>>,
    pub released: Mutex<Vec<CameraDevice>>,
}

impl MockCamera {
    pub fn new(facings: &[CameraFacing]) -> Self {
        Self {
            available: Mutex::new(facings.iter().copied().collect()),
            delay: Mutex::new(Duration::ZERO),
            fail_next: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            frames: AtomicUsize::new(0),
            find_calls: AtomicUsize::new(0),
            captures: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
        }
    }

    pub fn both() -> Self {
        Self::new(&[CameraFacing::Front, CameraFacing::Back])
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn fail_next(&self, error: DeviceError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    pub fn unplug(&self, facing: CameraFacing) {
        self.available.lock().unwrap().remove(&facing);
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn capture_count(&self) -> usize {
        self.captures.lock().unwrap().len()
    }

    /// Bytes of the n-th frame (1-based)
    pub fn frame_bytes(n: usize) -> Vec<u8> {
        format!("jpeg-frame-{}", n).into_bytes()
    }
}

#[async_trait]
impl CameraSource for MockCamera {
    async fn find_device(&self, facing: CameraFacing) -> Option<CameraDevice> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if !self.available.lock().unwrap().contains(&facing) {
            return None;
        }
        Some(CameraDevice {
            name: format!("mock {} camera", facing),
            path: format!("/dev/mock-{}", facing),
            facing,
            device_info: None,
        })
    }

    async fn capture(
        &self,
        device: &CameraDevice,
        _flash: FlashPolicy,
    ) -> Result<RawCapture, DeviceError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.captures.lock().unwrap().push(device.facing);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(error) = self.fail_next.lock().unwrap().take() {
            return Err(error);
        }

        let n = self.frames.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RawCapture::from_bytes(Self::frame_bytes(n)).with_dimensions(640, 480))
    }

    fn release(&self, device: &CameraDevice) {
        self.released.lock().unwrap().push(device.clone());
    }
}

/// Filesystem kept in a map
#[derive(Default)]
pub struct MemoryFilesystem {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    fail_writes: AtomicBool,
    fail_removes: AtomicBool,
    pub ops: AtomicUsize,
}

impl MemoryFilesystem {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    pub fn insert(&self, path: impl Into<PathBuf>, data: &[u8]) {
        self.files.lock().unwrap().insert(path.into(), data.to_vec());
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn op_count(&self) -> usize {
        self.ops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Filesystem for MemoryFilesystem {
    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            // Truncated, half written, then out of space
            self.insert(path, &data[..data.len() / 2]);
            return Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"));
        }
        self.insert(path, data);
        Ok(())
    }

    async fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        let data = self
            .contents(from)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        if self.fail_writes.load(Ordering::SeqCst) {
            self.insert(to, &data[..data.len() / 2]);
            return Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"));
        }
        let len = data.len() as u64;
        self.files.lock().unwrap().insert(to.to_path_buf(), data);
        Ok(len)
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        let mut files = self.files.lock().unwrap();
        let data = files
            .remove(from)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        files.insert(to.to_path_buf(), data);
        Ok(())
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        self.contents(path)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
        }
        self.files.lock().unwrap().remove(path);
        Ok(())
    }

    async fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

/// Transport that records requests and answers from a script
pub struct MockTransport {
    upload_error: Mutex<Option<UploadError>>,
    upload_body: Mutex<Value>,
    get_body: Mutex<Value>,
    delay: Mutex<Duration>,
    pub posts: Mutex<Vec<(String, MultipartPayload)>>,
    pub gets: Mutex<Vec<String>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            upload_error: Mutex::new(None),
            upload_body: Mutex::new(json!({ "is_intruder": false })),
            get_body: Mutex::new(json!([])),
            delay: Mutex::new(Duration::ZERO),
            posts: Mutex::new(Vec::new()),
            gets: Mutex::new(Vec::new()),
        }
    }
}

impl MockTransport {
    /// Every upload fails with `error` until cleared
    pub fn fail_uploads(&self, error: Option<UploadError>) {
        *self.upload_error.lock().unwrap() = error;
    }

    pub fn set_upload_body(&self, body: Value) {
        *self.upload_body.lock().unwrap() = body;
    }

    pub fn set_get_body(&self, body: Value) {
        *self.get_body.lock().unwrap() = body;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn post_multipart(
        &self,
        url: &str,
        payload: MultipartPayload,
    ) -> Result<ServerResponse, UploadError> {
        self.posts.lock().unwrap().push((url.to_string(), payload));

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.upload_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(ServerResponse {
            status: 200,
            body: self.upload_body.lock().unwrap().clone(),
        })
    }

    async fn get_json(&self, url: &str) -> Result<ServerResponse, UploadError> {
        self.gets.lock().unwrap().push(url.to_string());
        Ok(ServerResponse {
            status: 200,
            body: self.get_body.lock().unwrap().clone(),
        })
    }
}

/// Starts `status` and answers every request with `answer`
pub struct ScriptedPermission {
    status: PermissionState,
    answer: PermissionState,
    pub requests: AtomicUsize,
}

impl ScriptedPermission {
    pub fn new(status: PermissionState, answer: PermissionState) -> Self {
        Self {
            status,
            answer,
            requests: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PermissionProvider for ScriptedPermission {
    fn status(&self) -> PermissionState {
        self.status
    }

    async fn request(&self) -> Result<PermissionState, PermissionError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer)
    }
}

/// A prompt the user never answers
pub struct HangingPermission;

#[async_trait]
impl PermissionProvider for HangingPermission {
    fn status(&self) -> PermissionState {
        PermissionState::Unknown
    }

    async fn request(&self) -> Result<PermissionState, PermissionError> {
        std::future::pending().await
    }
}

/// Pipeline wired to mocks, with handles on every collaborator
pub struct Harness {
    pub camera: Arc<MockCamera>,
    pub fs: Arc<MemoryFilesystem>,
    pub transport: Arc<MockTransport>,
    pub pipeline: CapturePipeline,
}

impl Harness {
    pub fn new(policy: RetentionPolicy, permission: Arc<dyn PermissionProvider>) -> Self {
        Self::with_camera(MockCamera::both(), policy, permission)
    }

    pub fn granted(policy: RetentionPolicy) -> Self {
        Self::new(
            policy,
            Arc::new(ScriptedPermission::new(
                PermissionState::Granted,
                PermissionState::Granted,
            )),
        )
    }

    pub fn with_camera(
        camera: MockCamera,
        policy: RetentionPolicy,
        permission: Arc<dyn PermissionProvider>,
    ) -> Self {
        let camera = Arc::new(camera);
        let fs = Arc::new(MemoryFilesystem::default());
        let transport = Arc::new(MockTransport::default());

        let store = ArtifactStore::new(fs.clone(), STORAGE_DIR, policy);
        let base = ApiBase::parse(BASE_URL).unwrap();
        let uploader = UploadClient::new(transport.clone(), fs.clone(), &base, UploadForm::default());
        let gate = Arc::new(PermissionGate::new(permission));

        let cycle = CaptureCycle::new(camera.clone(), store, uploader, gate, FlashPolicy::Auto);
        let pipeline = CapturePipeline::new(cycle, CameraFacing::Front);

        Self {
            camera,
            fs,
            transport,
            pipeline,
        }
    }
}

/// Advance the paused clock by `ms`
pub async fn advance_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
