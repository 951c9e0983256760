// SPDX-License-Identifier: MPL-2.0

//! Local artifact storage
//!
//! The [`ArtifactStore`] owns every capture written to disk from the moment it
//! is persisted until it is deleted or superseded. It holds at most one
//! current artifact; a superseded one is kept on a pending list until the
//! retention policy says it may go, and stays there if its delete fails so
//! the next [`reconcile`](ArtifactStore::reconcile) retries it.

pub mod fs;

pub use fs::{Filesystem, TokioFilesystem};

use crate::backends::camera::RawCapture;
use crate::constants::storage::{EXTENSION, FIXED_FILE_NAME, UNIQUE_PREFIX};
use crate::errors::StorageError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A capture persisted on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub captured_at: DateTime<Local>,
    pub size_bytes: Option<u64>,
}

impl Artifact {
    /// `file://` URI for image viewers
    pub fn preview_uri(&self) -> String {
        let path = self.path.to_string_lossy();
        if path.starts_with("file://") {
            path.into_owned()
        } else {
            format!("file://{}", path)
        }
    }
}

/// When a superseded rotate-unique artifact is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cleanup {
    /// As soon as the new capture is on disk, before it is uploaded
    AfterPersist,
    /// Once the upload of the new capture has finished
    #[default]
    AfterUpload,
}

/// How many files the store keeps and under which names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RetentionPolicy {
    /// Fresh unique name per capture, previous one deleted at `cleanup`
    RotateUnique {
        #[serde(default)]
        cleanup: Cleanup,
    },
    /// Every capture written over the same file
    OverwriteFixed {
        #[serde(default = "default_fixed_name")]
        file_name: String,
    },
}

fn default_fixed_name() -> String {
    FIXED_FILE_NAME.to_string()
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy::RotateUnique {
            cleanup: Cleanup::default(),
        }
    }
}

impl RetentionPolicy {
    pub fn overwrite_fixed() -> Self {
        RetentionPolicy::OverwriteFixed {
            file_name: default_fixed_name(),
        }
    }
}

impl std::fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetentionPolicy::RotateUnique {
                cleanup: Cleanup::AfterPersist,
            } => write!(f, "rotate-eager"),
            RetentionPolicy::RotateUnique {
                cleanup: Cleanup::AfterUpload,
            } => write!(f, "rotate-deferred"),
            RetentionPolicy::OverwriteFixed { file_name } => write!(f, "overwrite:{}", file_name),
        }
    }
}

impl std::str::FromStr for RetentionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "rotate" | "rotate-deferred" => Ok(RetentionPolicy::RotateUnique {
                cleanup: Cleanup::AfterUpload,
            }),
            "rotate-eager" => Ok(RetentionPolicy::RotateUnique {
                cleanup: Cleanup::AfterPersist,
            }),
            "overwrite" => Ok(RetentionPolicy::overwrite_fixed()),
            _ => match s.strip_prefix("overwrite:") {
                Some(name) if is_plain_file_name(name) => {
                    Ok(RetentionPolicy::OverwriteFixed {
                        file_name: name.to_string(),
                    })
                }
                _ => Err(format!(
                    "unknown retention policy '{}' (expected rotate, rotate-eager, overwrite or overwrite:<name>)",
                    s
                )),
            },
        }
    }
}

/// Point in a cycle at which retention cleanup may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStage {
    AfterPersist,
    AfterUpload,
}

/// Lifecycle of captured images on disk
pub struct ArtifactStore {
    fs: Arc<dyn Filesystem>,
    dir: PathBuf,
    policy: RetentionPolicy,
    current: Option<Artifact>,
    /// Superseded artifacts waiting for deletion
    retired: Vec<Artifact>,
}

impl ArtifactStore {
    pub fn new(fs: Arc<dyn Filesystem>, dir: impl Into<PathBuf>, policy: RetentionPolicy) -> Self {
        Self {
            fs,
            dir: dir.into(),
            policy,
            current: None,
            retired: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Create the storage directory
    pub async fn prepare(&self) -> Result<(), StorageError> {
        self.fs
            .create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::write(&self.dir, e))
    }

    /// Latest successfully persisted artifact
    pub fn current_preview(&self) -> Option<&Artifact> {
        self.current.as_ref()
    }

    /// Number of superseded artifacts not yet deleted
    pub fn pending_deletes(&self) -> usize {
        self.retired.len()
    }

    /// Write a capture to disk and make it the current artifact
    ///
    /// The capture is staged next to its final path and renamed into place, so
    /// the target only ever holds a complete image. On failure the previous
    /// artifact stays current and untouched.
    pub async fn persist(&mut self, raw: RawCapture) -> Result<Artifact, StorageError> {
        let path = self.next_path(&raw.captured_at);
        let staged = staging_path(&path);

        let size = match raw.native_path.as_deref() {
            Some(scratch) => {
                let copied = match self.fs.copy(scratch, &staged).await {
                    Ok(copied) => copied,
                    Err(e) => {
                        self.discard_staged(&staged).await;
                        return Err(StorageError::copy(&path, e));
                    }
                };
                if let Err(e) = self.fs.remove(scratch).await {
                    warn!(path = %scratch.display(), error = %e, "Failed to remove scratch capture");
                }
                copied
            }
            None => {
                if let Err(e) = self.fs.write(&staged, &raw.data).await {
                    self.discard_staged(&staged).await;
                    return Err(StorageError::write(&path, e));
                }
                raw.data.len() as u64
            }
        };

        if let Err(e) = self.fs.rename(&staged, &path).await {
            self.discard_staged(&staged).await;
            return Err(StorageError::write(&path, e));
        }

        let artifact = Artifact {
            path,
            captured_at: raw.captured_at,
            size_bytes: Some(size),
        };

        debug!(path = %artifact.path.display(), bytes = size, "Persisted capture");

        if let Some(previous) = self.current.replace(artifact.clone()) {
            if previous.path != artifact.path {
                self.retired.push(previous);
            }
        }

        Ok(artifact)
    }

    /// Delete an artifact; deleting a missing file succeeds
    pub async fn delete(&mut self, artifact: &Artifact) -> Result<(), StorageError> {
        self.fs
            .remove(&artifact.path)
            .await
            .map_err(|e| StorageError::delete(&artifact.path, e))?;

        if self.current.as_ref().is_some_and(|c| c.path == artifact.path) {
            self.current = None;
        }
        self.retired.retain(|r| r.path != artifact.path);
        debug!(path = %artifact.path.display(), "Deleted artifact");
        Ok(())
    }

    /// Read an artifact back
    pub async fn read(&self, artifact: &Artifact) -> Result<Vec<u8>, StorageError> {
        self.fs
            .read(&artifact.path)
            .await
            .map_err(|e| StorageError::read(&artifact.path, e))
    }

    /// Run retention cleanup if the policy schedules it at `stage`
    pub async fn cleanup(&mut self, stage: CleanupStage) -> usize {
        let due = match &self.policy {
            RetentionPolicy::RotateUnique { cleanup } => matches!(
                (cleanup, stage),
                (Cleanup::AfterPersist, CleanupStage::AfterPersist)
                    | (Cleanup::AfterUpload, CleanupStage::AfterUpload)
            ),
            RetentionPolicy::OverwriteFixed { .. } => false,
        };

        if due { self.reconcile().await } else { 0 }
    }

    /// Delete every superseded artifact
    ///
    /// Returns how many were deleted. Failed deletes stay pending.
    pub async fn reconcile(&mut self) -> usize {
        let current = self.current.as_ref().map(|c| c.path.clone());
        let pending = std::mem::take(&mut self.retired);
        let mut deleted = 0;

        for artifact in pending {
            if current.as_deref() == Some(artifact.path.as_path()) {
                continue;
            }
            match self.fs.remove(&artifact.path).await {
                Ok(()) => {
                    debug!(path = %artifact.path.display(), "Removed superseded artifact");
                    deleted += 1;
                }
                Err(e) => {
                    warn!(
                        path = %artifact.path.display(),
                        error = %e,
                        "Failed to remove superseded artifact, will retry"
                    );
                    self.retired.push(artifact);
                }
            }
        }

        if deleted > 0 {
            info!(deleted, pending = self.retired.len(), "Reconciled artifact storage");
        }
        deleted
    }

    fn next_path(&self, captured_at: &DateTime<Local>) -> PathBuf {
        match &self.policy {
            RetentionPolicy::RotateUnique { .. } => self.dir.join(unique_file_name(captured_at)),
            RetentionPolicy::OverwriteFixed { file_name } => self.dir.join(file_name),
        }
    }

    async fn discard_staged(&self, staged: &Path) {
        if let Err(e) = self.fs.remove(staged).await {
            warn!(path = %staged.display(), error = %e, "Failed to remove staged capture");
        }
    }
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("dir", &self.dir)
            .field("policy", &self.policy)
            .field("current", &self.current)
            .field("retired", &self.retired)
            .finish_non_exhaustive()
    }
}

/// `capture_20250101_093000_123_1a2b3c4d.jpg`
pub fn unique_file_name(captured_at: &DateTime<Local>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}.{}",
        UNIQUE_PREFIX,
        captured_at.format("%Y%m%d_%H%M%S_%3f"),
        &suffix[..8],
        EXTENSION
    )
}

/// Hidden sibling a capture is written to before it replaces `path`
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.partial", name))
}

/// Whether `name` stays inside the directory it is joined to
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Default storage directory under the user cache directory
pub fn default_storage_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(crate::constants::storage::APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store(dir: &Path, policy: RetentionPolicy) -> ArtifactStore {
        ArtifactStore::new(Arc::new(TokioFilesystem), dir, policy)
    }

    #[test]
    fn test_unique_file_name_layout() {
        let at = Local.with_ymd_and_hms(2025, 3, 9, 7, 5, 1).unwrap();
        let name = unique_file_name(&at);
        assert!(name.starts_with("capture_20250309_070501_000_"), "{name}");
        assert!(name.ends_with(".jpg"));
        assert_eq!(name.len(), "capture_20250309_070501_000_".len() + 8 + 4);
        assert_ne!(name, unique_file_name(&at));
    }

    #[test]
    fn test_preview_uri_does_not_double_scheme() {
        let artifact = Artifact {
            path: PathBuf::from("/tmp/photo.jpg"),
            captured_at: Local::now(),
            size_bytes: None,
        };
        assert_eq!(artifact.preview_uri(), "file:///tmp/photo.jpg");

        let artifact = Artifact {
            path: PathBuf::from("file:///tmp/photo.jpg"),
            ..artifact
        };
        assert_eq!(artifact.preview_uri(), "file:///tmp/photo.jpg");
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("rotate".parse::<RetentionPolicy>(), Ok(RetentionPolicy::default()));
        assert_eq!(
            "rotate-eager".parse::<RetentionPolicy>(),
            Ok(RetentionPolicy::RotateUnique {
                cleanup: Cleanup::AfterPersist
            })
        );
        assert_eq!("overwrite".parse::<RetentionPolicy>(), Ok(RetentionPolicy::overwrite_fixed()));
        assert_eq!(
            "overwrite:latest.jpg".parse::<RetentionPolicy>(),
            Ok(RetentionPolicy::OverwriteFixed {
                file_name: "latest.jpg".into()
            })
        );
        assert!("overwrite:../x.jpg".parse::<RetentionPolicy>().is_err());
        assert!("overwrite:..".parse::<RetentionPolicy>().is_err());
        assert!("overwrite:.".parse::<RetentionPolicy>().is_err());
        assert!("keep-all".parse::<RetentionPolicy>().is_err());
    }

    #[test]
    fn test_policy_serde_layout() {
        let json = serde_json::to_string(&RetentionPolicy::default()).unwrap();
        assert_eq!(json, r#"{"kind":"rotate-unique","cleanup":"after-upload"}"#);

        let parsed: RetentionPolicy = serde_json::from_str(r#"{"kind":"overwrite-fixed"}"#).unwrap();
        assert_eq!(parsed, RetentionPolicy::overwrite_fixed());
    }

    #[tokio::test]
    async fn test_deferred_rotation_keeps_previous_until_upload() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path(), RetentionPolicy::default());

        let first = store.persist(RawCapture::from_bytes(b"one".to_vec())).await.unwrap();
        let second = store.persist(RawCapture::from_bytes(b"two".to_vec())).await.unwrap();

        assert_ne!(first.path, second.path);
        assert_eq!(store.cleanup(CleanupStage::AfterPersist).await, 0);
        assert!(first.path.exists());

        assert_eq!(store.cleanup(CleanupStage::AfterUpload).await, 1);
        assert!(!first.path.exists());
        assert!(second.path.exists());
        assert_eq!(store.current_preview(), Some(&second));
        assert_eq!(store.pending_deletes(), 0);
    }

    #[tokio::test]
    async fn test_native_capture_is_moved_into_store() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch.jpg");
        std::fs::write(&scratch, b"native").unwrap();

        let mut store = store(&dir.path().join("store"), RetentionPolicy::overwrite_fixed());
        store.prepare().await.unwrap();
        let artifact = store
            .persist(RawCapture::from_native_path(&scratch))
            .await
            .unwrap();

        assert_eq!(artifact.path, dir.path().join("store").join("photo.jpg"));
        assert_eq!(artifact.size_bytes, Some(6));
        assert!(!scratch.exists());
        assert_eq!(store.read(&artifact).await.unwrap(), b"native");
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_current() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path(), RetentionPolicy::default());
        let first = store.persist(RawCapture::from_bytes(b"one".to_vec())).await.unwrap();

        let missing = RawCapture::from_native_path(dir.path().join("never-written.jpg"));
        let err = store.persist(missing).await.unwrap_err();

        assert!(matches!(err, StorageError::Copy { .. }));
        assert_eq!(store.current_preview(), Some(&first));
        assert!(first.path.exists());
        assert_eq!(store.pending_deletes(), 0);
    }

    #[tokio::test]
    async fn test_failed_overwrite_keeps_fixed_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path(), RetentionPolicy::overwrite_fixed());
        let first = store.persist(RawCapture::from_bytes(b"one".to_vec())).await.unwrap();

        let missing = RawCapture::from_native_path(dir.path().join("never-written.jpg"));
        assert!(store.persist(missing).await.is_err());

        assert_eq!(store.current_preview(), Some(&first));
        assert_eq!(std::fs::read(&first.path).unwrap(), b"one");
    }

    #[tokio::test]
    async fn test_overwrite_leaves_no_staged_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path(), RetentionPolicy::overwrite_fixed());
        store.persist(RawCapture::from_bytes(b"one".to_vec())).await.unwrap();
        let latest = store.persist(RawCapture::from_bytes(b"two".to_vec())).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("photo.jpg")]);
        assert_eq!(std::fs::read(&latest.path).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_delete_current_clears_preview() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path(), RetentionPolicy::default());
        let artifact = store.persist(RawCapture::from_bytes(b"one".to_vec())).await.unwrap();

        store.delete(&artifact).await.unwrap();
        store.delete(&artifact).await.unwrap();
        assert!(store.current_preview().is_none());
        assert!(!artifact.path.exists());
    }
}
