// SPDX-License-Identifier: GPL-3.0-only

//! Filesystem seam for the artifact store and the upload client

use async_trait::async_trait;
use std::io;
use std::path::Path;

/// Path-based file operations used by the capture pipeline
#[async_trait]
pub trait Filesystem: Send + Sync {
    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Copy `from` over `to`, returning the number of bytes copied
    async fn copy(&self, from: &Path, to: &Path) -> io::Result<u64>;

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Atomically replace `to` with `from` (same directory)
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Remove a file; a missing file is not an error
    async fn remove(&self, path: &Path) -> io::Result<()>;

    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// [`Filesystem`] on top of `tokio::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFilesystem;

#[async_trait]
impl Filesystem for TokioFilesystem {
    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        tokio::fs::write(path, data).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        tokio::fs::copy(from, to).await
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        tokio::fs::rename(from, to).await
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        match tokio::fs::remove_file(path).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }
}
