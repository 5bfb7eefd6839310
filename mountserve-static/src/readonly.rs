//! Readonly wrapper

use crate::error::{FsError, FsResult};
use crate::fs::{FileHandle, FileInfo, FileSystem};
use async_trait::async_trait;
use tokio::fs::File;

/// Forwards reads to the inner filesystem and refuses every mutation
#[derive(Debug, Clone)]
pub struct ReadonlyFs<F> {
    inner: F,
}

impl<F: FileSystem> ReadonlyFs<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F: FileSystem> FileSystem for ReadonlyFs<F> {
    async fn open(&self, name: &str) -> FsResult<FileHandle> {
        self.inner.open(name).await
    }

    async fn stat(&self, name: &str) -> FsResult<FileInfo> {
        self.inner.stat(name).await
    }

    async fn read_dir(&self, name: &str) -> FsResult<Vec<FileInfo>> {
        self.inner.read_dir(name).await
    }

    async fn create(&self, name: &str) -> FsResult<File> {
        tracing::debug!(name, "Refusing create on readonly mount");
        Err(FsError::ReadOnly)
    }

    async fn mkdir(&self, name: &str, _mode: u32) -> FsResult<()> {
        tracing::debug!(name, "Refusing mkdir on readonly mount");
        Err(FsError::ReadOnly)
    }

    async fn remove(&self, name: &str) -> FsResult<()> {
        tracing::debug!(name, "Refusing remove on readonly mount");
        Err(FsError::ReadOnly)
    }
}
