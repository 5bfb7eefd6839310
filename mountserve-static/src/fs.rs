//! Filesystem capability set shared by every mount

use crate::error::FsResult;
use crate::readonly::ReadonlyFs;
use crate::root::RootFileSystem;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::fs::File;

/// Metadata for one entry, read fresh from the OS per request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
    pub mod_time: Option<SystemTime>,
}

impl FileInfo {
    pub(crate) fn from_metadata(name: String, meta: &std::fs::Metadata) -> Self {
        Self {
            name,
            size: if meta.is_dir() { 0 } else { meta.len() },
            is_dir: meta.is_dir(),
            mod_time: meta.modified().ok(),
        }
    }
}

/// An opened file plus what the content server needs to know about it
#[derive(Debug)]
pub struct FileHandle {
    pub file: File,
    pub info: FileInfo,
    /// Regular files support seeking; pipes and devices do not
    pub seekable: bool,
}

/// Operations exposed to listing, upload and content handlers
///
/// Names are request-style paths relative to the mount (`/a/b.txt`); each
/// implementation is responsible for keeping them inside its root.
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn open(&self, name: &str) -> FsResult<FileHandle>;

    async fn stat(&self, name: &str) -> FsResult<FileInfo>;

    async fn read_dir(&self, name: &str) -> FsResult<Vec<FileInfo>>;

    async fn create(&self, name: &str) -> FsResult<File>;

    async fn mkdir(&self, name: &str, mode: u32) -> FsResult<()>;

    async fn remove(&self, name: &str) -> FsResult<()>;
}

/// The filesystem variants a mount can be backed by
#[derive(Debug, Clone)]
pub enum MountFs {
    Root(RootFileSystem),
    Readonly(ReadonlyFs<RootFileSystem>),
}

impl MountFs {
    /// Build the filesystem for a mount directory
    pub fn new(dir: impl Into<PathBuf>, readonly: bool, show_hidden: bool) -> Self {
        let root = RootFileSystem::new(dir, show_hidden);
        if readonly {
            MountFs::Readonly(ReadonlyFs::new(root))
        } else {
            MountFs::Root(root)
        }
    }

    pub fn is_readonly(&self) -> bool {
        matches!(self, MountFs::Readonly(_))
    }

    fn inner(&self) -> &dyn FileSystem {
        match self {
            MountFs::Root(fs) => fs,
            MountFs::Readonly(fs) => fs,
        }
    }
}

#[async_trait]
impl FileSystem for MountFs {
    async fn open(&self, name: &str) -> FsResult<FileHandle> {
        self.inner().open(name).await
    }

    async fn stat(&self, name: &str) -> FsResult<FileInfo> {
        self.inner().stat(name).await
    }

    async fn read_dir(&self, name: &str) -> FsResult<Vec<FileInfo>> {
        self.inner().read_dir(name).await
    }

    async fn create(&self, name: &str) -> FsResult<File> {
        self.inner().create(name).await
    }

    async fn mkdir(&self, name: &str, mode: u32) -> FsResult<()> {
        self.inner().mkdir(name, mode).await
    }

    async fn remove(&self, name: &str) -> FsResult<()> {
        self.inner().remove(name).await
    }
}
