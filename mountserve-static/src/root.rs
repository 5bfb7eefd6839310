//! Filesystem rooted at one local directory
//!
//! Every operation resolves its name through the sanitizer, joins it onto
//! the root and checks containment by path relation. Reads additionally
//! resolve symlinks and refuse any that land outside the root.

use crate::error::{FsError, FsResult};
use crate::fs::{FileHandle, FileInfo, FileSystem};
use crate::sanitize::{clean_path, relative_within, sanitize, Sanitized};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;

/// Names never shown in listings unless hidden files are enabled
const JUNK_FILES: &[&str] = &["Thumbs.db", "Desktop.ini", ".DS_Store", "$RECYCLE.BIN"];

/// Whether a directory entry counts as hidden
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.') || JUNK_FILES.iter().any(|junk| junk.eq_ignore_ascii_case(name))
}

#[derive(Debug)]
struct RootInner {
    /// Lexically cleaned root, used for joining
    root: PathBuf,
    /// Root with symlinks resolved, used for containment of resolved paths
    real_root: PathBuf,
    show_hidden: bool,
}

/// Filesystem scoped to a single directory
#[derive(Debug, Clone)]
pub struct RootFileSystem {
    inner: Arc<RootInner>,
}

impl RootFileSystem {
    /// Create a filesystem rooted at `root`
    ///
    /// The root is cleaned once here. If it exists its symlinks are resolved
    /// too, so a root that is itself a symlink still contains its own files.
    pub fn new(root: impl Into<PathBuf>, show_hidden: bool) -> Self {
        let root = clean_path(&root.into());
        let real_root = std::fs::canonicalize(&root).unwrap_or_else(|_| root.clone());
        Self {
            inner: Arc::new(RootInner {
                root,
                real_root,
                show_hidden,
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn show_hidden(&self) -> bool {
        self.inner.show_hidden
    }

    /// Map a request-style name to an absolute path under the root
    pub fn resolve(&self, name: &str) -> FsResult<PathBuf> {
        let name = if name.is_empty() { "." } else { name };
        let relative = match sanitize(name) {
            Sanitized::Rejected => {
                tracing::warn!(name = %name.escape_debug(), "🚫 Rejected unsafe path");
                return Err(FsError::InvalidPath);
            }
            Sanitized::Root => return Ok(self.inner.root.clone()),
            Sanitized::Relative(relative) => relative,
        };

        let joined = self.inner.root.join(&relative);
        if relative_within(&self.inner.root, &joined).is_none() {
            tracing::warn!(name = %name.escape_debug(), "🚫 Path escapes mount root");
            return Err(FsError::InvalidPath);
        }
        Ok(joined)
    }

    /// Refuse paths whose real location lies outside the root
    ///
    /// A path that does not exist yet is accepted as long as its nearest
    /// existing ancestor is inside the root, so creating files through a
    /// symlinked parent directory cannot escape either.
    pub async fn verify_symlink_safety(&self, abs: &Path) -> FsResult<()> {
        let real = match tokio::fs::symlink_metadata(abs).await {
            Ok(meta) => match tokio::fs::canonicalize(abs).await {
                Ok(real) => real,
                Err(e) if meta.file_type().is_symlink() => {
                    tracing::warn!(path = %abs.display(), error = %e, "🔗 Unresolvable symlink");
                    return Err(FsError::Symlink(e));
                }
                Err(e) => return Err(FsError::from_io(e, FsError::FileStat)),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                match self.nearest_existing_ancestor(abs).await {
                    Some(real) => real,
                    None => return Ok(()),
                }
            }
            Err(e) => return Err(FsError::FileStat(e)),
        };

        if relative_within(&self.inner.real_root, &real).is_none() {
            tracing::warn!(path = %abs.display(), "🚨 Symlink escapes mount root");
            return Err(FsError::SymlinkAttack);
        }
        Ok(())
    }

    async fn nearest_existing_ancestor(&self, abs: &Path) -> Option<PathBuf> {
        let mut current = abs.parent();
        while let Some(dir) = current {
            if let Ok(real) = tokio::fs::canonicalize(dir).await {
                return Some(real);
            }
            if dir == self.inner.root {
                return None;
            }
            current = dir.parent();
        }
        None
    }

    async fn resolve_verified(&self, name: &str) -> FsResult<PathBuf> {
        let abs = self.resolve(name)?;
        self.verify_symlink_safety(&abs).await?;
        Ok(abs)
    }

    /// Resolve a name that must not be the root itself
    async fn resolve_child(&self, name: &str) -> FsResult<PathBuf> {
        let abs = self.resolve_verified(name).await?;
        if abs == self.inner.root {
            return Err(FsError::InvalidPath);
        }
        Ok(abs)
    }

    async fn stat_abs(&self, abs: &Path, name: String) -> FsResult<FileInfo> {
        let meta = tokio::fs::metadata(abs)
            .await
            .map_err(|e| FsError::from_io(e, FsError::FileStat))?;
        Ok(FileInfo::from_metadata(name, &meta))
    }

    fn entry_name(abs: &Path) -> String {
        abs.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string())
    }
}

#[async_trait]
impl FileSystem for RootFileSystem {
    async fn open(&self, name: &str) -> FsResult<FileHandle> {
        let abs = self.resolve_verified(name).await?;
        let file = File::open(&abs)
            .await
            .map_err(|e| FsError::from_io(e, FsError::FileAccess))?;
        let meta = file
            .metadata()
            .await
            .map_err(|e| FsError::from_io(e, FsError::FileStat))?;

        Ok(FileHandle {
            seekable: meta.is_file(),
            info: FileInfo::from_metadata(Self::entry_name(&abs), &meta),
            file,
        })
    }

    async fn stat(&self, name: &str) -> FsResult<FileInfo> {
        let abs = self.resolve_verified(name).await?;
        self.stat_abs(&abs, Self::entry_name(&abs)).await
    }

    async fn read_dir(&self, name: &str) -> FsResult<Vec<FileInfo>> {
        let abs = self.resolve_verified(name).await?;
        let mut entries = tokio::fs::read_dir(&abs)
            .await
            .map_err(|e| FsError::from_io(e, FsError::DirectoryRead))?;

        let mut infos = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => return Err(FsError::DirectoryRead(e)),
            };

            let entry_name = entry.file_name().to_string_lossy().into_owned();
            if !self.inner.show_hidden && is_hidden(&entry_name) {
                continue;
            }

            let path = entry.path();
            if self.verify_symlink_safety(&path).await.is_err() {
                tracing::debug!(entry = %entry_name, "Skipping unsafe directory entry");
                continue;
            }
            match self.stat_abs(&path, entry_name).await {
                Ok(info) => infos.push(info),
                Err(e) => tracing::debug!(error = %e, "Skipping unreadable directory entry"),
            }
        }

        Ok(infos)
    }

    async fn create(&self, name: &str) -> FsResult<File> {
        let abs = self.resolve_child(name).await?;
        if tokio::fs::metadata(&abs).await.is_ok_and(|meta| meta.is_dir()) {
            return Err(FsError::IsDirectory);
        }
        tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&abs)
            .await
            .map_err(|e| FsError::from_io(e, FsError::FileAccess))
    }

    async fn mkdir(&self, name: &str, mode: u32) -> FsResult<()> {
        let abs = self.resolve_child(name).await?;
        let mut builder = tokio::fs::DirBuilder::new();
        #[cfg(unix)]
        builder.mode(mode);
        #[cfg(not(unix))]
        let _ = mode;
        builder
            .create(&abs)
            .await
            .map_err(|e| FsError::from_io(e, FsError::FileAccess))
    }

    async fn remove(&self, name: &str) -> FsResult<()> {
        let abs = self.resolve_child(name).await?;
        let meta = tokio::fs::symlink_metadata(&abs)
            .await
            .map_err(|e| FsError::from_io(e, FsError::FileStat))?;
        let result = if meta.is_dir() {
            tokio::fs::remove_dir(&abs).await
        } else {
            tokio::fs::remove_file(&abs).await
        };
        result.map_err(|e| FsError::from_io(e, FsError::FileAccess))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn setup() -> (tempfile::TempDir, RootFileSystem) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("hello.txt"), "hello world").unwrap();
        std::fs::create_dir(root.join("sub")).unwrap();
        std::fs::write(root.join("sub").join("inner.txt"), "inner").unwrap();
        let fs = RootFileSystem::new(&root, false);
        (dir, fs)
    }

    #[test]
    fn test_is_hidden() {
        assert!(is_hidden(".git"));
        assert!(is_hidden("Thumbs.db"));
        assert!(is_hidden("desktop.ini"));
        assert!(is_hidden("$RECYCLE.BIN"));
        assert!(!is_hidden("notes.txt"));
    }

    #[test]
    fn test_resolve() {
        let (_dir, fs) = setup();
        assert_eq!(fs.resolve("").unwrap(), fs.root());
        assert_eq!(fs.resolve("/").unwrap(), fs.root());
        assert_eq!(fs.resolve("/sub/inner.txt").unwrap(), fs.root().join("sub/inner.txt"));
        assert!(matches!(fs.resolve("/../etc/passwd"), Err(FsError::InvalidPath)));
        assert!(matches!(fs.resolve("/a\0"), Err(FsError::InvalidPath)));
    }

    #[tokio::test]
    async fn test_open_and_stat() {
        let (_dir, fs) = setup();
        let mut handle = fs.open("/hello.txt").await.unwrap();
        assert!(handle.seekable);
        assert_eq!(handle.info.size, 11);
        assert_eq!(handle.info.name, "hello.txt");

        let mut content = String::new();
        handle.file.read_to_string(&mut content).await.unwrap();
        assert_eq!(content, "hello world");

        let info = fs.stat("/sub").await.unwrap();
        assert!(info.is_dir);
        assert!(matches!(fs.stat("/missing").await, Err(FsError::NotFound)));
    }

    #[tokio::test]
    async fn test_read_dir_filters_hidden() {
        let (_dir, fs) = setup();
        std::fs::write(fs.root().join(".secret"), "x").unwrap();
        std::fs::write(fs.root().join("Thumbs.db"), "x").unwrap();

        let mut names: Vec<_> = fs.read_dir("/").await.unwrap().into_iter().map(|i| i.name).collect();
        names.sort();
        assert_eq!(names, vec!["hello.txt", "sub"]);

        let showing = RootFileSystem::new(fs.root(), true);
        let names: Vec<_> = showing.read_dir("/").await.unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names.len(), 4);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_inside_root_allowed() {
        let (_dir, fs) = setup();
        std::os::unix::fs::symlink(fs.root().join("sub/inner.txt"), fs.root().join("link.txt")).unwrap();

        let info = fs.stat("/link.txt").await.unwrap();
        assert_eq!(info.size, 5);
        assert!(fs.open("/link.txt").await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_outside_root_rejected() {
        let (dir, fs) = setup();
        let outside = dir.path().join("outside.txt");
        std::fs::write(&outside, "top secret").unwrap();
        std::os::unix::fs::symlink(&outside, fs.root().join("escape.txt")).unwrap();
        std::os::unix::fs::symlink(dir.path(), fs.root().join("escape_dir")).unwrap();

        assert!(matches!(fs.open("/escape.txt").await, Err(FsError::SymlinkAttack)));
        assert!(matches!(fs.stat("/escape.txt").await, Err(FsError::SymlinkAttack)));
        assert!(matches!(fs.read_dir("/escape_dir").await, Err(FsError::SymlinkAttack)));
        assert!(matches!(fs.stat("/escape_dir/outside.txt").await, Err(FsError::SymlinkAttack)));
        assert!(matches!(fs.create("/escape_dir/new.txt").await, Err(FsError::SymlinkAttack)));
        assert!(!dir.path().join("new.txt").exists());

        // Escaping entries are left out of listings instead of failing them
        let names: Vec<_> = fs.read_dir("/").await.unwrap().into_iter().map(|i| i.name).collect();
        assert!(!names.contains(&"escape.txt".to_string()));
        assert!(!names.contains(&"escape_dir".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_symlink() {
        let (_dir, fs) = setup();
        std::os::unix::fs::symlink(fs.root().join("nowhere"), fs.root().join("dangling")).unwrap();
        assert!(matches!(fs.stat("/dangling").await, Err(FsError::Symlink(_))));
    }

    #[tokio::test]
    async fn test_sibling_directory_with_shared_prefix() {
        let (dir, fs) = setup();
        let sibling = dir.path().join("root-evil");
        std::fs::create_dir(&sibling).unwrap();
        std::fs::write(sibling.join("x.txt"), "x").unwrap();
        assert!(relative_within(fs.root(), &sibling.join("x.txt")).is_none());
        assert!(fs.stat("/../root-evil/x.txt").await.is_err());
    }

    #[tokio::test]
    async fn test_write_operations() {
        let (_dir, fs) = setup();

        let mut file = fs.create("/new.txt").await.unwrap();
        file.write_all(b"data").await.unwrap();
        file.flush().await.unwrap();
        drop(file);
        assert_eq!(std::fs::read_to_string(fs.root().join("new.txt")).unwrap(), "data");

        fs.mkdir("/made", 0o755).await.unwrap();
        assert!(fs.root().join("made").is_dir());
        assert!(matches!(fs.mkdir("/made", 0o755).await, Err(FsError::AlreadyExists)));
        assert!(matches!(fs.create("/made").await, Err(FsError::IsDirectory)));
        assert!(fs.root().join("made").is_dir());

        fs.remove("/new.txt").await.unwrap();
        fs.remove("/made").await.unwrap();
        assert!(!fs.root().join("new.txt").exists());
        assert!(matches!(fs.remove("/new.txt").await, Err(FsError::NotFound)));

        // The root itself is never a write target
        assert!(matches!(fs.remove("/").await, Err(FsError::InvalidPath)));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn resolved_paths_never_leave_root(input in "[a-z日ü/.\\\\ ]{0,32}") {
                let fs = RootFileSystem::new("/srv/mount", false);
                if let Ok(abs) = fs.resolve(&input) {
                    prop_assert!(abs.starts_with("/srv/mount"));
                    prop_assert!(relative_within(Path::new("/srv/mount"), &abs).is_some());
                }
            }
        }
    }
}
