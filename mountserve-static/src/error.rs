//! Filesystem error kinds
//!
//! Every failure carries a stable code and a suggested HTTP status. The
//! underlying OS error is kept as the `source` for logging but never
//! appears in `Display`, so host paths do not leak to clients.

use http::StatusCode;
use std::io;
use thiserror::Error;

/// Result type for filesystem operations
pub type FsResult<T> = std::result::Result<T, FsError>;

#[derive(Debug, Error)]
pub enum FsError {
    /// Path failed sanitization or escapes the mount root
    #[error("invalid path")]
    InvalidPath,

    /// Nothing exists at the path
    #[error("file not found")]
    NotFound,

    /// Opening, creating or removing failed
    #[error("file access error")]
    FileAccess(#[source] io::Error),

    /// Metadata lookup failed
    #[error("file stat error")]
    FileStat(#[source] io::Error),

    /// Listing a directory failed
    #[error("directory read error")]
    DirectoryRead(#[source] io::Error),

    /// A symlink could not be resolved
    #[error("symlink could not be resolved")]
    Symlink(#[source] io::Error),

    /// A symlink resolves outside the mount root
    #[error("symlink points outside the mount")]
    SymlinkAttack,

    /// Mutating operation on a readonly mount
    #[error("mount is read-only")]
    ReadOnly,

    /// Target of a create operation already exists
    #[error("file already exists")]
    AlreadyExists,

    /// A file operation named a directory
    #[error("cannot write to a directory")]
    IsDirectory,
}

impl FsError {
    /// Stable machine readable code
    pub fn code(&self) -> &'static str {
        match self {
            FsError::InvalidPath => "invalid_path",
            FsError::NotFound => "not_found",
            FsError::FileAccess(_) => "file_access_error",
            FsError::FileStat(_) => "file_stat_error",
            FsError::DirectoryRead(_) => "directory_read_error",
            FsError::Symlink(_) => "symlink_error",
            FsError::SymlinkAttack => "symlink_attack",
            FsError::ReadOnly => "read_only",
            FsError::AlreadyExists => "already_exists",
            FsError::IsDirectory => "is_directory",
        }
    }

    /// Suggested HTTP status
    pub fn status(&self) -> StatusCode {
        match self {
            FsError::InvalidPath | FsError::NotFound => StatusCode::NOT_FOUND,
            FsError::Symlink(_) | FsError::SymlinkAttack | FsError::ReadOnly => {
                StatusCode::FORBIDDEN
            }
            FsError::AlreadyExists | FsError::IsDirectory => StatusCode::CONFLICT,
            FsError::FileAccess(e) | FsError::FileStat(e) | FsError::DirectoryRead(e) => {
                match e.kind() {
                    io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    io::ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                }
            }
        }
    }

    /// Classify an OS error, folding "not found" into [`FsError::NotFound`]
    pub(crate) fn from_io(err: io::Error, wrap: fn(io::Error) -> FsError) -> FsError {
        match err.kind() {
            io::ErrorKind::NotFound => FsError::NotFound,
            io::ErrorKind::AlreadyExists => FsError::AlreadyExists,
            io::ErrorKind::IsADirectory => FsError::IsDirectory,
            _ => wrap(err),
        }
    }
}
