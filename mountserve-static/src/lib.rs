//! Mountserve static content
//!
//! Everything that touches the disk on behalf of a mount:
//! - Request path sanitizing and root containment
//! - The `FileSystem` capability trait with root and readonly variants
//! - Single-range negotiation
//! - Streaming file bodies, index files and directory listings

pub mod error;
pub mod file_server;
pub mod fs;
pub mod listing;
pub mod mime;
pub mod pool;
pub mod range;
pub mod readonly;
pub mod root;
pub mod sanitize;

pub use error::{FsError, FsResult};
pub use file_server::{ByteStream, ContentRequest, FileServer, FileServerConfig, Served, ServedFile};
pub use fs::{FileHandle, FileInfo, FileSystem, MountFs};
pub use pool::{BufferPool, PooledBuf};
pub use range::{ByteRange, RangeDecision, RangeError};
pub use readonly::ReadonlyFs;
pub use root::RootFileSystem;
pub use sanitize::{sanitize, Sanitized};
