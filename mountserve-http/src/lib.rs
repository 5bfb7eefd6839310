//! Mountserve HTTP front end
//!
//! This crate provides the network side of mountserve:
//! - The HTTP/1.1 accept loop (hyper)
//! - Longest-prefix dispatch with panic recovery
//! - Per-mount method handling (read, upload, mkdir, delete)
//! - Streaming response bodies

pub mod body;
pub mod handler;
pub mod server;

pub use body::ResponseBody;
pub use handler::MountHandler;
pub use server::{bind, MountServer};
