//! Mountserve Core Library
//!
//! This crate provides the pieces shared by every mountserve component:
//! configuration loading and validation, the top-level error type, and the
//! mount router that maps request paths onto configured directory mounts.

pub mod config;
pub mod error;
pub mod server;

pub use error::{Error, Result};

/// Mountserve version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
