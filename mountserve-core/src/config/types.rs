//! Configuration type definitions
//!
//! These types represent the on-disk configuration for mountserve. They are
//! turned into validated [`Mount`] records once at startup.

use crate::error::{Error, Result};
use crate::server::Mount;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default listen address
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// Default read size for streamed file bodies (64 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Root configuration for mountserve
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MountserveConfig {
    /// Listener and directory behaviour
    #[serde(default)]
    pub server: ServerConfig,

    /// Directory mounts, in declaration order
    #[serde(default)]
    pub mounts: Vec<MountConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (`host:port`, or `:port` for all interfaces)
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Show dot-files and OS junk files in listings (per-mount default)
    #[serde(default)]
    pub show_hidden: bool,

    /// Index files to look for when a directory is requested
    #[serde(default = "default_index")]
    pub index: Vec<String>,

    /// Render a listing for directories without an index file
    #[serde(default = "default_bool_true")]
    pub browse: bool,

    /// Read size used when streaming file bodies
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            show_hidden: false,
            index: default_index(),
            browse: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// A single directory mount as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountConfig {
    /// URL prefix, e.g. `/media`
    pub path: String,

    /// Local directory to expose
    pub dir: String,

    /// Reject uploads, directory creation and deletion
    #[serde(default)]
    pub readonly: bool,

    /// Display name (defaults to the last prefix segment or directory name)
    #[serde(default)]
    pub name: Option<String>,

    /// Override `server.show_hidden` for this mount
    #[serde(default)]
    pub show_hidden: Option<bool>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_index() -> Vec<String> {
    vec!["index.html".to_string()]
}

fn default_bool_true() -> bool {
    true
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

impl MountserveConfig {
    /// Build a single-mount configuration serving `dir` at `/`
    pub fn single(listen: impl Into<String>, dir: impl Into<String>, readonly: bool) -> Self {
        Self {
            server: ServerConfig {
                listen: listen.into(),
                ..Default::default()
            },
            mounts: vec![MountConfig {
                path: "/".to_string(),
                dir: dir.into(),
                readonly,
                name: None,
                show_hidden: None,
            }],
            logging: LoggingConfig::default(),
        }
    }

    /// Parse the listen address, expanding the `:port` shorthand
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let listen = self.server.listen.trim();
        let listen = if listen.starts_with(':') {
            format!("0.0.0.0{}", listen)
        } else {
            listen.to_string()
        };
        listen
            .parse()
            .map_err(|e| Error::Config(format!("Invalid listen address '{}': {}", listen, e)))
    }

    /// Validate the mount list and resolve it into [`Mount`] records
    ///
    /// Prefixes are normalised (leading `/` required, trailing `/` dropped),
    /// duplicates are rejected, and every directory must exist. Directories
    /// are canonicalised so later containment checks compare real paths.
    pub fn validate(&self) -> Result<Vec<Mount>> {
        if self.mounts.is_empty() {
            return Err(Error::Config("No mounts configured".to_string()));
        }
        if self.server.chunk_size == 0 {
            return Err(Error::Config("server.chunk_size must be positive".to_string()));
        }
        self.listen_addr()?;

        let mut seen = HashSet::new();
        let mut mounts = Vec::with_capacity(self.mounts.len());

        for entry in &self.mounts {
            let prefix = normalize_prefix(&entry.path)?;
            if !seen.insert(prefix.clone()) {
                return Err(Error::Config(format!("Duplicate mount path: {}", prefix)));
            }

            let dir = canonical_dir(&entry.dir)?;
            let name = entry
                .name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| derive_name(&prefix, &dir));

            mounts.push(Mount {
                url_prefix: prefix,
                local_dir: dir,
                readonly: entry.readonly,
                display_name: name,
                show_hidden: entry.show_hidden.unwrap_or(self.server.show_hidden),
            });
        }

        Ok(mounts)
    }
}

/// Normalise a mount prefix: must start with `/`, no trailing `/` unless root
fn normalize_prefix(path: &str) -> Result<String> {
    let path = path.trim();
    if !path.starts_with('/') {
        return Err(Error::Config(format!("Mount path must start with '/': {}", path)));
    }
    if path.contains('\0') || path.split('/').any(|seg| seg == "." || seg == "..") {
        return Err(Error::Config(format!("Mount path contains an invalid segment: {}", path)));
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Ok("/".to_string());
    }
    Ok(format!("/{}", segments.join("/")))
}

fn canonical_dir(dir: &str) -> Result<PathBuf> {
    let path = Path::new(dir);
    let meta = std::fs::metadata(path)
        .map_err(|e| Error::Config(format!("Mount directory '{}' is not accessible: {}", dir, e)))?;
    if !meta.is_dir() {
        return Err(Error::Config(format!("Mount directory '{}' is not a directory", dir)));
    }
    std::fs::canonicalize(path)
        .map_err(|e| Error::Config(format!("Failed to resolve mount directory '{}': {}", dir, e)))
}

fn derive_name(prefix: &str, dir: &Path) -> String {
    if let Some(last) = prefix.rsplit('/').find(|s| !s.is_empty()) {
        return last.to_string();
    }
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "/".to_string())
}
