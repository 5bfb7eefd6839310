//! Mount records

use std::path::PathBuf;

/// A URL-prefix to local-directory binding
///
/// Built once from configuration by [`crate::config::MountserveConfig::validate`]
/// and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// URL prefix, always starting with `/` and without a trailing slash
    /// (except the root mount, which is exactly `/`)
    pub url_prefix: String,
    /// Canonical absolute directory
    pub local_dir: PathBuf,
    /// Reject mutating operations
    pub readonly: bool,
    /// Human readable name
    pub display_name: String,
    /// Include hidden entries in directory listings
    pub show_hidden: bool,
}

impl Mount {
    /// Request-scoped view of this mount
    pub fn info(&self) -> MountInfo {
        MountInfo {
            path: self.url_prefix.clone(),
            name: self.display_name.clone(),
            readonly: self.readonly,
        }
    }

    /// Whether this mount sits at the URL root
    pub fn is_root(&self) -> bool {
        self.url_prefix == "/"
    }
}

/// The mount that served a request
///
/// Attached to request extensions by the dispatcher so downstream handlers
/// can show the mount name or hide write controls on readonly mounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    pub path: String,
    pub name: String,
    pub readonly: bool,
}
