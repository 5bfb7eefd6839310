//! Request path sanitizer
//!
//! Turns an untrusted request path into a relative path that can be joined
//! onto a mount root. Pure string work: nothing here touches the filesystem.

use std::path::{Component, Path, PathBuf};

/// Outcome of [`sanitize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sanitized {
    /// The input named the mount root itself (`""`, `"/"`, `"."`)
    Root,
    /// A cleaned relative path with no leading separator
    Relative(String),
    /// Unsafe input; do not proceed
    Rejected,
}

impl Sanitized {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Sanitized::Rejected)
    }

    /// Relative path to join onto a root, `""` for the root itself
    pub fn as_relative(&self) -> Option<&str> {
        match self {
            Sanitized::Root => Some(""),
            Sanitized::Relative(path) => Some(path),
            Sanitized::Rejected => None,
        }
    }
}

/// Sanitize an untrusted request path
///
/// Checks run on the raw input and again after cleaning, so a traversal
/// hidden by normalisation is still caught.
pub fn sanitize(raw: &str) -> Sanitized {
    if raw.bytes().any(|b| b < 0x20 || b == 0x7f) {
        return Sanitized::Rejected;
    }
    if raw.contains("..") {
        return Sanitized::Rejected;
    }

    let trimmed = raw
        .strip_prefix('/')
        .or_else(|| raw.strip_prefix('\\'))
        .unwrap_or(raw);
    if trimmed.is_empty() {
        return Sanitized::Root;
    }

    let cleaned = clean_relative(trimmed);
    if cleaned.is_empty() {
        return Sanitized::Root;
    }

    if cleaned.contains("..") || cleaned.starts_with('/') || cleaned.starts_with('\\') {
        return Sanitized::Rejected;
    }
    if has_drive_letter(&cleaned) {
        return Sanitized::Rejected;
    }

    Sanitized::Relative(cleaned)
}

/// Collapse repeated slashes and drop `.` segments
///
/// A leading separator survives so the post-clean check can reject it.
fn clean_relative(path: &str) -> String {
    let mut cleaned = String::with_capacity(path.len());
    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if !cleaned.is_empty() || path.starts_with('/') {
            cleaned.push('/');
        }
        cleaned.push_str(segment);
    }
    cleaned
}

fn has_drive_letter(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Lexically normalise a path: resolve `.` and `..`, collapse separators
pub fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    cleaned.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    cleaned.pop();
                } else if !cleaned.has_root() {
                    cleaned.push("..");
                }
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }
    cleaned
}

/// Path of `target` relative to `root`, or `None` if it lies outside
///
/// Both sides are cleaned first and compared component-wise, so a sibling
/// such as `/data-evil` is never treated as inside `/data`.
pub fn relative_within(root: &Path, target: &Path) -> Option<PathBuf> {
    let root = clean_path(root);
    let target = clean_path(target);
    if root.is_absolute() != target.is_absolute() {
        return None;
    }

    let rel = target.strip_prefix(&root).ok()?;
    if rel.is_absolute()
        || rel
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return None;
    }
    Some(rel.to_path_buf())
}
