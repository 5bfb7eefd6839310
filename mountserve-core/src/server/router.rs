//! Mount router using a segment trie
//!
//! Maps a request path onto the mount with the longest matching URL prefix
//! and rewrites the path so it is relative to that mount. Prefixes are
//! compared segment by segment, so `/api` never matches `/apix`.

use crate::error::{Error, Result};
use crate::server::{Mount, MountInfo};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A mount paired with whatever serves it
#[derive(Debug)]
pub struct MountEntry<H> {
    pub mount: Mount,
    pub handler: H,
}

/// Result of a successful lookup
#[derive(Debug)]
pub struct RouteMatch<H> {
    /// The matched mount
    pub entry: Arc<MountEntry<H>>,
    /// Request path relative to the mount, always starting with `/`
    pub path: String,
}

impl<H> RouteMatch<H> {
    pub fn mount(&self) -> &Mount {
        &self.entry.mount
    }

    pub fn handler(&self) -> &H {
        &self.entry.handler
    }

    /// Request-scoped mount metadata
    pub fn info(&self) -> MountInfo {
        self.entry.mount.info()
    }
}

struct TrieNode<H> {
    children: HashMap<String, TrieNode<H>>,
    entry: Option<Arc<MountEntry<H>>>,
}

impl<H> TrieNode<H> {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            entry: None,
        }
    }

    fn is_terminal(&self) -> bool {
        self.entry.is_some()
    }
}

/// Trie plus the mounts in declaration order
struct RouteTable<H> {
    root: TrieNode<H>,
    ordered: Vec<Arc<MountEntry<H>>>,
}

impl<H> RouteTable<H> {
    fn build(mounts: Vec<(Mount, H)>) -> Result<Self> {
        let mut root = TrieNode::new();
        let mut ordered = Vec::with_capacity(mounts.len());

        for (mount, handler) in mounts {
            if !mount.url_prefix.starts_with('/') {
                return Err(Error::Config(format!(
                    "Mount path must start with '/': {}",
                    mount.url_prefix
                )));
            }

            let mut node = &mut root;
            for segment in split_segments(&mount.url_prefix) {
                node = node
                    .children
                    .entry(segment.to_string())
                    .or_insert_with(TrieNode::new);
            }

            if node.is_terminal() {
                return Err(Error::Config(format!(
                    "Duplicate mount path: {}",
                    mount.url_prefix
                )));
            }

            let entry = Arc::new(MountEntry { mount, handler });
            node.entry = Some(Arc::clone(&entry));
            ordered.push(entry);
        }

        Ok(Self { root, ordered })
    }
}

/// Longest-prefix mount router
///
/// The table is built before serving starts and only ever read afterwards.
/// The lock is held for the trie walk and path rewrite, never across I/O.
pub struct MountRouter<H> {
    table: RwLock<RouteTable<H>>,
}

impl<H> MountRouter<H> {
    /// Build a router from mounts in declaration order
    pub fn new(mounts: Vec<(Mount, H)>) -> Result<Self> {
        let table = RouteTable::build(mounts)?;
        for entry in &table.ordered {
            tracing::debug!(
                prefix = %entry.mount.url_prefix,
                dir = %entry.mount.local_dir.display(),
                readonly = entry.mount.readonly,
                "📂 Registered mount"
            );
        }
        Ok(Self {
            table: RwLock::new(table),
        })
    }

    /// Replace every mount at once
    ///
    /// The new trie is built before the write lock is taken, so readers see
    /// either the old table or the new one, never a partial build.
    pub fn remount(&self, mounts: Vec<(Mount, H)>) -> Result<()> {
        let table = RouteTable::build(mounts)?;
        *self.table.write() = table;
        tracing::info!("🔄 Mount table replaced");
        Ok(())
    }

    /// Find the mount with the longest prefix matching `path`
    pub fn find_best_match(&self, path: &str) -> Option<RouteMatch<H>> {
        let table = self.table.read();
        let mut node = &table.root;
        let mut best = node.entry.as_ref().map(|entry| (entry, 0usize));

        if path.is_empty() || path == "/" {
            return best.map(|(entry, _)| RouteMatch {
                entry: Arc::clone(entry),
                path: "/".to_string(),
            });
        }

        let segments: Vec<&str> = split_segments(path).collect();
        for (depth, segment) in segments.iter().enumerate() {
            match node.children.get(*segment) {
                Some(child) => {
                    node = child;
                    if let Some(entry) = &node.entry {
                        best = Some((entry, depth + 1));
                    }
                }
                None => break,
            }
        }

        let (entry, consumed) = best?;
        Some(RouteMatch {
            entry: Arc::clone(entry),
            path: rewrite(&segments[consumed..], path.ends_with('/')),
        })
    }

    /// First mount in declaration order
    pub fn first_mount(&self) -> Option<Arc<MountEntry<H>>> {
        self.table.read().ordered.first().cloned()
    }

    /// All mounts in declaration order
    pub fn mounts(&self) -> Vec<Arc<MountEntry<H>>> {
        self.table.read().ordered.clone()
    }

    /// Whether a mount is bound to `/`
    pub fn has_root_mount(&self) -> bool {
        self.table.read().root.is_terminal()
    }

    pub fn len(&self) -> usize {
        self.table.read().ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn rewrite(rest: &[&str], trailing_slash: bool) -> String {
    if rest.is_empty() {
        return "/".to_string();
    }
    let mut path = String::with_capacity(rest.iter().map(|s| s.len() + 1).sum::<usize>() + 1);
    for segment in rest {
        path.push('/');
        path.push_str(segment);
    }
    if trailing_slash {
        path.push('/');
    }
    path
}
