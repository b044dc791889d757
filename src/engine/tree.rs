//! Directory Tree
//!
//! Path-addressable file tree used on both sides of the merge: the source tree
//! lists the archive contents, the destination tree is the merge output.
//!
//! # Design
//!
//! - **Case-insensitive**: lookups ignore ASCII case, display names keep the
//!   spelling of their first insertion
//! - **Deterministic**: children are kept in a `BTreeMap`, so iteration order
//!   never depends on insertion order
//! - **Typed conflicts**: a file where a directory is needed (or the reverse)
//!   is a `DestinationConflict` error

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::{FomodError, Result};

// ============================================================================
// Tree Types
// ============================================================================

/// Leaf record: where a file comes from and which rule put it there
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Path inside the archive
    pub source: String,
    pub priority: i32,
    pub sequence: usize,
}

impl FileEntry {
    /// Record for a file listed in a source tree
    pub fn listed(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            priority: 0,
            sequence: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    File(FileEntry),
    Directory(DirectoryTree),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    name: String,
    node: TreeNode,
}

/// A directory and everything below it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryTree {
    entries: BTreeMap<String, Entry>,
}

/// One leaf of a flattened tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeFile {
    pub path: String,
    #[serde(flatten)]
    pub entry: FileEntry,
}

/// Split a path into its non-empty components, accepting both separators
pub fn components(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect()
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

// ============================================================================
// Construction
// ============================================================================

impl DirectoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a source tree from archive paths. Paths ending in a separator are
    /// directories; every other path is a file whose record points at itself.
    pub fn from_paths<I, S>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::new();
        for path in paths {
            let path = path.as_ref();
            let normalized = components(path).join("/");
            if normalized.is_empty() {
                continue;
            }
            if path.ends_with('/') || path.ends_with('\\') {
                tree.insert_dir(&normalized)?;
            } else {
                tree.insert_file(&normalized, FileEntry::listed(normalized.clone()))?;
            }
        }
        Ok(tree)
    }

    /// Build a source tree from an extracted archive on disk
    pub fn from_directory(root: &Path) -> Result<Self> {
        let mut tree = Self::new();
        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|err| std::io::Error::other(err.to_string()))?;
            let path = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if entry.file_type().is_dir() {
                tree.insert_dir(&path)?;
            } else {
                tree.insert_file(&path, FileEntry::listed(path.clone()))?;
            }
        }
        Ok(tree)
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Create a directory and its parents. Existing directories are reused.
    pub fn insert_dir(&mut self, path: &str) -> Result<&mut DirectoryTree> {
        let mut current = self;
        let mut walked = String::new();

        for name in components(path) {
            if !walked.is_empty() {
                walked.push('/');
            }
            walked.push_str(name);

            let entry = current.entries.entry(key(name)).or_insert_with(|| Entry {
                name: name.to_string(),
                node: TreeNode::Directory(DirectoryTree::new()),
            });
            current = match &mut entry.node {
                TreeNode::Directory(dir) => dir,
                TreeNode::File(_) => {
                    return Err(FomodError::DestinationConflict { path: walked });
                }
            };
        }
        Ok(current)
    }

    /// Place a file, creating parent directories. Returns the record it
    /// replaced, if any.
    pub fn insert_file(&mut self, path: &str, file: FileEntry) -> Result<Option<FileEntry>> {
        let parts = components(path);
        let Some((name, parents)) = parts.split_last() else {
            return Err(FomodError::DestinationConflict {
                path: path.to_string(),
            });
        };

        let parent = self.insert_dir(&parents.join("/"))?;
        match parent.entries.get_mut(&key(name)) {
            Some(Entry {
                node: TreeNode::Directory(_),
                ..
            }) => Err(FomodError::DestinationConflict {
                path: parts.join("/"),
            }),
            Some(entry) => {
                entry.name = name.to_string();
                let previous = std::mem::replace(&mut entry.node, TreeNode::File(file));
                Ok(match previous {
                    TreeNode::File(previous) => Some(previous),
                    TreeNode::Directory(_) => None,
                })
            }
            None => {
                parent.entries.insert(
                    key(name),
                    Entry {
                        name: name.to_string(),
                        node: TreeNode::File(file),
                    },
                );
                Ok(None)
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Node at `path`; the empty path is not a node
    pub fn get(&self, path: &str) -> Option<&TreeNode> {
        let parts = components(path);
        let (name, parents) = parts.split_last()?;

        let mut current = self;
        for parent in parents {
            match &current.entries.get(&key(parent))?.node {
                TreeNode::Directory(dir) => current = dir,
                TreeNode::File(_) => return None,
            }
        }
        current.entries.get(&key(name)).map(|entry| &entry.node)
    }

    /// Directory at `path`; the empty path is the tree itself
    pub fn directory(&self, path: &str) -> Option<&DirectoryTree> {
        if components(path).is_empty() {
            return Some(self);
        }
        match self.get(path)? {
            TreeNode::Directory(dir) => Some(dir),
            TreeNode::File(_) => None,
        }
    }

    /// File record at `path`
    pub fn file(&self, path: &str) -> Option<&FileEntry> {
        match self.get(path)? {
            TreeNode::File(file) => Some(file),
            TreeNode::Directory(_) => None,
        }
    }

    /// Every leaf below this directory with its relative path, depth first in
    /// case-insensitive name order
    pub fn files(&self) -> Vec<TreeFile> {
        let mut out = Vec::new();
        self.collect_files("", &mut out);
        out
    }

    /// Every directory below this one (relative paths), parents first
    pub fn directories(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_dirs("", &mut out);
        out
    }

    /// Direct children with their display names
    pub fn entries(&self) -> impl Iterator<Item = (&str, &TreeNode)> {
        self.entries
            .values()
            .map(|entry| (entry.name.as_str(), &entry.node))
    }

    /// Detach the directory at `path`; the empty path is the whole tree
    pub fn into_subtree(mut self, path: &str) -> Option<DirectoryTree> {
        let parts = components(path);
        let Some((name, parents)) = parts.split_last() else {
            return Some(self);
        };

        let mut current = &mut self;
        for parent in parents {
            match &mut current.entries.get_mut(&key(parent))?.node {
                TreeNode::Directory(dir) => current = dir,
                TreeNode::File(_) => return None,
            }
        }
        match current.entries.remove(&key(name))?.node {
            TreeNode::Directory(dir) => Some(dir),
            TreeNode::File(_) => None,
        }
    }

    pub fn file_count(&self) -> usize {
        self.entries
            .values()
            .map(|entry| match &entry.node {
                TreeNode::File(_) => 1,
                TreeNode::Directory(dir) => dir.file_count(),
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indented listing, one entry per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(0, &mut out);
        out
    }

    fn collect_files(&self, prefix: &str, out: &mut Vec<TreeFile>) {
        for entry in self.entries.values() {
            let path = join(prefix, &entry.name);
            match &entry.node {
                TreeNode::File(file) => out.push(TreeFile {
                    path,
                    entry: file.clone(),
                }),
                TreeNode::Directory(dir) => dir.collect_files(&path, out),
            }
        }
    }

    fn collect_dirs(&self, prefix: &str, out: &mut Vec<String>) {
        for entry in self.entries.values() {
            if let TreeNode::Directory(dir) = &entry.node {
                let path = join(prefix, &entry.name);
                out.push(path.clone());
                dir.collect_dirs(&path, out);
            }
        }
    }

    fn render_into(&self, depth: usize, out: &mut String) {
        for entry in self.entries.values() {
            let indent = "  ".repeat(depth);
            match &entry.node {
                TreeNode::File(file) => {
                    out.push_str(&format!(
                        "{}{}  <- {} (priority {})\n",
                        indent, entry.name, file.source, file.priority
                    ));
                }
                TreeNode::Directory(dir) => {
                    out.push_str(&format!("{}{}/\n", indent, entry.name));
                    dir.render_into(depth + 1, out);
                }
            }
        }
    }
}

/// Join two relative paths with a forward slash
pub fn join(prefix: &str, name: &str) -> String {
    match (prefix.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{}/{}", prefix, name),
    }
}

// ============================================================================
// Tests
// ============================================================================
