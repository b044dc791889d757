//! Tree Merge Engine
//!
//! Maps the active file descriptors from the source tree into a fresh
//! destination tree.
//!
//! # Resolution Rules
//!
//! | Situation                              | Winner |
//! |----------------------------------------|--------|
//! | Leaf claimed by different priorities   | Higher priority |
//! | Leaf claimed at equal priority         | Lower declaration sequence |
//! | Same priority and sequence             | Lexicographically smaller source |
//!
//! Every displaced mapping becomes an [`OverwriteNotice`]. Folder descriptors
//! graft each leaf under the source folder individually, so folder and file
//! descriptors compete per leaf under the same rules.
//!
//! # Design
//!
//! - **Pure logic**: No I/O; the source tree is consumed, nothing is copied on disk
//! - **Deterministic**: Descriptors are sorted before grafting, so the result
//!   and the overwrite log do not depend on input order

use serde::Serialize;
use std::cmp::Ordering;
use tracing::{debug, info};

use super::tree::{DirectoryTree, FileEntry, TreeNode, components, join};
use crate::error::{FomodError, Result};
use crate::logic::resolver::sort_descriptors;
use crate::manifest::FileDescriptor;

// ============================================================================
// Merge Output Types
// ============================================================================

/// A destination leaf changed hands during the merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverwriteNotice {
    pub destination: String,
    pub displaced: FileEntry,
    pub winner: FileEntry,
}

/// Destination tree plus the overwrite log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeResult {
    pub tree: DirectoryTree,
    pub overwrites: Vec<OverwriteNotice>,
}

// ============================================================================
// Merge
// ============================================================================

/// Build the destination tree from `source` and the active descriptors.
///
/// # Errors
///
/// - `MissingSourceFile` if a descriptor names a path the source tree lacks
/// - `DestinationConflict` if a file and a directory meet at one path
pub fn merge(source: DirectoryTree, descriptors: &[FileDescriptor]) -> Result<MergeResult> {
    let mut ordered = descriptors.to_vec();
    sort_descriptors(&mut ordered);

    let mut result = MergeResult::default();
    for descriptor in &ordered {
        if descriptor.is_folder {
            graft_folder(&source, descriptor, &mut result)?;
        } else {
            graft_file(&source, descriptor, &mut result)?;
        }
    }

    info!(
        "Merged {} descriptor(s) into {} file(s), {} overwrite(s)",
        ordered.len(),
        result.tree.file_count(),
        result.overwrites.len()
    );
    Ok(result)
}

fn graft_file(source: &DirectoryTree, descriptor: &FileDescriptor, result: &mut MergeResult) -> Result<()> {
    if source.file(&descriptor.source).is_none() {
        return Err(FomodError::missing_source(&descriptor.source));
    }

    // An empty destination puts the file at the root under its own name
    let destination = if components(&descriptor.destination).is_empty() {
        components(&descriptor.source)
            .last()
            .map(|name| name.to_string())
            .unwrap_or_default()
    } else {
        descriptor.destination.clone()
    };

    claim(result, &destination, record(descriptor, descriptor.source.clone()))
}

fn graft_folder(source: &DirectoryTree, descriptor: &FileDescriptor, result: &mut MergeResult) -> Result<()> {
    let folder = source
        .directory(&descriptor.source)
        .ok_or_else(|| FomodError::missing_source(&descriptor.source))?;

    debug!(
        "Grafting folder '{}' onto '{}'",
        descriptor.source, descriptor.destination
    );

    result.tree.insert_dir(&descriptor.destination)?;
    for dir in folder.directories() {
        result.tree.insert_dir(&join(&descriptor.destination, &dir))?;
    }
    for leaf in folder.files() {
        let destination = join(&descriptor.destination, &leaf.path);
        let source_path = join(&descriptor.source, &leaf.path);
        claim(result, &destination, record(descriptor, source_path))?;
    }
    Ok(())
}

fn record(descriptor: &FileDescriptor, source: String) -> FileEntry {
    FileEntry {
        source,
        priority: descriptor.priority,
        sequence: descriptor.sequence,
    }
}

/// Total order of claims: `Greater` means `a` wins over `b`
fn precedence(a: &FileEntry, b: &FileEntry) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then(b.sequence.cmp(&a.sequence))
        .then_with(|| b.source.cmp(&a.source))
}

fn claim(result: &mut MergeResult, destination: &str, candidate: FileEntry) -> Result<()> {
    let existing = match result.tree.get(destination) {
        Some(TreeNode::File(existing)) => Some(existing.clone()),
        Some(TreeNode::Directory(_)) => {
            return Err(FomodError::DestinationConflict {
                path: destination.to_string(),
            });
        }
        None => None,
    };

    match existing {
        None => {
            result.tree.insert_file(destination, candidate)?;
        }
        Some(existing) if existing == candidate => {}
        Some(existing) => {
            // The leaf keeps the winner's spelling of the destination
            let (winner, displaced) = if precedence(&candidate, &existing) == Ordering::Greater {
                result.tree.insert_file(destination, candidate.clone())?;
                (candidate, existing)
            } else {
                (existing, candidate)
            };

            info!(
                "Overwrite at '{}': '{}' (priority {}) replaces '{}' (priority {})",
                destination, winner.source, winner.priority, displaced.source, displaced.priority
            );
            result.overwrites.push(OverwriteNotice {
                destination: destination.to_string(),
                displaced,
                winner,
            });
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
