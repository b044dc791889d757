//! Engine modules: turn the resolved descriptors into the output file tree.
//!
//! The engine layer sits between the selection (which descriptors are active)
//! and the host's install manager (which copies files). It only plans; nothing
//! touches the disk.

pub mod merge;
pub mod tree;

pub use merge::{MergeResult, OverwriteNotice, merge};
pub use tree::{DirectoryTree, FileEntry, TreeFile, TreeNode};
