//! Archive layout detection.
//!
//! Decides whether an archive listing is a FOMOD package, where its `fomod`
//! directory lives, and which files must be extracted before the wizard can
//! run.

use serde::Serialize;
use tracing::debug;

use crate::engine::tree::{DirectoryTree, TreeNode, join};

/// Name of the installer directory
pub const FOMOD_DIR: &str = "fomod";
/// Install script inside the installer directory
pub const MODULE_CONFIG: &str = "ModuleConfig.xml";
/// Optional metadata inside the installer directory
pub const INFO: &str = "info.xml";

const IMAGE_EXTENSIONS: [&str; 4] = [".png", ".jpg", ".gif", ".bmp"];

/// Where the installer and the installable data sit inside an archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveLayout {
    /// Path of the `fomod` directory, with the archive's spelling
    pub fomod_dir: String,
    /// Parent of the `fomod` directory; descriptor sources are relative to it
    pub data_root: String,
}

/// Locate the `fomod` directory.
///
/// It is either a top-level directory named `fomod` (any case), or found by
/// descending while a level holds exactly one directory and no files.
pub fn detect_layout(tree: &DirectoryTree) -> Option<ArchiveLayout> {
    let mut current = tree;
    let mut prefix = String::new();

    loop {
        if let Some((name, _)) = current.entries().find(|(name, node)| {
            matches!(node, TreeNode::Directory(_)) && name.eq_ignore_ascii_case(FOMOD_DIR)
        }) {
            let layout = ArchiveLayout {
                fomod_dir: join(&prefix, name),
                data_root: prefix,
            };
            debug!("Found installer directory at '{}'", layout.fomod_dir);
            return Some(layout);
        }

        let mut entries = current.entries();
        match (entries.next(), entries.next()) {
            (Some((name, TreeNode::Directory(dir))), None) => {
                prefix = join(&prefix, name);
                current = dir;
            }
            _ => return None,
        }
    }
}

/// An archive is a FOMOD package iff its `fomod` directory holds `ModuleConfig.xml`
pub fn is_archive_supported(tree: &DirectoryTree) -> bool {
    detect_layout(tree)
        .and_then(|layout| tree.directory(&layout.fomod_dir).map(has_module_config))
        .unwrap_or(false)
}

fn has_module_config(fomod: &DirectoryTree) -> bool {
    fomod.entries().any(|(name, node)| {
        matches!(node, TreeNode::File(_)) && name.eq_ignore_ascii_case(MODULE_CONFIG)
    })
}

/// Files needed before the wizard starts: `info.xml`, `ModuleConfig.xml` and
/// every image in the archive
pub fn installer_files(tree: &DirectoryTree) -> Vec<String> {
    let mut files = Vec::new();

    if let Some(layout) = detect_layout(tree) {
        if let Some(fomod) = tree.directory(&layout.fomod_dir) {
            for (name, node) in fomod.entries() {
                let wanted =
                    name.eq_ignore_ascii_case(INFO) || name.eq_ignore_ascii_case(MODULE_CONFIG);
                if wanted && matches!(node, TreeNode::File(_)) {
                    files.push(join(&layout.fomod_dir, name));
                }
            }
        }
    }

    for file in tree.files() {
        let lower = file.path.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) && !files.contains(&file.path) {
            files.push(file.path);
        }
    }
    files
}
