//! Installer module
//!
//! Ties the pieces together for one installation session: open a package,
//! run the wizard, resolve the active descriptors and merge them into the
//! destination tree.

use std::path::Path;
use tracing::{info, warn};

use crate::archive::{self, ArchiveLayout};
use crate::choices::InstallChoices;
use crate::engine::{DirectoryTree, OverwriteNotice, merge};
use crate::error::{FomodError, Result};
use crate::facts::{FactProvider, InstallerSettings};
use crate::logic::resolver::resolve_active_descriptors;
use crate::manifest::{GuessQuality, Manifest, ModMetadata};
use crate::wizard::{InstallWizard, WizardState};

/// A FOMOD package ready for installation
#[derive(Debug, Clone)]
pub struct Package {
    pub layout: ArchiveLayout,
    pub manifest: Manifest,
    /// Archive contents below the data root
    pub source: DirectoryTree,
}

impl Package {
    /// Open an extracted archive
    pub fn open(root: &Path) -> Result<Self> {
        let tree = DirectoryTree::from_directory(root)?;
        let layout = archive::detect_layout(&tree).ok_or_else(|| {
            FomodError::parse(
                archive::MODULE_CONFIG,
                format!("no fomod directory in {}", root.display()),
            )
        })?;
        let manifest = Manifest::load(&root.join(&layout.fomod_dir))?;
        Self::assemble(tree, layout, manifest)
    }

    /// Build a package from an archive listing and the raw installer documents
    pub fn from_listing(tree: DirectoryTree, info: Option<&[u8]>, module_config: &[u8]) -> Result<Self> {
        let layout = archive::detect_layout(&tree).unwrap_or(ArchiveLayout {
            fomod_dir: archive::FOMOD_DIR.to_string(),
            data_root: String::new(),
        });
        let manifest = Manifest::parse(info, module_config)?;
        Self::assemble(tree, layout, manifest)
    }

    fn assemble(tree: DirectoryTree, layout: ArchiveLayout, manifest: Manifest) -> Result<Self> {
        let source = tree.into_subtree(&layout.data_root).ok_or_else(|| {
            FomodError::missing_source(layout.data_root.clone())
        })?;
        Ok(Self {
            layout,
            manifest,
            source,
        })
    }
}

/// Result of a completed selection
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub metadata: ModMetadata,
    pub tree: DirectoryTree,
    pub overwrites: Vec<OverwriteNotice>,
    /// Selections that reproduce this installation
    pub choices: InstallChoices,
}

/// How a session ended
#[derive(Debug, Clone)]
pub enum InstallOutcome {
    Success(InstallReport),
    /// The user wants to install by hand; carries the chosen name
    ManualRequested { name: String },
    Cancelled,
}

/// The FOMOD installer as seen by a host application
#[derive(Debug, Clone, Default)]
pub struct FomodInstaller {
    settings: InstallerSettings,
}

impl FomodInstaller {
    pub fn new(settings: InstallerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &InstallerSettings {
        &self.settings
    }

    /// Priority among competing installers
    pub fn priority(&self) -> i32 {
        self.settings.priority()
    }

    /// Whether this installer handles the archive
    pub fn is_archive_supported(&self, tree: &DirectoryTree) -> bool {
        self.settings.enabled && archive::is_archive_supported(tree)
    }

    /// Run a whole session headlessly, driving the wizard from `choices`
    pub fn install(
        &self,
        package: Package,
        facts: &dyn FactProvider,
        choices: &InstallChoices,
    ) -> Result<InstallOutcome> {
        let Package {
            manifest, source, ..
        } = package;

        let mut metadata = manifest.metadata.clone();
        if let Some(name) = &choices.name {
            metadata.set_user_name(name.clone());
        }

        let mut wizard = InstallWizard::new(&manifest.config, facts);
        if !wizard.has_options() {
            info!("'{}' has no options, installing directly", metadata.display_name());
        }
        choices.apply(&mut wizard)?;

        finish(metadata, &wizard, source)
    }
}

/// Turn a terminal wizard into an outcome; a finished wizard is merged.
///
/// # Errors
///
/// - `Navigation` if the wizard is still on a page
/// - merge errors (`MissingSourceFile`, `DestinationConflict`)
pub fn finish(metadata: ModMetadata, wizard: &InstallWizard<'_>, source: DirectoryTree) -> Result<InstallOutcome> {
    match wizard.state() {
        WizardState::Page(page) => Err(FomodError::navigation(format!(
            "selection is not complete, wizard is on page {}",
            page
        ))),
        WizardState::Cancelled => Ok(InstallOutcome::Cancelled),
        WizardState::ManualRequested => {
            warn!("Manual installation requested for '{}'", metadata.display_name());
            Ok(InstallOutcome::ManualRequested {
                name: metadata.display_name().to_string(),
            })
        }
        WizardState::Finished => {
            let descriptors = resolve_active_descriptors(wizard);
            let merged = merge(source, &descriptors)?;

            let mut choices = InstallChoices::record(wizard);
            if metadata.name.quality() == GuessQuality::User {
                choices.name = Some(metadata.display_name().to_string());
            }

            Ok(InstallOutcome::Success(InstallReport {
                metadata,
                tree: merged.tree,
                overwrites: merged.overwrites,
                choices,
            }))
        }
    }
}
