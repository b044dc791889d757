//! Active Descriptor Resolver
//!
//! Translates the selection state of a wizard into the list of file
//! descriptors that take part in the merge.
//!
//! # Design
//!
//! - **Pure logic**: No I/O, no side effects; only reads the wizard and the
//!   fact provider
//! - **Deterministic**: Output is sorted by priority, then declaration sequence
//!
//! # Resolution Rules
//!
//! | Source                  | Included when |
//! |-------------------------|---------------|
//! | `requiredInstallFiles`  | Always |
//! | Plugin files            | Page visible and (always-install, selected, or install-if-usable while usable) |
//! | Conditional installs    | Condition holds against the final selection |

use tracing::debug;

use crate::condition::evaluate_sub;
use crate::manifest::FileDescriptor;
use crate::types::PluginType;
use crate::wizard::InstallWizard;

// ============================================================================
// Descriptor Resolution
// ============================================================================

/// Collect every descriptor the current selection installs.
///
/// Plugin types are resolved the same way the wizard shows them, against the
/// pages before the plugin's own page. Conditional installs see every page.
pub fn resolve_active_descriptors(wizard: &InstallWizard<'_>) -> Vec<FileDescriptor> {
    let config = wizard.config();
    let mut active: Vec<FileDescriptor> = config.required_files.clone();

    for (page, step) in config.steps.iter().enumerate() {
        if !wizard.is_page_visible(page) {
            debug!("Skipping files of hidden page '{}'", step.name);
            continue;
        }
        for (g, group) in step.groups.iter().enumerate() {
            for (p, plugin) in group.plugins.iter().enumerate() {
                let selected = wizard.is_selected(page, g, p);
                let plugin_type = wizard.plugin_type(page, g, p);
                active.extend(
                    plugin
                        .files
                        .iter()
                        .filter(|file| installs(file, selected, plugin_type))
                        .cloned(),
                );
            }
        }
    }

    let flags = wizard.final_flags();
    for conditional in &config.conditional_installs {
        if evaluate_sub(&conditional.condition, &flags, wizard.facts()) {
            active.extend(conditional.files.iter().cloned());
        }
    }

    sort_descriptors(&mut active);
    active
}

/// Sort by priority, then declaration sequence, then paths
pub fn sort_descriptors(descriptors: &mut [FileDescriptor]) {
    descriptors.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(a.sequence.cmp(&b.sequence))
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| a.destination.cmp(&b.destination))
    });
}

// ============================================================================
// Helper Functions
// ============================================================================

fn installs(file: &FileDescriptor, selected: bool, plugin_type: PluginType) -> bool {
    file.always_install
        || selected
        || (file.install_if_usable && plugin_type != PluginType::NotUsable)
}

// ============================================================================
// Tests
// ============================================================================
