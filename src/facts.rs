//! Host facts and installer settings.
//!
//! The engine never inspects the host's mod registry directly. Every file,
//! setting and version question is routed through [`FactProvider`].
//! [`FactSheet`] is a static provider loaded from JSON, used by the command
//! line driver and the tests.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::types::{FileState, VersionKind};

/// Injected source of external facts for the condition engine.
///
/// Calls are synchronous and treated as idempotent; answers are never cached
/// across evaluations.
pub trait FactProvider {
    /// State of a data file (plugin or loose file) in the host
    fn file_state(&self, path: &str) -> FileState;

    /// Value of a named install-time setting, `None` if unknown
    fn setting_value(&self, name: &str) -> Option<String>;

    /// Version of the game or a companion tool, `None` if not reported
    fn tool_version(&self, kind: VersionKind) -> Option<String>;
}

/// Installer preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerSettings {
    /// Whether the installer handles archives at all
    pub enabled: bool,
    /// Prefer this installer over competing ones
    pub prefer: bool,
    /// Answer file conditions for loose files, not only plugins
    pub use_any_file: bool,
    /// Report files inside disabled mods as inactive instead of missing
    pub see_disabled_mods: bool,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            prefer: true,
            use_any_file: false,
            see_disabled_mods: false,
        }
    }
}

impl InstallerSettings {
    /// Installer priority among competing installers
    pub fn priority(&self) -> i32 {
        if self.prefer { 110 } else { 90 }
    }

    /// Save settings to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize settings to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write settings to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load settings from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("Failed to parse settings JSON")
    }
}

/// How [`FactSheet`] answers file conditions on non-plugin files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FilePolicy {
    use_any_file: bool,
    see_disabled_mods: bool,
}

/// Static snapshot of the host's state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactSheet {
    /// Plugin files (`.esp`/`.esm`) enabled in the load order
    pub active_plugins: Vec<String>,
    /// Plugin files present but disabled
    pub inactive_plugins: Vec<String>,
    /// Loose files provided by enabled mods
    pub data_files: Vec<String>,
    /// Files provided by installed but disabled mods
    pub disabled_mod_files: Vec<String>,
    /// Named install-time settings
    pub settings: HashMap<String, String>,
    /// Reported tool versions
    pub versions: HashMap<VersionKind, String>,

    #[serde(skip)]
    policy: FilePolicy,
}

impl FactSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the file lookup rules of the installer settings
    pub fn with_settings(mut self, settings: &InstallerSettings) -> Self {
        self.policy = FilePolicy {
            use_any_file: settings.use_any_file,
            see_disabled_mods: settings.see_disabled_mods,
        };
        self
    }

    /// Load a fact sheet from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read fact sheet from {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("Failed to parse fact sheet JSON")
    }

    /// Save the fact sheet to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize fact sheet to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write fact sheet to {:?}", path.as_ref()))?;

        Ok(())
    }

    fn plugin_state(&self, path: &str) -> FileState {
        if contains_path(&self.active_plugins, path) {
            FileState::Active
        } else if contains_path(&self.inactive_plugins, path) {
            FileState::Inactive
        } else {
            FileState::Missing
        }
    }

    fn loose_file_state(&self, path: &str) -> FileState {
        if contains_path(&self.data_files, path) {
            return FileState::Active;
        }
        if self.policy.see_disabled_mods && contains_path(&self.disabled_mod_files, path) {
            return FileState::Inactive;
        }
        FileState::Missing
    }
}

impl FactProvider for FactSheet {
    fn file_state(&self, path: &str) -> FileState {
        if is_plugin_file(path) {
            self.plugin_state(path)
        } else if self.policy.use_any_file {
            self.loose_file_state(path)
        } else {
            warn!(
                "File condition on non-plugin file '{}' requires use_any_file, reporting missing",
                path
            );
            FileState::Missing
        }
    }

    fn setting_value(&self, name: &str) -> Option<String> {
        self.settings.get(name).cloned()
    }

    fn tool_version(&self, kind: VersionKind) -> Option<String> {
        self.versions.get(&kind).cloned()
    }
}

/// `.esp` and `.esm` files are looked up in the plugin list
pub fn is_plugin_file(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.ends_with(".esp") || lower.ends_with(".esm")
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
        .trim_matches('/')
        .to_ascii_lowercase()
}

fn contains_path(list: &[String], path: &str) -> bool {
    let wanted = normalize(path);
    list.iter().any(|entry| normalize(entry) == wanted)
}
