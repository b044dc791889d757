//! Manifest Model
//!
//! In-memory form of a FOMOD package: metadata from `info.xml` and the install
//! script from `ModuleConfig.xml`. The model is built once at load time and
//! never mutated by the wizard; all per-session state lives in
//! [`crate::wizard::InstallWizard`].

pub mod metadata;
pub mod parser;
pub mod xml;

use serde::{Deserialize, Serialize};

use crate::condition::{ConditionFlag, FlagState, SubCondition, evaluate_sub};
use crate::facts::FactProvider;
use crate::types::{GroupType, PluginType};

pub use metadata::{GuessQuality, GuessedValue, ModMetadata};
pub use parser::{parse_module_config, Manifest};

/// A file or folder mapping from the archive into the destination tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Path inside the archive, relative to the parent of the `fomod` directory
    pub source: String,
    /// Path inside the destination tree; empty means the root
    pub destination: String,
    /// Higher priority wins when two descriptors claim the same leaf
    pub priority: i32,
    pub is_folder: bool,
    /// Installed whenever the owning plugin's page is visible
    pub always_install: bool,
    /// Installed unless the owning plugin resolves to not-usable
    pub install_if_usable: bool,
    /// Declaration order within the manifest; lower wins priority ties
    pub sequence: usize,
}

/// `(type, condition)` entry of a plugin's dependency type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyPattern {
    pub plugin_type: PluginType,
    pub condition: SubCondition,
}

/// How a plugin's effective type is determined
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginTypeInfo {
    pub default_type: PluginType,
    pub patterns: Vec<DependencyPattern>,
}

impl PluginTypeInfo {
    /// A plugin type that never changes
    pub fn fixed(plugin_type: PluginType) -> Self {
        Self {
            default_type: plugin_type,
            patterns: Vec::new(),
        }
    }

    /// Type of the first pattern whose condition holds, else the default
    pub fn resolve(&self, flags: &FlagState, facts: &dyn FactProvider) -> PluginType {
        self.patterns
            .iter()
            .find(|pattern| evaluate_sub(&pattern.condition, flags, facts))
            .map(|pattern| pattern.plugin_type)
            .unwrap_or(self.default_type)
    }

    /// Whether the type can change with the selection or the host state
    pub fn is_dynamic(&self) -> bool {
        !self.patterns.is_empty()
    }
}

/// One selectable option
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    pub name: String,
    pub description: String,
    pub image_path: Option<String>,
    pub type_info: PluginTypeInfo,
    /// Flags set while this plugin is selected
    pub condition_flags: Vec<ConditionFlag>,
    pub files: Vec<FileDescriptor>,
}

/// Named set of plugins with a cardinality rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub group_type: GroupType,
    pub plugins: Vec<Plugin>,
}

impl Group {
    pub fn plugin(&self, name: &str) -> Option<(usize, &Plugin)> {
        self.plugins
            .iter()
            .enumerate()
            .find(|(_, plugin)| plugin.name == name)
    }
}

/// A wizard page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallStep {
    pub name: String,
    /// Page is shown only while this holds; `None` means always visible
    pub visible: Option<SubCondition>,
    pub groups: Vec<Group>,
}

/// Files installed whenever a condition holds, regardless of plugin selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalInstall {
    pub condition: SubCondition,
    pub files: Vec<FileDescriptor>,
}

/// Parsed `ModuleConfig.xml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub module_name: String,
    pub module_image: Option<String>,
    /// `moduleDependencies`: checked once when a session starts
    pub dependencies: Option<SubCondition>,
    /// Flags set before the first page is shown
    pub seed_flags: Vec<ConditionFlag>,
    pub required_files: Vec<FileDescriptor>,
    pub steps: Vec<InstallStep>,
    pub conditional_installs: Vec<ConditionalInstall>,
}

impl ModuleConfig {
    /// Number of plugins across every page
    pub fn plugin_count(&self) -> usize {
        self.steps
            .iter()
            .flat_map(|step| &step.groups)
            .map(|group| group.plugins.len())
            .sum()
    }

    /// Every descriptor declared anywhere in the manifest, in declaration order
    pub fn all_descriptors(&self) -> Vec<&FileDescriptor> {
        let mut all: Vec<&FileDescriptor> = self
            .required_files
            .iter()
            .chain(
                self.steps
                    .iter()
                    .flat_map(|step| &step.groups)
                    .flat_map(|group| &group.plugins)
                    .flat_map(|plugin| &plugin.files),
            )
            .chain(self.conditional_installs.iter().flat_map(|ci| &ci.files))
            .collect();
        all.sort_by_key(|descriptor| descriptor.sequence);
        all
    }
}
