//! FOMOD installer engine
//!
//! This library reads a FOMOD package's installer documents, drives the
//! selection wizard over them and merges the chosen files into the tree a
//! mod manager installs.

pub mod archive;
pub mod choices;
pub mod cli;
pub mod condition;
pub mod engine;
pub mod error;
pub mod facts;
pub mod installer;
pub mod logic;
pub mod manifest;
pub mod types;
pub mod wizard;

// Re-export main types for convenience
pub use choices::{GroupChoice, InstallChoices, StepChoice};
pub use condition::{
    Condition, ConditionEngine, ConditionFlag, FileCondition, FlagSource, FlagState,
    SubCondition, ValueCondition, VersionCondition,
};
pub use error::{FomodError, Result};
pub use facts::{FactProvider, FactSheet, InstallerSettings};
pub use installer::{FomodInstaller, InstallOutcome, InstallReport, Package};
pub use manifest::{
    FileDescriptor, Group, InstallStep, Manifest, ModMetadata, ModuleConfig, Plugin,
    parse_module_config,
};
pub use types::{ConditionOperator, FileState, GroupType, ItemOrder, PluginType, VersionKind};
pub use wizard::{InstallWizard, PageView, WizardError, WizardState};

// Tree merge engine
pub use engine::{DirectoryTree, MergeResult, OverwriteNotice, merge};

// Descriptor resolver
pub use logic::resolver::resolve_active_descriptors;
