//! Type-safe manifest enumerations
//!
//! The XML manifest spells its enumerations as attribute strings
//! (`type="SelectExactlyOne"`, `state="Active"`, ...). These enums replace the
//! strings with exhaustive Rust types parsed through strum.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Cardinality rule for the plugins of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum GroupType {
    SelectAtLeastOne,
    SelectAtMostOne,
    SelectExactlyOne,
    #[default]
    SelectAny,
    SelectAll,
}

impl GroupType {
    /// Check whether `selected` out of `total` plugins satisfies the rule
    pub fn accepts(self, selected: usize, total: usize) -> bool {
        match self {
            Self::SelectAtLeastOne => selected >= 1,
            Self::SelectAtMostOne => selected <= 1,
            Self::SelectExactlyOne => selected == 1,
            Self::SelectAny => true,
            Self::SelectAll => selected == total,
        }
    }

    /// Groups presented as radio buttons: selecting one clears the others
    pub fn is_exclusive(self) -> bool {
        matches!(self, Self::SelectAtMostOne | Self::SelectExactlyOne)
    }
}

/// Resolved status of a plugin for a selection snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum PluginType {
    Required,
    Recommended,
    #[default]
    Optional,
    NotUsable,
    CouldBeUsable,
}

impl PluginType {
    /// Rank used for forced selection: required > recommended > optional >
    /// could-be-usable > not-usable
    pub const fn rank(self) -> u8 {
        match self {
            Self::Required => 4,
            Self::Recommended => 3,
            Self::Optional => 2,
            Self::CouldBeUsable => 1,
            Self::NotUsable => 0,
        }
    }

    /// Whether the user may turn this plugin on
    #[inline]
    pub const fn is_selectable(self) -> bool {
        !matches!(self, Self::NotUsable)
    }

    /// Whether the plugin is forced on and locked
    #[inline]
    pub const fn is_forced_on(self) -> bool {
        matches!(self, Self::Required)
    }

    /// Whether the plugin starts out selected when its page is first shown
    #[inline]
    pub const fn is_preselected(self) -> bool {
        matches!(self, Self::Required | Self::Recommended)
    }
}

/// Presentation order of steps, groups or plugins (`order` attribute)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum ItemOrder {
    #[default]
    Ascending,
    Descending,
    Explicit,
}

/// State of a data file as reported by the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum FileState {
    Active,
    Inactive,
    #[default]
    Missing,
}

/// Boolean composition operator of a composite dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum ConditionOperator {
    #[default]
    And,
    Or,
}

/// Which version a version dependency is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum VersionKind {
    /// `<gameDependency>`: the game executable version
    #[strum(serialize = "game")]
    Game,
    /// `<fommDependency>`: the mod manager version
    #[strum(serialize = "fomm")]
    ModManager,
    /// `<foseDependency>`: the script extender version
    #[strum(serialize = "fose")]
    ScriptExtender,
}

impl VersionKind {
    /// XML element name that declares a dependency on this version
    pub const fn element_name(self) -> &'static str {
        match self {
            Self::Game => "gameDependency",
            Self::ModManager => "fommDependency",
            Self::ScriptExtender => "foseDependency",
        }
    }

    /// Look up the kind for a dependency element name
    pub fn from_element(name: &str) -> Option<Self> {
        match name {
            "gameDependency" => Some(Self::Game),
            "fommDependency" => Some(Self::ModManager),
            "foseDependency" => Some(Self::ScriptExtender),
            _ => None,
        }
    }
}
