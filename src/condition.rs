//! Condition Engine
//!
//! Boolean predicates over a selection snapshot. Leaves are answered either by
//! the accumulated flag state (flags set by selected plugins) or by the host
//! through a [`FactProvider`]; `SubCondition` composes children with AND/OR.
//!
//! # Page bounds
//!
//! Every evaluation is bounded by a page limit. Only plugins selected on pages
//! with an index at or below the limit contribute flags, so a choice on a later
//! page can never change the visibility or forced types of an earlier one.
//!
//! # Errors
//!
//! A leaf whose target cannot be answered (unknown setting, a version the host
//! does not report) is a [`ConditionError`]. It is logged and the leaf
//! evaluates to `false`; evaluation itself never fails.

use crate::facts::FactProvider;
use crate::types::{ConditionOperator, FileState, VersionKind};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Page limit that includes every page of the manifest
pub const UNBOUNDED: Option<usize> = Some(usize::MAX);

/// A named install-time setting must equal the expected value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCondition {
    pub name: String,
    pub value: String,
}

/// A condition flag must currently hold the given value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionFlag {
    pub name: String,
    pub value: String,
}

impl ConditionFlag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A data file must be in the given state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCondition {
    pub file: String,
    pub state: FileState,
}

/// A host-reported version must be at least `required`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCondition {
    pub kind: VersionKind,
    pub required: String,
}

/// AND/OR composition of child conditions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubCondition {
    pub operator: ConditionOperator,
    pub conditions: Vec<Condition>,
}

impl SubCondition {
    pub fn new(operator: ConditionOperator, conditions: Vec<Condition>) -> Self {
        Self { operator, conditions }
    }

    pub fn and(conditions: Vec<Condition>) -> Self {
        Self::new(ConditionOperator::And, conditions)
    }

    pub fn or(conditions: Vec<Condition>) -> Self {
        Self::new(ConditionOperator::Or, conditions)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// A node of a condition tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Value(ValueCondition),
    Flag(ConditionFlag),
    File(FileCondition),
    Version(VersionCondition),
    Sub(SubCondition),
}

impl Condition {
    /// Shorthand for a flag leaf
    pub fn flag(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Flag(ConditionFlag::new(name, value))
    }

    /// Shorthand for a file leaf
    pub fn file(file: impl Into<String>, state: FileState) -> Self {
        Self::File(FileCondition {
            file: file.into(),
            state,
        })
    }

    /// Shorthand for a version leaf
    pub fn version(kind: VersionKind, required: impl Into<String>) -> Self {
        Self::Version(VersionCondition {
            kind,
            required: required.into(),
        })
    }

    /// Shorthand for a setting leaf
    pub fn value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Value(ValueCondition {
            name: name.into(),
            value: value.into(),
        })
    }
}

/// Leaf targets the host could not answer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    #[error("Host reports no value for setting '{name}'")]
    UnknownSetting { name: String },

    #[error("Host does not report a {kind} version")]
    UnsupportedVersion { kind: VersionKind },
}

/// Accumulated condition flags. Later assignments overwrite earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagState {
    flags: HashMap<String, String>,
}

impl FlagState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.flags.insert(name.into(), value.into());
    }

    /// Apply a list of flags in order
    pub fn apply<'a>(&mut self, flags: impl IntoIterator<Item = &'a ConditionFlag>) {
        for flag in flags {
            self.set(flag.name.clone(), flag.value.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(String::as_str)
    }

    /// True iff `name` currently holds exactly `value`
    pub fn matches(&self, flag: &ConditionFlag) -> bool {
        self.get(&flag.name) == Some(flag.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// Source of the flag state for a page limit
pub trait FlagSource {
    /// Flags set by selected plugins on pages `0..=max_page`.
    /// `None` means no page contributes.
    fn flag_state(&self, max_page: Option<usize>) -> FlagState;
}

/// Page-bounded condition evaluator
pub struct ConditionEngine<'a> {
    flags: &'a dyn FlagSource,
    facts: &'a dyn FactProvider,
}

impl<'a> ConditionEngine<'a> {
    pub fn new(flags: &'a dyn FlagSource, facts: &'a dyn FactProvider) -> Self {
        Self { flags, facts }
    }

    /// Evaluate `condition` considering only selections on pages `<= max_page`.
    ///
    /// The flag state is rebuilt from the selection on every call.
    pub fn evaluate(&self, condition: &Condition, max_page: Option<usize>) -> bool {
        let flags = self.flags.flag_state(max_page);
        evaluate(condition, &flags, self.facts)
    }

    /// Evaluate a composite condition (see [`ConditionEngine::evaluate`])
    pub fn evaluate_sub(&self, condition: &SubCondition, max_page: Option<usize>) -> bool {
        let flags = self.flags.flag_state(max_page);
        evaluate_sub(condition, &flags, self.facts)
    }
}

/// Evaluate a condition tree against an explicit flag state
pub fn evaluate(condition: &Condition, flags: &FlagState, facts: &dyn FactProvider) -> bool {
    let answered = match condition {
        Condition::Flag(flag) => return flags.matches(flag),
        Condition::Sub(sub) => return evaluate_sub(sub, flags, facts),
        Condition::File(file) => Ok(file_matches(file, facts)),
        Condition::Value(value) => value_matches(value, facts),
        Condition::Version(version) => version_satisfied(version, facts),
    };

    answered.unwrap_or_else(|err| {
        warn!("Condition evaluates to false: {}", err);
        false
    })
}

/// Evaluate a composite condition. AND stops on the first false child, OR on
/// the first true child; an empty AND is true and an empty OR is false.
pub fn evaluate_sub(condition: &SubCondition, flags: &FlagState, facts: &dyn FactProvider) -> bool {
    match condition.operator {
        ConditionOperator::And => condition
            .conditions
            .iter()
            .all(|child| evaluate(child, flags, facts)),
        ConditionOperator::Or => condition
            .conditions
            .iter()
            .any(|child| evaluate(child, flags, facts)),
    }
}

fn file_matches(condition: &FileCondition, facts: &dyn FactProvider) -> bool {
    let actual = facts.file_state(&condition.file);
    debug!("File '{}' is {} (required {})", condition.file, actual, condition.state);
    actual == condition.state
}

fn value_matches(condition: &ValueCondition, facts: &dyn FactProvider) -> Result<bool, ConditionError> {
    let actual = facts
        .setting_value(&condition.name)
        .ok_or_else(|| ConditionError::UnknownSetting {
            name: condition.name.clone(),
        })?;
    Ok(actual == condition.value)
}

fn version_satisfied(condition: &VersionCondition, facts: &dyn FactProvider) -> Result<bool, ConditionError> {
    let actual = facts
        .tool_version(condition.kind)
        .ok_or(ConditionError::UnsupportedVersion { kind: condition.kind })?;
    Ok(compare_versions(&actual, &condition.required) != Ordering::Less)
}

/// Compare dotted numeric versions. Missing or unparsable segments count as 0,
/// so `1.2` equals `1.2.0` and `1.x` equals `1.0`.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let parse = |version: &str| -> Vec<u64> {
        version
            .trim()
            .split('.')
            .map(|segment| segment.trim().parse::<u64>().unwrap_or(0))
            .collect()
    };
    let left = parse(left);
    let right = parse(right);
    let len = left.len().max(right.len());

    (0..len)
        .map(|i| {
            let l = left.get(i).copied().unwrap_or(0);
            let r = right.get(i).copied().unwrap_or(0);
            l.cmp(&r)
        })
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}
