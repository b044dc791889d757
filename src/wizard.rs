//! Selection & Visibility State Machine
//!
//! `InstallWizard` owns the per-session selection state of a manifest and
//! enforces the navigation rules of the installer dialog.
//!
//! # Design Principles
//!
//! - **Manifest is read-only**: the wizard borrows the parsed [`ModuleConfig`]
//!   and never changes it
//! - **Nothing cached**: page visibility, plugin types and flags are
//!   recomputed from the selection on every query
//! - **Earlier pages are stable**: a page only sees selections made on pages
//!   before it, so changing a choice can affect later pages, never earlier ones
//!
//! # Page Flow
//!
//! ```text
//! Page(first visible)
//!     ↕ next() / previous()   (hidden pages skipped)
//! Page(last visible)
//!     ↓ next()
//! Finished
//!
//! (Any page can transition to Cancelled or ManualRequested)
//! ```

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::condition::{ConditionEngine, FlagSource, FlagState, UNBOUNDED, evaluate_sub};
use crate::error::{FomodError, Result};
use crate::facts::FactProvider;
use crate::manifest::{Group, ModuleConfig};
use crate::types::{GroupType, PluginType};

/// Where the wizard currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WizardState {
    /// Showing the page with this index
    Page(usize),
    /// Past the last visible page; the selection is final (terminal)
    Finished,
    /// The user aborted (terminal)
    Cancelled,
    /// The user asked to install manually instead (terminal)
    ManualRequested,
}

impl WizardState {
    /// Returns true for Finished, Cancelled and ManualRequested
    #[inline]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Page(_))
    }
}

impl fmt::Display for WizardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(index) => write!(f, "page {}", index),
            Self::Finished => write!(f, "finished"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::ManualRequested => write!(f, "waiting for manual installation"),
        }
    }
}

/// Errors that can occur during wizard navigation and selection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WizardError {
    /// Attempted to navigate or select after the session ended
    #[error("Cannot change a wizard that is {state}")]
    Terminal { state: WizardState },

    /// `previous()` on the first visible page
    #[error("No visible page before '{page}'")]
    AtFirstPage { page: String },

    /// Group index out of range for the current page
    #[error("Page '{page}' has no group #{group}")]
    UnknownGroup { page: String, group: usize },

    /// Plugin index out of range for the group
    #[error("Group '{group}' has no plugin #{plugin}")]
    UnknownPlugin { group: String, plugin: usize },
}

impl From<WizardError> for FomodError {
    fn from(err: WizardError) -> Self {
        let message = err.to_string();
        match err {
            WizardError::Terminal { .. } | WizardError::AtFirstPage { .. } => {
                FomodError::Navigation(message)
            }
            WizardError::UnknownGroup { page, .. } => FomodError::rejected(page, message),
            WizardError::UnknownPlugin { group, .. } => FomodError::rejected(group, message),
        }
    }
}

/// Read-only presentation data for one plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginView {
    pub name: String,
    pub description: String,
    pub image_path: Option<String>,
    pub plugin_type: PluginType,
    pub selected: bool,
    /// Whether the user may change this plugin's selection
    pub enabled: bool,
}

/// Read-only presentation data for one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupView {
    pub name: String,
    pub group_type: GroupType,
    pub plugins: Vec<PluginView>,
}

/// Read-only presentation data for one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageView {
    pub index: usize,
    pub name: String,
    pub groups: Vec<GroupView>,
    /// The "next" control installs instead of advancing
    pub is_last: bool,
}

/// Selection state of one page
#[derive(Debug, Clone, Default)]
struct PageSelection {
    /// Defaults are applied once, on first display
    initialized: bool,
    groups: Vec<Vec<bool>>,
}

impl PageSelection {
    fn is_selected(&self, group: usize, plugin: usize) -> bool {
        self.groups
            .get(group)
            .and_then(|plugins| plugins.get(plugin))
            .copied()
            .unwrap_or(false)
    }
}

/// Per-session installer wizard over a parsed manifest
pub struct InstallWizard<'a> {
    config: &'a ModuleConfig,
    facts: &'a dyn FactProvider,
    selections: Vec<PageSelection>,
    state: WizardState,
}

impl<'a> InstallWizard<'a> {
    /// Start a session on the first visible page.
    ///
    /// Unmet module dependencies are logged but do not block the session. A
    /// manifest without visible pages finishes immediately.
    pub fn new(config: &'a ModuleConfig, facts: &'a dyn FactProvider) -> Self {
        let selections = config
            .steps
            .iter()
            .map(|step| PageSelection {
                initialized: false,
                groups: step
                    .groups
                    .iter()
                    .map(|group| vec![false; group.plugins.len()])
                    .collect(),
            })
            .collect();

        let mut wizard = Self {
            config,
            facts,
            selections,
            state: WizardState::Finished,
        };

        if let Some(dependencies) = &config.dependencies {
            let mut seeded = FlagState::new();
            seeded.apply(&config.seed_flags);
            if !evaluate_sub(dependencies, &seeded, facts) {
                warn!(
                    "Module dependencies of '{}' are not met, continuing anyway",
                    config.module_name
                );
            }
        }

        match wizard.next_visible_from(0) {
            Some(first) => wizard.show_page(first),
            None => info!("'{}' has no visible pages", config.module_name),
        }
        wizard
    }

    pub fn config(&self) -> &'a ModuleConfig {
        self.config
    }

    pub fn facts(&self) -> &'a dyn FactProvider {
        self.facts
    }

    #[inline]
    pub fn state(&self) -> WizardState {
        self.state
    }

    /// Index of the page being shown, if the session is still running
    pub fn current_page(&self) -> Option<usize> {
        match self.state {
            WizardState::Page(index) => Some(index),
            _ => None,
        }
    }

    /// Whether the manifest offers any visible page at all
    pub fn has_options(&self) -> bool {
        (0..self.config.steps.len()).any(|index| self.is_page_visible(index))
    }

    /// Evaluate a page's visibility against the selections of the pages before it
    pub fn is_page_visible(&self, page: usize) -> bool {
        let Some(step) = self.config.steps.get(page) else {
            return false;
        };
        match &step.visible {
            Some(condition) => self.engine().evaluate_sub(condition, page.checked_sub(1)),
            None => true,
        }
    }

    /// Effective type of a plugin, considering selections on earlier pages only
    pub fn plugin_type(&self, page: usize, group: usize, plugin: usize) -> PluginType {
        let Some(plugin) = self
            .config
            .steps
            .get(page)
            .and_then(|step| step.groups.get(group))
            .and_then(|group| group.plugins.get(plugin))
        else {
            return PluginType::NotUsable;
        };

        let flags = self.flag_state(page.checked_sub(1));
        plugin.type_info.resolve(&flags, self.facts)
    }

    pub fn is_selected(&self, page: usize, group: usize, plugin: usize) -> bool {
        self.selections
            .get(page)
            .is_some_and(|selection| selection.is_selected(group, plugin))
    }

    /// Flags after every visible page, as used for conditional installs
    pub fn final_flags(&self) -> FlagState {
        self.flag_state(UNBOUNDED)
    }

    /// True if no visible page follows the current one
    pub fn is_last_page(&self) -> bool {
        match self.state {
            WizardState::Page(index) => self.next_visible_from(index + 1).is_none(),
            _ => true,
        }
    }

    /// Presentation data for the current page
    pub fn page_view(&self) -> Option<PageView> {
        let page = self.current_page()?;
        let step = self.config.steps.get(page)?;

        let groups = step
            .groups
            .iter()
            .enumerate()
            .map(|(g, group)| GroupView {
                name: group.name.clone(),
                group_type: group.group_type,
                plugins: group
                    .plugins
                    .iter()
                    .enumerate()
                    .map(|(p, plugin)| {
                        let plugin_type = self.plugin_type(page, g, p);
                        PluginView {
                            name: plugin.name.clone(),
                            description: plugin.description.clone(),
                            image_path: plugin.image_path.clone(),
                            plugin_type,
                            selected: self.is_selected(page, g, p),
                            enabled: plugin_type.is_selectable()
                                && !plugin_type.is_forced_on()
                                && group.group_type != GroupType::SelectAll,
                        }
                    })
                    .collect(),
            })
            .collect();

        Some(PageView {
            index: page,
            name: step.name.clone(),
            groups,
            is_last: self.is_last_page(),
        })
    }

    /// Change the selection of one plugin on the current page.
    ///
    /// Selecting in a radio group clears the siblings. Refused toggles leave
    /// the selection untouched:
    /// - selecting a not-usable plugin
    /// - deselecting a required plugin or a plugin of a select-all group
    /// - deselecting the only selection of a select-exactly-one group
    /// - replacing a required plugin in a radio group
    pub fn toggle(&mut self, group: usize, plugin: usize, selected: bool) -> Result<()> {
        let page = self.require_page()?;
        let group_def = self.group_def(page, group)?;
        let plugin_def = group_def
            .plugins
            .get(plugin)
            .ok_or_else(|| WizardError::UnknownPlugin {
                group: group_def.name.clone(),
                plugin,
            })?;
        let plugin_type = self.plugin_type(page, group, plugin);

        if selected {
            if !plugin_type.is_selectable() {
                return Err(FomodError::rejected(&plugin_def.name, "plugin is not usable"));
            }
            if group_def.group_type.is_exclusive() {
                let forced_sibling = (0..group_def.plugins.len()).find(|&other| {
                    other != plugin
                        && self.is_selected(page, group, other)
                        && self.plugin_type(page, group, other).is_forced_on()
                });
                if let Some(other) = forced_sibling {
                    return Err(FomodError::rejected(
                        &plugin_def.name,
                        format!("'{}' is required in this group", group_def.plugins[other].name),
                    ));
                }
                self.selections[page].groups[group].fill(false);
            }
        } else {
            if !self.is_selected(page, group, plugin) {
                return Ok(());
            }
            if plugin_type.is_forced_on() {
                return Err(FomodError::rejected(&plugin_def.name, "plugin is required"));
            }
            match group_def.group_type {
                GroupType::SelectAll => {
                    return Err(FomodError::rejected(
                        &plugin_def.name,
                        "every plugin of this group is installed",
                    ));
                }
                GroupType::SelectExactlyOne => {
                    return Err(FomodError::rejected(
                        &plugin_def.name,
                        "exactly one plugin must stay selected, select another one instead",
                    ));
                }
                _ => {}
            }
        }

        debug!(
            "{} '{}' in group '{}'",
            if selected { "Selected" } else { "Deselected" },
            plugin_def.name,
            group_def.name
        );
        self.selections[page].groups[group][plugin] = selected;
        Ok(())
    }

    /// Replace the selection of a whole group on the current page.
    ///
    /// Required plugins stay selected and select-all groups stay full. The
    /// cardinality rule is checked on `next()`, except that radio groups
    /// accept at most one choice here and a select-exactly-one group without
    /// a required plugin refuses an empty choice.
    pub fn select_group(&mut self, group: usize, chosen: &[usize]) -> Result<()> {
        let page = self.require_page()?;
        let group_def = self.group_def(page, group)?;

        for &plugin in chosen {
            let plugin_def = group_def
                .plugins
                .get(plugin)
                .ok_or_else(|| WizardError::UnknownPlugin {
                    group: group_def.name.clone(),
                    plugin,
                })?;
            if !self.plugin_type(page, group, plugin).is_selectable() {
                return Err(FomodError::rejected(&plugin_def.name, "plugin is not usable"));
            }
        }

        let types: Vec<PluginType> = (0..group_def.plugins.len())
            .map(|plugin| self.plugin_type(page, group, plugin))
            .collect();

        if group_def.group_type.is_exclusive() {
            if chosen.len() > 1 {
                return Err(FomodError::Validation {
                    group: group_def.name.clone(),
                    rule: group_def.group_type,
                    selected: chosen.len(),
                });
            }
            let forced = types.iter().position(|t| t.is_forced_on());
            if chosen.is_empty()
                && forced.is_none()
                && group_def.group_type == GroupType::SelectExactlyOne
            {
                return Err(FomodError::Validation {
                    group: group_def.name.clone(),
                    rule: group_def.group_type,
                    selected: 0,
                });
            }
            if let (Some(forced), Some(&wanted)) = (forced, chosen.first()) {
                if forced != wanted {
                    return Err(FomodError::rejected(
                        &group_def.plugins[wanted].name,
                        format!("'{}' is required in this group", group_def.plugins[forced].name),
                    ));
                }
            }
        }

        let select_all = group_def.group_type == GroupType::SelectAll;
        let updated: Vec<bool> = types
            .iter()
            .enumerate()
            .map(|(plugin, plugin_type)| {
                plugin_type.is_selectable()
                    && (chosen.contains(&plugin) || plugin_type.is_forced_on() || select_all)
            })
            .collect();
        self.selections[page].groups[group] = updated;
        Ok(())
    }

    /// Submit the current page and move to the next visible page, or finish.
    ///
    /// # Errors
    ///
    /// - `Validation` if a group's cardinality rule is violated
    /// - `Navigation` if the session already ended
    pub fn next(&mut self) -> Result<WizardState> {
        let page = self.require_page()?;
        self.validate_page(page)?;

        match self.next_visible_from(page + 1) {
            Some(next) => self.show_page(next),
            None => {
                info!("Selection for '{}' is complete", self.config.module_name);
                self.state = WizardState::Finished;
            }
        }
        Ok(self.state)
    }

    /// Go back to the previous visible page
    pub fn previous(&mut self) -> Result<WizardState> {
        let page = self.require_page()?;
        let previous = (0..page)
            .rev()
            .find(|&index| self.is_page_visible(index))
            .ok_or_else(|| WizardError::AtFirstPage {
                page: self.config.steps[page].name.clone(),
            })?;
        self.show_page(previous);
        Ok(self.state)
    }

    /// Abort the session; no tree will be produced
    pub fn cancel(&mut self) {
        info!("Installation of '{}' cancelled", self.config.module_name);
        self.state = WizardState::Cancelled;
    }

    /// Leave the wizard so the user can install manually
    pub fn request_manual(&mut self) {
        info!("Manual installation requested for '{}'", self.config.module_name);
        self.state = WizardState::ManualRequested;
    }

    /// Check every group of a page against its cardinality rule
    pub fn validate_page(&self, page: usize) -> Result<()> {
        let Some(step) = self.config.steps.get(page) else {
            return Ok(());
        };
        for (g, group) in step.groups.iter().enumerate() {
            let selected = (0..group.plugins.len())
                .filter(|&p| self.is_selected(page, g, p))
                .count();
            let usable = (0..group.plugins.len())
                .filter(|&p| self.plugin_type(page, g, p).is_selectable())
                .count();
            if !group.group_type.accepts(selected, usable) {
                return Err(FomodError::Validation {
                    group: group.name.clone(),
                    rule: group.group_type,
                    selected,
                });
            }
        }
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn engine(&self) -> ConditionEngine<'_> {
        ConditionEngine::new(self, self.facts)
    }

    fn require_page(&self) -> std::result::Result<usize, WizardError> {
        self.current_page()
            .ok_or(WizardError::Terminal { state: self.state })
    }

    fn group_def(&self, page: usize, group: usize) -> std::result::Result<&'a Group, WizardError> {
        let config: &'a ModuleConfig = self.config;
        let step = &config.steps[page];
        step.groups.get(group).ok_or_else(|| WizardError::UnknownGroup {
            page: step.name.clone(),
            group,
        })
    }

    fn next_visible_from(&self, start: usize) -> Option<usize> {
        (start..self.config.steps.len()).find(|&index| self.is_page_visible(index))
    }

    /// Make `page` current: defaults on first display, forced types every time
    fn show_page(&mut self, page: usize) {
        let config: &'a ModuleConfig = self.config;
        let step = &config.steps[page];
        let first_display = !self.selections[page].initialized;

        for (g, group) in step.groups.iter().enumerate() {
            let types: Vec<PluginType> = (0..group.plugins.len())
                .map(|p| self.plugin_type(page, g, p))
                .collect();
            let current = &mut self.selections[page].groups[g];

            if first_display {
                apply_defaults(group.group_type, &types, current);
            }
            apply_forced(group, &types, current);
        }

        self.selections[page].initialized = true;
        self.state = WizardState::Page(page);
        debug!("Showing page {} '{}'", page, step.name);
    }
}

impl FlagSource for InstallWizard<'_> {
    /// Seed flags, then the flags of every selected plugin on visible pages
    /// up to `max_page`. Each page's visibility is judged with the flags of
    /// the pages before it.
    fn flag_state(&self, max_page: Option<usize>) -> FlagState {
        let mut flags = FlagState::new();
        flags.apply(&self.config.seed_flags);
        let Some(max_page) = max_page else {
            return flags;
        };

        for (index, step) in self
            .config
            .steps
            .iter()
            .enumerate()
            .take(max_page.saturating_add(1))
        {
            let visible = step
                .visible
                .as_ref()
                .is_none_or(|condition| evaluate_sub(condition, &flags, self.facts));
            if !visible {
                continue;
            }

            for (g, group) in step.groups.iter().enumerate() {
                for (p, plugin) in group.plugins.iter().enumerate() {
                    if self.selections[index].is_selected(g, p) {
                        flags.apply(&plugin.condition_flags);
                    }
                }
            }
        }
        flags
    }
}

/// Initial selection of a group on first display
fn apply_defaults(group_type: GroupType, types: &[PluginType], selection: &mut [bool]) {
    match group_type {
        GroupType::SelectAll => selection.fill(true),
        GroupType::SelectExactlyOne | GroupType::SelectAtMostOne => {
            selection.fill(false);
            // Highest rank wins, the first plugin on ties
            let best = types
                .iter()
                .enumerate()
                .filter(|(_, t)| t.is_selectable())
                .max_by(|(a, ta), (b, tb)| ta.rank().cmp(&tb.rank()).then(b.cmp(a)));
            let pick = best
                .filter(|(_, t)| group_type == GroupType::SelectExactlyOne || t.is_preselected())
                .map(|(index, _)| index);
            if let Some(pick) = pick {
                selection[pick] = true;
            }
        }
        GroupType::SelectAtLeastOne | GroupType::SelectAny => {
            for (selected, plugin_type) in selection.iter_mut().zip(types) {
                *selected = plugin_type.is_preselected();
            }
        }
    }
}

/// Constraints re-applied every time a page is shown
fn apply_forced(group: &Group, types: &[PluginType], selection: &mut [bool]) {
    let group_type = group.group_type;
    if group_type.is_exclusive() {
        let mut forced = types.iter().enumerate().filter(|(_, t)| t.is_forced_on());
        if let Some((required, _)) = forced.next() {
            if forced.next().is_some() {
                warn!(
                    "Group '{}' allows one plugin but several are required, keeping '{}'",
                    group.name, group.plugins[required].name
                );
            }
            selection.fill(false);
            selection[required] = true;
        }
    } else {
        for (selected, plugin_type) in selection.iter_mut().zip(types) {
            if plugin_type.is_forced_on() || group_type == GroupType::SelectAll {
                *selected = true;
            }
        }
    }

    for (selected, plugin_type) in selection.iter_mut().zip(types) {
        if !plugin_type.is_selectable() {
            *selected = false;
        }
    }

    // A radio group that lost its choice falls back to the default pick
    if group_type == GroupType::SelectExactlyOne && !selection.contains(&true) {
        apply_defaults(group_type, types, selection);
    }
}
