//! Choices file handling for replaying installer selections.
//!
//! A choices file names, per page and group, the plugins to select. It lets the
//! same installation run again without interaction. Pages and groups are
//! addressed by name, so files stay valid when the manifest sorts them
//! differently.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::FomodError;
use crate::wizard::{InstallWizard, WizardState};

/// Selected plugins of one group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupChoice {
    pub name: String,
    #[serde(default)]
    pub plugins: Vec<String>,
}

/// Choices for one page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepChoice {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<GroupChoice>,
}

/// Selections that can be saved and replayed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallChoices {
    /// Display name chosen by the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Skip the wizard and hand the archive to manual installation
    #[serde(default)]
    pub manual: bool,
    #[serde(default)]
    pub steps: Vec<StepChoice>,
}

impl InstallChoices {
    /// Create empty choices: every page keeps its defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Save choices to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize choices to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write choices to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load choices from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read choices from {:?}", path.as_ref()))?;

        let choices: Self =
            serde_json::from_str(&content).context("Failed to parse choices JSON")?;

        Ok(choices)
    }

    /// Validate the choices
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                anyhow::bail!("Name override cannot be empty");
            }
        }

        let mut seen_steps = HashSet::new();
        for step in &self.steps {
            if step.name.trim().is_empty() {
                anyhow::bail!("Step name must be specified");
            }
            if !seen_steps.insert(step.name.as_str()) {
                anyhow::bail!("Step '{}' is listed more than once", step.name);
            }

            let mut seen_groups = HashSet::new();
            for group in &step.groups {
                if group.name.trim().is_empty() {
                    anyhow::bail!("Group name must be specified in step '{}'", step.name);
                }
                if !seen_groups.insert(group.name.as_str()) {
                    anyhow::bail!(
                        "Group '{}' is listed more than once in step '{}'",
                        group.name,
                        step.name
                    );
                }
            }
        }

        Ok(())
    }

    /// Drive the wizard to a terminal state.
    ///
    /// On every page shown, listed groups get exactly the listed plugins and
    /// unlisted groups keep their defaults; then the page is submitted.
    ///
    /// # Errors
    ///
    /// - `SelectionRejected` for unknown group or plugin names and refused
    ///   selections
    /// - `Validation` if a page fails its group rules
    pub fn apply(&self, wizard: &mut InstallWizard<'_>) -> crate::error::Result<WizardState> {
        if self.manual {
            wizard.request_manual();
            return Ok(wizard.state());
        }

        while let Some(page) = wizard.current_page() {
            let step = &wizard.config().steps[page];
            if let Some(choice) = self.steps.iter().find(|choice| choice.name == step.name) {
                for group_choice in &choice.groups {
                    let (g, group) = step
                        .groups
                        .iter()
                        .enumerate()
                        .find(|(_, group)| group.name == group_choice.name)
                        .ok_or_else(|| {
                            FomodError::rejected(
                                &group_choice.name,
                                format!("page '{}' has no such group", step.name),
                            )
                        })?;

                    let chosen = group_choice
                        .plugins
                        .iter()
                        .map(|plugin| {
                            group.plugin(plugin).map(|(p, _)| p).ok_or_else(|| {
                                FomodError::rejected(
                                    plugin,
                                    format!("group '{}' has no such plugin", group.name),
                                )
                            })
                        })
                        .collect::<crate::error::Result<Vec<_>>>()?;

                    debug!("Applying {} choice(s) to group '{}'", chosen.len(), group.name);
                    wizard.select_group(g, &chosen)?;
                }
            }
            wizard.next()?;
        }

        info!("Choices applied, wizard is {}", wizard.state());
        Ok(wizard.state())
    }

    /// Capture the current selection of every visible page
    pub fn record(wizard: &InstallWizard<'_>) -> Self {
        let config = wizard.config();
        let steps = config
            .steps
            .iter()
            .enumerate()
            .filter(|(page, _)| wizard.is_page_visible(*page))
            .map(|(page, step)| StepChoice {
                name: step.name.clone(),
                groups: step
                    .groups
                    .iter()
                    .enumerate()
                    .map(|(g, group)| GroupChoice {
                        name: group.name.clone(),
                        plugins: group
                            .plugins
                            .iter()
                            .enumerate()
                            .filter(|(p, _)| wizard.is_selected(page, g, *p))
                            .map(|(_, plugin)| plugin.name.clone())
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            name: None,
            manual: wizard.state() == WizardState::ManualRequested,
            steps,
        }
    }
}
