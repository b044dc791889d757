//! Mod metadata from `info.xml` and the "guessed" display name.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::xml;
use crate::error::Result;

/// Confidence of a guessed value, weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum GuessQuality {
    #[default]
    Invalid,
    /// Derived from something unrelated (archive file name, `moduleName`)
    Fallback,
    /// Plausible guess
    Good,
    /// Read from package metadata
    Meta,
    /// Supplied by the host before installation
    Preset,
    /// Typed by the user
    User,
}

/// A value that may be replaced by better guesses later on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessedValue<T> {
    value: T,
    quality: GuessQuality,
}

impl<T> GuessedValue<T> {
    pub fn new(value: T, quality: GuessQuality) -> Self {
        Self { value, quality }
    }

    /// Replace the value if `quality` is at least the current quality.
    /// Returns whether the update applied.
    pub fn update(&mut self, value: T, quality: GuessQuality) -> bool {
        if quality < self.quality {
            return false;
        }
        self.value = value;
        self.quality = quality;
        true
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn quality(&self) -> GuessQuality {
        self.quality
    }
}

impl<T: fmt::Display> fmt::Display for GuessedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

/// Descriptive metadata of a mod package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModMetadata {
    pub name: GuessedValue<String>,
    pub version: String,
    pub id: Option<i64>,
    pub url: String,
    pub author: String,
}

impl ModMetadata {
    /// Metadata seeded with a host-provided name guess
    pub fn with_name(name: impl Into<String>, quality: GuessQuality) -> Self {
        Self {
            name: GuessedValue::new(name.into(), quality),
            ..Default::default()
        }
    }

    /// Merge the fields of an `info.xml` document into this metadata.
    ///
    /// The name only replaces guesses of `Meta` quality or weaker. Missing
    /// elements leave the current values untouched; a non-numeric id is
    /// treated as absent.
    pub fn read_info(&mut self, bytes: &[u8]) -> Result<()> {
        let root = xml::parse_document("info.xml", bytes)?;

        if let Some(name) = root.child_text("Name") {
            self.name.update(name.to_string(), GuessQuality::Meta);
        }
        if let Some(version) = root.child_text("Version") {
            self.version = version.to_string();
        }
        if let Some(id) = root.child_text("Id") {
            self.id = id.trim().parse().ok();
            if self.id.is_none() {
                debug!("Ignoring non-numeric mod id '{}'", id);
            }
        }
        if let Some(url) = root.child_text("Website").or_else(|| root.child_text("Url")) {
            self.url = url.to_string();
        }
        if let Some(author) = root.child_text("Author") {
            self.author = author.to_string();
        }

        Ok(())
    }

    /// Override the display name with user input
    pub fn set_user_name(&mut self, name: impl Into<String>) {
        self.name.update(name.into(), GuessQuality::User);
    }

    /// Final display name
    pub fn display_name(&self) -> &str {
        self.name.get()
    }
}
