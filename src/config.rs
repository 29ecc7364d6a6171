//! Editing policies shared by every cursor, writer and fragment parse of a document.

use crate::error::SpliceError;
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// What to do with an `<?xml ...?>` declaration found inside a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationPolicy {
    /// Fail the parse with a structural error.
    #[default]
    Reject,
    /// Drop the declaration and keep parsing.
    Ignore,
}

/// What a writer does with attribute events issued while no element is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrayEventPolicy {
    /// Accept the events and discard them.
    #[default]
    Ignore,
    /// Move the writer into its error state.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// Settings consulted by the mutation engine.
///
/// ```toml
/// fragment_declaration = "ignore"
/// stray_writer_events = "reject"
/// coalesce_text = false
/// ```
pub struct EditorConfig {
    pub fragment_declaration: DeclarationPolicy,
    pub stray_writer_events: StrayEventPolicy,
    /// Merge consecutive `write_string` calls into a single text node.
    pub coalesce_text: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            fragment_declaration: DeclarationPolicy::default(),
            stray_writer_events: StrayEventPolicy::default(),
            coalesce_text: true,
        }
    }
}

impl EditorConfig {
    /// Parses a configuration from TOML text. Missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self, SpliceError> {
        toml::from_str(content).map_err(|err| SpliceError::Config(err.to_string()))
    }

    /// Reads and parses a TOML configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }
}

impl FromStr for EditorConfig {
    type Err = SpliceError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        Self::from_toml(content)
    }
}
