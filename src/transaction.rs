//! Declarative edit batches.
//!
//! A batch is a list of [`Operation`]s, usually read from a JSON or YAML file,
//! that [`XmlDocument::apply`](crate::XmlDocument::apply) runs all-or-nothing.

use crate::error::SpliceError;
use crate::locator::NodePath;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A single edit applied to the node a path points at.
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Add parsed content as the last children of the target.
    AppendChild(InsertOperation),
    /// Add parsed content as the first children of the target.
    PrependChild(InsertOperation),
    /// Add parsed content as siblings right before the target.
    InsertBefore(InsertOperation),
    /// Add parsed content as siblings right after the target.
    InsertAfter(InsertOperation),
    /// Remove the target, or the sibling run from the target up to `until`.
    Delete(DeleteOperation),
    /// Replace the target, or the sibling run up to `until`, with new content.
    Replace(ReplaceOperation),
    /// Overwrite the value of the target.
    SetValue(SetValueOperation),
}

impl Operation {
    pub fn target(&self) -> &NodePath {
        match self {
            Operation::AppendChild(op)
            | Operation::PrependChild(op)
            | Operation::InsertBefore(op)
            | Operation::InsertAfter(op) => &op.target,
            Operation::Delete(op) => &op.target,
            Operation::Replace(op) => &op.target,
            Operation::SetValue(op) => &op.target,
        }
    }

    pub fn comment(&self) -> Option<&str> {
        match self {
            Operation::AppendChild(op)
            | Operation::PrependChild(op)
            | Operation::InsertBefore(op)
            | Operation::InsertAfter(op) => op.comment.as_deref(),
            Operation::Delete(op) => op.comment.as_deref(),
            Operation::Replace(op) => op.comment.as_deref(),
            Operation::SetValue(op) => op.comment.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Content to splice relative to a target node.
pub struct InsertOperation {
    /// The node the content is placed against.
    pub target: NodePath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Optional human-readable note recorded alongside the operation.
    pub comment: Option<String>,
    /// Markup fragment to insert.
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Removal of a node or a run of siblings.
pub struct DeleteOperation {
    pub target: NodePath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// First following sibling to keep. Everything from `target` up to it is removed.
    pub until: Option<NodePath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Replacement of a node or a run of siblings.
pub struct ReplaceOperation {
    pub target: NodePath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// First following sibling to keep, as for [`DeleteOperation::until`].
    pub until: Option<NodePath>,
    /// Markup fragment taking the place of the removed nodes. May be empty.
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetValueOperation {
    pub target: NodePath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub value: String,
}

/// Parses a batch from a JSON array.
pub fn from_json(data: &str) -> Result<Vec<Operation>, SpliceError> {
    serde_json::from_str(data).map_err(|err| SpliceError::OperationParse(err.to_string()))
}

/// Parses a batch from a YAML sequence.
pub fn from_yaml(data: &str) -> Result<Vec<Operation>, SpliceError> {
    serde_yaml::from_str(data).map_err(|err| SpliceError::OperationParse(err.to_string()))
}

/// Reads a batch file. `.json` files are parsed as JSON, anything else as
/// YAML (which also accepts JSON input).
pub fn load_operations(path: impl AsRef<Path>) -> anyhow::Result<Vec<Operation>> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read operations file: {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let operations = if is_json {
        from_json(&data)
    } else {
        from_yaml(&data)
    }
    .with_context(|| format!("Invalid operations in {}", path.display()))?;

    log::debug!(
        "Loaded {} operation(s) from {}",
        operations.len(),
        path.display()
    );
    Ok(operations)
}
