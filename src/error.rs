//! Defines custom error types for the library.

use crate::tree::NodeKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
/// Error type returned when a tree edit fails.
///
/// Every variant is raised before the tree is touched, so a returned error
/// always means the document is exactly as it was before the call.
pub enum SpliceError {
    #[error("Malformed event sequence: {0}")]
    Structural(String),

    #[error("Invalid operation: cannot {operation} a {kind} node.")]
    InvalidPosition {
        operation: &'static str,
        kind: NodeKind,
    },

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("The '{0}' argument is required but was not provided.")]
    NullArgument(&'static str),

    #[error("The node targeted by this edit is no longer attached to the document.")]
    DetachedNode,

    #[error("Malformed fragment at byte {offset}: {message}")]
    MalformedFragment { offset: usize, message: String },

    #[error("Path '{0}' did not match any node in the document.")]
    NodeNotFound(String),

    #[error("Invalid node path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Failed to parse operations: {0}")]
    OperationParse(String),

    #[error("Operation #{index} failed: {source}")]
    OperationFailed {
        index: usize,
        #[source]
        source: Box<SpliceError>,
    },

    #[error("Failed to parse configuration: {0}")]
    Config(String),
}

impl SpliceError {
    pub(crate) fn structural(message: impl Into<String>) -> Self {
        SpliceError::Structural(message.into())
    }

    pub(crate) fn malformed(offset: usize, message: impl Into<String>) -> Self {
        SpliceError::MalformedFragment {
            offset,
            message: message.into(),
        }
    }
}
