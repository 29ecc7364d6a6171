//! `xml-splice` is an editable, cursor-based navigator over an in-memory XML
//! tree.
//!
//! A [`Cursor`] reads and moves around the tree of an [`XmlDocument`] and is
//! the entry point for every edit: inserting content through a
//! [`MutationWriter`] or a markup fragment, deleting or replacing runs of
//! siblings, and setting values. Every edit is all-or-nothing; a rejected
//! edit leaves the tree exactly as it was. Batches of edits can also be
//! described declaratively (see [`transaction`]) and applied atomically.
//!
//! # Example
//!
//! ```rust
//! use xml_splice::XmlDocument;
//!
//! # fn demo() -> Result<(), xml_splice::error::SpliceError> {
//! let document = XmlDocument::parse("<root><foo><bar/></foo><next/></root>")?;
//!
//! let mut cursor = document.cursor();
//! cursor.move_to_first_child(); // root
//! cursor.move_to_first_child(); // foo
//!
//! let mut writer = cursor.insert_after()?;
//! writer.write_start_element("new")?;
//! writer.write_string("text")?;
//! writer.write_end_element()?;
//! writer.close()?;
//!
//! assert_eq!(document.outline(), r#"#document(root(foo(bar), new("text"), next))"#);
//! # Ok(())
//! # }
//! # demo().unwrap();
//! ```

pub mod config;
pub mod cursor;
pub mod error;
pub mod fragment;
pub mod locator;
pub mod namespace;
pub mod range;
pub mod splicer;
pub mod transaction;
pub mod tree;
pub mod writer;

use crate::config::EditorConfig;
use crate::error::SpliceError;
use crate::transaction::{DeleteOperation, Operation, ReplaceOperation};
use crate::tree::Tree;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

pub use crate::cursor::Cursor;
pub use crate::locator::NodePath;
pub use crate::range::RangeBound;
pub use crate::splicer::SplicePoint;
pub use crate::tree::{NodeId, NodeKind, QName};
pub use crate::writer::{MutationWriter, WriterState};

/// Handle on one in-memory XML tree.
///
/// Every cursor obtained from the document shares its tree, so edits made
/// through one cursor are visible through all of them.
pub struct XmlDocument {
    tree: Rc<RefCell<Tree>>,
}

/// Deep copy. Cursors of the original do not see edits made to the copy.
impl Clone for XmlDocument {
    fn clone(&self) -> Self {
        Self::from_tree(self.tree.borrow().clone())
    }
}

impl fmt::Debug for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("XmlDocument").field(&self.outline()).finish()
    }
}

impl Default for XmlDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlDocument {
    /// Creates a document holding only a root node.
    pub fn new() -> Self {
        Self::with_config(EditorConfig::default())
    }

    pub fn with_config(config: EditorConfig) -> Self {
        Self::from_tree(Tree::new(config))
    }

    fn from_tree(tree: Tree) -> Self {
        XmlDocument {
            tree: Rc::new(RefCell::new(tree)),
        }
    }

    /// Parses markup into a new document with the default configuration.
    pub fn parse(content: &str) -> Result<Self, SpliceError> {
        Self::parse_with_config(content, EditorConfig::default())
    }

    /// Parses markup into a new document.
    ///
    /// A leading XML declaration is accepted and dropped. Whitespace-only
    /// text between top-level nodes is not kept.
    pub fn parse_with_config(content: &str, config: EditorConfig) -> Result<Self, SpliceError> {
        let document = Self::with_config(config);
        let body = strip_declaration(content);

        let cursor = document.cursor();
        let mut writer = cursor.append_child()?;
        let nodes = {
            let tree = document.tree.borrow();
            fragment::parse_fragment(
                body,
                &tree.namespace_scope(tree.root()),
                tree.config().fragment_declaration,
            )?
        };
        for node in &nodes {
            if matches!(node, fragment::FragmentNode::Text(text) if text.trim().is_empty()) {
                continue;
            }
            writer.write_node(node)?;
        }
        writer.close()?;

        log::debug!(
            "Parsed document with {} top-level node(s)",
            writer.inserted().len()
        );
        Ok(document)
    }

    /// A cursor positioned on the root node.
    pub fn cursor(&self) -> Cursor {
        let root = self.tree.borrow().root();
        Cursor::new(self.tree.clone(), root)
    }

    pub fn config(&self) -> EditorConfig {
        self.tree.borrow().config().clone()
    }

    /// A cursor positioned on the node `path` points at.
    pub fn select(&self, path: &NodePath) -> Result<Cursor, SpliceError> {
        let node = path.resolve(&self.tree.borrow())?;
        Ok(Cursor::new(self.tree.clone(), node))
    }

    /// Structural outline of the whole tree.
    pub fn outline(&self) -> String {
        let tree = self.tree.borrow();
        tree.outline(tree.root())
    }

    /// Applies a batch of operations.
    ///
    /// Operations run in order against a working copy of the tree. If every
    /// step succeeds the working copy replaces the current content; cursors
    /// already handed out keep their positions and see the new content. If a
    /// step fails the document is left untouched and the error names the
    /// failing operation's index.
    pub fn apply(&mut self, operations: Vec<Operation>) -> Result<(), SpliceError> {
        let working = self.clone();

        for (index, operation) in operations.iter().enumerate() {
            if let Some(comment) = operation.comment() {
                log::debug!("Operation #{index}: {comment}");
            }
            apply_operation(&working, operation).map_err(|source| {
                SpliceError::OperationFailed {
                    index,
                    source: Box::new(source),
                }
            })?;
        }

        self.tree.swap(&working.tree);
        log::debug!("Applied {} operation(s)", operations.len());
        Ok(())
    }
}

impl FromStr for XmlDocument {
    type Err = SpliceError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        Self::parse(content)
    }
}

fn strip_declaration(content: &str) -> &str {
    let content = content.trim_start_matches('\u{feff}');
    let trimmed = content.trim_start();
    let is_declaration = trimmed
        .strip_prefix("<?xml")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_whitespace() || c == '?');
    if !is_declaration {
        return content;
    }
    match trimmed.find("?>") {
        Some(end) => &trimmed[end + 2..],
        None => content,
    }
}

fn apply_operation(document: &XmlDocument, operation: &Operation) -> Result<(), SpliceError> {
    let mut cursor = document.select(operation.target())?;
    match operation {
        Operation::AppendChild(op) => cursor.append_child_fragment(&op.content),
        Operation::PrependChild(op) => cursor.prepend_child_fragment(&op.content),
        Operation::InsertBefore(op) => cursor.insert_before_fragment(&op.content),
        Operation::InsertAfter(op) => cursor.insert_after_fragment(&op.content),
        Operation::Delete(op) => apply_delete_operation(document, &mut cursor, op),
        Operation::Replace(op) => apply_replace_operation(document, &mut cursor, op),
        Operation::SetValue(op) => cursor.set_value(&op.value),
    }
}

fn apply_delete_operation(
    document: &XmlDocument,
    cursor: &mut Cursor,
    op: &DeleteOperation,
) -> Result<(), SpliceError> {
    match &op.until {
        Some(until) => {
            let end = document.select(until)?;
            cursor.delete_range(Some(&end))
        }
        None => cursor.delete_self(),
    }
}

fn apply_replace_operation(
    document: &XmlDocument,
    cursor: &mut Cursor,
    op: &ReplaceOperation,
) -> Result<(), SpliceError> {
    match &op.until {
        Some(until) => {
            let end = document.select(until)?;
            cursor.replace_range_fragment(Some(&end), &op.content)
        }
        None if cursor.node_kind() == NodeKind::Attribute => Err(SpliceError::InvalidPosition {
            operation: "replace",
            kind: NodeKind::Attribute,
        }),
        None => cursor.replace_self_fragment(&op.content),
    }
}
