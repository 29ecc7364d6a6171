//! Contains the logic for modifying the tree (inserting and removing nodes).

use crate::error::SpliceError;
use crate::fragment::FragmentNode;
use crate::tree::{NodeData, NodeId, NodeKind, QName, Tree};
use std::ops::Range;

/// Where a buffered node sequence lands, relative to an anchor node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplicePoint {
    /// New last children of the anchor.
    AppendChild(NodeId),
    /// New first children of the anchor.
    PrependChild(NodeId),
    /// Siblings immediately preceding the anchor.
    Before(NodeId),
    /// Siblings immediately following the anchor.
    After(NodeId),
}

impl SplicePoint {
    pub fn anchor(self) -> NodeId {
        match self {
            SplicePoint::AppendChild(id)
            | SplicePoint::PrependChild(id)
            | SplicePoint::Before(id)
            | SplicePoint::After(id) => id,
        }
    }

    fn operation(self) -> &'static str {
        match self {
            SplicePoint::AppendChild(_) => "append a child to",
            SplicePoint::PrependChild(_) => "prepend a child to",
            SplicePoint::Before(_) => "insert a sibling before",
            SplicePoint::After(_) => "insert a sibling after",
        }
    }

    fn inserts_children(self) -> bool {
        matches!(self, SplicePoint::AppendChild(_) | SplicePoint::PrependChild(_))
    }

    /// Rejects anchors whose kind cannot take part in this kind of splice.
    pub(crate) fn check_source(self, tree: &Tree) -> Result<(), SpliceError> {
        let kind = tree.kind(self.anchor());
        let allowed = if self.inserts_children() {
            kind.can_hold_children()
        } else {
            kind.has_ordinary_sibling_position()
        };
        if allowed {
            Ok(())
        } else {
            Err(SpliceError::InvalidPosition {
                operation: self.operation(),
                kind,
            })
        }
    }

    /// The node whose namespace scope content spliced here will live in.
    pub(crate) fn scope_node(self, tree: &Tree) -> NodeId {
        let anchor = self.anchor();
        if self.inserts_children() {
            anchor
        } else {
            tree.parent(anchor).unwrap_or(anchor)
        }
    }

    /// Resolves the point to a concrete `(parent, index)` slot.
    pub(crate) fn resolve(self, tree: &Tree) -> Result<(NodeId, usize), SpliceError> {
        self.check_source(tree)?;
        let anchor = self.anchor();
        if !tree.is_attached(anchor) {
            return Err(SpliceError::DetachedNode);
        }

        match self {
            SplicePoint::AppendChild(_) => Ok((anchor, tree.children(anchor).len())),
            SplicePoint::PrependChild(_) => Ok((anchor, 0)),
            SplicePoint::Before(_) | SplicePoint::After(_) => {
                let (Some(parent), Some(index)) = (tree.parent(anchor), tree.position(anchor))
                else {
                    return Err(SpliceError::DetachedNode);
                };
                let index = if matches!(self, SplicePoint::After(_)) {
                    index + 1
                } else {
                    index
                };
                Ok((parent, index))
            }
        }
    }
}

/// Inserts `nodes` at `point` in one step and returns the ids of the new
/// top-level nodes, in order.
///
/// The slot is resolved before anything is allocated, so a failure leaves the
/// tree untouched.
pub(crate) fn splice(
    tree: &mut Tree,
    point: SplicePoint,
    nodes: &[FragmentNode],
) -> Result<Vec<NodeId>, SpliceError> {
    let (parent, index) = point.resolve(tree)?;

    let ids: Vec<NodeId> = nodes
        .iter()
        .map(|node| materialize(tree, parent, node))
        .collect();

    // `splice` with an empty range inserts at that position without removing anything.
    tree.node_mut(parent)
        .children
        .splice(index..index, ids.iter().copied());

    log::debug!(
        "Spliced {} node(s) into {:?} at index {} ({:?})",
        ids.len(),
        parent,
        index,
        point
    );
    Ok(ids)
}

/// Unlinks the children of `parent` in `range` and returns them.
///
/// The removed nodes keep their `parent` back-reference so that a cursor
/// still positioned on one of them can climb back out.
pub(crate) fn remove_children(tree: &mut Tree, parent: NodeId, range: Range<usize>) -> Vec<NodeId> {
    let removed: Vec<NodeId> = tree.node_mut(parent).children.drain(range.clone()).collect();
    log::debug!(
        "Removed {} node(s) from {:?} at indices {:?}",
        removed.len(),
        parent,
        range
    );
    removed
}

fn leaf(tree: &mut Tree, parent: NodeId, kind: NodeKind, name: QName, value: &str) -> NodeId {
    let mut data = NodeData::new(kind, name, value);
    data.parent = Some(parent);
    tree.push(data)
}

/// Allocates `node` and its descendants in the arena under `parent`.
///
/// Only the new node's own lists are filled; linking it into `parent` is up
/// to the caller.
fn materialize(tree: &mut Tree, parent: NodeId, node: &FragmentNode) -> NodeId {
    let id = allocate(tree, parent, node);
    let mut pending = vec![(id, node)];
    while let Some((id, node)) = pending.pop() {
        let FragmentNode::Element(element) = node else {
            continue;
        };
        for child in &element.children {
            let child_id = allocate(tree, id, child);
            tree.node_mut(id).children.push(child_id);
            pending.push((child_id, child));
        }
    }
    id
}

/// Allocates `node` with its attributes and namespaces, but no children.
fn allocate(tree: &mut Tree, parent: NodeId, node: &FragmentNode) -> NodeId {
    match node {
        FragmentNode::Element(element) => {
            let mut data = NodeData::new(NodeKind::Element, element.name.clone(), "");
            data.parent = Some(parent);
            data.explicit_close = element.explicit_close;
            let id = tree.push(data);

            for (prefix, uri) in &element.namespaces {
                let ns = leaf(tree, id, NodeKind::Namespace, QName::local(prefix.as_str()), uri);
                tree.node_mut(id).namespaces.push(ns);
            }
            for attribute in &element.attributes {
                let attr = leaf(
                    tree,
                    id,
                    NodeKind::Attribute,
                    attribute.name.clone(),
                    &attribute.value,
                );
                tree.node_mut(id).attributes.push(attr);
            }
            id
        }
        FragmentNode::Text(text) => leaf(tree, parent, NodeKind::Text, QName::default(), text),
        FragmentNode::Comment(text) => {
            leaf(tree, parent, NodeKind::Comment, QName::default(), text)
        }
        FragmentNode::ProcessingInstruction { target, data } => leaf(
            tree,
            parent,
            NodeKind::ProcessingInstruction,
            QName::local(target.as_str()),
            data,
        ),
    }
}
