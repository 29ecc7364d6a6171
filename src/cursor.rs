//! Cursor - a movable handle onto one node of a shared tree.
//!
//! Cursors never own nodes. Any number of them may point into the same tree,
//! and an edit made through one is immediately visible through the others.
//! A cursor left on a node that another cursor removed keeps reading that
//! node's last content; it is not updated.

use crate::error::SpliceError;
use crate::fragment::{parse_fragment, FragmentNode};
use crate::range::{self, RangeBound, SiblingRange};
use crate::splicer::{remove_children, SplicePoint};
use crate::tree::{NodeData, NodeId, NodeKind, QName, Tree};
use crate::writer::MutationWriter;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Clone)]
pub struct Cursor {
    tree: Rc<RefCell<Tree>>,
    node: NodeId,
    /// Element whose in-scope namespaces are being iterated, while the
    /// cursor sits on a namespace node.
    namespace_owner: Option<NodeId>,
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("node", &self.node)
            .field("kind", &self.node_kind())
            .field("name", &self.name())
            .finish()
    }
}

/// Two cursors are equal when they reference the same node of the same tree.
impl PartialEq for Cursor {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree) && self.node == other.node
    }
}

impl Eq for Cursor {}

impl Cursor {
    pub(crate) fn new(tree: Rc<RefCell<Tree>>, node: NodeId) -> Self {
        Cursor {
            tree,
            node,
            namespace_owner: None,
        }
    }

    fn with_node<T>(&self, read: impl FnOnce(&Tree, &NodeData) -> T) -> T {
        let tree = self.tree.borrow();
        read(&tree, tree.node(self.node))
    }

    fn goto(&mut self, target: Option<NodeId>) -> bool {
        match target {
            Some(node) => {
                self.node = node;
                self.namespace_owner = None;
                true
            }
            None => false,
        }
    }

    fn same_tree(&self, other: &Cursor) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree)
    }

    // --- Read contract -----------------------------------------------------

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn node_kind(&self) -> NodeKind {
        self.with_node(|_, node| node.kind)
    }

    pub fn prefix(&self) -> String {
        self.with_node(|_, node| match node.kind {
            NodeKind::Element | NodeKind::Attribute => node.name.prefix.clone(),
            _ => String::new(),
        })
    }

    pub fn local_name(&self) -> String {
        self.with_node(|_, node| node.name.local_name.clone())
    }

    pub fn namespace_uri(&self) -> String {
        self.with_node(|_, node| node.name.namespace_uri.clone())
    }

    /// Qualified name; the declared prefix for namespace nodes, the target
    /// for processing instructions, empty for text, comments and the root.
    pub fn name(&self) -> String {
        self.with_node(|_, node| node.name.name())
    }

    pub fn qname(&self) -> QName {
        self.with_node(|_, node| node.name.clone())
    }

    /// String value of the node: concatenated descendant text for elements
    /// and the root.
    pub fn value(&self) -> String {
        self.tree.borrow().string_value(self.node)
    }

    pub fn has_attributes(&self) -> bool {
        self.tree.borrow().has_attributes(self.node)
    }

    pub fn has_children(&self) -> bool {
        self.tree.borrow().has_children(self.node)
    }

    pub fn is_empty_element(&self) -> bool {
        self.tree.borrow().is_empty_element(self.node)
    }

    pub fn depth(&self) -> usize {
        self.tree.borrow().depth(self.node)
    }

    /// Whether the node is still reachable from the root.
    pub fn is_attached(&self) -> bool {
        self.tree.borrow().is_attached(self.node)
    }

    pub fn is_same_position(&self, other: &Cursor) -> bool {
        self == other
    }

    pub fn lookup_namespace(&self, prefix: &str) -> Option<String> {
        self.tree.borrow().lookup_namespace(self.node, prefix)
    }

    /// Structural outline of the subtree under the cursor.
    pub fn outline(&self) -> String {
        self.tree.borrow().outline(self.node)
    }

    // --- Moves ---------------------------------------------------------------

    pub fn move_to_root(&mut self) {
        let root = self.tree.borrow().root();
        self.goto(Some(root));
    }

    pub fn move_to_first_child(&mut self) -> bool {
        let target = self.tree.borrow().children(self.node).first().copied();
        self.goto(target)
    }

    pub fn move_to_next(&mut self) -> bool {
        let target = self.tree.borrow().next_sibling(self.node);
        self.goto(target)
    }

    pub fn move_to_previous(&mut self) -> bool {
        let target = self.tree.borrow().previous_sibling(self.node);
        self.goto(target)
    }

    pub fn move_to_first(&mut self) -> bool {
        let target = self.tree.borrow().first_sibling(self.node);
        self.goto(target)
    }

    pub fn move_to_last(&mut self) -> bool {
        let target = self.tree.borrow().last_sibling(self.node);
        self.goto(target)
    }

    /// From a namespace node this returns to the element it was reached from.
    pub fn move_to_parent(&mut self) -> bool {
        let target = match self.namespace_owner {
            Some(owner) => Some(owner),
            None => self.tree.borrow().parent(self.node),
        };
        self.goto(target)
    }

    pub fn move_to_first_attribute(&mut self) -> bool {
        let target = self.tree.borrow().attributes(self.node).first().copied();
        self.goto(target)
    }

    pub fn move_to_next_attribute(&mut self) -> bool {
        let target = {
            let tree = self.tree.borrow();
            if tree.kind(self.node) != NodeKind::Attribute {
                return false;
            }
            tree.parent(self.node).and_then(|owner| {
                let attributes = tree.attributes(owner);
                let index = attributes.iter().position(|&a| a == self.node)?;
                attributes.get(index + 1).copied()
            })
        };
        self.goto(target)
    }

    /// Moves to the nearest in-scope namespace node of the current element.
    pub fn move_to_first_namespace(&mut self) -> bool {
        let first = {
            let tree = self.tree.borrow();
            if tree.kind(self.node) != NodeKind::Element {
                return false;
            }
            tree.in_scope_namespaces(self.node).first().copied()
        };
        match first {
            Some(namespace) => {
                self.namespace_owner = Some(self.node);
                self.node = namespace;
                true
            }
            None => false,
        }
    }

    pub fn move_to_next_namespace(&mut self) -> bool {
        let Some(owner) = self.namespace_owner else {
            return false;
        };
        let next = {
            let visible = self.tree.borrow().in_scope_namespaces(owner);
            visible
                .iter()
                .position(|&ns| ns == self.node)
                .and_then(|index| visible.get(index + 1).copied())
        };
        match next {
            Some(namespace) => {
                self.node = namespace;
                true
            }
            None => false,
        }
    }

    /// Moves to the position of `other`. Fails for cursors on another tree.
    pub fn move_to(&mut self, other: &Cursor) -> bool {
        if !self.same_tree(other) {
            return false;
        }
        self.node = other.node;
        self.namespace_owner = other.namespace_owner;
        true
    }

    // --- Writer-based edits ----------------------------------------------------

    /// Opens a writer whose content becomes the new last children of this
    /// node. Only Root and Element nodes accept children.
    pub fn append_child(&self) -> Result<MutationWriter, SpliceError> {
        MutationWriter::new(self.tree.clone(), SplicePoint::AppendChild(self.node))
    }

    pub fn prepend_child(&self) -> Result<MutationWriter, SpliceError> {
        MutationWriter::new(self.tree.clone(), SplicePoint::PrependChild(self.node))
    }

    /// Opens a writer whose content lands right before this node. Root,
    /// Attribute and Namespace nodes have no sibling position and are refused.
    pub fn insert_before(&self) -> Result<MutationWriter, SpliceError> {
        MutationWriter::new(self.tree.clone(), SplicePoint::Before(self.node))
    }

    pub fn insert_after(&self) -> Result<MutationWriter, SpliceError> {
        MutationWriter::new(self.tree.clone(), SplicePoint::After(self.node))
    }

    // --- Fragment-string edits -------------------------------------------------

    pub fn append_child_fragment(&self, markup: &str) -> Result<(), SpliceError> {
        self.splice_fragment(SplicePoint::AppendChild(self.node), markup)
            .map(|_| ())
    }

    pub fn prepend_child_fragment(&self, markup: &str) -> Result<(), SpliceError> {
        self.splice_fragment(SplicePoint::PrependChild(self.node), markup)
            .map(|_| ())
    }

    pub fn insert_before_fragment(&self, markup: &str) -> Result<(), SpliceError> {
        self.splice_fragment(SplicePoint::Before(self.node), markup)
            .map(|_| ())
    }

    pub fn insert_after_fragment(&self, markup: &str) -> Result<(), SpliceError> {
        self.splice_fragment(SplicePoint::After(self.node), markup)
            .map(|_| ())
    }

    /// Parses `markup` in the namespace scope of the splice point and feeds
    /// it through a writer at `point`.
    fn splice_fragment(&self, point: SplicePoint, markup: &str) -> Result<Vec<NodeId>, SpliceError> {
        let mut writer = MutationWriter::new(self.tree.clone(), point)?;
        let nodes = self.parse_for(point, markup)?;
        feed(&mut writer, &nodes)?;
        writer.close()?;
        Ok(writer.inserted().to_vec())
    }

    fn parse_for(&self, point: SplicePoint, markup: &str) -> Result<Vec<FragmentNode>, SpliceError> {
        let tree = self.tree.borrow();
        let scope = tree.namespace_scope(point.scope_node(&tree));
        parse_fragment(markup, &scope, tree.config().fragment_declaration)
    }

    // --- Range edits -------------------------------------------------------------

    fn validate_range(
        &self,
        end: Option<&Cursor>,
        bound: RangeBound,
    ) -> Result<SiblingRange, SpliceError> {
        let end = end.ok_or(SpliceError::NullArgument("end"))?;
        if !self.same_tree(end) {
            return Err(SpliceError::InvalidRange(
                "the end cursor belongs to a different document".to_string(),
            ));
        }
        range::validate(&self.tree.borrow(), self.node, end.node, bound)
    }

    fn remove_range(&self, range: &SiblingRange) {
        range::remove(&mut self.tree.borrow_mut(), range);
    }

    /// Removes this node and its following siblings up to, but not including,
    /// `end`. The cursor moves to `end`, which now fills the vacated slot.
    pub fn delete_range(&mut self, end: Option<&Cursor>) -> Result<(), SpliceError> {
        let range = self.validate_range(end, RangeBound::Exclusive)?;
        self.remove_range(&range);
        self.goto(range.following.or(Some(range.parent)));
        Ok(())
    }

    /// Like [`delete_range`](Self::delete_range) but `last` is removed too.
    /// The cursor moves to the node after `last`, or to the parent when
    /// `last` was the final child.
    pub fn delete_through(&mut self, last: Option<&Cursor>) -> Result<(), SpliceError> {
        let range = self.validate_range(last, RangeBound::Inclusive)?;
        self.remove_range(&range);
        self.goto(range.following.or(Some(range.parent)));
        Ok(())
    }

    /// Removes the range `[self, end)` and returns a writer that inserts
    /// replacement content in its place.
    ///
    /// The cursor keeps referencing the removed start node; its content stays
    /// readable and [`move_to_parent`](Self::move_to_parent) leads back to the
    /// former parent.
    pub fn replace_range(&self, end: Option<&Cursor>) -> Result<MutationWriter, SpliceError> {
        self.replace_span(end, RangeBound::Exclusive)
    }

    /// Inclusive-end counterpart of [`replace_range`](Self::replace_range).
    pub fn replace_through(&self, last: Option<&Cursor>) -> Result<MutationWriter, SpliceError> {
        self.replace_span(last, RangeBound::Inclusive)
    }

    fn replace_span(
        &self,
        end: Option<&Cursor>,
        bound: RangeBound,
    ) -> Result<MutationWriter, SpliceError> {
        let range = self.validate_range(end, bound)?;
        let writer = MutationWriter::new(self.tree.clone(), range.vacated_slot())?;
        self.remove_range(&range);
        Ok(writer)
    }

    /// Replaces `[self, end)` with parsed `markup` in one step. Nothing is
    /// removed unless the replacement parses and buffers cleanly.
    pub fn replace_range_fragment(
        &self,
        end: Option<&Cursor>,
        markup: &str,
    ) -> Result<(), SpliceError> {
        let range = self.validate_range(end, RangeBound::Exclusive)?;
        let point = range.vacated_slot();
        let mut writer = MutationWriter::new(self.tree.clone(), point)?;
        let nodes = self.parse_for(point, markup)?;
        feed(&mut writer, &nodes)?;
        self.remove_range(&range);
        writer.close()
    }

    // --- Single-node edits ---------------------------------------------------------

    /// Removes the current node and moves the cursor to its parent.
    pub fn delete_self(&mut self) -> Result<(), SpliceError> {
        let parent = {
            let mut tree = self.tree.borrow_mut();
            let kind = tree.kind(self.node);
            if matches!(kind, NodeKind::Root | NodeKind::Namespace) {
                return Err(SpliceError::InvalidPosition {
                    operation: "delete",
                    kind,
                });
            }
            if !tree.is_attached(self.node) {
                return Err(SpliceError::DetachedNode);
            }
            let Some(parent) = tree.parent(self.node) else {
                return Err(SpliceError::DetachedNode);
            };

            if kind == NodeKind::Attribute {
                let node = self.node;
                tree.node_mut(parent).attributes.retain(|&a| a != node);
                log::debug!("Removed attribute {:?} from {:?}", node, parent);
            } else {
                let Some(index) = tree.position(self.node) else {
                    return Err(SpliceError::DetachedNode);
                };
                remove_children(&mut tree, parent, index..index + 1);
            }
            parent
        };
        self.goto(Some(parent));
        Ok(())
    }

    /// Replaces the current node with parsed `markup`. The cursor moves to
    /// the first inserted node, or to the parent if `markup` was empty.
    pub fn replace_self_fragment(&mut self, markup: &str) -> Result<(), SpliceError> {
        let inserted = self.splice_fragment(SplicePoint::Before(self.node), markup)?;
        let parent = {
            let mut tree = self.tree.borrow_mut();
            let (Some(parent), Some(index)) = (tree.parent(self.node), tree.position(self.node))
            else {
                return Err(SpliceError::DetachedNode);
            };
            remove_children(&mut tree, parent, index..index + 1);
            parent
        };
        self.goto(inserted.first().copied().or(Some(parent)));
        Ok(())
    }

    /// Sets the node's value. Elements and the root have all their children
    /// replaced by a single text node (none for an empty `value`).
    ///
    /// A node that is no longer part of the tree is left unchanged and the
    /// call fails with [`SpliceError::DetachedNode`].
    pub fn set_value(&self, value: &str) -> Result<(), SpliceError> {
        if !self.is_attached() {
            return Err(SpliceError::DetachedNode);
        }
        let kind = self.node_kind();
        match kind {
            NodeKind::Namespace => Err(SpliceError::InvalidPosition {
                operation: "set the value of",
                kind,
            }),
            NodeKind::Root | NodeKind::Element => {
                let mut writer =
                    MutationWriter::new(self.tree.clone(), SplicePoint::AppendChild(self.node))?;
                writer.write_string(value)?;
                let count = self.tree.borrow().children(self.node).len();
                remove_children(&mut self.tree.borrow_mut(), self.node, 0..count);
                writer.close()
            }
            NodeKind::ProcessingInstruction if value.contains("?>") => Err(
                SpliceError::structural("processing instruction data cannot contain '?>'"),
            ),
            NodeKind::Comment if value.contains("--") || value.ends_with('-') => Err(
                SpliceError::structural("comment text cannot contain '--' or end with '-'"),
            ),
            _ => {
                self.tree.borrow_mut().node_mut(self.node).value = value.to_string();
                Ok(())
            }
        }
    }
}

fn feed(writer: &mut MutationWriter, nodes: &[FragmentNode]) -> Result<(), SpliceError> {
    for node in nodes {
        writer.write_node(node)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::XmlDocument;

    #[test]
    fn moves_fail_in_place() {
        let doc = XmlDocument::parse("<root><a/></root>").unwrap();
        let mut nav = doc.cursor();
        assert!(!nav.move_to_next());
        assert!(!nav.move_to_parent());
        assert!(nav.move_to_first_child());
        assert!(!nav.move_to_previous());
        assert!(nav.move_to_first_child());
        assert_eq!(nav.name(), "a");
        assert!(!nav.move_to_first_child());
        assert!(!nav.move_to_first_attribute());
        assert_eq!(nav.name(), "a");
    }

    #[test]
    fn clone_is_independent() {
        let doc = XmlDocument::parse("<root><a/><b/></root>").unwrap();
        let mut nav = doc.cursor();
        nav.move_to_first_child();
        nav.move_to_first_child();
        let mut other = nav.clone();
        assert_eq!(nav, other);
        assert!(other.move_to_next());
        assert_ne!(nav, other);
        assert_eq!(nav.name(), "a");
        assert_eq!(other.name(), "b");
        assert!(nav.move_to(&other));
        assert!(nav.is_same_position(&other));
    }

    #[test]
    fn cursors_of_different_documents_differ() {
        let one = XmlDocument::parse("<root/>").unwrap();
        let two = XmlDocument::parse("<root/>").unwrap();
        let mut nav = one.cursor();
        assert_ne!(nav, two.cursor());
        assert!(!nav.move_to(&two.cursor()));
    }

    #[test]
    fn attribute_iteration() {
        let doc = XmlDocument::parse("<root a='1' b='2'/>").unwrap();
        let mut nav = doc.cursor();
        nav.move_to_first_child();
        assert!(nav.move_to_first_attribute());
        assert_eq!((nav.name(), nav.value()), ("a".to_string(), "1".to_string()));
        assert!(!nav.move_to_next());
        assert!(nav.move_to_next_attribute());
        assert_eq!(nav.name(), "b");
        assert!(!nav.move_to_next_attribute());
        assert!(nav.move_to_parent());
        assert_eq!(nav.name(), "root");
    }

    #[test]
    fn namespace_iteration_skips_shadowed_prefixes() {
        let doc = XmlDocument::parse(
            "<root xmlns='urn:outer' xmlns:p='urn:p'><inner xmlns='urn:inner'/></root>",
        )
        .unwrap();
        let mut nav = doc.cursor();
        nav.move_to_first_child();
        nav.move_to_first_child();
        assert!(nav.move_to_first_namespace());
        let mut seen = vec![(nav.name(), nav.value())];
        while nav.move_to_next_namespace() {
            seen.push((nav.name(), nav.value()));
        }
        assert_eq!(
            seen,
            vec![
                ("".to_string(), "urn:inner".to_string()),
                ("p".to_string(), "urn:p".to_string()),
                ("xml".to_string(), crate::namespace::XML_NAMESPACE.to_string()),
            ]
        );
        assert!(nav.move_to_parent());
        assert_eq!(nav.name(), "inner");
    }

    #[test]
    fn set_value_on_text_and_element() {
        let doc = XmlDocument::parse("<root><a>old<b/></a></root>").unwrap();
        let mut nav = doc.cursor();
        nav.move_to_first_child();
        nav.move_to_first_child();
        nav.set_value("new").unwrap();
        assert_eq!(nav.outline(), r#"a("new")"#);

        nav.move_to_first_child();
        nav.set_value("newer").unwrap();
        assert_eq!(nav.value(), "newer");
    }

    #[test]
    fn delete_self_moves_to_parent() {
        let doc = XmlDocument::parse("<root k='v'><a/><b/></root>").unwrap();
        let mut nav = doc.cursor();
        nav.move_to_first_child();
        nav.move_to_first_child();
        nav.delete_self().unwrap();
        assert_eq!(nav.outline(), r#"root[@k="v"](b)"#);

        nav.move_to_first_attribute();
        nav.delete_self().unwrap();
        assert_eq!(nav.outline(), "root(b)");

        nav.move_to_root();
        assert!(nav.delete_self().is_err());
    }

    #[test]
    fn replace_self_moves_to_replacement() {
        let doc = XmlDocument::parse("<root><a/><b/></root>").unwrap();
        let mut nav = doc.cursor();
        nav.move_to_first_child();
        nav.move_to_first_child();
        nav.replace_self_fragment("<x/><y/>").unwrap();
        assert_eq!(nav.name(), "x");
        nav.move_to_parent();
        assert_eq!(nav.outline(), "root(x, y, b)");
    }
}
