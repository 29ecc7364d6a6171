//! Mutation Writer
//!
//! An event-sequence receiver that buffers start/end element, attribute and
//! text events into a detached node sequence. The tree is only touched once,
//! by [`MutationWriter::close`], which splices the whole buffer at the
//! writer's fixed [`SplicePoint`] or does nothing at all.

use crate::config::StrayEventPolicy;
use crate::error::SpliceError;
use crate::fragment::{is_valid_name, FragmentAttribute, FragmentElement, FragmentNode};
use crate::namespace::{NamespaceScope, XMLNS_NAMESPACE};
use crate::splicer::{splice, SplicePoint};
use crate::tree::{NodeId, QName, Tree};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Lifecycle of a [`MutationWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// No event received yet.
    Initial,
    /// At least one event accepted; elements may be open.
    Building,
    /// Content was spliced into the tree.
    Closed,
    /// A structural violation was observed. Terminal; nothing will be spliced.
    Error,
}

struct Frame {
    element: FragmentElement,
    /// Attributes may still be added; namespace resolution is pending.
    start_tag_open: bool,
    prefix_unresolved: bool,
    unresolved_attributes: Vec<usize>,
}

struct PendingAttribute {
    name: QName,
    unresolved: bool,
    value: String,
    /// Written while no element was open; discarded at its end.
    stray: bool,
}

/// Work item of [`MutationWriter::write_node`]'s explicit stack.
enum NodeEvent<'a> {
    Enter(&'a FragmentNode),
    Exit { explicit_close: bool },
}

/// Deferred-commit builder returned by the cursor edit entry points.
///
/// Drive it through an event sequence and call [`close`](Self::close). If it
/// is dropped without a successful close, the target tree is left unmodified.
pub struct MutationWriter {
    tree: Rc<RefCell<Tree>>,
    target: SplicePoint,
    scope: NamespaceScope,
    stray_events: StrayEventPolicy,
    coalesce_text: bool,
    state: WriterState,
    frames: Vec<Frame>,
    top_level: Vec<FragmentNode>,
    attribute: Option<PendingAttribute>,
    inserted: Vec<NodeId>,
}

impl fmt::Debug for MutationWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationWriter")
            .field("target", &self.target)
            .field("state", &self.state)
            .field("depth", &self.frames.len())
            .field("buffered", &self.top_level.len())
            .finish_non_exhaustive()
    }
}

impl MutationWriter {
    /// Opens a writer that will splice at `target`.
    ///
    /// Fails up front when the anchor's kind cannot accept this splice.
    pub(crate) fn new(tree: Rc<RefCell<Tree>>, target: SplicePoint) -> Result<Self, SpliceError> {
        let (scope, config) = {
            let borrowed = tree.borrow();
            target.check_source(&borrowed)?;
            (
                borrowed.namespace_scope(target.scope_node(&borrowed)),
                borrowed.config().clone(),
            )
        };

        Ok(MutationWriter {
            tree,
            target,
            scope,
            stray_events: config.stray_writer_events,
            coalesce_text: config.coalesce_text,
            state: WriterState::Initial,
            frames: Vec::new(),
            top_level: Vec::new(),
            attribute: None,
            inserted: Vec::new(),
        })
    }

    pub fn target(&self) -> SplicePoint {
        self.target
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Number of currently open elements.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Ids of the top-level nodes spliced by a successful close.
    pub fn inserted(&self) -> &[NodeId] {
        &self.inserted
    }

    fn fail<T>(&mut self, message: impl Into<String>) -> Result<T, SpliceError> {
        self.state = WriterState::Error;
        self.frames.clear();
        self.top_level.clear();
        self.attribute = None;
        Err(SpliceError::Structural(message.into()))
    }

    fn ensure_writable(&mut self) -> Result<(), SpliceError> {
        match self.state {
            WriterState::Closed => Err(SpliceError::structural("the writer is already closed")),
            WriterState::Error => Err(SpliceError::structural(
                "the writer is in an error state and cannot accept more events",
            )),
            WriterState::Initial | WriterState::Building => {
                self.state = WriterState::Building;
                Ok(())
            }
        }
    }

    /// Prepares for child content of the innermost open element (or for
    /// top-level content when none is open).
    fn begin_content(&mut self) -> Result<(), SpliceError> {
        self.ensure_writable()?;
        if self.attribute.is_some() {
            return self.fail("cannot write content while an attribute is open");
        }
        self.finish_start_tag()
    }

    /// Resolves the innermost element's deferred prefixes and adds any
    /// namespace declarations its names need.
    fn finish_start_tag(&mut self) -> Result<(), SpliceError> {
        let Some(frame) = self.frames.last_mut() else {
            return Ok(());
        };
        if !frame.start_tag_open {
            return Ok(());
        }
        frame.start_tag_open = false;

        let mut unbound = None;
        let element = &mut frame.element;
        if frame.prefix_unresolved {
            match self.scope.resolve(&element.name.prefix) {
                Some(uri) => element.name.namespace_uri = uri.to_string(),
                None => unbound = Some(element.name.prefix.clone()),
            }
        }
        for &index in &frame.unresolved_attributes {
            let name = &mut element.attributes[index].name;
            match self.scope.resolve(&name.prefix) {
                Some(uri) => name.namespace_uri = uri.to_string(),
                None => unbound = Some(name.prefix.clone()),
            }
        }
        if let Some(prefix) = unbound {
            return self.fail(format!("namespace prefix '{prefix}' is not declared"));
        }

        // Bind prefixes given with an explicit URI that the scope does not
        // already map the same way.
        let mut needed: Vec<(String, String)> = Vec::new();
        let element_name = &element.name;
        if self.scope.resolve(&element_name.prefix) != Some(element_name.namespace_uri.as_str()) {
            needed.push((element_name.prefix.clone(), element_name.namespace_uri.clone()));
        }
        for attribute in &element.attributes {
            let name = &attribute.name;
            if !name.prefix.is_empty()
                && self.scope.resolve(&name.prefix) != Some(name.namespace_uri.as_str())
                && !needed.iter().any(|(p, _)| *p == name.prefix)
            {
                needed.push((name.prefix.clone(), name.namespace_uri.clone()));
            }
        }
        for (prefix, uri) in needed {
            if element.namespaces.iter().any(|(p, _)| *p == prefix) {
                return self.fail(format!(
                    "prefix '{prefix}' is declared with a different namespace than the one it is used with"
                ));
            }
            self.scope.declare(&prefix, &uri);
            element.namespaces.push((prefix, uri));
        }
        Ok(())
    }

    fn push_node(&mut self, node: FragmentNode) {
        let siblings = match self.frames.last_mut() {
            Some(frame) => &mut frame.element.children,
            None => &mut self.top_level,
        };
        if self.coalesce_text {
            if let (FragmentNode::Text(text), Some(FragmentNode::Text(previous))) =
                (&node, siblings.last_mut())
            {
                previous.push_str(text);
                return;
            }
        }
        siblings.push(node);
    }

    /// Always an error: a writer builds a fragment, never a standalone document.
    pub fn write_start_document(&mut self) -> Result<(), SpliceError> {
        self.ensure_writable()?;
        self.fail("a document cannot be started inside a fragment writer")
    }

    /// Closes every element still open.
    pub fn write_end_document(&mut self) -> Result<(), SpliceError> {
        self.ensure_writable()?;
        while !self.frames.is_empty() {
            self.write_end_element()?;
        }
        Ok(())
    }

    /// Opens an unprefixed element in the default namespace in scope.
    pub fn write_start_element(&mut self, local_name: &str) -> Result<(), SpliceError> {
        self.write_start_element_ns("", local_name, None)
    }

    /// Opens an element. With `namespace` set to `None` the prefix is looked
    /// up in scope once the start tag is complete, so declarations written as
    /// attributes of this same element are honoured.
    pub fn write_start_element_ns(
        &mut self,
        prefix: &str,
        local_name: &str,
        namespace: Option<&str>,
    ) -> Result<(), SpliceError> {
        self.begin_content()?;
        if !is_valid_local_name(local_name) || !(prefix.is_empty() || is_valid_local_name(prefix))
        {
            return self.fail(format!("'{local_name}' is not a valid element name"));
        }
        let name = QName::new(prefix, local_name, namespace.unwrap_or_default());
        log::trace!("start element {}", name.name());

        self.scope.push_scope();
        self.frames.push(Frame {
            element: FragmentElement::new(name),
            start_tag_open: true,
            prefix_unresolved: namespace.is_none(),
            unresolved_attributes: Vec::new(),
        });
        Ok(())
    }

    /// Closes the innermost element. An element left without children this
    /// way reports itself as empty.
    pub fn write_end_element(&mut self) -> Result<(), SpliceError> {
        self.end_element(false)
    }

    /// Closes the innermost element as if it had a separate end tag.
    pub fn write_full_end_element(&mut self) -> Result<(), SpliceError> {
        self.end_element(true)
    }

    fn end_element(&mut self, explicit_close: bool) -> Result<(), SpliceError> {
        self.ensure_writable()?;
        if self.attribute.is_some() {
            self.write_end_attribute()?;
        }
        if self.frames.is_empty() {
            return self.fail("there is no open element to end");
        }
        self.finish_start_tag()?;

        let Some(mut frame) = self.frames.pop() else {
            return self.fail("there is no open element to end");
        };
        self.scope.pop_scope();
        frame.element.explicit_close = explicit_close;
        log::trace!("end element {}", frame.element.name.name());
        self.push_node(FragmentNode::Element(frame.element));
        Ok(())
    }

    pub fn write_start_attribute(&mut self, local_name: &str) -> Result<(), SpliceError> {
        self.write_start_attribute_ns("", local_name, None)
    }

    /// Opens an attribute on the innermost element. `xmlns` and `xmlns:p`
    /// attributes become namespace declarations.
    ///
    /// Outside any element the event is accepted and discarded, unless the
    /// configuration asks for stray events to be rejected.
    pub fn write_start_attribute_ns(
        &mut self,
        prefix: &str,
        local_name: &str,
        namespace: Option<&str>,
    ) -> Result<(), SpliceError> {
        self.ensure_writable()?;
        if self.attribute.is_some() {
            return self.fail("an attribute is already open");
        }
        if !is_valid_local_name(local_name) || !(prefix.is_empty() || is_valid_local_name(prefix))
        {
            return self.fail(format!("'{local_name}' is not a valid attribute name"));
        }

        let stray = match self.frames.last() {
            None => match self.stray_events {
                StrayEventPolicy::Ignore => {
                    log::warn!(
                        "Ignoring attribute '{local_name}' written outside of any element."
                    );
                    true
                }
                StrayEventPolicy::Reject => {
                    return self.fail(format!(
                        "attribute '{local_name}' written outside of any element"
                    ));
                }
            },
            Some(frame) if !frame.start_tag_open => {
                return self.fail(format!(
                    "attribute '{local_name}' written after element content"
                ));
            }
            Some(_) => false,
        };

        let is_declaration = prefix == "xmlns" || (prefix.is_empty() && local_name == "xmlns");
        let unresolved = namespace.is_none() && !prefix.is_empty() && !is_declaration;
        let namespace = if is_declaration {
            XMLNS_NAMESPACE
        } else {
            namespace.unwrap_or_default()
        };
        self.attribute = Some(PendingAttribute {
            name: QName::new(prefix, local_name, namespace),
            unresolved,
            value: String::new(),
            stray,
        });
        Ok(())
    }

    pub fn write_end_attribute(&mut self) -> Result<(), SpliceError> {
        self.ensure_writable()?;
        let Some(attribute) = self.attribute.take() else {
            return self.fail("there is no open attribute to end");
        };
        if attribute.stray {
            return Ok(());
        }
        let Some(frame) = self.frames.last_mut() else {
            return self.fail("attribute has no element to attach to");
        };

        let name = attribute.name;
        let declared = if name.prefix == "xmlns" {
            Some(name.local_name.clone())
        } else if name.prefix.is_empty() && name.local_name == "xmlns" {
            Some(String::new())
        } else {
            None
        };

        if let Some(prefix) = declared {
            if frame.element.namespaces.iter().any(|(p, _)| *p == prefix) {
                return self.fail(format!("namespace prefix '{prefix}' declared twice"));
            }
            if !prefix.is_empty() && attribute.value.is_empty() {
                return self.fail(format!("prefix '{prefix}' cannot be bound to an empty URI"));
            }
            self.scope.declare(&prefix, &attribute.value);
            frame.element.namespaces.push((prefix, attribute.value));
            return Ok(());
        }

        let duplicate = frame.element.attributes.iter().any(|existing| {
            existing.name.local_name == name.local_name
                && existing.name.prefix == name.prefix
                && existing.name.namespace_uri == name.namespace_uri
        });
        if duplicate {
            return self.fail(format!("duplicate attribute '{}'", name.name()));
        }
        if attribute.unresolved {
            frame
                .unresolved_attributes
                .push(frame.element.attributes.len());
        }
        frame.element.attributes.push(FragmentAttribute {
            name,
            value: attribute.value,
        });
        Ok(())
    }

    /// Convenience for start attribute, value, end attribute.
    pub fn write_attribute_string(&mut self, local_name: &str, value: &str) -> Result<(), SpliceError> {
        self.write_attribute_string_ns("", local_name, None, value)
    }

    pub fn write_attribute_string_ns(
        &mut self,
        prefix: &str,
        local_name: &str,
        namespace: Option<&str>,
        value: &str,
    ) -> Result<(), SpliceError> {
        self.write_start_attribute_ns(prefix, local_name, namespace)?;
        self.write_string(value)?;
        self.write_end_attribute()
    }

    /// Writes text: into the open attribute if there is one, otherwise as a
    /// Text node.
    pub fn write_string(&mut self, text: &str) -> Result<(), SpliceError> {
        self.ensure_writable()?;
        if let Some(attribute) = self.attribute.as_mut() {
            attribute.value.push_str(text);
            return Ok(());
        }
        self.begin_content()?;
        if !text.is_empty() {
            self.push_node(FragmentNode::Text(text.to_string()));
        }
        Ok(())
    }

    /// CDATA content is stored as ordinary text.
    pub fn write_cdata(&mut self, text: &str) -> Result<(), SpliceError> {
        if text.contains("]]>") {
            self.ensure_writable()?;
            return self.fail("CDATA content cannot contain ']]>'");
        }
        self.write_string(text)
    }

    pub fn write_comment(&mut self, text: &str) -> Result<(), SpliceError> {
        self.begin_content()?;
        if text.contains("--") || text.ends_with('-') {
            return self.fail("comment text cannot contain '--' or end with '-'");
        }
        self.push_node(FragmentNode::Comment(text.to_string()));
        Ok(())
    }

    pub fn write_processing_instruction(&mut self, target: &str, data: &str) -> Result<(), SpliceError> {
        self.begin_content()?;
        if target.eq_ignore_ascii_case("xml") {
            return self.fail("an XML declaration cannot be written into a fragment");
        }
        if !is_valid_local_name(target) || data.contains("?>") {
            return self.fail(format!("invalid processing instruction '{target}'"));
        }
        self.push_node(FragmentNode::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        });
        Ok(())
    }

    /// Replays a detached node (and its subtree) as an event sequence.
    pub fn write_node(&mut self, node: &FragmentNode) -> Result<(), SpliceError> {
        let mut pending = vec![NodeEvent::Enter(node)];
        while let Some(event) = pending.pop() {
            match event {
                NodeEvent::Enter(FragmentNode::Element(element)) => {
                    self.write_element_start(element)?;
                    pending.push(NodeEvent::Exit {
                        explicit_close: element.explicit_close,
                    });
                    pending.extend(element.children.iter().rev().map(NodeEvent::Enter));
                }
                NodeEvent::Enter(FragmentNode::Text(text)) => self.write_string(text)?,
                NodeEvent::Enter(FragmentNode::Comment(text)) => self.write_comment(text)?,
                NodeEvent::Enter(FragmentNode::ProcessingInstruction { target, data }) => {
                    self.write_processing_instruction(target, data)?
                }
                NodeEvent::Exit { explicit_close: true } => self.write_full_end_element()?,
                NodeEvent::Exit { explicit_close: false } => self.write_end_element()?,
            }
        }
        Ok(())
    }

    fn write_element_start(&mut self, element: &FragmentElement) -> Result<(), SpliceError> {
        let name = &element.name;
        self.write_start_element_ns(&name.prefix, &name.local_name, Some(&name.namespace_uri))?;
        for (prefix, uri) in &element.namespaces {
            if prefix.is_empty() {
                self.write_attribute_string_ns("", "xmlns", Some(XMLNS_NAMESPACE), uri)?;
            } else {
                self.write_attribute_string_ns("xmlns", prefix, Some(XMLNS_NAMESPACE), uri)?;
            }
        }
        for attribute in &element.attributes {
            let name = &attribute.name;
            self.write_attribute_string_ns(
                &name.prefix,
                &name.local_name,
                Some(&name.namespace_uri),
                &attribute.value,
            )?;
        }
        Ok(())
    }

    /// Validates the buffered sequence and splices it into the tree.
    ///
    /// Fails, without touching the tree, when elements are still open, when
    /// the writer already failed or closed, or when the anchor node has been
    /// removed since the writer was opened.
    pub fn close(&mut self) -> Result<(), SpliceError> {
        self.ensure_writable()?;
        if self.attribute.as_ref().is_some_and(|attribute| attribute.stray) {
            self.attribute = None;
        }
        if !self.frames.is_empty() {
            let open = self.frames.len();
            return self.fail(format!(
                "{open} element(s) still open at close; nothing was inserted"
            ));
        }

        let nodes = std::mem::take(&mut self.top_level);
        let result = splice(&mut self.tree.borrow_mut(), self.target, &nodes);
        match result {
            Ok(ids) => {
                self.inserted = ids;
                self.state = WriterState::Closed;
                Ok(())
            }
            Err(err) => {
                self.state = WriterState::Error;
                Err(err)
            }
        }
    }
}

impl Drop for MutationWriter {
    fn drop(&mut self) {
        let buffered = !self.top_level.is_empty() || !self.frames.is_empty();
        if self.state == WriterState::Building && buffered {
            log::warn!(
                "Mutation writer for {:?} dropped without close; buffered content discarded.",
                self.target
            );
        }
    }
}

fn is_valid_local_name(name: &str) -> bool {
    !name.contains(':') && is_valid_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::tree::NodeKind;

    fn tree_with(markup: &str) -> (Rc<RefCell<Tree>>, NodeId) {
        let tree = Rc::new(RefCell::new(Tree::default()));
        let root = tree.borrow().root();
        let mut writer = MutationWriter::new(tree.clone(), SplicePoint::AppendChild(root)).unwrap();
        let nodes = crate::fragment::parse_fragment(
            markup,
            &NamespaceScope::new(),
            crate::config::DeclarationPolicy::Reject,
        )
        .unwrap();
        for node in &nodes {
            writer.write_node(node).unwrap();
        }
        writer.close().unwrap();
        let element = writer.inserted()[0];
        (tree, element)
    }

    #[test]
    fn open_elements_carry_their_qualified_names() {
        let (tree, root) = tree_with("<root xmlns:p='urn:p'/>");
        let mut writer = MutationWriter::new(tree, SplicePoint::AppendChild(root)).unwrap();
        writer.write_start_element("foo").unwrap();
        writer.write_start_element_ns("p", "item", None).unwrap();
        let names: Vec<String> = writer
            .frames
            .iter()
            .map(|frame| frame.element.name.name())
            .collect();
        assert_eq!(names, ["foo", "p:item"]);
    }

    #[test]
    fn state_moves_from_initial_to_closed() {
        let (tree, root) = tree_with("<root/>");
        let mut writer = MutationWriter::new(tree.clone(), SplicePoint::AppendChild(root)).unwrap();
        assert_eq!(writer.state(), WriterState::Initial);
        writer.write_start_element("foo").unwrap();
        assert_eq!(writer.state(), WriterState::Building);
        assert_eq!(writer.depth(), 1);
        writer.write_end_element().unwrap();
        writer.close().unwrap();
        assert_eq!(writer.state(), WriterState::Closed);
        assert_eq!(tree.borrow().outline(root), "root(foo)");

        let err = writer.write_string("late").unwrap_err();
        assert!(matches!(err, SpliceError::Structural(_)));
    }

    #[test]
    fn nothing_reaches_the_tree_before_close() {
        let (tree, root) = tree_with("<root/>");
        let mut writer = MutationWriter::new(tree.clone(), SplicePoint::AppendChild(root)).unwrap();
        writer.write_start_element("a").unwrap();
        writer.write_string("text").unwrap();
        writer.write_end_element().unwrap();
        assert!(!tree.borrow().has_children(root));
        writer.close().unwrap();
        assert_eq!(tree.borrow().outline(root), r#"root(a("text"))"#);
    }

    #[test]
    fn unclosed_element_fails_close_and_leaves_tree() {
        let (tree, root) = tree_with("<root><keep/></root>");
        let before = tree.borrow().outline(root);
        let mut writer = MutationWriter::new(tree.clone(), SplicePoint::AppendChild(root)).unwrap();
        writer.write_start_element("foo").unwrap();
        let err = writer.close().unwrap_err();
        assert!(matches!(err, SpliceError::Structural(_)));
        assert_eq!(writer.state(), WriterState::Error);
        assert_eq!(tree.borrow().outline(root), before);

        // Terminal: even a now-balanced sequence cannot recover.
        assert!(writer.write_end_element().is_err());
        assert!(writer.close().is_err());
    }

    #[test]
    fn end_element_without_open_element_fails() {
        let (tree, root) = tree_with("<root/>");
        let mut writer = MutationWriter::new(tree, SplicePoint::AppendChild(root)).unwrap();
        assert!(writer.write_end_element().is_err());
        assert_eq!(writer.state(), WriterState::Error);
    }

    #[test]
    fn start_document_is_rejected() {
        let (tree, root) = tree_with("<root/>");
        let mut writer = MutationWriter::new(tree, SplicePoint::AppendChild(root)).unwrap();
        assert!(matches!(
            writer.write_start_document(),
            Err(SpliceError::Structural(_))
        ));
        assert_eq!(writer.state(), WriterState::Error);
    }

    #[test]
    fn stray_attribute_is_ignored_by_default() {
        let tree = Rc::new(RefCell::new(Tree::default()));
        let root = tree.borrow().root();
        let mut writer = MutationWriter::new(tree.clone(), SplicePoint::AppendChild(root)).unwrap();
        writer.write_start_attribute("test").unwrap();
        writer.write_string("ignored").unwrap();
        writer.write_end_attribute().unwrap();
        writer.close().unwrap();
        assert!(!tree.borrow().has_children(root));
    }

    #[test]
    fn stray_attribute_can_be_rejected() {
        let config = EditorConfig {
            stray_writer_events: StrayEventPolicy::Reject,
            ..EditorConfig::default()
        };
        let tree = Rc::new(RefCell::new(Tree::new(config)));
        let root = tree.borrow().root();
        let mut writer = MutationWriter::new(tree, SplicePoint::AppendChild(root)).unwrap();
        assert!(writer.write_start_attribute("test").is_err());
        assert_eq!(writer.state(), WriterState::Error);
    }

    #[test]
    fn attributes_and_declarations_attach_to_element() {
        let (tree, root) = tree_with("<root/>");
        let mut writer = MutationWriter::new(tree.clone(), SplicePoint::AppendChild(root)).unwrap();
        writer.write_start_element_ns("p", "item", None).unwrap();
        writer
            .write_attribute_string_ns("xmlns", "p", None, "urn:p")
            .unwrap();
        writer.write_attribute_string("id", "7").unwrap();
        writer.write_end_element().unwrap();
        writer.close().unwrap();

        let tree = tree.borrow();
        let item = tree.children(root)[0];
        assert_eq!(tree.node(item).name, QName::new("p", "item", "urn:p"));
        assert_eq!(tree.outline(item), r#"p:item[@id="7"]"#);
        assert_eq!(tree.in_scope_namespaces(item).len(), 2);
    }

    #[test]
    fn unbound_prefix_fails() {
        let (tree, root) = tree_with("<root/>");
        let mut writer = MutationWriter::new(tree, SplicePoint::AppendChild(root)).unwrap();
        writer.write_start_element_ns("q", "item", None).unwrap();
        assert!(writer.write_end_element().is_err());
        assert_eq!(writer.state(), WriterState::Error);
    }

    #[test]
    fn explicit_namespace_gets_declared() {
        let (tree, root) = tree_with("<root/>");
        let mut writer = MutationWriter::new(tree.clone(), SplicePoint::AppendChild(root)).unwrap();
        writer
            .write_start_element_ns("x", "item", Some("urn:x"))
            .unwrap();
        writer.write_end_element().unwrap();
        writer.close().unwrap();

        let tree = tree.borrow();
        let item = tree.children(root)[0];
        assert_eq!(tree.lookup_namespace(item, "x").as_deref(), Some("urn:x"));
    }

    #[test]
    fn attribute_after_content_fails() {
        let (tree, root) = tree_with("<root/>");
        let mut writer = MutationWriter::new(tree, SplicePoint::AppendChild(root)).unwrap();
        writer.write_start_element("a").unwrap();
        writer.write_string("body").unwrap();
        assert!(writer.write_attribute_string("late", "1").is_err());
    }

    #[test]
    fn duplicate_attribute_fails() {
        let (tree, root) = tree_with("<root/>");
        let mut writer = MutationWriter::new(tree, SplicePoint::AppendChild(root)).unwrap();
        writer.write_start_element("a").unwrap();
        writer.write_attribute_string("k", "1").unwrap();
        assert!(writer.write_attribute_string("k", "2").is_err());
    }

    #[test]
    fn adjacent_text_is_coalesced() {
        let (tree, root) = tree_with("<root/>");
        let mut writer = MutationWriter::new(tree.clone(), SplicePoint::AppendChild(root)).unwrap();
        writer.write_string("a").unwrap();
        writer.write_string("b").unwrap();
        writer.close().unwrap();
        assert_eq!(tree.borrow().outline(root), r#"root("ab")"#);
    }

    #[test]
    fn full_end_element_is_not_empty() {
        let (tree, root) = tree_with("<root/>");
        let mut writer = MutationWriter::new(tree.clone(), SplicePoint::AppendChild(root)).unwrap();
        writer.write_start_element("short").unwrap();
        writer.write_end_element().unwrap();
        writer.write_start_element("long").unwrap();
        writer.write_full_end_element().unwrap();
        writer.close().unwrap();

        let tree = tree.borrow();
        let children = tree.children(root);
        assert!(tree.is_empty_element(children[0]));
        assert!(!tree.is_empty_element(children[1]));
    }

    #[test]
    fn comments_and_instructions_are_validated() {
        let (tree, root) = tree_with("<root/>");
        let mut writer = MutationWriter::new(tree.clone(), SplicePoint::AppendChild(root)).unwrap();
        writer.write_comment("fine").unwrap();
        writer.write_processing_instruction("pi", "data").unwrap();
        writer.close().unwrap();
        assert_eq!(tree.borrow().outline(root), "root(<!--fine-->, <?pi data?>)");

        let mut writer = MutationWriter::new(tree.clone(), SplicePoint::AppendChild(root)).unwrap();
        assert!(writer.write_processing_instruction("xml", "version='1.0'").is_err());
        let mut writer = MutationWriter::new(tree, SplicePoint::AppendChild(root)).unwrap();
        assert!(writer.write_comment("a--b").is_err());
    }

    #[test]
    fn invalid_source_kind_is_rejected_on_open() {
        let (tree, root) = tree_with("<root>text</root>");
        let text = tree.borrow().children(root)[0];
        assert_eq!(tree.borrow().kind(text), NodeKind::Text);
        let err = MutationWriter::new(tree, SplicePoint::AppendChild(text)).unwrap_err();
        assert!(matches!(err, SpliceError::InvalidPosition { .. }));
    }
}
