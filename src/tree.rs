//! Tree Model - arena-backed XML node graph.
//!
//! All nodes live in a `Vec<NodeData>` owned by the [`Tree`] and are addressed
//! by [`NodeId`]. Children, attributes and namespace declarations are owned by
//! their parent's lists; the `parent` link is a plain index back-reference.
//!
//! Nodes are never freed. A node removed by an edit stays readable in the
//! arena and keeps its former parent link, but no longer appears in that
//! parent's lists.

use crate::config::EditorConfig;
use crate::namespace::{NamespaceScope, XML_NAMESPACE};
use std::fmt;

/// Compact node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Type of XML node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Document root
    Root,
    Element,
    Attribute,
    /// Namespace declaration in scope of an element
    Namespace,
    Text,
    Comment,
    ProcessingInstruction,
}

impl NodeKind {
    /// Root and Element nodes own an ordered child list.
    #[inline]
    pub fn can_hold_children(self) -> bool {
        matches!(self, NodeKind::Root | NodeKind::Element)
    }

    /// Whether a node of this kind occupies a slot among its parent's children.
    #[inline]
    pub fn has_ordinary_sibling_position(self) -> bool {
        !matches!(
            self,
            NodeKind::Root | NodeKind::Attribute | NodeKind::Namespace
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Root => "Root",
            NodeKind::Element => "Element",
            NodeKind::Attribute => "Attribute",
            NodeKind::Namespace => "Namespace",
            NodeKind::Text => "Text",
            NodeKind::Comment => "Comment",
            NodeKind::ProcessingInstruction => "ProcessingInstruction",
        };
        f.write_str(name)
    }
}

/// Qualified name triple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: String,
    pub local_name: String,
    pub namespace_uri: String,
}

impl QName {
    pub fn new(
        prefix: impl Into<String>,
        local_name: impl Into<String>,
        namespace_uri: impl Into<String>,
    ) -> Self {
        QName {
            prefix: prefix.into(),
            local_name: local_name.into(),
            namespace_uri: namespace_uri.into(),
        }
    }

    /// An unprefixed name in no namespace.
    pub fn local(local_name: impl Into<String>) -> Self {
        QName::new("", local_name, "")
    }

    /// `prefix:local`, or just `local` when there is no prefix.
    pub fn name(&self) -> String {
        if self.prefix.is_empty() {
            self.local_name.clone()
        } else {
            format!("{}:{}", self.prefix, self.local_name)
        }
    }
}

/// A node in the arena
#[derive(Debug, Clone)]
pub struct NodeData {
    pub kind: NodeKind,
    pub name: QName,
    /// Text, comment, attribute and PI content; the bound URI for namespace
    /// nodes; empty for Root and Element.
    pub value: String,
    pub children: Vec<NodeId>,
    pub attributes: Vec<NodeId>,
    pub namespaces: Vec<NodeId>,
    /// Parent node (None for the root and for never-attached nodes)
    pub parent: Option<NodeId>,
    /// Element was written with a separate end tag, so it never reports as
    /// an empty element even without children.
    pub explicit_close: bool,
}

impl NodeData {
    pub(crate) fn new(kind: NodeKind, name: QName, value: impl Into<String>) -> Self {
        NodeData {
            kind,
            name,
            value: value.into(),
            children: Vec::new(),
            attributes: Vec::new(),
            namespaces: Vec::new(),
            parent: None,
            explicit_close: false,
        }
    }
}

/// The node arena for one document.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<NodeData>,
    root: NodeId,
    config: EditorConfig,
}

enum OutlineStep {
    Node(NodeId),
    Text(&'static str),
}

impl Default for Tree {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Tree {
    /// Creates a tree holding only a Root node and its implicit `xml` binding.
    pub fn new(config: EditorConfig) -> Self {
        let mut tree = Tree {
            nodes: Vec::with_capacity(16),
            root: NodeId(0),
            config,
        };
        let root = tree.push(NodeData::new(NodeKind::Root, QName::default(), ""));
        let mut xml_binding = NodeData::new(NodeKind::Namespace, QName::local("xml"), XML_NAMESPACE);
        xml_binding.parent = Some(root);
        let xml_binding = tree.push(xml_binding);
        tree.node_mut(root).namespaces.push(xml_binding);
        tree.root = root;
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Number of nodes ever allocated, detached ones and the root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.index()]
    }

    pub(crate) fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(data);
        id
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn attributes(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).attributes
    }

    /// Index of `id` among its parent's children, or `None` when the node has
    /// no sibling position or is no longer listed by its parent.
    pub fn position(&self, id: NodeId) -> Option<usize> {
        if !self.kind(id).has_ordinary_sibling_position() {
            return None;
        }
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    /// Whether `id` is reachable from the root through owning lists.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            let Some(parent) = self.parent(current) else {
                return false;
            };
            let owner = self.node(parent);
            let listed = match self.kind(current) {
                NodeKind::Attribute => owner.attributes.contains(&current),
                NodeKind::Namespace => owner.namespaces.contains(&current),
                _ => owner.children.contains(&current),
            };
            if !listed {
                return false;
            }
            current = parent;
        }
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let index = self.position(id)?;
        let parent = self.parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let index = self.position(id)?;
        let parent = self.parent(id)?;
        index
            .checked_sub(1)
            .and_then(|prev| self.children(parent).get(prev).copied())
    }

    pub fn first_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.position(id)?;
        let parent = self.parent(id)?;
        self.children(parent).first().copied()
    }

    pub fn last_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.position(id)?;
        let parent = self.parent(id)?;
        self.children(parent).last().copied()
    }

    /// Number of parent links between `id` and the top of its tree.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            depth += 1;
            current = parent;
        }
        depth
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        !self.node(id).children.is_empty()
    }

    pub fn has_attributes(&self, id: NodeId) -> bool {
        !self.node(id).attributes.is_empty()
    }

    pub fn is_empty_element(&self, id: NodeId) -> bool {
        let node = self.node(id);
        node.kind == NodeKind::Element && node.children.is_empty() && !node.explicit_close
    }

    /// Concatenated descendant text for Root and Element nodes, the stored
    /// value for everything else.
    pub fn string_value(&self, id: NodeId) -> String {
        let node = self.node(id);
        if !node.kind.can_hold_children() {
            return node.value.clone();
        }
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let mut pending: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(child) = pending.pop() {
            let node = self.node(child);
            match node.kind {
                NodeKind::Text => out.push_str(&node.value),
                NodeKind::Element => pending.extend(node.children.iter().rev()),
                _ => {}
            }
        }
    }

    /// Namespace nodes visible on `element`, nearest declaration first.
    ///
    /// Prefixes shadowed by a closer declaration are skipped, as is an
    /// `xmlns=""` undeclaration of the default namespace.
    pub fn in_scope_namespaces(&self, element: NodeId) -> Vec<NodeId> {
        let mut seen: Vec<&str> = Vec::new();
        let mut visible = Vec::new();
        let mut current = Some(element);
        while let Some(id) = current {
            for &ns in &self.node(id).namespaces {
                let binding = self.node(ns);
                let prefix = binding.name.local_name.as_str();
                if seen.contains(&prefix) {
                    continue;
                }
                seen.push(prefix);
                if !binding.value.is_empty() {
                    visible.push(ns);
                }
            }
            current = self.parent(id);
        }
        visible
    }

    /// The prefix bindings a fragment spliced relative to `id` would see.
    ///
    /// For Root and Element the scope is the node's own; for any other kind
    /// it is the scope of the node's parent.
    pub fn namespace_scope(&self, id: NodeId) -> NamespaceScope {
        let context = if self.kind(id).can_hold_children() {
            Some(id)
        } else {
            self.parent(id)
        };

        let mut chain = Vec::new();
        let mut current = context;
        while let Some(node) = current {
            chain.push(node);
            current = self.parent(node);
        }

        let mut scope = NamespaceScope::new();
        for &node in chain.iter().rev() {
            scope.push_scope();
            for &ns in &self.node(node).namespaces {
                let binding = self.node(ns);
                scope.declare(&binding.name.local_name, &binding.value);
            }
        }
        scope
    }

    /// Looks up the URI bound to `prefix` as seen from `id`.
    pub fn lookup_namespace(&self, id: NodeId, prefix: &str) -> Option<String> {
        self.namespace_scope(id).resolve(prefix).map(str::to_string)
    }

    /// Compact structural rendering, e.g. `root(foo(bar), "final")`.
    ///
    /// Intended for diagnostics and assertions; this is not an XML serializer.
    pub fn outline(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_outline(id, &mut out);
        out
    }

    fn write_outline(&self, id: NodeId, out: &mut String) {
        let mut pending = vec![OutlineStep::Node(id)];
        while let Some(step) = pending.pop() {
            let id = match step {
                OutlineStep::Node(id) => id,
                OutlineStep::Text(text) => {
                    out.push_str(text);
                    continue;
                }
            };
            self.write_outline_label(id, out);
            let children = &self.node(id).children;
            if !children.is_empty() {
                out.push('(');
                pending.push(OutlineStep::Text(")"));
                for (i, &child) in children.iter().enumerate().rev() {
                    pending.push(OutlineStep::Node(child));
                    if i > 0 {
                        pending.push(OutlineStep::Text(", "));
                    }
                }
            }
        }
    }

    /// The outline of `id` without its children.
    fn write_outline_label(&self, id: NodeId, out: &mut String) {
        let node = self.node(id);
        match node.kind {
            NodeKind::Root => out.push_str("#document"),
            NodeKind::Element => {
                out.push_str(&node.name.name());
                if !node.attributes.is_empty() {
                    out.push('[');
                    for (i, &attr) in node.attributes.iter().enumerate() {
                        if i > 0 {
                            out.push(' ');
                        }
                        self.write_outline_label(attr, out);
                    }
                    out.push(']');
                }
            }
            NodeKind::Attribute => {
                out.push('@');
                out.push_str(&node.name.name());
                out.push('=');
                out.push_str(&format!("{:?}", node.value));
            }
            NodeKind::Namespace => {
                if node.name.local_name.is_empty() {
                    out.push_str("xmlns");
                } else {
                    out.push_str("xmlns:");
                    out.push_str(&node.name.local_name);
                }
                out.push('=');
                out.push_str(&format!("{:?}", node.value));
            }
            NodeKind::Text => out.push_str(&format!("{:?}", node.value)),
            NodeKind::Comment => {
                out.push_str("<!--");
                out.push_str(&node.value);
                out.push_str("-->");
            }
            NodeKind::ProcessingInstruction => {
                out.push_str("<?");
                out.push_str(&node.name.local_name);
                if !node.value.is_empty() {
                    out.push(' ');
                    out.push_str(&node.value);
                }
                out.push_str("?>");
            }
        }
    }
}
