//! Contains the logic for finding a target node from a path string.
//!
//! Paths are deliberately small: a `/`-separated list of child steps starting
//! at the document root, each optionally indexed, with an optional final
//! attribute step.
//!
//! ```text
//! /catalog/book[2]/title
//! /catalog/*[1]/text()
//! /catalog/book/@id
//! ```

use crate::error::SpliceError;
use crate::tree::{NodeId, NodeKind, Tree};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const STEP_PATTERN: &str = r"^(?:(?P<test>\*|text\(\)|comment\(\)|processing-instruction\(\)|node\(\)|[A-Za-z_][\w.\-]*(?::[A-Za-z_][\w.\-]*)?)(?:\[(?P<index>\d+)\])?|@(?P<attribute>[A-Za-z_][\w.\-]*(?::[A-Za-z_][\w.\-]*)?))$";

/// What a single child step matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// Elements with this qualified name, as written in the document.
    Name(String),
    /// Any element.
    AnyElement,
    Text,
    Comment,
    ProcessingInstruction,
    /// Any child.
    AnyNode,
}

impl NodeTest {
    fn matches(&self, tree: &Tree, id: NodeId) -> bool {
        let node = tree.node(id);
        match self {
            NodeTest::Name(name) => node.kind == NodeKind::Element && node.name.name() == *name,
            NodeTest::AnyElement => node.kind == NodeKind::Element,
            NodeTest::Text => node.kind == NodeKind::Text,
            NodeTest::Comment => node.kind == NodeKind::Comment,
            NodeTest::ProcessingInstruction => node.kind == NodeKind::ProcessingInstruction,
            NodeTest::AnyNode => true,
        }
    }
}

/// One child step; `ordinal` is 1-based among the children passing `test`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub test: NodeTest,
    pub ordinal: usize,
}

/// A parsed node path. Deserializes from its string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePath {
    raw: String,
    steps: Vec<Step>,
    attribute: Option<String>,
}

impl NodePath {
    pub fn parse(raw: &str) -> Result<Self, SpliceError> {
        let invalid = |reason: String| SpliceError::InvalidPath {
            path: raw.to_string(),
            reason,
        };
        let pattern = Regex::new(STEP_PATTERN).map_err(|err| invalid(err.to_string()))?;

        let trimmed = raw.trim();
        let body = trimmed.strip_prefix('/').unwrap_or(trimmed);
        let mut steps = Vec::new();
        let mut attribute = None;

        if !body.is_empty() {
            let parts: Vec<&str> = body.split('/').collect();
            for (position, part) in parts.iter().enumerate() {
                let captures = pattern
                    .captures(part)
                    .ok_or_else(|| invalid(format!("'{part}' is not a valid step")))?;

                if let Some(name) = captures.name("attribute") {
                    if position + 1 != parts.len() {
                        return Err(invalid("an attribute step must come last".to_string()));
                    }
                    attribute = Some(name.as_str().to_string());
                    continue;
                }

                let test = match captures.name("test").map(|m| m.as_str()) {
                    Some("*") => NodeTest::AnyElement,
                    Some("text()") => NodeTest::Text,
                    Some("comment()") => NodeTest::Comment,
                    Some("processing-instruction()") => NodeTest::ProcessingInstruction,
                    Some("node()") => NodeTest::AnyNode,
                    Some(name) => NodeTest::Name(name.to_string()),
                    None => return Err(invalid(format!("'{part}' is not a valid step"))),
                };
                let ordinal = match captures.name("index") {
                    Some(index) => index
                        .as_str()
                        .parse::<usize>()
                        .ok()
                        .filter(|&n| n > 0)
                        .ok_or_else(|| invalid(format!("index in '{part}' must be 1 or more")))?,
                    None => 1,
                };
                steps.push(Step { test, ordinal });
            }
        }

        if steps.is_empty() && attribute.is_some() {
            return Err(invalid("the document root has no attributes".to_string()));
        }

        Ok(NodePath {
            raw: raw.to_string(),
            steps,
            attribute,
        })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    /// Walks the path from the document root.
    pub fn resolve(&self, tree: &Tree) -> Result<NodeId, SpliceError> {
        let not_found = || SpliceError::NodeNotFound(self.raw.clone());
        let mut current = tree.root();

        for step in &self.steps {
            current = tree
                .children(current)
                .iter()
                .copied()
                .filter(|&child| step.test.matches(tree, child))
                .nth(step.ordinal - 1)
                .ok_or_else(not_found)?;
        }

        if let Some(name) = &self.attribute {
            current = tree
                .attributes(current)
                .iter()
                .copied()
                .find(|&attr| tree.node(attr).name.name() == *name)
                .ok_or_else(not_found)?;
        }

        log::trace!("Resolved path '{}' to {:?}", self.raw, current);
        Ok(current)
    }
}

impl FromStr for NodePath {
    type Err = SpliceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodePath::parse(s)
    }
}

impl TryFrom<String> for NodePath {
    type Error = SpliceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        NodePath::parse(&value)
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.raw
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::XmlDocument;
    use rstest::rstest;

    fn catalog() -> XmlDocument {
        XmlDocument::parse(
            "<catalog><!--intro--><book id='a'>First</book><magazine/><book id='b'>Second</book></catalog>",
        )
        .unwrap()
    }

    #[test]
    fn parses_steps_and_attribute() {
        let path = NodePath::parse("/catalog/book[2]/@id").unwrap();
        assert_eq!(
            path.steps(),
            &[
                Step {
                    test: NodeTest::Name("catalog".into()),
                    ordinal: 1
                },
                Step {
                    test: NodeTest::Name("book".into()),
                    ordinal: 2
                },
            ]
        );
        assert_eq!(path.attribute(), Some("id"));
        assert_eq!(path.to_string(), "/catalog/book[2]/@id");
    }

    #[rstest]
    #[case("/catalog/book[0]")]
    #[case("/catalog/@id/book")]
    #[case("/catalog//book")]
    #[case("/@id")]
    #[case("/catalog/bo ok")]
    fn rejects_malformed_paths(#[case] raw: &str) {
        let err = NodePath::parse(raw).unwrap_err();
        assert!(matches!(err, SpliceError::InvalidPath { .. }), "{raw}: {err:?}");
    }

    #[rstest]
    #[case("/catalog/book", "book", "First")]
    #[case("/catalog/book[2]", "book", "Second")]
    #[case("/catalog/*[2]", "magazine", "")]
    #[case("/catalog/book[2]/@id", "id", "b")]
    #[case("/catalog/book/text()", "", "First")]
    #[case("catalog/comment()", "", "intro")]
    #[case("/catalog/node()[2]", "book", "First")]
    fn resolves_against_document(#[case] raw: &str, #[case] name: &str, #[case] value: &str) {
        let doc = catalog();
        let cursor = doc.select(&raw.parse().unwrap()).unwrap();
        assert_eq!(cursor.name(), name);
        assert_eq!(cursor.value(), value);
    }

    #[test]
    fn empty_path_is_the_root() {
        let doc = catalog();
        let cursor = doc.select(&NodePath::parse("/").unwrap()).unwrap();
        assert_eq!(cursor.node_kind(), NodeKind::Root);
    }

    #[test]
    fn missing_node_reports_path() {
        let doc = catalog();
        let err = doc
            .select(&NodePath::parse("/catalog/book[3]").unwrap())
            .unwrap_err();
        assert_eq!(err, SpliceError::NodeNotFound("/catalog/book[3]".into()));
    }

    #[test]
    fn deserializes_from_string() {
        let path: NodePath = serde_json::from_str(r#""/catalog/magazine""#).unwrap();
        assert_eq!(path.steps().len(), 2);
        assert!(serde_json::from_str::<NodePath>(r#""/catalog/[1]""#).is_err());
    }
}
