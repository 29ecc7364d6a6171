//! Range Editor validation and removal.
//!
//! A range is a contiguous run of siblings under one parent, found by walking
//! forward from the start node through sibling links only.

use crate::error::SpliceError;
use crate::splicer::{remove_children, SplicePoint};
use crate::tree::{NodeId, Tree};
use std::ops::Range;

/// Whether the node that ends a range is itself part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    /// The end node is the first node kept.
    Exclusive,
    /// The end node is the last node removed.
    Inclusive,
}

/// A validated run of siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiblingRange {
    pub parent: NodeId,
    /// Child indices covered, end exclusive.
    pub indices: Range<usize>,
    /// The sibling right after the run, if any.
    pub following: Option<NodeId>,
}

impl SiblingRange {
    /// Where content replacing this range has to go. The point stays valid
    /// once the range itself is removed.
    pub fn vacated_slot(&self) -> SplicePoint {
        match self.following {
            Some(node) => SplicePoint::Before(node),
            None => SplicePoint::AppendChild(self.parent),
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Checks that `end` is reachable from `start` by forward sibling moves.
pub fn validate(
    tree: &Tree,
    start: NodeId,
    end: NodeId,
    bound: RangeBound,
) -> Result<SiblingRange, SpliceError> {
    let kind = tree.kind(start);
    if !kind.has_ordinary_sibling_position() {
        return Err(SpliceError::InvalidPosition {
            operation: "start a sibling range at",
            kind,
        });
    }
    if !tree.is_attached(start) {
        return Err(SpliceError::DetachedNode);
    }
    let (Some(parent), Some(start_index)) = (tree.parent(start), tree.position(start)) else {
        return Err(SpliceError::DetachedNode);
    };

    let mut current = start;
    let mut index = start_index;
    while current != end {
        match tree.next_sibling(current) {
            Some(next) => {
                current = next;
                index += 1;
            }
            None => {
                return Err(SpliceError::InvalidRange(
                    "the end node is not a following sibling of the start node".to_string(),
                ));
            }
        }
    }

    let end_index = match bound {
        RangeBound::Exclusive => index,
        RangeBound::Inclusive => index + 1,
    };
    if end_index <= start_index {
        return Err(SpliceError::InvalidRange(
            "the range does not contain any node".to_string(),
        ));
    }

    Ok(SiblingRange {
        parent,
        indices: start_index..end_index,
        following: tree.children(parent).get(end_index).copied(),
    })
}

/// Removes a validated range and returns the removed nodes.
pub(crate) fn remove(tree: &mut Tree, range: &SiblingRange) -> Vec<NodeId> {
    remove_children(tree, range.parent, range.indices.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeclarationPolicy;
    use crate::fragment::parse_fragment;
    use crate::namespace::NamespaceScope;
    use crate::splicer::splice;
    use rstest::rstest;

    /// `<root><foo><bar/><baz/></foo><next>child<tmp/></next>final</root>`
    fn sample() -> (Tree, NodeId) {
        let mut tree = Tree::default();
        let nodes = parse_fragment(
            "<root><foo><bar/><baz/></foo><next>child<tmp/></next>final</root>",
            &NamespaceScope::new(),
            DeclarationPolicy::Reject,
        )
        .unwrap();
        let document = tree.root();
        let root = splice(&mut tree, SplicePoint::AppendChild(document), &nodes).unwrap()[0];
        (tree, root)
    }

    #[rstest]
    #[case(RangeBound::Exclusive, 1, 0..1)]
    #[case(RangeBound::Exclusive, 2, 0..2)]
    #[case(RangeBound::Inclusive, 0, 0..1)]
    #[case(RangeBound::Inclusive, 2, 0..3)]
    fn forward_sibling_ranges(
        #[case] bound: RangeBound,
        #[case] end_index: usize,
        #[case] expected: Range<usize>,
    ) {
        let (tree, root) = sample();
        let children = tree.children(root);
        let range = validate(&tree, children[0], children[end_index], bound).unwrap();
        assert_eq!(range.parent, root);
        assert_eq!(range.indices, expected);
        assert_eq!(range.following, children.get(expected.end).copied());
    }

    #[test]
    fn empty_exclusive_range_is_invalid() {
        let (tree, root) = sample();
        let foo = tree.children(root)[0];
        let err = validate(&tree, foo, foo, RangeBound::Exclusive).unwrap_err();
        assert!(matches!(err, SpliceError::InvalidRange(_)));
    }

    #[test]
    fn backwards_range_is_invalid() {
        let (tree, root) = sample();
        let children = tree.children(root);
        let err = validate(&tree, children[1], children[0], RangeBound::Exclusive).unwrap_err();
        assert!(matches!(err, SpliceError::InvalidRange(_)));
    }

    #[test]
    fn descendant_end_is_invalid() {
        let (tree, root) = sample();
        let foo = tree.children(root)[0];
        let next = tree.children(root)[1];
        let child = tree.children(next)[0];
        let err = validate(&tree, foo, child, RangeBound::Exclusive).unwrap_err();
        assert!(matches!(err, SpliceError::InvalidRange(_)));
    }

    #[test]
    fn removal_keeps_following_node_in_slot() {
        let (mut tree, root) = sample();
        let children = tree.children(root).to_vec();
        let range = validate(&tree, children[0], children[2], RangeBound::Exclusive).unwrap();
        let removed = remove(&mut tree, &range);
        assert_eq!(removed, children[..2].to_vec());
        assert_eq!(range.vacated_slot(), SplicePoint::Before(children[2]));
        assert_eq!(tree.outline(root), r#"root("final")"#);
    }

    #[test]
    fn range_to_last_child_appends_on_replace() {
        let (tree, root) = sample();
        let children = tree.children(root);
        let range = validate(&tree, children[1], children[2], RangeBound::Inclusive).unwrap();
        assert_eq!(range.following, None);
        assert_eq!(range.vacated_slot(), SplicePoint::AppendChild(root));
    }
}
