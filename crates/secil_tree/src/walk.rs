//! Generic depth-first traversal.
//!
//! [`walk`] visits the children of a node in pre-order, calling the
//! visitor's [`first_child`](Visitor::first_child) hook before descending
//! into a child list and [`last_child`](Visitor::last_child) after leaving
//! it. Those hooks are where the resolver maintains its call and optional
//! stacks.
//!
//! The walk is generic over the state it threads through ([`TreeView`]):
//! the resolver walks a whole database, the lowering walks its own pass
//! state. Two properties matter to both and are guaranteed here:
//!
//! - A visitor may return [`VisitOutcome::SkipChildren`] to prune the
//!   subtree below the visited node.
//! - The child list is re-read after every visit, so a visitor may splice
//!   replacement nodes in place of the visited child (tunableif folding)
//!   or append children to it (macro expansion) and the new nodes are
//!   traversed in the same pass.

use crate::node::{NodeId, Tree};
use secil_base::Result;

/// State a walk can traverse: anything that exposes the tree.
pub trait TreeView {
    fn tree(&self) -> &Tree;
}

impl TreeView for Tree {
    fn tree(&self) -> &Tree {
        self
    }
}

impl TreeView for crate::Database {
    fn tree(&self) -> &Tree {
        &self.tree
    }
}

/// What to do with the subtree below a visited node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitOutcome {
    /// Descend into the node's children.
    Continue,
    /// Prune the subtree rooted at the node.
    SkipChildren,
}

/// Hooks invoked by [`walk`].
pub trait Visitor<S: TreeView> {
    /// Called on every node in pre-order.
    fn visit(&mut self, state: &mut S, node: NodeId) -> Result<VisitOutcome>;

    /// Called before the first child of `parent` is visited.
    fn first_child(&mut self, _state: &mut S, _parent: NodeId) -> Result<()> {
        Ok(())
    }

    /// Called after the last child of `parent` has been visited.
    fn last_child(&mut self, _state: &mut S, _parent: NodeId) -> Result<()> {
        Ok(())
    }
}

/// Walks the subtree below `root` (the root itself is not visited).
pub fn walk<S: TreeView>(state: &mut S, root: NodeId, visitor: &mut dyn Visitor<S>) -> Result<()> {
    walk_children(state, root, visitor)
}

fn walk_children<S: TreeView>(
    state: &mut S,
    parent: NodeId,
    visitor: &mut dyn Visitor<S>,
) -> Result<()> {
    if state.tree().node(parent).children.is_empty() {
        return Ok(());
    }
    visitor.first_child(state, parent)?;

    let mut index = 0;
    loop {
        let child = match state.tree().node(parent).children.get(index) {
            Some(&c) => c,
            None => break,
        };
        let outcome = visitor.visit(state, child)?;
        if outcome == VisitOutcome::Continue {
            walk_children(state, child, visitor)?;
        }
        // Only advance past the child if it is still in place; a splice
        // leaves its replacements at the current index.
        if state.tree().node(parent).children.get(index) == Some(&child) {
            index += 1;
        }
    }

    visitor.last_child(state, parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{Payload, Ref};
    use secil_base::Location;

    struct Recorder {
        visited: Vec<NodeId>,
        skip: Option<NodeId>,
        hooks: Vec<(char, NodeId)>,
    }

    impl Visitor<Tree> for Recorder {
        fn visit(&mut self, _tree: &mut Tree, node: NodeId) -> Result<VisitOutcome> {
            self.visited.push(node);
            if self.skip == Some(node) {
                Ok(VisitOutcome::SkipChildren)
            } else {
                Ok(VisitOutcome::Continue)
            }
        }

        fn first_child(&mut self, _tree: &mut Tree, parent: NodeId) -> Result<()> {
            self.hooks.push(('f', parent));
            Ok(())
        }

        fn last_child(&mut self, _tree: &mut Tree, parent: NodeId) -> Result<()> {
            self.hooks.push(('l', parent));
            Ok(())
        }
    }

    fn statement(tree: &mut Tree, parent: NodeId) -> NodeId {
        tree.append(
            parent,
            Location::line(1),
            Payload::In {
                block: Ref::name("b"),
            },
        )
    }

    #[test]
    fn walk_is_depth_first_preorder() {
        let mut tree = Tree::new();
        let root = tree.root();
        let block = tree
            .declare(
                root,
                Location::line(1),
                "b",
                Payload::Block { is_abstract: false },
            )
            .unwrap();
        let inner = statement(&mut tree, block);
        let after = statement(&mut tree, root);

        let mut rec = Recorder {
            visited: Vec::new(),
            skip: None,
            hooks: Vec::new(),
        };
        walk(&mut tree, root, &mut rec).unwrap();
        assert_eq!(rec.visited, vec![block, inner, after]);
        assert_eq!(
            rec.hooks,
            vec![('f', root), ('f', block), ('l', block), ('l', root)]
        );
    }

    #[test]
    fn skip_children_prunes_the_subtree() {
        let mut tree = Tree::new();
        let root = tree.root();
        let block = tree
            .declare(
                root,
                Location::line(1),
                "b",
                Payload::Block { is_abstract: false },
            )
            .unwrap();
        let inner = statement(&mut tree, block);

        let mut rec = Recorder {
            visited: Vec::new(),
            skip: Some(block),
            hooks: Vec::new(),
        };
        walk(&mut tree, root, &mut rec).unwrap();
        assert_eq!(rec.visited, vec![block]);
        assert!(!rec.visited.contains(&inner));
    }

    struct Splicer {
        target: NodeId,
        visited_after_splice: Vec<NodeId>,
        done: bool,
    }

    impl Visitor<Tree> for Splicer {
        fn visit(&mut self, tree: &mut Tree, node: NodeId) -> Result<VisitOutcome> {
            if node == self.target && !self.done {
                self.done = true;
                let parent = tree.node(node).parent.unwrap();
                let replacement = tree.alloc_node(
                    Location::line(9),
                    Payload::In {
                        block: Ref::name("spliced"),
                    },
                );
                tree.splice_children(parent, node, vec![replacement]);
            } else if self.done {
                self.visited_after_splice.push(node);
            }
            Ok(VisitOutcome::Continue)
        }
    }

    #[test]
    fn spliced_replacements_are_visited_in_the_same_pass() {
        let mut tree = Tree::new();
        let root = tree.root();
        let target = statement(&mut tree, root);
        let tail = statement(&mut tree, root);

        let mut splicer = Splicer {
            target,
            visited_after_splice: Vec::new(),
            done: false,
        };
        walk(&mut tree, root, &mut splicer).unwrap();
        // The replacement lands at the target's index and is visited next,
        // followed by the original tail statement.
        assert_eq!(splicer.visited_after_splice.len(), 2);
        assert_eq!(splicer.visited_after_splice[1], tail);
    }
}
