//! # secil-tree
//!
//! The CIL abstract syntax tree and its supporting infrastructure:
//!
//! - [`Tree`] — index-arena AST with builder methods for the parser
//! - [`Payload`] — exhaustive per-flavor node data
//! - [`Datum`] — identity records for declared entities
//! - [`SymbolTable`] — per-scope, per-kind name tables
//! - [`walk`] — depth-first traversal with descend/ascend hooks
//! - [`copy_children`] — deep subtree copying with substitution
//! - [`Database`] — the tree plus the merged category and dominance orders
//!
//! The resolver and the policy-database lowering are built entirely on
//! this crate.

pub mod copy;
pub mod flavor;
pub mod node;
pub mod payload;
pub mod symtab;
pub mod walk;

pub use copy::{copy_children, Subst};
pub use flavor::{Flavor, SymKind, SYM_KIND_COUNT};
pub use node::{Datum, DatumId, DatumState, Node, NodeId, Scope, ScopeId, Tree};
pub use payload::*;
pub use symtab::SymbolTable;
pub use walk::{walk, TreeView, VisitOutcome, Visitor};

/// The compilation database: the AST plus the global orders the resolver
/// computes and the lowering consumes.
#[derive(Debug, Default)]
pub struct Database {
    /// The abstract syntax tree, including every scope's symbol tables.
    pub tree: Tree,
    /// The merged total order of categories (pass MISC1).
    pub catorder: Vec<DatumId>,
    /// The merged sensitivity dominance order (pass MISC1).
    pub dominance: Vec<DatumId>,
}

impl Database {
    /// Wraps a parsed tree with empty orders.
    pub fn new(tree: Tree) -> Self {
        Database {
            tree,
            catorder: Vec::new(),
            dominance: Vec::new(),
        }
    }
}
