//! # secil-resolve
//!
//! Multi-pass symbol resolution for the CIL AST.
//!
//! [`resolve`] runs eleven ordered passes over a [`Database`]: tunableif
//! folding, `in` splicing, block inheritance and abstraction, macro
//! expansion, argument resolution, order merging, MLS resolution, and
//! finally the cross-reference sweep that rewrites every remaining textual
//! name into a datum reference. A resolution failure inside an optional
//! disables that optional and restarts the sequence at CALL1.
//!
//! After `resolve` returns, every reference field of every enabled node
//! points at an enabled datum of the right flavor, and the database holds
//! the merged category and sensitivity orders.

pub mod calls;
pub mod contexts;
pub mod ctx;
pub mod mls;
pub mod name;
pub mod order;
pub mod passes;
pub mod rules;

pub use ctx::ResolveCtx;
pub use order::OrderMerger;
pub use passes::resolve;

use secil_tree::Database;

/// The ordered resolver passes.
///
/// Comparison order is execution order; the abstract-block and disabled-
/// optional skips test against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Pass {
    /// Fold tunableifs into their selected branch.
    Tif,
    /// Splice `in` containers into their named block.
    In,
    /// Execute blockinherit copies.
    BlkIn,
    /// Mark abstract blocks.
    BlkAbs,
    /// Expand calls nested in macro bodies.
    Macro,
    /// Expand calls: resolve the macro, type the arguments, copy the body.
    Call1,
    /// Resolve call arguments at the call site.
    Call2,
    /// Merge orders, reset transient state, resolve booleanif expressions.
    Misc1,
    /// Resolve category ranges, category sets, sensitivity aliases.
    Mls,
    /// Resolve sensitivity categories, class commons, type aliases.
    Misc2,
    /// Resolve every remaining cross-reference.
    Misc3,
}

/// Convenience wrapper: build a database from a tree and resolve it.
pub fn resolve_tree(tree: secil_tree::Tree) -> secil_base::Result<Database> {
    let mut db = Database::new(tree);
    resolve(&mut db)?;
    Ok(db)
}
