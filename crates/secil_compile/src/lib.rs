//! # secil-compile
//!
//! The compilation pipeline: a parsed CIL tree goes in, a policy database
//! comes out.
//!
//! ```text
//! parse tree ──▶ resolve (11 passes) ──▶ resolved AST ──▶ lower (3 passes) ──▶ PolicyDb
//! ```
//!
//! The whole pipeline is one sequential computation over one owned tree
//! and one owned database; every allocation is scoped to the call, so a
//! failure at any step releases everything built so far.

pub mod compile;

pub use compile::compile;
pub use secil_base::{CompileError, ErrorKind, Location, Result};
pub use secil_policydb::{CompileOptions, PolicyDb, TargetPlatform};
pub use secil_tree::{Database, Tree};
