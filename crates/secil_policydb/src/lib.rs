//! # secil-policydb
//!
//! The policy database and the lowering that produces it.
//!
//! [`lower`] walks a resolved [`Database`](secil_tree::Database) in three
//! ordered passes and returns a [`PolicyDb`]: numbered symbol tables, the
//! access-vector tables, conditional nodes, relation records, per-class
//! constraints, object contexts, and the global bitmaps. Neverallow rules
//! are enforced during insertion via the [`NeverallowIndex`].
//!
//! Iteration everywhere follows insertion or declaration order, so two
//! compilations of the same input produce structurally identical output.

pub mod avtab;
pub mod cond;
pub mod constraint;
pub mod context;
pub mod lower;
pub mod neverallow;
pub mod options;
pub mod pdb;
pub mod sort;

pub use avtab::{Avtab, AvtabEntry, AvtabKey, AvtabKind};
pub use cond::{CondNode, CondToken};
pub use constraint::{ConsAttr, ConsNode, Constraint};
pub use context::{MlsLevel, MlsRange, PdbContext};
pub use lower::{lower, LowerMaps};
pub use neverallow::{NeverallowIndex, NeverallowRecord, NeverallowTuple};
pub use options::{CompileOptions, TargetPlatform};
pub use pdb::*;
