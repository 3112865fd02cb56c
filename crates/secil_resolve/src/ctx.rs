//! Per-pass traversal state.

use crate::order::OrderMerger;
use crate::Pass;
use secil_tree::NodeId;

/// State threaded through one resolver pass.
///
/// The call and optional stacks are maintained by the walker's
/// descend/ascend hooks; `changed` records that an optional was disabled
/// and the pass sequence must restart at CALL1.
#[derive(Debug)]
pub struct ResolveCtx {
    pub pass: Pass,
    pub changed: bool,
    /// Call nodes enclosing the current position, innermost last.
    pub callstack: Vec<NodeId>,
    /// Optional nodes enclosing the current position, innermost last.
    pub optstack: Vec<NodeId>,
    /// The macro whose body is being walked, if any.
    pub macro_node: Option<NodeId>,
    /// Category adjacency hints collected during MISC1.
    pub cat_order: OrderMerger,
    /// Sensitivity dominance hints collected during MISC1.
    pub sens_order: OrderMerger,
}

impl ResolveCtx {
    pub fn new(pass: Pass) -> Self {
        ResolveCtx {
            pass,
            changed: false,
            callstack: Vec::new(),
            optstack: Vec::new(),
            macro_node: None,
            cat_order: OrderMerger::new(),
            sens_order: OrderMerger::new(),
        }
    }
}
