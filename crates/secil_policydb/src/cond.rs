//! Conditional (booleanif) nodes.
//!
//! Each node carries the postfix boolean expression and the positions of
//! the avtab entries its true and false branches contribute to the
//! conditional access-vector table. The runtime toggles those entries as
//! boolean values change, which is why branch entries are inserted without
//! duplicate merging.

/// One token of a conditional expression, postfix order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondToken {
    /// A boolean, by value.
    Bool(u32),
    Not,
    And,
    Or,
    Xor,
    Eq,
    Neq,
}

/// One conditional node.
#[derive(Debug, Clone, Default)]
pub struct CondNode {
    /// Postfix expression over boolean values.
    pub expr: Vec<CondToken>,
    /// Positions into the conditional avtab enabled when the expression
    /// is true.
    pub true_list: Vec<usize>,
    /// Positions enabled when it is false.
    pub false_list: Vec<usize>,
}
