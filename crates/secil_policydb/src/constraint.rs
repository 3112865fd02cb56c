//! Constraint expression compilation.
//!
//! A resolved prefix-form constraint tree compiles to a flat postfix node
//! list. Comparison nodes derive their attribute selector from the left
//! keyword (and, for level keywords, the right one); a comparison against
//! a concrete user/role/type becomes a `Names` node carrying the value
//! bitmap instead.

use crate::lower::LowerMaps;
use bitflags::bitflags;
use secil_base::{Bitmap, CompileError, ErrorKind, Location, Result};
use secil_tree::{ConsCmp, ConsExpr, ConsKey, ConsOperand, Tree};

bitflags! {
    /// Attribute selector of a constraint comparison, kernel encoding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConsAttr: u32 {
        const USER   = 1;
        const ROLE   = 2;
        const TYPE   = 4;
        const TARGET = 8;
        const XTARGET = 16;
        const L1L2 = 32;
        const L1H2 = 64;
        const H1L2 = 128;
        const H1H2 = 256;
        const L1H1 = 512;
        const L2H2 = 1024;
    }
}

/// One compiled expression node, postfix order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsNode {
    Not,
    And,
    Or,
    /// Compare two context attributes (e.g. `u1 == u2`, `l1 dom l2`).
    Attr { op: ConsCmp, attr: ConsAttr },
    /// Compare a context attribute against a concrete name set.
    Names {
        op: ConsCmp,
        attr: ConsAttr,
        names: Bitmap,
    },
}

/// A per-class constraint: the permissions it guards and its expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub perm_mask: u32,
    pub expr: Vec<ConsNode>,
}

fn malformed(location: Location, message: impl Into<String>) -> CompileError {
    CompileError::new(ErrorKind::ConstraintMalformed, location, message.into())
}

/// Compiles a resolved constraint tree into its postfix node list.
pub fn compile_expr(
    tree: &Tree,
    maps: &LowerMaps,
    expr: &ConsExpr,
    location: Location,
) -> Result<Vec<ConsNode>> {
    let mut nodes = Vec::new();
    emit(tree, maps, expr, location, &mut nodes)?;
    Ok(nodes)
}

fn emit(
    tree: &Tree,
    maps: &LowerMaps,
    expr: &ConsExpr,
    location: Location,
    out: &mut Vec<ConsNode>,
) -> Result<()> {
    match expr {
        ConsExpr::Not(inner) => {
            emit(tree, maps, inner, location, out)?;
            out.push(ConsNode::Not);
        }
        ConsExpr::And(a, b) => {
            emit(tree, maps, a, location, out)?;
            emit(tree, maps, b, location, out)?;
            out.push(ConsNode::And);
        }
        ConsExpr::Or(a, b) => {
            emit(tree, maps, a, location, out)?;
            emit(tree, maps, b, location, out)?;
            out.push(ConsNode::Or);
        }
        ConsExpr::Cmp { op, left, right } => {
            out.push(compile_cmp(tree, maps, *op, *left, right, location)?);
        }
    }
    Ok(())
}

fn compile_cmp(
    tree: &Tree,
    maps: &LowerMaps,
    op: ConsCmp,
    left: ConsKey,
    right: &ConsOperand,
    location: Location,
) -> Result<ConsNode> {
    if let ConsOperand::Name(r) = right {
        // Level keywords never compare against names; the resolver has
        // already rejected that, so the left key is u/r/t here.
        let attr = scalar_attr(left, location)?;
        if !matches!(op, ConsCmp::Eq | ConsCmp::Neq) {
            return Err(malformed(location, "name comparison must use eq or neq"));
        }
        let datum = r
            .datum()
            .ok_or_else(|| malformed(location, "constraint name was never resolved"))?;
        let mut names = Bitmap::new();
        names.set((maps.value(tree, datum)? - 1) as usize);
        return Ok(ConsNode::Names { op, attr, names });
    }

    let right = match right {
        ConsOperand::Key(k) => *k,
        ConsOperand::Name(_) => unreachable!("handled above"),
    };

    use ConsKey::*;
    let attr = match (left, right) {
        (U1, U2) => ConsAttr::USER,
        (U2, U3) => ConsAttr::USER | ConsAttr::TARGET,
        (R1, R2) => ConsAttr::ROLE,
        (R2, R3) => ConsAttr::ROLE | ConsAttr::TARGET,
        (T1, T2) => ConsAttr::TYPE,
        (T2, T3) => ConsAttr::TYPE | ConsAttr::TARGET,
        (L1, L2) => ConsAttr::L1L2,
        (L1, H1) => ConsAttr::L1H1,
        (L1, H2) => ConsAttr::L1H2,
        (L2, H2) => ConsAttr::L2H2,
        (H1, L2) => ConsAttr::H1L2,
        (H1, H2) => ConsAttr::H1H2,
        _ => {
            return Err(malformed(
                location,
                "constraint keywords are not a comparable pair",
            ))
        }
    };

    if matches!(left, L1 | L2 | H1 | H2) {
        if !matches!(op, ConsCmp::Eq | ConsCmp::Neq | ConsCmp::Dom | ConsCmp::DomBy | ConsCmp::Incomp)
        {
            return Err(malformed(location, "invalid level comparison"));
        }
    } else if !matches!(op, ConsCmp::Eq | ConsCmp::Neq) {
        return Err(malformed(
            location,
            "dom, domby, and incomp apply only to levels",
        ));
    }

    Ok(ConsNode::Attr { op, attr })
}

fn scalar_attr(left: ConsKey, location: Location) -> Result<ConsAttr> {
    use ConsKey::*;
    Ok(match left {
        U1 => ConsAttr::USER,
        U2 => ConsAttr::USER | ConsAttr::TARGET,
        U3 => ConsAttr::USER | ConsAttr::XTARGET,
        R1 => ConsAttr::ROLE,
        R2 => ConsAttr::ROLE | ConsAttr::TARGET,
        R3 => ConsAttr::ROLE | ConsAttr::XTARGET,
        T1 => ConsAttr::TYPE,
        T2 => ConsAttr::TYPE | ConsAttr::TARGET,
        T3 => ConsAttr::TYPE | ConsAttr::XTARGET,
        _ => return Err(malformed(location, "level keyword compared against a name")),
    })
}
