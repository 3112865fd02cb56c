//! Tree-restructuring passes: tunableif folding (TIF), `in` splicing (IN),
//! block inheritance (BLKIN), block abstraction (BLKABS), and macro-call
//! expansion (MACRO/CALL1/CALL2).
//!
//! These passes run before any cross-reference resolution and are the only
//! places the tree's shape changes. Each relies on the walker re-reading
//! child lists, so content spliced in here is traversed in the same pass.

use crate::ctx::ResolveCtx;
use crate::name::{resolve_name, resolve_ref_flavored, Resolution};
use secil_base::{CompileError, ErrorKind, Result};
use secil_tree::{
    copy_children, Arg, ArgValue, BoolExpr, BoolOp, BoolToken, CallArg, CondBranch, Database,
    DatumId, DatumState, Flavor, NodeId, ParamKind, Payload, Ref, Subst, SymKind, Tree,
};

fn malformed(tree: &Tree, node: NodeId, message: impl Into<String>) -> CompileError {
    CompileError::new(
        ErrorKind::ParseInputMalformed,
        tree.node(node).location,
        message.into(),
    )
}

// ═══════════════════════════════════════════════════════════════════
// TIF
// ═══════════════════════════════════════════════════════════════════

/// Evaluates a resolved postfix expression over tunable values.
///
/// The expression is consumed with an explicit result stack, exactly how
/// the emitted conditional expressions are evaluated at load time.
fn evaluate_tunable_expr(tree: &Tree, node: NodeId, expr: &BoolExpr) -> Result<bool> {
    let mut stack: Vec<bool> = Vec::new();
    for token in &expr.tokens {
        match token {
            BoolToken::Ref(r) => {
                let datum = r
                    .datum()
                    .ok_or_else(|| malformed(tree, node, "unresolved tunable in expression"))?;
                let primary = tree.datum(datum).primary();
                match &tree.node(primary).payload {
                    Payload::Tunable { value } => stack.push(*value),
                    _ => unreachable!("tunable reference resolved to a tunable"),
                }
            }
            BoolToken::Op(BoolOp::Not) => {
                let value = stack
                    .pop()
                    .ok_or_else(|| malformed(tree, node, "not enough operands for NOT"))?;
                stack.push(!value);
            }
            BoolToken::Op(op) => {
                let rhs = stack.pop();
                let lhs = stack.pop();
                let (lhs, rhs) = match (lhs, rhs) {
                    (Some(l), Some(r)) => (l, r),
                    _ => return Err(malformed(tree, node, "not enough operands for operation")),
                };
                stack.push(match op {
                    BoolOp::And => lhs && rhs,
                    BoolOp::Or => lhs || rhs,
                    BoolOp::Xor => lhs ^ rhs,
                    BoolOp::Eq => lhs == rhs,
                    BoolOp::Neq => lhs != rhs,
                    BoolOp::Not => unreachable!("handled above"),
                });
            }
        }
    }
    if stack.len() != 1 {
        return Err(malformed(tree, node, "malformed tunable expression"));
    }
    Ok(stack[0])
}

/// TIF: evaluate a tunableif and splice the selected branch in its place.
pub fn resolve_tunif(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let mut expr = match &db.tree.node(node).payload {
        Payload::TunableIf { expr } => expr.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    for token in &mut expr.tokens {
        if let BoolToken::Ref(r) = token {
            resolve_ref_flavored(
                &db.tree,
                ctx,
                node,
                r,
                SymKind::Tunables,
                &[Flavor::Tunable],
                "a tunable",
            )?;
        }
    }
    let result = evaluate_tunable_expr(&db.tree, node, &expr)?;
    if let Payload::TunableIf { expr: slot } = &mut db.tree.node_mut(node).payload {
        *slot = expr;
    }

    let wanted = if result {
        CondBranch::True
    } else {
        CondBranch::False
    };
    let branch = db.tree.node(node).children.iter().copied().find(|&c| {
        matches!(
            db.tree.node(c).payload,
            Payload::CondBlock { branch } if branch == wanted
        )
    });

    let parent = db
        .tree
        .node(node)
        .parent
        .expect("tunableif is never the root");
    let copies = match branch {
        Some(branch) => {
            let copies = copy_children(&mut db.tree, branch, parent, &Subst::new())?;
            db.tree.detach_last_children(parent, copies.len())
        }
        None => Vec::new(),
    };
    db.tree.splice_children(parent, node, copies);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════
// IN
// ═══════════════════════════════════════════════════════════════════

/// IN: move an `in` container's statements into the named block.
pub fn resolve_in(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let mut block = match &db.tree.node(node).payload {
        Payload::In { block } => block.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    let target = resolve_in_target(db, ctx, node, &mut block)?;
    if let Payload::In { block: slot } = &mut db.tree.node_mut(node).payload {
        *slot = block;
    }

    let target_node = db.tree.datum(target).primary();
    copy_children(&mut db.tree, node, target_node, &Subst::new())?;

    // The originals are dead; detach them and disable their declarations
    // so stale symbol-table entries never resolve.
    for child in db.tree.take_children(node) {
        disable_subtree(&mut db.tree, child);
    }
    Ok(())
}

/// `in` is the one statement allowed to name a macro as its container.
fn resolve_in_target(
    db: &Database,
    ctx: &ResolveCtx,
    node: NodeId,
    r: &mut Ref,
) -> Result<DatumId> {
    let datum = match r {
        Ref::Resolved(d) => *d,
        Ref::Name(name) => {
            match resolve_name(&db.tree, ctx, node, name, SymKind::Blocks, true)? {
                Resolution::Datum(d) => d,
                Resolution::Literal(_) => {
                    return Err(malformed(&db.tree, node, "in-statement target is not a block"))
                }
            }
        }
    };
    let flavor = db.tree.datum_flavor(datum);
    if !matches!(flavor, Flavor::Block | Flavor::Macro) {
        return Err(CompileError::new(
            ErrorKind::TypeMismatch,
            db.tree.node(node).location,
            "in-statement target must be a block or macro",
        ));
    }
    *r = Ref::Resolved(datum);
    Ok(datum)
}

fn disable_subtree(tree: &mut Tree, node: NodeId) {
    if let Some(datum) = tree.node(node).datum {
        tree.datum_mut(datum).state = DatumState::Disabled;
    }
    for child in tree.node(node).children.clone() {
        disable_subtree(tree, child);
    }
}

// ═══════════════════════════════════════════════════════════════════
// BLKIN / BLKABS
// ═══════════════════════════════════════════════════════════════════

/// BLKIN: copy the named block's body under the blockinherit site.
pub fn resolve_blockinherit(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut block, copied) = match &db.tree.node(node).payload {
        Payload::BlockInherit { block, copied } => (block.clone(), *copied),
        _ => unreachable!("dispatched on flavor"),
    };
    let datum = resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut block,
        SymKind::Blocks,
        &[Flavor::Block],
        "a block",
    )?;
    if let Payload::BlockInherit { block: slot, copied: c } = &mut db.tree.node_mut(node).payload {
        *slot = block;
        *c = true;
    }
    if copied {
        return Ok(());
    }

    let block_node = db.tree.datum(datum).primary();
    // A block inheriting an enclosing block would copy its own
    // blockinherit statement forever.
    let mut ancestor = Some(node);
    while let Some(a) = ancestor {
        if a == block_node {
            return Err(CompileError::new(
                ErrorKind::RecursiveCall,
                db.tree.node(node).location,
                "block inherits one of its own ancestors",
            ));
        }
        ancestor = db.tree.node(a).parent;
    }

    copy_children(&mut db.tree, block_node, node, &Subst::new())?;
    Ok(())
}

/// BLKABS: mark the named block abstract.
pub fn resolve_blockabstract(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let mut block = match &db.tree.node(node).payload {
        Payload::BlockAbstract { block } => block.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    let datum = resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut block,
        SymKind::Blocks,
        &[Flavor::Block],
        "a block",
    )?;
    if let Payload::BlockAbstract { block: slot } = &mut db.tree.node_mut(node).payload {
        *slot = block;
    }
    let block_node = db.tree.datum(datum).primary();
    if let Payload::Block { is_abstract } = &mut db.tree.node_mut(block_node).payload {
        *is_abstract = true;
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════
// CALL1 / CALL2
// ═══════════════════════════════════════════════════════════════════

/// CALL1 (and MACRO, for calls nested in macro bodies): resolve the macro,
/// type the arguments, and expand the body under the call site.
pub fn resolve_call1(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut macro_ref, args_in, copied) = match &db.tree.node(node).payload {
        Payload::Call {
            macro_ref,
            args_in,
            copied,
            ..
        } => (macro_ref.clone(), args_in.clone(), *copied),
        _ => unreachable!("dispatched on flavor"),
    };
    let macro_datum = resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut macro_ref,
        SymKind::Blocks,
        &[Flavor::Macro],
        "a macro",
    )?;
    let macro_node = db.tree.datum(macro_datum).primary();
    let params = match &db.tree.node(macro_node).payload {
        Payload::Macro { params } => params.clone(),
        _ => unreachable!("macro datum has a macro payload"),
    };

    if args_in.len() < params.len() {
        return Err(malformed(&db.tree, node, "missing arguments"));
    }
    if args_in.len() > params.len() {
        return Err(malformed(&db.tree, node, "unexpected arguments"));
    }

    let mut args = Vec::with_capacity(params.len());
    let mut subst = Subst::new();
    for (param, arg_in) in params.iter().zip(args_in) {
        let value = type_argument(&db.tree, node, param.kind, arg_in)?;
        if let ArgValue::Ref(Ref::Name(name)) = &value {
            subst.insert(param.name.clone(), name.clone());
        }
        args.push(Arg {
            param: param.name.clone(),
            kind: param.kind,
            value,
        });
    }

    if let Payload::Call {
        macro_ref: m,
        args: slot,
        copied: c,
        ..
    } = &mut db.tree.node_mut(node).payload
    {
        *m = macro_ref;
        *slot = args;
        *c = true;
    }

    if !copied {
        copy_children(&mut db.tree, macro_node, node, &subst)?;
    }
    Ok(())
}

/// Checks one call argument against its parameter's kind.
fn type_argument(tree: &Tree, node: NodeId, kind: ParamKind, arg: CallArg) -> Result<ArgValue> {
    let value = match (kind, arg) {
        (_, CallArg::Name(name)) => ArgValue::Ref(Ref::Name(name)),
        (ParamKind::CatSet, CallArg::CatSet(data)) => ArgValue::CatSet(data),
        (ParamKind::Level, CallArg::Level(data)) => ArgValue::Level(data),
        (ParamKind::LevelRange, CallArg::LevelRange(data)) => ArgValue::LevelRange(data),
        (ParamKind::IpAddr, CallArg::IpAddr(addr)) => ArgValue::IpAddr(addr),
        (ParamKind::ClassPermSet, CallArg::ClassPermSet(data)) => ArgValue::ClassPermSet(data),
        _ => {
            return Err(CompileError::new(
                ErrorKind::TypeMismatch,
                tree.node(node).location,
                "literal argument does not match the parameter kind",
            ))
        }
    };
    Ok(value)
}

/// CALL2: resolve every name argument against the call site.
///
/// An argument naming an enclosing call's literal-valued parameter takes
/// the literal over, so compound literals flow through nested calls.
pub fn resolve_call2(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let mut args = match &db.tree.node(node).payload {
        Payload::Call { args, .. } => args.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    for arg in &mut args {
        let name = match &arg.value {
            ArgValue::Ref(Ref::Name(name)) => name.clone(),
            ArgValue::Ref(Ref::Resolved(_)) => {
                if let ArgValue::Ref(r) = &mut arg.value {
                    crate::name::resolve_ref(&db.tree, ctx, node, r, arg.kind.sym_kind())?;
                }
                continue;
            }
            _ => continue,
        };
        match resolve_name(&db.tree, ctx, node, &name, arg.kind.sym_kind(), false)? {
            Resolution::Datum(datum) => arg.value = ArgValue::Ref(Ref::Resolved(datum)),
            Resolution::Literal(value) => arg.value = value,
        }
    }
    if let Payload::Call { args: slot, .. } = &mut db.tree.node_mut(node).payload {
        *slot = args;
    }
    Ok(())
}
