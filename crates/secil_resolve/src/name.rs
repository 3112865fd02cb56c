//! Name lookup.
//!
//! Given a reference string and the node it appears at, [`resolve_name`]
//! finds the declaring datum:
//!
//! - An unqualified name inside a macro expansion checks the call's
//!   arguments first (macro parameters), then the scopes enclosing the use
//!   site outward, then the scopes enclosing the macro definition, then the
//!   global scope.
//! - A qualified name (`a.b.c`) resolves its first segment as a block
//!   walking outward, descends through nested blocks, and looks the final
//!   segment up in the target scope's kind table. A relative qualified
//!   name that misses is retried as absolute.
//! - A name starting with `.` is absolute from the root.
//!
//! Lookups skip datums that are not `Enabled`, so statements referring
//! into a disabled optional miss rather than resolve to dead declarations.

use crate::ctx::ResolveCtx;
use crate::Pass;
use secil_base::{CompileError, ErrorKind, Location, Result};
use secil_tree::{
    ArgValue, DatumId, DatumState, Flavor, NodeId, Payload, Ref, SymKind, Tree,
};

/// What a name resolved to.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A declared datum.
    Datum(DatumId),
    /// An inline literal passed as a macro argument, cloned for the use
    /// site to resolve in place.
    Literal(ArgValue),
}

/// Raises the miss error for `name` at `location`.
pub fn unresolved(name: &str, location: Location) -> CompileError {
    CompileError::new(
        ErrorKind::UnresolvedName,
        location,
        format!("failed to resolve {}", name),
    )
}

/// Resolves `name` of symbol kind `kind` as seen from `node`.
///
/// `allow_macro_target` relaxes the qualified-name rule that intermediate
/// segments must be blocks; only `in` statements pass it.
pub fn resolve_name(
    tree: &Tree,
    ctx: &ResolveCtx,
    node: NodeId,
    name: &str,
    kind: SymKind,
    allow_macro_target: bool,
) -> Result<Resolution> {
    let location = tree.node(node).location;

    if let Some(rest) = name.strip_prefix('.') {
        return resolve_qualified(tree, ctx, tree.root(), rest, kind, allow_macro_target)
            .ok_or_else(|| unresolved(name, location))
            .map(Resolution::Datum);
    }

    if name.contains('.') {
        // Relative qualified; falls back to an absolute interpretation.
        if let Some(datum) =
            resolve_qualified_relative(tree, ctx, node, name, kind, allow_macro_target)
        {
            return Ok(Resolution::Datum(datum));
        }
        return resolve_qualified(tree, ctx, tree.root(), name, kind, allow_macro_target)
            .ok_or_else(|| unresolved(name, location))
            .map(Resolution::Datum);
    }

    if let Some(call) = ctx.callstack.last().copied() {
        // Macro parameters shadow everything but take their value from the
        // call site.
        if let Some(resolution) = lookup_call_args(tree, call, name, kind) {
            return resolution.map_err(|_| unresolved(name, location));
        }
        if let Some(datum) = chain_lookup(tree, node, name, kind) {
            return Ok(Resolution::Datum(datum));
        }
        // The macro definition's own lexical surroundings.
        if let Payload::Call {
            macro_ref: Ref::Resolved(macro_datum),
            ..
        } = &tree.node(call).payload
        {
            let macro_node = tree.datum(*macro_datum).primary();
            if let Some(parent) = tree.node(macro_node).parent {
                if let Some(datum) = chain_lookup(tree, parent, name, kind) {
                    return Ok(Resolution::Datum(datum));
                }
            }
        }
        return Err(unresolved(name, location));
    }

    chain_lookup(tree, node, name, kind)
        .map(Resolution::Datum)
        .ok_or_else(|| unresolved(name, location))
}

/// Looks `name` up in every scope enclosing `node`, innermost first.
fn chain_lookup(tree: &Tree, node: NodeId, name: &str, kind: SymKind) -> Option<DatumId> {
    let mut current = Some(tree.enclosing_scope_node(node));
    while let Some(scope_node) = current {
        let scope = tree.node(scope_node).scope.expect("scope-bearing node");
        if let Some(datum) = enabled(tree, tree.scope(scope).table(kind).lookup(name)) {
            return Some(datum);
        }
        current = tree
            .node(scope_node)
            .parent
            .map(|p| tree.enclosing_scope_node(p));
    }
    None
}

fn enabled(tree: &Tree, datum: Option<DatumId>) -> Option<DatumId> {
    datum.filter(|&d| tree.datum(d).state == DatumState::Enabled)
}

/// Checks the call's argument list for a parameter named `name` whose kind
/// resolves in the `kind` table.
///
/// Returns `None` when no parameter matches; `Some(Err(()))` when a
/// parameter matches but its argument is unusable (not yet resolved).
fn lookup_call_args(
    tree: &Tree,
    call: NodeId,
    name: &str,
    kind: SymKind,
) -> Option<std::result::Result<Resolution, ()>> {
    let args = match &tree.node(call).payload {
        Payload::Call { args, .. } => args,
        _ => return None,
    };
    for arg in args {
        if arg.param != name || arg.kind.sym_kind() != kind {
            continue;
        }
        return Some(match &arg.value {
            ArgValue::Ref(Ref::Resolved(d)) => Ok(Resolution::Datum(*d)),
            ArgValue::Ref(Ref::Name(_)) => Err(()),
            literal => Ok(Resolution::Literal(literal.clone())),
        });
    }
    None
}

fn resolve_qualified_relative(
    tree: &Tree,
    ctx: &ResolveCtx,
    node: NodeId,
    name: &str,
    kind: SymKind,
    allow_macro_target: bool,
) -> Option<DatumId> {
    let first = name.split('.').next()?;
    // The first segment is a block name, found by walking outward.
    let head = chain_lookup(tree, node, first, SymKind::Blocks)?;
    descend(tree, ctx, head, name, kind, allow_macro_target)
}

fn resolve_qualified(
    tree: &Tree,
    ctx: &ResolveCtx,
    root: NodeId,
    name: &str,
    kind: SymKind,
    allow_macro_target: bool,
) -> Option<DatumId> {
    let mut segments = name.split('.');
    let first = segments.next()?;
    let root_scope = tree.node(root).scope.expect("root has the global scope");
    if !name.contains('.') {
        return enabled(tree, tree.scope(root_scope).table(kind).lookup(name));
    }
    let head = enabled(tree, tree.scope(root_scope).table(SymKind::Blocks).lookup(first))?;
    descend(tree, ctx, head, name, kind, allow_macro_target)
}

/// Walks the remaining segments of a qualified name down from `head`.
fn descend(
    tree: &Tree,
    ctx: &ResolveCtx,
    head: DatumId,
    name: &str,
    kind: SymKind,
    allow_macro_target: bool,
) -> Option<DatumId> {
    let segments: Vec<&str> = name.split('.').collect();
    let mut container = head;
    for (i, segment) in segments.iter().enumerate().skip(1) {
        let container_node = tree.datum(container).primary();
        let scope = match &tree.node(container_node).payload {
            Payload::Block { is_abstract } => {
                if *is_abstract && ctx.pass > Pass::BlkAbs {
                    return None;
                }
                tree.node(container_node).scope?
            }
            Payload::Macro { .. } if allow_macro_target => tree.node(container_node).scope?,
            _ => return None,
        };
        let table_kind = if i + 1 == segments.len() { kind } else { SymKind::Blocks };
        container = enabled(tree, tree.scope(scope).table(table_kind).lookup(segment))?;
    }
    Some(container)
}

/// Resolves a plain reference in place, returning its datum.
///
/// Already-resolved references are re-checked against the datum state so a
/// restarted resolution notices targets that have since been disabled.
pub fn resolve_ref(
    tree: &Tree,
    ctx: &ResolveCtx,
    node: NodeId,
    r: &mut Ref,
    kind: SymKind,
) -> Result<DatumId> {
    let location = tree.node(node).location;
    match r {
        Ref::Resolved(d) => {
            if tree.datum(*d).state == DatumState::Enabled {
                Ok(*d)
            } else {
                Err(unresolved(&tree.datum(*d).name, location))
            }
        }
        Ref::Name(name) => {
            match resolve_name(tree, ctx, node, name, kind, false)? {
                Resolution::Datum(d) => {
                    *r = Ref::Resolved(d);
                    Ok(d)
                }
                Resolution::Literal(_) => Err(CompileError::new(
                    ErrorKind::TypeMismatch,
                    location,
                    format!("{} names an inline literal where a declared name is required", name),
                )),
            }
        }
    }
}

/// Like [`resolve_ref`] but additionally checks the datum's flavor.
pub fn resolve_ref_flavored(
    tree: &Tree,
    ctx: &ResolveCtx,
    node: NodeId,
    r: &mut Ref,
    kind: SymKind,
    allowed: &[Flavor],
    what: &str,
) -> Result<DatumId> {
    let datum = resolve_ref(tree, ctx, node, r, kind)?;
    let flavor = tree.datum_flavor(datum);
    if allowed.contains(&flavor) {
        Ok(datum)
    } else {
        Err(CompileError::new(
            ErrorKind::TypeMismatch,
            tree.node(node).location,
            format!("{} must be {}", tree.datum(datum).name, what),
        ))
    }
}
