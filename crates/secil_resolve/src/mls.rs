//! MLS resolution: orders, category sets, levels, and ranges.
//!
//! MISC1 collects `categoryorder` and `dominance` hints into the context's
//! mergers; the driver finishes them into the database after the pass. The
//! MLS pass resolves named category ranges, category sets, and sensitivity
//! aliases; MISC2 attaches sensitivity-category associations; MISC3
//! resolves levels and level ranges wherever they appear.
//!
//! The spec resolvers here are shared with the rule and context resolvers:
//! any level/range/catset position may name a declaration, name a macro
//! parameter bound to an inline literal (which is cloned in and resolved in
//! place), or carry an inline literal of its own.

use crate::ctx::ResolveCtx;
use crate::name::{resolve_name, resolve_ref, resolve_ref_flavored, unresolved, Resolution};
use secil_base::{CompileError, ErrorKind, Result};
use secil_tree::{
    ArgValue, CatItem, CatRangeData, CatSetData, Database, DatumId, Flavor, LevelData,
    LevelRangeData, NodeId, Payload, Ref, Spec, SymKind, Tree,
};

fn mismatch(tree: &Tree, node: NodeId, message: impl Into<String>) -> CompileError {
    CompileError::new(ErrorKind::TypeMismatch, tree.node(node).location, message.into())
}

// ═══════════════════════════════════════════════════════════════════
// Orders (pass MISC1)
// ═══════════════════════════════════════════════════════════════════

/// Resolves one `categoryorder` statement into an adjacency hint.
pub fn resolve_catorder(db: &mut Database, ctx: &mut ResolveCtx, node: NodeId) -> Result<()> {
    let names = match &db.tree.node(node).payload {
        Payload::CatOrder { order } => order.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    let hint = resolve_order_names(&db.tree, ctx, node, &names, SymKind::Cats, Flavor::Cat)?;
    let location = db.tree.node(node).location;
    ctx.cat_order.add_hint(&hint, location)
}

/// Resolves one `dominance` statement into an adjacency hint.
pub fn resolve_dominance(db: &mut Database, ctx: &mut ResolveCtx, node: NodeId) -> Result<()> {
    let names = match &db.tree.node(node).payload {
        Payload::Dominance { order } => order.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    let hint = resolve_order_names(&db.tree, ctx, node, &names, SymKind::Sens, Flavor::Sens)?;
    let location = db.tree.node(node).location;
    ctx.sens_order.add_hint(&hint, location)
}

fn resolve_order_names(
    tree: &Tree,
    ctx: &ResolveCtx,
    node: NodeId,
    names: &[String],
    kind: SymKind,
    want: Flavor,
) -> Result<Vec<DatumId>> {
    let mut hint = Vec::with_capacity(names.len());
    for name in names {
        let datum = match resolve_name(tree, ctx, node, name, kind, false)? {
            Resolution::Datum(d) => d,
            Resolution::Literal(_) => {
                return Err(mismatch(tree, node, format!("{} is not a declared name", name)))
            }
        };
        if tree.datum_flavor(datum) != want {
            return Err(mismatch(
                tree,
                node,
                format!("order statements accept only plain declarations, not {}", name),
            ));
        }
        hint.push(datum);
    }
    Ok(hint)
}

// ═══════════════════════════════════════════════════════════════════
// Shared spec resolvers
// ═══════════════════════════════════════════════════════════════════

/// Resolves a sensitivity reference, following an alias to its target.
pub fn resolve_sens_ref(
    tree: &Tree,
    ctx: &ResolveCtx,
    node: NodeId,
    r: &mut Ref,
) -> Result<DatumId> {
    let datum = resolve_ref_flavored(
        tree,
        ctx,
        node,
        r,
        SymKind::Sens,
        &[Flavor::Sens, Flavor::SensAlias],
        "a sensitivity or sensitivity alias",
    )?;
    if tree.datum_flavor(datum) == Flavor::Sens {
        return Ok(datum);
    }
    let alias_node = tree.datum(datum).primary();
    match &tree.node(alias_node).payload {
        Payload::SensAlias { target } => match target.datum() {
            Some(sens) => {
                *r = Ref::Resolved(sens);
                Ok(sens)
            }
            None => Err(unresolved(&tree.datum(datum).name, tree.node(node).location)),
        },
        _ => unreachable!("alias datum has an alias payload"),
    }
}

/// Resolves the categories of a category set literal.
pub fn resolve_catset_data(
    db: &Database,
    ctx: &ResolveCtx,
    node: NodeId,
    data: &mut CatSetData,
) -> Result<()> {
    for item in &mut data.items {
        match item {
            CatItem::Name(r) => {
                let datum = resolve_ref(&db.tree, ctx, node, r, SymKind::Cats)?;
                let flavor = db.tree.datum_flavor(datum);
                if !matches!(flavor, Flavor::Cat | Flavor::CatAlias | Flavor::CatRange) {
                    return Err(mismatch(
                        &db.tree,
                        node,
                        "category sets may contain only categories, aliases, and ranges",
                    ));
                }
            }
            CatItem::Range(range) => resolve_catrange_data(db, ctx, node, range)?,
        }
    }
    Ok(())
}

/// Resolves a category range and checks the endpoints follow the merged
/// category order.
pub fn resolve_catrange_data(
    db: &Database,
    ctx: &ResolveCtx,
    node: NodeId,
    data: &mut CatRangeData,
) -> Result<()> {
    let low = resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut data.low,
        SymKind::Cats,
        &[Flavor::Cat],
        "a category",
    )?;
    let high = resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut data.high,
        SymKind::Cats,
        &[Flavor::Cat],
        "a category",
    )?;

    let start = db.catorder.iter().position(|&d| d == low);
    let start = match start {
        Some(i) => i,
        None => {
            return Err(CompileError::new(
                ErrorKind::OrderConflict,
                db.tree.node(node).location,
                format!("category {} is not in the category order", db.tree.datum(low).name),
            ))
        }
    };
    if !db.catorder[start..].contains(&high) {
        return Err(CompileError::new(
            ErrorKind::OrderConflict,
            db.tree.node(node).location,
            format!(
                "category range {} .. {} does not follow the category order",
                db.tree.datum(low).name,
                db.tree.datum(high).name
            ),
        ));
    }
    Ok(())
}

/// Resolves a named-or-inline category set position.
///
/// `require_named_set` rejects bare categories in the named case, which is
/// what `sensitivitycategory` demands.
pub fn resolve_catset_spec(
    db: &Database,
    ctx: &ResolveCtx,
    node: NodeId,
    spec: &mut Spec<CatSetData>,
    require_named_set: bool,
) -> Result<()> {
    match spec {
        Spec::Inline(data) => resolve_catset_data(db, ctx, node, data),
        Spec::Named(r) => {
            if let Ref::Name(name) = r {
                if let Resolution::Literal(value) =
                    resolve_name(&db.tree, ctx, node, name, SymKind::Cats, false)?
                {
                    let mut data = match value {
                        ArgValue::CatSet(data) => data,
                        _ => {
                            return Err(mismatch(&db.tree, node, "argument is not a category set"))
                        }
                    };
                    resolve_catset_data(db, ctx, node, &mut data)?;
                    *spec = Spec::Inline(data);
                    return Ok(());
                }
            }
            let datum = resolve_ref(&db.tree, ctx, node, r, SymKind::Cats)?;
            let flavor = db.tree.datum_flavor(datum);
            if require_named_set && flavor != Flavor::CatSet {
                return Err(mismatch(&db.tree, node, "named object is not a category set"));
            }
            if !matches!(flavor, Flavor::CatSet | Flavor::Cat | Flavor::CatAlias | Flavor::CatRange)
            {
                return Err(mismatch(&db.tree, node, "not usable as a category set"));
            }
            Ok(())
        }
    }
}

/// Resolves a level literal: its sensitivity and its categories.
pub fn resolve_level_data(
    db: &Database,
    ctx: &ResolveCtx,
    node: NodeId,
    data: &mut LevelData,
) -> Result<()> {
    resolve_sens_ref(&db.tree, ctx, node, &mut data.sens)?;
    if let Some(cats) = &mut data.cats {
        resolve_catset_spec(db, ctx, node, cats, false)?;
    }
    Ok(())
}

/// Resolves a named-or-inline level position.
pub fn resolve_level_spec(
    db: &Database,
    ctx: &ResolveCtx,
    node: NodeId,
    spec: &mut Spec<LevelData>,
) -> Result<()> {
    match spec {
        Spec::Inline(data) => resolve_level_data(db, ctx, node, data),
        Spec::Named(r) => {
            if let Ref::Name(name) = r {
                if let Resolution::Literal(value) =
                    resolve_name(&db.tree, ctx, node, name, SymKind::Levels, false)?
                {
                    let mut data = match value {
                        ArgValue::Level(data) => data,
                        _ => return Err(mismatch(&db.tree, node, "argument is not a level")),
                    };
                    resolve_level_data(db, ctx, node, &mut data)?;
                    *spec = Spec::Inline(data);
                    return Ok(());
                }
            }
            resolve_ref_flavored(
                &db.tree,
                ctx,
                node,
                r,
                SymKind::Levels,
                &[Flavor::Level],
                "a level",
            )?;
            Ok(())
        }
    }
}

/// Resolves a level range literal: both bounds.
pub fn resolve_levelrange_data(
    db: &Database,
    ctx: &ResolveCtx,
    node: NodeId,
    data: &mut LevelRangeData,
) -> Result<()> {
    resolve_level_spec(db, ctx, node, &mut data.low)?;
    resolve_level_spec(db, ctx, node, &mut data.high)
}

/// Resolves a named-or-inline level range position.
pub fn resolve_levelrange_spec(
    db: &Database,
    ctx: &ResolveCtx,
    node: NodeId,
    spec: &mut Spec<LevelRangeData>,
) -> Result<()> {
    match spec {
        Spec::Inline(data) => resolve_levelrange_data(db, ctx, node, data),
        Spec::Named(r) => {
            if let Ref::Name(name) = r {
                if let Resolution::Literal(value) =
                    resolve_name(&db.tree, ctx, node, name, SymKind::LevelRanges, false)?
                {
                    let mut data = match value {
                        ArgValue::LevelRange(data) => data,
                        _ => return Err(mismatch(&db.tree, node, "argument is not a level range")),
                    };
                    resolve_levelrange_data(db, ctx, node, &mut data)?;
                    *spec = Spec::Inline(data);
                    return Ok(());
                }
            }
            resolve_ref_flavored(
                &db.tree,
                ctx,
                node,
                r,
                SymKind::LevelRanges,
                &[Flavor::LevelRange],
                "a level range",
            )?;
            Ok(())
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Per-statement handlers
// ═══════════════════════════════════════════════════════════════════

/// MLS pass: a named `categoryrange` declaration.
pub fn resolve_catrange(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let mut data = match &db.tree.node(node).payload {
        Payload::CatRange { data } => data.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_catrange_data(db, ctx, node, &mut data)?;
    if let Payload::CatRange { data: slot } = &mut db.tree.node_mut(node).payload {
        *slot = data;
    }
    Ok(())
}

/// MLS pass: a named `categoryset` declaration.
pub fn resolve_catset(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let mut data = match &db.tree.node(node).payload {
        Payload::CatSet { data } => data.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_catset_data(db, ctx, node, &mut data)?;
    if let Payload::CatSet { data: slot } = &mut db.tree.node_mut(node).payload {
        *slot = data;
    }
    Ok(())
}

/// MLS pass: a sensitivity alias.
pub fn resolve_sensalias(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let mut target = match &db.tree.node(node).payload {
        Payload::SensAlias { target } => target.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut target,
        SymKind::Sens,
        &[Flavor::Sens],
        "a sensitivity",
    )?;
    if let Payload::SensAlias { target: slot } = &mut db.tree.node_mut(node).payload {
        *slot = target;
    }
    Ok(())
}

/// MISC3: a category alias.
pub fn resolve_catalias(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let mut target = match &db.tree.node(node).payload {
        Payload::CatAlias { target } => target.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut target,
        SymKind::Cats,
        &[Flavor::Cat],
        "a category",
    )?;
    if let Payload::CatAlias { target: slot } = &mut db.tree.node_mut(node).payload {
        *slot = target;
    }
    Ok(())
}

/// MISC2: a `sensitivitycategory` association.
pub fn resolve_senscat(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut sens, mut cats) = match &db.tree.node(node).payload {
        Payload::SensCat { sens, cats } => (sens.clone(), cats.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    let sens_datum = resolve_sens_ref(&db.tree, ctx, node, &mut sens)?;
    resolve_catset_spec(db, ctx, node, &mut cats, true)?;

    if let Payload::SensCat { sens: s, cats: c } = &mut db.tree.node_mut(node).payload {
        *s = sens;
        *c = cats.clone();
    }
    let sens_node = db.tree.datum(sens_datum).primary();
    if let Payload::Sens { cats: list } = &mut db.tree.node_mut(sens_node).payload {
        list.push(cats);
    }
    Ok(())
}

/// MISC3: a named `level` declaration.
pub fn resolve_level(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let mut data = match &db.tree.node(node).payload {
        Payload::Level { data } => data.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_level_data(db, ctx, node, &mut data)?;
    if let Payload::Level { data: slot } = &mut db.tree.node_mut(node).payload {
        *slot = data;
    }
    Ok(())
}

/// MISC3: a named `levelrange` declaration.
pub fn resolve_levelrange(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let mut data = match &db.tree.node(node).payload {
        Payload::LevelRange { data } => data.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_levelrange_data(db, ctx, node, &mut data)?;
    if let Payload::LevelRange { data: slot } = &mut db.tree.node_mut(node).payload {
        *slot = data;
    }
    Ok(())
}
