//! Resolution of rules and relationship statements (pass MISC3, plus the
//! class/type attachments of MISC2).
//!
//! Every handler follows the same shape: clone the reference fields out of
//! the payload, resolve them against the tree, write the resolved fields
//! back, then apply any attachment side effect (a class gaining its
//! common, an attribute gaining a member expression, a user gaining its
//! default level). Attachment targets are reset at MISC1 so a restarted
//! resolution never sees stale state.

use crate::ctx::ResolveCtx;
use crate::mls::{resolve_level_spec, resolve_levelrange_spec};
use crate::name::{resolve_name, resolve_ref, resolve_ref_flavored, unresolved, Resolution};
use secil_base::{CompileError, ErrorKind, Location, Result};
use secil_tree::{
    ArgValue, AvTarget, BoolToken, ClassPermSetData, Database, DatumId, Flavor, NodeId, Payload,
    Ref, SetToken, Spec, SymKind, Tree,
};

fn mismatch(tree: &Tree, node: NodeId, message: impl Into<String>) -> CompileError {
    CompileError::new(ErrorKind::TypeMismatch, tree.node(node).location, message.into())
}

fn rebind(tree: &Tree, node: NodeId, message: impl Into<String>) -> CompileError {
    CompileError::new(
        ErrorKind::DuplicateDeclaration,
        tree.node(node).location,
        message.into(),
    )
}

const TYPE_LIKE: &[Flavor] = &[Flavor::Type, Flavor::TypeAttribute, Flavor::TypeAlias];
const TYPE_OR_ALIAS: &[Flavor] = &[Flavor::Type, Flavor::TypeAlias];

// ═══════════════════════════════════════════════════════════════════
// Class permissions
// ═══════════════════════════════════════════════════════════════════

/// Resolves a class permission set literal: the class and each permission
/// name, falling back to the attached common for ordinary classes.
pub fn resolve_classperms_data(
    tree: &Tree,
    ctx: &ResolveCtx,
    node: NodeId,
    data: &mut ClassPermSetData,
) -> Result<()> {
    let class = resolve_ref_flavored(
        tree,
        ctx,
        node,
        &mut data.class,
        SymKind::Classes,
        &[Flavor::Class, Flavor::MapClass],
        "a class or classmap",
    )?;
    let class_node = tree.datum(class).primary();

    data.perms.clear();
    for name in &data.perm_names {
        let perm = match &tree.node(class_node).payload {
            Payload::Class { perms, .. } => perms.lookup(name),
            Payload::MapClass { perms } => perms.lookup(name),
            _ => unreachable!("class datum has a class payload"),
        };
        match perm.or_else(|| common_perm_lookup(tree, class_node, name)) {
            Some(p) => data.perms.push(p),
            None => return Err(unresolved(name, tree.node(node).location)),
        }
    }
    Ok(())
}

fn common_perm_lookup(tree: &Tree, class_node: NodeId, name: &str) -> Option<DatumId> {
    if let Payload::Class {
        common: Some(common),
        ..
    } = &tree.node(class_node).payload
    {
        let common_node = tree.datum(*common).primary();
        if let Payload::Common { perms } = &tree.node(common_node).payload {
            return perms.lookup(name);
        }
    }
    None
}

/// Resolves a named-or-inline class permission set position.
pub fn resolve_classperms_spec(
    tree: &Tree,
    ctx: &ResolveCtx,
    node: NodeId,
    spec: &mut Spec<ClassPermSetData>,
) -> Result<()> {
    match spec {
        Spec::Inline(data) => resolve_classperms_data(tree, ctx, node, data),
        Spec::Named(r) => {
            if let Ref::Name(name) = r {
                if let Resolution::Literal(value) =
                    resolve_name(tree, ctx, node, name, SymKind::ClassPermSets, false)?
                {
                    let mut data = match value {
                        ArgValue::ClassPermSet(data) => data,
                        _ => {
                            return Err(mismatch(tree, node, "argument is not a classpermissionset"))
                        }
                    };
                    resolve_classperms_data(tree, ctx, node, &mut data)?;
                    *spec = Spec::Inline(data);
                    return Ok(());
                }
            }
            resolve_ref_flavored(
                tree,
                ctx,
                node,
                r,
                SymKind::ClassPermSets,
                &[Flavor::ClassPermSet],
                "a classpermissionset",
            )?;
            Ok(())
        }
    }
}

/// MISC3: a named `classpermissionset` declaration.
pub fn resolve_classpermset(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let mut data = match &db.tree.node(node).payload {
        Payload::ClassPermSet { data } => data.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_classperms_data(&db.tree, ctx, node, &mut data)?;
    if let Payload::ClassPermSet { data: slot } = &mut db.tree.node_mut(node).payload {
        *slot = data;
    }
    Ok(())
}

/// MISC2: attach a common to a class.
pub fn resolve_classcommon(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut class, mut common) = match &db.tree.node(node).payload {
        Payload::ClassCommon { class, common } => (class.clone(), common.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    let class_datum = resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut class,
        SymKind::Classes,
        &[Flavor::Class],
        "a class",
    )?;
    let common_datum = resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut common,
        SymKind::Commons,
        &[Flavor::Common],
        "a common",
    )?;

    if let Payload::ClassCommon { class: c, common: m } = &mut db.tree.node_mut(node).payload {
        *c = class;
        *m = common;
    }
    let class_node = db.tree.datum(class_datum).primary();
    if let Payload::Class { common: slot, .. } = &mut db.tree.node_mut(class_node).payload {
        if slot.is_some() {
            return Err(rebind(
                &db.tree,
                node,
                "class cannot be associated with more than one common",
            ));
        }
        *slot = Some(common_datum);
    }
    Ok(())
}

/// MISC3: attach class permission sets to a classmap permission.
pub fn resolve_classmapping(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut map_class, map_perm, mut sets) = match &db.tree.node(node).payload {
        Payload::ClassMapping {
            map_class,
            map_perm,
            classpermsets,
        } => (map_class.clone(), map_perm.clone(), classpermsets.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    let map_datum = resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut map_class,
        SymKind::Classes,
        &[Flavor::MapClass],
        "a classmap",
    )?;
    let map_node = db.tree.datum(map_datum).primary();
    let perm_datum = match &db.tree.node(map_node).payload {
        Payload::MapClass { perms } => perms
            .lookup(&map_perm)
            .ok_or_else(|| unresolved(&map_perm, db.tree.node(node).location))?,
        _ => unreachable!("classmap datum has a classmap payload"),
    };
    for set in &mut sets {
        resolve_classperms_spec(&db.tree, ctx, node, set)?;
    }

    if let Payload::ClassMapping {
        map_class: mc,
        classpermsets: cps,
        ..
    } = &mut db.tree.node_mut(node).payload
    {
        *mc = map_class;
        *cps = sets.clone();
    }
    let perm_node = db.tree.datum(perm_datum).primary();
    if let Payload::MapPerm { classperms } = &mut db.tree.node_mut(perm_node).payload {
        classperms.extend(sets);
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════
// Access-vector and type rules
// ═══════════════════════════════════════════════════════════════════

/// MISC3: an allow/auditallow/dontaudit/neverallow rule.
pub fn resolve_avrule(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut src, mut tgt, mut classperms) = match &db.tree.node(node).payload {
        Payload::AvRule {
            src,
            tgt,
            classperms,
            ..
        } => (src.clone(), tgt.clone(), classperms.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut src,
        SymKind::Types,
        TYPE_LIKE,
        "a type, type alias, or type attribute",
    )?;
    if let AvTarget::Ref(r) = &mut tgt {
        resolve_ref_flavored(
            &db.tree,
            ctx,
            node,
            r,
            SymKind::Types,
            TYPE_LIKE,
            "a type, type alias, or type attribute",
        )?;
    }
    resolve_classperms_spec(&db.tree, ctx, node, &mut classperms)?;

    if let Payload::AvRule {
        src: s,
        tgt: t,
        classperms: c,
        ..
    } = &mut db.tree.node_mut(node).payload
    {
        *s = src;
        *t = tgt;
        *c = classperms;
    }
    Ok(())
}

/// MISC3: a typetransition/typechange/typemember rule.
pub fn resolve_type_rule(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut src, mut tgt, mut obj, mut result) = match &db.tree.node(node).payload {
        Payload::TypeRule {
            src,
            tgt,
            obj,
            result,
            ..
        } => (src.clone(), tgt.clone(), obj.clone(), result.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_ref_flavored(&db.tree, ctx, node, &mut src, SymKind::Types, TYPE_LIKE, "a type")?;
    resolve_ref_flavored(&db.tree, ctx, node, &mut tgt, SymKind::Types, TYPE_LIKE, "a type")?;
    resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut obj,
        SymKind::Classes,
        &[Flavor::Class],
        "a class",
    )?;
    resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut result,
        SymKind::Types,
        TYPE_OR_ALIAS,
        "a type or type alias",
    )?;

    if let Payload::TypeRule {
        src: s,
        tgt: t,
        obj: o,
        result: r,
        ..
    } = &mut db.tree.node_mut(node).payload
    {
        *s = src;
        *t = tgt;
        *o = obj;
        *r = result;
    }
    Ok(())
}

/// MISC3: a filename transition.
pub fn resolve_nametypetransition(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut src, mut exec, mut proc, mut dest) = match &db.tree.node(node).payload {
        Payload::NameTypeTransition {
            src,
            exec,
            proc,
            dest,
            ..
        } => (src.clone(), exec.clone(), proc.clone(), dest.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_ref_flavored(&db.tree, ctx, node, &mut src, SymKind::Types, TYPE_LIKE, "a type")?;
    resolve_ref_flavored(&db.tree, ctx, node, &mut exec, SymKind::Types, TYPE_LIKE, "a type")?;
    resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut proc,
        SymKind::Classes,
        &[Flavor::Class],
        "a class",
    )?;
    resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut dest,
        SymKind::Types,
        TYPE_OR_ALIAS,
        "a type or type alias",
    )?;

    if let Payload::NameTypeTransition {
        src: s,
        exec: e,
        proc: p,
        dest: d,
        ..
    } = &mut db.tree.node_mut(node).payload
    {
        *s = src;
        *e = exec;
        *p = proc;
        *d = dest;
    }
    Ok(())
}

/// MISC3: a range transition.
pub fn resolve_rangetransition(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut src, mut exec, mut obj, mut range) = match &db.tree.node(node).payload {
        Payload::RangeTransition {
            src,
            exec,
            obj,
            range,
        } => (src.clone(), exec.clone(), obj.clone(), range.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_ref_flavored(&db.tree, ctx, node, &mut src, SymKind::Types, TYPE_LIKE, "a type")?;
    resolve_ref_flavored(&db.tree, ctx, node, &mut exec, SymKind::Types, TYPE_LIKE, "a type")?;
    resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut obj,
        SymKind::Classes,
        &[Flavor::Class],
        "a class",
    )?;
    resolve_levelrange_spec(db, ctx, node, &mut range)?;

    if let Payload::RangeTransition {
        src: s,
        exec: e,
        obj: o,
        range: r,
    } = &mut db.tree.node_mut(node).payload
    {
        *s = src;
        *e = exec;
        *o = obj;
        *r = range;
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════
// Types, aliases, attributes, bounds
// ═══════════════════════════════════════════════════════════════════

/// MISC2: resolve a typealias to its immediate target.
pub fn resolve_typealias(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let mut target = match &db.tree.node(node).payload {
        Payload::TypeAlias { target, .. } => target.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut target,
        SymKind::Types,
        TYPE_OR_ALIAS,
        "a type or type alias",
    )?;
    if let Payload::TypeAlias { target: slot, .. } = &mut db.tree.node_mut(node).payload {
        *slot = target;
    }
    Ok(())
}

/// Follows an alias chain to the concrete type, detecting cycles with
/// Brent's tortoise-free variant (step counter with doubling limit).
pub fn chase_type(tree: &Tree, start: DatumId, location: Location) -> Result<DatumId> {
    let mut current = start;
    let mut checkpoint = start;
    let mut steps = 0usize;
    let mut limit = 2usize;

    loop {
        if tree.datum_flavor(current) == Flavor::Type {
            return Ok(current);
        }
        let alias_node = tree.datum(current).primary();
        current = match &tree.node(alias_node).payload {
            Payload::TypeAlias { target, .. } => target
                .datum()
                .ok_or_else(|| unresolved(&tree.datum(current).name, location))?,
            _ => {
                return Err(CompileError::new(
                    ErrorKind::TypeMismatch,
                    location,
                    "alias chain reaches a non-type",
                ))
            }
        };
        if current == checkpoint {
            return Err(CompileError::new(
                ErrorKind::RecursiveAlias,
                location,
                format!("circular typealias involving {}", tree.datum(current).name),
            ));
        }
        steps += 1;
        if steps == limit {
            steps = 0;
            limit *= 2;
            checkpoint = current;
        }
    }
}

/// MISC3: collapse the alias chain into the alias's concrete type.
pub fn resolve_typealias_chain(db: &mut Database, node: NodeId) -> Result<()> {
    let location = db.tree.node(node).location;
    let datum = db.tree.node(node).datum.expect("typealias declares a datum");
    let ty = chase_type(&db.tree, datum, location)?;
    if let Payload::TypeAlias { ty: slot, .. } = &mut db.tree.node_mut(node).payload {
        *slot = Some(ty);
    }
    Ok(())
}

/// MISC3: append a member expression to a type attribute.
pub fn resolve_typeattributeset(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut attr, mut expr) = match &db.tree.node(node).payload {
        Payload::TypeAttributeSet { attr, expr } => (attr.clone(), expr.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    let attr_datum = resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut attr,
        SymKind::Types,
        &[Flavor::TypeAttribute],
        "a type attribute",
    )?;
    for token in &mut expr.tokens {
        if let SetToken::Ref(r) = token {
            resolve_ref_flavored(&db.tree, ctx, node, r, SymKind::Types, TYPE_LIKE, "a type")?;
        }
    }

    if let Payload::TypeAttributeSet { attr: a, expr: e } = &mut db.tree.node_mut(node).payload {
        *a = attr;
        *e = expr.clone();
    }
    let attr_node = db.tree.datum(attr_datum).primary();
    if let Payload::TypeAttribute { exprs } = &mut db.tree.node_mut(attr_node).payload {
        exprs.push(expr);
    }
    Ok(())
}

/// MISC3: append a member expression to a role attribute.
pub fn resolve_roleattributeset(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut attr, mut expr) = match &db.tree.node(node).payload {
        Payload::RoleAttributeSet { attr, expr } => (attr.clone(), expr.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    let attr_datum = resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut attr,
        SymKind::Roles,
        &[Flavor::RoleAttribute],
        "a role attribute",
    )?;
    for token in &mut expr.tokens {
        if let SetToken::Ref(r) = token {
            resolve_ref_flavored(
                &db.tree,
                ctx,
                node,
                r,
                SymKind::Roles,
                &[Flavor::Role, Flavor::RoleAttribute],
                "a role",
            )?;
        }
    }

    if let Payload::RoleAttributeSet { attr: a, expr: e } = &mut db.tree.node_mut(node).payload {
        *a = attr;
        *e = expr.clone();
    }
    let attr_node = db.tree.datum(attr_datum).primary();
    if let Payload::RoleAttribute { exprs } = &mut db.tree.node_mut(attr_node).payload {
        exprs.push(expr);
    }
    Ok(())
}

/// MISC3: typebounds. The bounded side is collapsed through aliases so the
/// bound lands on the concrete type.
pub fn resolve_typebounds(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut ty, mut bounds) = match &db.tree.node(node).payload {
        Payload::TypeBounds { ty, bounds } => (ty.clone(), bounds.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    let location = db.tree.node(node).location;
    let ty_datum = resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut ty,
        SymKind::Types,
        TYPE_OR_ALIAS,
        "a type or type alias",
    )?;
    let bounds_datum = resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut bounds,
        SymKind::Types,
        TYPE_OR_ALIAS,
        "a type or type alias",
    )?;
    let ty_datum = chase_type(&db.tree, ty_datum, location)?;

    if let Payload::TypeBounds { ty: t, bounds: b } = &mut db.tree.node_mut(node).payload {
        *t = ty;
        *b = bounds;
    }
    let ty_node = db.tree.datum(ty_datum).primary();
    if let Payload::Type { bounds: slot } = &mut db.tree.node_mut(ty_node).payload {
        if slot.is_some() {
            return Err(rebind(&db.tree, node, "type cannot bind more than one type"));
        }
        *slot = Some(bounds_datum);
    }
    Ok(())
}

/// MISC3: typepermissive.
pub fn resolve_typepermissive(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let mut ty = match &db.tree.node(node).payload {
        Payload::TypePermissive { ty } => ty.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut ty,
        SymKind::Types,
        TYPE_OR_ALIAS,
        "a type or type alias",
    )?;
    if let Payload::TypePermissive { ty: slot } = &mut db.tree.node_mut(node).payload {
        *slot = ty;
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════
// Roles and users
// ═══════════════════════════════════════════════════════════════════

/// MISC3: roletype.
pub fn resolve_roletype(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut role, mut ty) = match &db.tree.node(node).payload {
        Payload::RoleType { role, ty } => (role.clone(), ty.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut role,
        SymKind::Roles,
        &[Flavor::Role, Flavor::RoleAttribute],
        "a role or role attribute",
    )?;
    resolve_ref_flavored(&db.tree, ctx, node, &mut ty, SymKind::Types, TYPE_LIKE, "a type")?;
    if let Payload::RoleType { role: r, ty: t } = &mut db.tree.node_mut(node).payload {
        *r = role;
        *t = ty;
    }
    Ok(())
}

/// MISC3: roletransition.
pub fn resolve_roletransition(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut src, mut tgt, mut obj, mut result) = match &db.tree.node(node).payload {
        Payload::RoleTransition {
            src,
            tgt,
            obj,
            result,
        } => (src.clone(), tgt.clone(), obj.clone(), result.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_ref_flavored(&db.tree, ctx, node, &mut src, SymKind::Roles, &[Flavor::Role], "a role")?;
    resolve_ref_flavored(&db.tree, ctx, node, &mut tgt, SymKind::Types, TYPE_LIKE, "a type")?;
    resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut obj,
        SymKind::Classes,
        &[Flavor::Class],
        "a class",
    )?;
    resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut result,
        SymKind::Roles,
        &[Flavor::Role],
        "a role",
    )?;
    if let Payload::RoleTransition {
        src: s,
        tgt: t,
        obj: o,
        result: r,
    } = &mut db.tree.node_mut(node).payload
    {
        *s = src;
        *t = tgt;
        *o = obj;
        *r = result;
    }
    Ok(())
}

/// MISC3: roleallow.
pub fn resolve_roleallow(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut src, mut tgt) = match &db.tree.node(node).payload {
        Payload::RoleAllow { src, tgt } => (src.clone(), tgt.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_ref_flavored(&db.tree, ctx, node, &mut src, SymKind::Roles, &[Flavor::Role], "a role")?;
    resolve_ref_flavored(&db.tree, ctx, node, &mut tgt, SymKind::Roles, &[Flavor::Role], "a role")?;
    if let Payload::RoleAllow { src: s, tgt: t } = &mut db.tree.node_mut(node).payload {
        *s = src;
        *t = tgt;
    }
    Ok(())
}

/// MISC3: rolebounds.
pub fn resolve_rolebounds(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut role, mut bounds) = match &db.tree.node(node).payload {
        Payload::RoleBounds { role, bounds } => (role.clone(), bounds.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    let role_datum = resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut role,
        SymKind::Roles,
        &[Flavor::Role],
        "a role",
    )?;
    let bounds_datum = resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut bounds,
        SymKind::Roles,
        &[Flavor::Role],
        "a role",
    )?;
    if let Payload::RoleBounds { role: r, bounds: b } = &mut db.tree.node_mut(node).payload {
        *r = role;
        *b = bounds;
    }
    let role_node = db.tree.datum(role_datum).primary();
    if let Payload::Role { bounds: slot } = &mut db.tree.node_mut(role_node).payload {
        if slot.is_some() {
            return Err(rebind(&db.tree, node, "role cannot bind more than one role"));
        }
        *slot = Some(bounds_datum);
    }
    Ok(())
}

/// MISC3: userrole.
pub fn resolve_userrole(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut user, mut role) = match &db.tree.node(node).payload {
        Payload::UserRole { user, role } => (user.clone(), role.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_ref_flavored(&db.tree, ctx, node, &mut user, SymKind::Users, &[Flavor::User], "a user")?;
    resolve_ref_flavored(&db.tree, ctx, node, &mut role, SymKind::Roles, &[Flavor::Role], "a role")?;
    if let Payload::UserRole { user: u, role: r } = &mut db.tree.node_mut(node).payload {
        *u = user;
        *r = role;
    }
    Ok(())
}

/// MISC3: userlevel attaches the user's default level.
pub fn resolve_userlevel(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut user, mut level) = match &db.tree.node(node).payload {
        Payload::UserLevel { user, level } => (user.clone(), level.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    let user_datum = resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut user,
        SymKind::Users,
        &[Flavor::User],
        "a user",
    )?;
    resolve_level_spec(db, ctx, node, &mut level)?;
    if let Payload::UserLevel { user: u, level: l } = &mut db.tree.node_mut(node).payload {
        *u = user;
        *l = level.clone();
    }
    let user_node = db.tree.datum(user_datum).primary();
    if let Payload::User { dftlevel, .. } = &mut db.tree.node_mut(user_node).payload {
        *dftlevel = Some(level);
    }
    Ok(())
}

/// MISC3: userrange attaches the user's range.
pub fn resolve_userrange(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut user, mut range) = match &db.tree.node(node).payload {
        Payload::UserRange { user, range } => (user.clone(), range.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    let user_datum = resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut user,
        SymKind::Users,
        &[Flavor::User],
        "a user",
    )?;
    resolve_levelrange_spec(db, ctx, node, &mut range)?;
    if let Payload::UserRange { user: u, range: r } = &mut db.tree.node_mut(node).payload {
        *u = user;
        *r = range.clone();
    }
    let user_node = db.tree.datum(user_datum).primary();
    if let Payload::User { range: slot, .. } = &mut db.tree.node_mut(user_node).payload {
        *slot = Some(range);
    }
    Ok(())
}

/// MISC3: userbounds.
pub fn resolve_userbounds(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut user, mut bounds) = match &db.tree.node(node).payload {
        Payload::UserBounds { user, bounds } => (user.clone(), bounds.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    let user_datum = resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut user,
        SymKind::Users,
        &[Flavor::User],
        "a user",
    )?;
    let bounds_datum = resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut bounds,
        SymKind::Users,
        &[Flavor::User],
        "a user",
    )?;
    if let Payload::UserBounds { user: u, bounds: b } = &mut db.tree.node_mut(node).payload {
        *u = user;
        *b = bounds;
    }
    let user_node = db.tree.datum(user_datum).primary();
    if let Payload::User { bounds: slot, .. } = &mut db.tree.node_mut(user_node).payload {
        if slot.is_some() {
            return Err(rebind(&db.tree, node, "user cannot bind more than one user"));
        }
        *slot = Some(bounds_datum);
    }
    Ok(())
}

/// MISC3: userprefix.
pub fn resolve_userprefix(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let mut user = match &db.tree.node(node).payload {
        Payload::UserPrefix { user, .. } => user.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_ref_flavored(&db.tree, ctx, node, &mut user, SymKind::Users, &[Flavor::User], "a user")?;
    if let Payload::UserPrefix { user: u, .. } = &mut db.tree.node_mut(node).payload {
        *u = user;
    }
    Ok(())
}

/// MISC3: selinuxuser / selinuxuserdefault.
pub fn resolve_selinuxuser(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut user, mut range) = match &db.tree.node(node).payload {
        Payload::SelinuxUser { user, range, .. }
        | Payload::SelinuxUserDefault { user, range } => (user.clone(), range.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_ref_flavored(&db.tree, ctx, node, &mut user, SymKind::Users, &[Flavor::User], "a user")?;
    if let Some(r) = &mut range {
        resolve_levelrange_spec(db, ctx, node, r)?;
    }
    match &mut db.tree.node_mut(node).payload {
        Payload::SelinuxUser { user: u, range: r, .. }
        | Payload::SelinuxUserDefault { user: u, range: r } => {
            *u = user;
            *r = range;
        }
        _ => unreachable!(),
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════
// Conditionals
// ═══════════════════════════════════════════════════════════════════

/// MISC1: resolve a booleanif expression over declared booleans.
pub fn resolve_boolif(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let mut expr = match &db.tree.node(node).payload {
        Payload::BooleanIf { expr } => expr.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    for token in &mut expr.tokens {
        if let BoolToken::Ref(r) = token {
            resolve_ref_flavored(
                &db.tree,
                ctx,
                node,
                r,
                SymKind::Bools,
                &[Flavor::Bool],
                "a boolean",
            )?;
        }
    }
    if let Payload::BooleanIf { expr: slot } = &mut db.tree.node_mut(node).payload {
        *slot = expr;
    }
    Ok(())
}
