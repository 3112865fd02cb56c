//! Resolution of security contexts, object-context statements, and
//! constraint expressions (pass MISC3).

use crate::ctx::ResolveCtx;
use crate::mls::resolve_levelrange_spec;
use crate::name::{resolve_name, resolve_ref_flavored, Resolution};
use crate::rules::resolve_classperms_spec;
use secil_base::{CompileError, ErrorKind, Result};
use secil_tree::{
    ArgValue, ConsExpr, ConsKey, ConsOperand, ContextData, Database, Flavor, NodeId, Payload, Ref,
    Spec, SymKind,
};
use std::net::IpAddr;

fn mismatch(db: &Database, node: NodeId, message: impl Into<String>) -> CompileError {
    CompileError::new(
        ErrorKind::TypeMismatch,
        db.tree.node(node).location,
        message.into(),
    )
}

/// Resolves a context literal: user, role, type, and optional range.
pub fn resolve_context_data(
    db: &Database,
    ctx: &ResolveCtx,
    node: NodeId,
    data: &mut ContextData,
) -> Result<()> {
    resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut data.user,
        SymKind::Users,
        &[Flavor::User],
        "a user",
    )?;
    resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut data.role,
        SymKind::Roles,
        &[Flavor::Role],
        "a role",
    )?;
    resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut data.ty,
        SymKind::Types,
        &[Flavor::Type, Flavor::TypeAlias],
        "a type or type alias",
    )?;
    if let Some(range) = &mut data.range {
        resolve_levelrange_spec(db, ctx, node, range)?;
    }
    Ok(())
}

/// Resolves a named-or-inline context position.
pub fn resolve_context_spec(
    db: &Database,
    ctx: &ResolveCtx,
    node: NodeId,
    spec: &mut Spec<ContextData>,
) -> Result<()> {
    match spec {
        Spec::Inline(data) => resolve_context_data(db, ctx, node, data),
        Spec::Named(r) => {
            resolve_ref_flavored(
                &db.tree,
                ctx,
                node,
                r,
                SymKind::Contexts,
                &[Flavor::Context],
                "a context",
            )?;
            Ok(())
        }
    }
}

fn resolve_ip_spec(
    db: &Database,
    ctx: &ResolveCtx,
    node: NodeId,
    spec: &mut Spec<IpAddr>,
) -> Result<IpAddr> {
    match spec {
        Spec::Inline(addr) => Ok(*addr),
        Spec::Named(r) => {
            if let Ref::Name(name) = r {
                if let Resolution::Literal(value) =
                    resolve_name(&db.tree, ctx, node, name, SymKind::IpAddrs, false)?
                {
                    let addr = match value {
                        ArgValue::IpAddr(addr) => addr,
                        _ => return Err(mismatch(db, node, "argument is not an ip address")),
                    };
                    *spec = Spec::Inline(addr);
                    return Ok(addr);
                }
            }
            let datum = resolve_ref_flavored(
                &db.tree,
                ctx,
                node,
                r,
                SymKind::IpAddrs,
                &[Flavor::IpAddr],
                "an ip address",
            )?;
            let addr_node = db.tree.datum(datum).primary();
            match &db.tree.node(addr_node).payload {
                Payload::IpAddr { addr } => Ok(*addr),
                _ => unreachable!("ipaddr datum has an ipaddr payload"),
            }
        }
    }
}

/// Generic handler for the statements that carry exactly one context:
/// portcon, genfscon, pirqcon, iomemcon, ioportcon, pcidevicecon, fsuse,
/// and filecon (whose context is optional).
pub fn resolve_single_context(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let mut spec = match &db.tree.node(node).payload {
        Payload::PortCon { context, .. }
        | Payload::GenfsCon { context, .. }
        | Payload::PirqCon { context, .. }
        | Payload::IomemCon { context, .. }
        | Payload::IoportCon { context, .. }
        | Payload::PciDeviceCon { context, .. }
        | Payload::FsUse { context, .. } => Some(context.clone()),
        Payload::FileCon { context, .. } => context.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    if let Some(spec) = &mut spec {
        resolve_context_spec(db, ctx, node, spec)?;
    }
    match &mut db.tree.node_mut(node).payload {
        Payload::PortCon { context, .. }
        | Payload::GenfsCon { context, .. }
        | Payload::PirqCon { context, .. }
        | Payload::IomemCon { context, .. }
        | Payload::IoportCon { context, .. }
        | Payload::PciDeviceCon { context, .. }
        | Payload::FsUse { context, .. } => *context = spec.expect("context present"),
        Payload::FileCon { context, .. } => *context = spec,
        _ => unreachable!(),
    }
    Ok(())
}

/// MISC3: netifcon carries an interface context and a packet context.
pub fn resolve_netifcon(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut if_ctx, mut packet_ctx) = match &db.tree.node(node).payload {
        Payload::NetifCon {
            if_context,
            packet_context,
            ..
        } => (if_context.clone(), packet_context.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_context_spec(db, ctx, node, &mut if_ctx)?;
    resolve_context_spec(db, ctx, node, &mut packet_ctx)?;
    if let Payload::NetifCon {
        if_context,
        packet_context,
        ..
    } = &mut db.tree.node_mut(node).payload
    {
        *if_context = if_ctx;
        *packet_context = packet_ctx;
    }
    Ok(())
}

/// MISC3: nodecon. The address and mask must agree in IP family.
pub fn resolve_nodecon(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut addr, mut mask, mut context) = match &db.tree.node(node).payload {
        Payload::NodeCon {
            addr,
            mask,
            context,
        } => (addr.clone(), mask.clone(), context.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    let addr_value = resolve_ip_spec(db, ctx, node, &mut addr)?;
    let mask_value = resolve_ip_spec(db, ctx, node, &mut mask)?;
    resolve_context_spec(db, ctx, node, &mut context)?;

    if addr_value.is_ipv4() != mask_value.is_ipv4() {
        return Err(CompileError::new(
            ErrorKind::IpFamilyMismatch,
            db.tree.node(node).location,
            "nodecon address and mask are not in the same family",
        ));
    }

    if let Payload::NodeCon {
        addr: a,
        mask: m,
        context: c,
    } = &mut db.tree.node_mut(node).payload
    {
        *a = addr;
        *m = mask;
        *c = context;
    }
    Ok(())
}

/// MISC3: a named `context` declaration.
pub fn resolve_context(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let mut data = match &db.tree.node(node).payload {
        Payload::Context { data } => data.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_context_data(db, ctx, node, &mut data)?;
    if let Payload::Context { data: slot } = &mut db.tree.node_mut(node).payload {
        *slot = data;
    }
    Ok(())
}

/// MISC3: sidcontext attaches a context to a sid.
pub fn resolve_sidcontext(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut sid, mut context) = match &db.tree.node(node).payload {
        Payload::SidContext { sid, context } => (sid.clone(), context.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    let sid_datum = resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut sid,
        SymKind::Sids,
        &[Flavor::Sid],
        "a sid",
    )?;
    resolve_context_spec(db, ctx, node, &mut context)?;

    if let Payload::SidContext { sid: s, context: c } = &mut db.tree.node_mut(node).payload {
        *s = sid;
        *c = context.clone();
    }
    let location = db.tree.node(node).location;
    let sid_node = db.tree.datum(sid_datum).primary();
    if let Payload::Sid { context: slot } = &mut db.tree.node_mut(sid_node).payload {
        if slot.is_some() {
            return Err(CompileError::new(
                ErrorKind::DuplicateDeclaration,
                location,
                "sids cannot be associated with more than one context",
            ));
        }
        *slot = Some(context);
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════
// Constraints
// ═══════════════════════════════════════════════════════════════════

fn resolve_cons_expr(
    db: &Database,
    ctx: &ResolveCtx,
    node: NodeId,
    expr: &mut ConsExpr,
) -> Result<()> {
    match expr {
        ConsExpr::Not(inner) => resolve_cons_expr(db, ctx, node, inner),
        ConsExpr::And(a, b) | ConsExpr::Or(a, b) => {
            resolve_cons_expr(db, ctx, node, a)?;
            resolve_cons_expr(db, ctx, node, b)
        }
        ConsExpr::Cmp { left, right, .. } => {
            if let ConsOperand::Name(r) = right {
                let (kind, allowed, what): (_, &[Flavor], _) = match left {
                    ConsKey::U1 | ConsKey::U2 | ConsKey::U3 => {
                        (SymKind::Users, &[Flavor::User], "a user")
                    }
                    ConsKey::R1 | ConsKey::R2 | ConsKey::R3 => {
                        (SymKind::Roles, &[Flavor::Role, Flavor::RoleAttribute], "a role")
                    }
                    ConsKey::T1 | ConsKey::T2 | ConsKey::T3 => (
                        SymKind::Types,
                        &[Flavor::Type, Flavor::TypeAlias, Flavor::TypeAttribute],
                        "a type",
                    ),
                    _ => {
                        return Err(CompileError::new(
                            ErrorKind::ConstraintMalformed,
                            db.tree.node(node).location,
                            "level operands cannot be compared against names",
                        ))
                    }
                };
                resolve_ref_flavored(&db.tree, ctx, node, r, kind, allowed, what)?;
            }
            Ok(())
        }
    }
}

/// MISC3: constrain / mlsconstrain.
pub fn resolve_constrain(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut classperms, mut expr) = match &db.tree.node(node).payload {
        Payload::Constrain {
            classperms, expr, ..
        } => (classperms.clone(), expr.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_classperms_spec(&db.tree, ctx, node, &mut classperms)?;
    resolve_cons_expr(db, ctx, node, &mut expr)?;
    if let Payload::Constrain {
        classperms: c,
        expr: e,
        ..
    } = &mut db.tree.node_mut(node).payload
    {
        *c = classperms;
        *e = expr;
    }
    Ok(())
}

/// MISC3: validatetrans / mlsvalidatetrans.
pub fn resolve_validatetrans(db: &mut Database, ctx: &ResolveCtx, node: NodeId) -> Result<()> {
    let (mut class, mut expr) = match &db.tree.node(node).payload {
        Payload::ValidateTrans { class, expr, .. } => (class.clone(), expr.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    resolve_ref_flavored(
        &db.tree,
        ctx,
        node,
        &mut class,
        SymKind::Classes,
        &[Flavor::Class],
        "a class",
    )?;
    resolve_cons_expr(db, ctx, node, &mut expr)?;
    if let Payload::ValidateTrans {
        class: c, expr: e, ..
    } = &mut db.tree.node_mut(node).payload
    {
        *c = class;
        *e = expr;
    }
    Ok(())
}
