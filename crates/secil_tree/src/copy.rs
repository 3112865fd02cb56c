//! Deep subtree copying with identifier substitution.
//!
//! [`copy_children`] clones the body of a block, macro, or condition
//! branch under a new parent. It backs three resolver operations: block
//! inheritance, macro-call expansion, and tunableif branch selection.
//!
//! Copied declarations get fresh datums inserted into the destination
//! scope; copied blocks and macros open fresh scopes. Reference strings
//! whose whole text matches an entry of the substitution map are rewritten
//! (macro parameter → call argument); everything else stays textual and is
//! resolved later, so the copied subtree never points back into its
//! source.

use crate::flavor::Flavor;
use crate::node::{NodeId, Tree};
use crate::payload::{
    Arg, ArgValue, AvTarget, BoolToken, CallArg, CatItem, CatRangeData, CatSetData,
    ClassPermSetData, ConsExpr, ConsOperand, ContextData, LevelData, LevelRangeData, Payload, Ref,
    SetToken, Spec,
};
use crate::symtab::SymbolTable;
use secil_base::Result;
use std::collections::HashMap;

/// Substitution map from macro parameter names to argument names.
pub type Subst = HashMap<String, String>;

/// Deep-copies every child of `src` under `dest`, returning the new
/// top-level nodes in order.
pub fn copy_children(
    tree: &mut Tree,
    src: NodeId,
    dest: NodeId,
    subst: &Subst,
) -> Result<Vec<NodeId>> {
    let children = tree.node(src).children.clone();
    let mut copies = Vec::with_capacity(children.len());
    for child in children {
        copies.push(copy_node(tree, child, dest, subst)?);
    }
    Ok(copies)
}

fn copy_node(tree: &mut Tree, src: NodeId, dest_parent: NodeId, subst: &Subst) -> Result<NodeId> {
    let location = tree.node(src).location;
    let mut payload = tree.node(src).payload.clone();
    reset_copy_state(&mut payload);
    rewrite_payload(&mut payload, subst);

    let flavor = payload.flavor();
    let node = tree.alloc_node(location, payload);
    tree.attach(dest_parent, node);

    if flavor.is_declarative() {
        let name = tree
            .datum(tree.node(src).datum.expect("declarative node has a datum"))
            .name
            .clone();
        let datum = tree.alloc_datum(&name);
        tree.node_mut(node).datum = Some(datum);
        tree.datum_mut(datum).nodes.push(node);

        if matches!(flavor, Flavor::Block | Flavor::Macro) {
            let scope = tree.alloc_scope();
            tree.node_mut(node).scope = Some(scope);
        }

        if let Some(kind) = flavor.sym_kind() {
            let scope = tree.enclosing_scope(dest_parent);
            tree.insert_into_scope(scope, kind, &name, datum, location)?;
        } else {
            tree.insert_perm(dest_parent, &name, datum, location)?;
        }
    }

    let children = tree.node(src).children.clone();
    for child in children {
        copy_node(tree, child, node, subst)?;
    }
    Ok(node)
}

/// Clears state that belongs to the source's resolution, so the copy
/// resolves from scratch: owned permission tables are refilled by the
/// copied perm children, attachment fields by the copied statements.
fn reset_copy_state(payload: &mut Payload) {
    match payload {
        Payload::Class { common, perms } => {
            *common = None;
            *perms = SymbolTable::new();
        }
        Payload::MapClass { perms } | Payload::Common { perms } => {
            *perms = SymbolTable::new();
        }
        Payload::MapPerm { classperms } => classperms.clear(),
        Payload::Sid { context } => *context = None,
        Payload::User {
            dftlevel,
            range,
            bounds,
        } => {
            *dftlevel = None;
            *range = None;
            *bounds = None;
        }
        Payload::Role { bounds } | Payload::Type { bounds } => *bounds = None,
        Payload::RoleAttribute { exprs } | Payload::TypeAttribute { exprs } => exprs.clear(),
        Payload::TypeAlias { ty, .. } => *ty = None,
        Payload::Sens { cats } => cats.clear(),
        _ => {}
    }
}

// ═══════════════════════════════════════════════════════════════════
// Reference rewriting
// ═══════════════════════════════════════════════════════════════════

fn rewrite_name(name: &mut String, subst: &Subst) {
    if let Some(replacement) = subst.get(name.as_str()) {
        *name = replacement.clone();
    }
}

fn rewrite_ref(r: &mut Ref, subst: &Subst) {
    if let Ref::Name(name) = r {
        rewrite_name(name, subst);
    }
}

fn rewrite_target(t: &mut AvTarget, subst: &Subst) {
    if let AvTarget::Ref(r) = t {
        rewrite_ref(r, subst);
    }
}

fn rewrite_catset(data: &mut CatSetData, subst: &Subst) {
    for item in &mut data.items {
        match item {
            CatItem::Name(r) => rewrite_ref(r, subst),
            CatItem::Range(range) => rewrite_catrange(range, subst),
        }
    }
}

fn rewrite_catrange(data: &mut CatRangeData, subst: &Subst) {
    rewrite_ref(&mut data.low, subst);
    rewrite_ref(&mut data.high, subst);
}

fn rewrite_level(data: &mut LevelData, subst: &Subst) {
    rewrite_ref(&mut data.sens, subst);
    if let Some(cats) = &mut data.cats {
        rewrite_spec(cats, subst, rewrite_catset);
    }
}

fn rewrite_levelrange(data: &mut LevelRangeData, subst: &Subst) {
    rewrite_spec(&mut data.low, subst, rewrite_level);
    rewrite_spec(&mut data.high, subst, rewrite_level);
}

fn rewrite_context(data: &mut ContextData, subst: &Subst) {
    rewrite_ref(&mut data.user, subst);
    rewrite_ref(&mut data.role, subst);
    rewrite_ref(&mut data.ty, subst);
    if let Some(range) = &mut data.range {
        rewrite_spec(range, subst, rewrite_levelrange);
    }
}

fn rewrite_cps(data: &mut ClassPermSetData, subst: &Subst) {
    rewrite_ref(&mut data.class, subst);
}

fn rewrite_spec<T>(spec: &mut Spec<T>, subst: &Subst, inner: fn(&mut T, &Subst)) {
    match spec {
        Spec::Named(r) => rewrite_ref(r, subst),
        Spec::Inline(data) => inner(data, subst),
    }
}

fn rewrite_cons(expr: &mut ConsExpr, subst: &Subst) {
    match expr {
        ConsExpr::Cmp { right, .. } => {
            if let ConsOperand::Name(r) = right {
                rewrite_ref(r, subst);
            }
        }
        ConsExpr::Not(inner) => rewrite_cons(inner, subst),
        ConsExpr::And(a, b) | ConsExpr::Or(a, b) => {
            rewrite_cons(a, subst);
            rewrite_cons(b, subst);
        }
    }
}

fn rewrite_arg_value(value: &mut ArgValue, subst: &Subst) {
    match value {
        ArgValue::Ref(r) => rewrite_ref(r, subst),
        ArgValue::CatSet(d) => rewrite_catset(d, subst),
        ArgValue::Level(d) => rewrite_level(d, subst),
        ArgValue::LevelRange(d) => rewrite_levelrange(d, subst),
        ArgValue::IpAddr(_) => {}
        ArgValue::ClassPermSet(d) => rewrite_cps(d, subst),
    }
}

fn rewrite_payload(payload: &mut Payload, subst: &Subst) {
    if subst.is_empty() {
        return;
    }
    match payload {
        Payload::Root
        | Payload::Block { .. }
        | Payload::Optional
        | Payload::Macro { .. }
        | Payload::Perm
        | Payload::Common { .. }
        | Payload::MapClass { .. }
        | Payload::Class { .. }
        | Payload::Cat
        | Payload::PolicyCap
        | Payload::Bool { .. }
        | Payload::Tunable { .. }
        | Payload::User { .. }
        | Payload::Role { .. }
        | Payload::Type { .. }
        | Payload::RoleAttribute { .. }
        | Payload::TypeAttribute { .. }
        | Payload::CondBlock { .. } => {}

        Payload::MapPerm { classperms } => {
            for cps in classperms {
                rewrite_spec(cps, subst, rewrite_cps);
            }
        }
        Payload::ClassPermSet { data } => rewrite_cps(data, subst),
        Payload::Sid { context } => {
            if let Some(ctx) = context {
                rewrite_spec(ctx, subst, rewrite_context);
            }
        }
        Payload::TypeAlias { target, .. }
        | Payload::SensAlias { target }
        | Payload::CatAlias { target } => rewrite_ref(target, subst),
        Payload::Sens { cats } => {
            for c in cats {
                rewrite_spec(c, subst, rewrite_catset);
            }
        }
        Payload::CatRange { data } => rewrite_catrange(data, subst),
        Payload::CatSet { data } => rewrite_catset(data, subst),
        Payload::Level { data } => rewrite_level(data, subst),
        Payload::LevelRange { data } => rewrite_levelrange(data, subst),
        Payload::Context { data } => rewrite_context(data, subst),
        Payload::IpAddr { .. } => {}

        Payload::Call {
            macro_ref,
            args_in,
            args,
            ..
        } => {
            rewrite_ref(macro_ref, subst);
            for arg in args_in {
                match arg {
                    CallArg::Name(n) => rewrite_name(n, subst),
                    CallArg::CatSet(d) => rewrite_catset(d, subst),
                    CallArg::Level(d) => rewrite_level(d, subst),
                    CallArg::LevelRange(d) => rewrite_levelrange(d, subst),
                    CallArg::IpAddr(_) => {}
                    CallArg::ClassPermSet(d) => rewrite_cps(d, subst),
                }
            }
            for arg in args {
                rewrite_arg_value(&mut arg.value, subst);
            }
        }
        Payload::BooleanIf { expr } | Payload::TunableIf { expr } => {
            for token in &mut expr.tokens {
                if let BoolToken::Ref(r) = token {
                    rewrite_ref(r, subst);
                }
            }
        }
        Payload::In { block }
        | Payload::BlockInherit { block, .. }
        | Payload::BlockAbstract { block } => rewrite_ref(block, subst),
        Payload::ClassCommon { class, common } => {
            rewrite_ref(class, subst);
            rewrite_ref(common, subst);
        }
        Payload::ClassMapping {
            map_class,
            classpermsets,
            ..
        } => {
            rewrite_ref(map_class, subst);
            for cps in classpermsets {
                rewrite_spec(cps, subst, rewrite_cps);
            }
        }
        Payload::SidContext { sid, context } => {
            rewrite_ref(sid, subst);
            rewrite_spec(context, subst, rewrite_context);
        }
        Payload::CatOrder { order } | Payload::Dominance { order } => {
            for name in order {
                rewrite_name(name, subst);
            }
        }
        Payload::SensCat { sens, cats } => {
            rewrite_ref(sens, subst);
            rewrite_spec(cats, subst, rewrite_catset);
        }
        Payload::AvRule {
            src,
            tgt,
            classperms,
            ..
        } => {
            rewrite_ref(src, subst);
            rewrite_target(tgt, subst);
            rewrite_spec(classperms, subst, rewrite_cps);
        }
        Payload::TypeRule {
            src,
            tgt,
            obj,
            result,
            ..
        } => {
            rewrite_ref(src, subst);
            rewrite_ref(tgt, subst);
            rewrite_ref(obj, subst);
            rewrite_ref(result, subst);
        }
        Payload::TypeAttributeSet { attr, expr } | Payload::RoleAttributeSet { attr, expr } => {
            rewrite_ref(attr, subst);
            for token in &mut expr.tokens {
                if let SetToken::Ref(r) = token {
                    rewrite_ref(r, subst);
                }
            }
        }
        Payload::TypeBounds { ty, bounds } => {
            rewrite_ref(ty, subst);
            rewrite_ref(bounds, subst);
        }
        Payload::TypePermissive { ty } => rewrite_ref(ty, subst),
        Payload::NameTypeTransition {
            src,
            exec,
            proc,
            dest,
            ..
        } => {
            rewrite_ref(src, subst);
            rewrite_ref(exec, subst);
            rewrite_ref(proc, subst);
            rewrite_ref(dest, subst);
        }
        Payload::RangeTransition {
            src,
            exec,
            obj,
            range,
        } => {
            rewrite_ref(src, subst);
            rewrite_ref(exec, subst);
            rewrite_ref(obj, subst);
            rewrite_spec(range, subst, rewrite_levelrange);
        }
        Payload::RoleTransition {
            src,
            tgt,
            obj,
            result,
        } => {
            rewrite_ref(src, subst);
            rewrite_ref(tgt, subst);
            rewrite_ref(obj, subst);
            rewrite_ref(result, subst);
        }
        Payload::RoleAllow { src, tgt } => {
            rewrite_ref(src, subst);
            rewrite_ref(tgt, subst);
        }
        Payload::RoleType { role, ty } => {
            rewrite_ref(role, subst);
            rewrite_ref(ty, subst);
        }
        Payload::RoleBounds { role, bounds } => {
            rewrite_ref(role, subst);
            rewrite_ref(bounds, subst);
        }
        Payload::UserRole { user, role } => {
            rewrite_ref(user, subst);
            rewrite_ref(role, subst);
        }
        Payload::UserLevel { user, level } => {
            rewrite_ref(user, subst);
            rewrite_spec(level, subst, rewrite_level);
        }
        Payload::UserRange { user, range } => {
            rewrite_ref(user, subst);
            rewrite_spec(range, subst, rewrite_levelrange);
        }
        Payload::UserBounds { user, bounds } => {
            rewrite_ref(user, subst);
            rewrite_ref(bounds, subst);
        }
        Payload::UserPrefix { user, .. } => rewrite_ref(user, subst),
        Payload::SelinuxUser { user, range, .. }
        | Payload::SelinuxUserDefault { user, range } => {
            rewrite_ref(user, subst);
            if let Some(r) = range {
                rewrite_spec(r, subst, rewrite_levelrange);
            }
        }
        Payload::FileCon { context, .. } => {
            if let Some(ctx) = context {
                rewrite_spec(ctx, subst, rewrite_context);
            }
        }
        Payload::PortCon { context, .. }
        | Payload::GenfsCon { context, .. }
        | Payload::PirqCon { context, .. }
        | Payload::IomemCon { context, .. }
        | Payload::IoportCon { context, .. }
        | Payload::PciDeviceCon { context, .. }
        | Payload::FsUse { context, .. } => rewrite_spec(context, subst, rewrite_context),
        Payload::NodeCon {
            addr,
            mask,
            context,
        } => {
            if let Spec::Named(r) = addr {
                rewrite_ref(r, subst);
            }
            if let Spec::Named(r) = mask {
                rewrite_ref(r, subst);
            }
            rewrite_spec(context, subst, rewrite_context);
        }
        Payload::NetifCon {
            if_context,
            packet_context,
            ..
        } => {
            rewrite_spec(if_context, subst, rewrite_context);
            rewrite_spec(packet_context, subst, rewrite_context);
        }
        Payload::Constrain {
            classperms, expr, ..
        } => {
            rewrite_spec(classperms, subst, rewrite_cps);
            rewrite_cons(expr, subst);
        }
        Payload::ValidateTrans { class, expr, .. } => {
            rewrite_ref(class, subst);
            rewrite_cons(expr, subst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flavor::SymKind;
    use crate::payload::AvRuleKind;
    use secil_base::Location;

    fn subst(pairs: &[(&str, &str)]) -> Subst {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn copied_declarations_get_fresh_datums_in_the_destination_scope() {
        let mut tree = Tree::new();
        let root = tree.root();
        let src = tree
            .declare(
                root,
                Location::line(1),
                "src",
                Payload::Block { is_abstract: false },
            )
            .unwrap();
        tree.declare(src, Location::line(2), "t", Payload::Type { bounds: None })
            .unwrap();
        let dest = tree
            .declare(
                root,
                Location::line(3),
                "dest",
                Payload::Block { is_abstract: false },
            )
            .unwrap();

        copy_children(&mut tree, src, dest, &Subst::new()).unwrap();

        let dest_scope = tree.node(dest).scope.unwrap();
        let copied = tree.scope(dest_scope).table(SymKind::Types).lookup("t");
        let original_scope = tree.node(src).scope.unwrap();
        let original = tree
            .scope(original_scope)
            .table(SymKind::Types)
            .lookup("t");
        assert!(copied.is_some());
        assert_ne!(copied, original);
    }

    #[test]
    fn substitution_rewrites_whole_reference_names_only() {
        let mut tree = Tree::new();
        let root = tree.root();
        let src = tree
            .declare(
                root,
                Location::line(1),
                "m",
                Payload::Block { is_abstract: false },
            )
            .unwrap();
        tree.append(
            src,
            Location::line(2),
            Payload::AvRule {
                kind: AvRuleKind::Allow,
                src: Ref::name("T"),
                tgt: AvTarget::Ref(Ref::name("T_other")),
                classperms: Spec::Inline(ClassPermSetData::new("file", vec!["read".into()])),
            },
        );

        let copies = copy_children(&mut tree, src, root, &subst(&[("T", "t_a")])).unwrap();
        match &tree.node(copies[0]).payload {
            Payload::AvRule { src, tgt, .. } => {
                assert_eq!(*src, Ref::name("t_a"));
                // "T_other" is not a whole-string match and must not change.
                assert_eq!(*tgt, AvTarget::Ref(Ref::name("T_other")));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn copy_into_scope_with_colliding_name_fails() {
        let mut tree = Tree::new();
        let root = tree.root();
        let src = tree
            .declare(
                root,
                Location::line(1),
                "src",
                Payload::Block { is_abstract: false },
            )
            .unwrap();
        tree.declare(src, Location::line(2), "t", Payload::Type { bounds: None })
            .unwrap();
        // Root already declares "t".
        tree.declare(root, Location::line(3), "t", Payload::Type { bounds: None })
            .unwrap();

        let err = copy_children(&mut tree, src, root, &Subst::new()).unwrap_err();
        assert_eq!(err.kind, secil_base::ErrorKind::DuplicateDeclaration);
    }
}
