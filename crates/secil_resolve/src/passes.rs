//! The resolver driver: eleven ordered passes with a fixpoint restart.
//!
//! Each pass is one full traversal with a per-flavor dispatch. When a name
//! inside an optional fails to resolve, the optional is disabled and the
//! sequence restarts at CALL1 (everything earlier cannot appear inside an
//! optional, so it never needs to re-run). MISC1 doubles as the reset
//! point: it clears per-datum attachment state so a restarted resolution
//! rebuilds it without duplicates, and it rebuilds the category and
//! dominance orders from scratch.

use crate::calls;
use crate::contexts;
use crate::ctx::ResolveCtx;
use crate::mls;
use crate::rules;
use crate::Pass;
use secil_base::{CompileError, ErrorKind, Result};
use secil_tree::{
    walk, Database, DatumId, DatumState, Flavor, NodeId, Payload, Tree, VisitOutcome, Visitor,
};

const PASS_ORDER: [Pass; 11] = [
    Pass::Tif,
    Pass::In,
    Pass::BlkIn,
    Pass::BlkAbs,
    Pass::Macro,
    Pass::Call1,
    Pass::Call2,
    Pass::Misc1,
    Pass::Mls,
    Pass::Misc2,
    Pass::Misc3,
];

/// Runs the full resolution sequence over the database.
pub fn resolve(db: &mut Database) -> Result<()> {
    let mut index = 0;
    while index < PASS_ORDER.len() {
        let pass = PASS_ORDER[index];
        log::debug!("resolution pass {:?}", pass);
        let mut visitor = PassVisitor {
            ctx: ResolveCtx::new(pass),
        };
        let root = db.tree.root();
        walk(db, root, &mut visitor)?;

        if visitor.ctx.changed {
            // An optional was disabled; re-resolve from CALL1 with fresh
            // global orders.
            db.catorder.clear();
            db.dominance.clear();
            index = PASS_ORDER
                .iter()
                .position(|&p| p == Pass::Call1)
                .expect("CALL1 is in the pass order");
            continue;
        }

        if pass == Pass::Misc1 {
            finish_orders(db, visitor.ctx)?;
        }
        index += 1;
    }
    Ok(())
}

/// Merges the collected order hints and verifies them against every
/// enabled declaration.
fn finish_orders(db: &mut Database, ctx: ResolveCtx) -> Result<()> {
    let root = db.tree.root();
    let location = db.tree.node(root).location;
    let cats = collect_declarations(&db.tree, Flavor::Cat);
    let sens = collect_declarations(&db.tree, Flavor::Sens);
    db.catorder = ctx.cat_order.finish(&db.tree, &cats, "category", location)?;
    db.dominance = ctx.sens_order.finish(&db.tree, &sens, "sensitivity", location)?;
    Ok(())
}

/// Collects every enabled declaration of `flavor`, skipping disabled
/// optionals and macro bodies (whose expansions are collected instead).
fn collect_declarations(tree: &Tree, flavor: Flavor) -> Vec<DatumId> {
    fn visit(tree: &Tree, node: NodeId, flavor: Flavor, out: &mut Vec<DatumId>) {
        match tree.flavor(node) {
            Flavor::Macro => return,
            Flavor::Optional => {
                let datum = tree.node(node).datum.expect("optional declares a datum");
                if tree.datum(datum).state != DatumState::Enabled {
                    return;
                }
            }
            f if f == flavor => {
                let datum = tree.node(node).datum.expect("declaration has a datum");
                if tree.datum(datum).state == DatumState::Enabled {
                    out.push(datum);
                }
            }
            _ => {}
        }
        for &child in &tree.node(node).children {
            visit(tree, child, flavor, out);
        }
    }
    let mut out = Vec::new();
    visit(tree, tree.root(), flavor, &mut out);
    out
}

struct PassVisitor {
    ctx: ResolveCtx,
}

impl Visitor<Database> for PassVisitor {
    fn visit(&mut self, db: &mut Database, node: NodeId) -> Result<VisitOutcome> {
        let flavor = db.tree.flavor(node);

        if !self.ctx.optstack.is_empty()
            && matches!(flavor, Flavor::Tunable | Flavor::Macro)
        {
            return Err(CompileError::new(
                ErrorKind::ParseInputMalformed,
                db.tree.node(node).location,
                format!(
                    "{} declarations are not allowed in optionals",
                    db.tree.node(node).payload.statement_name()
                ),
            ));
        }

        // Macro bodies are templates: only the TIF fold and the in-macro
        // call expansion enter them.
        if flavor == Flavor::Macro && !matches!(self.ctx.pass, Pass::Tif | Pass::Macro) {
            return Ok(VisitOutcome::SkipChildren);
        }

        if flavor == Flavor::Optional {
            let datum = db.tree.node(node).datum.expect("optional declares a datum");
            if db.tree.datum(datum).state == DatumState::Disabled {
                return Ok(VisitOutcome::SkipChildren);
            }
        }

        if let Payload::Block { is_abstract: true } = db.tree.node(node).payload {
            if self.ctx.pass > Pass::BlkAbs {
                return Ok(VisitOutcome::SkipChildren);
            }
        }

        match dispatch(db, &mut self.ctx, node, flavor) {
            Ok(()) => {
                // A folded tunableif has been spliced out of the tree; its
                // detached branches must not be traversed.
                if self.ctx.pass == Pass::Tif && flavor == Flavor::TunableIf {
                    return Ok(VisitOutcome::SkipChildren);
                }
                Ok(VisitOutcome::Continue)
            }
            Err(err)
                if err.kind == ErrorKind::UnresolvedName && !self.ctx.optstack.is_empty() =>
            {
                // Recoverable: disable the innermost optional and let the
                // driver re-run from CALL1.
                let optional = *self.ctx.optstack.last().expect("optstack is non-empty");
                let datum = db
                    .tree
                    .node(optional)
                    .datum
                    .expect("optional declares a datum");
                log::warn!(
                    "disabling optional {} ({})",
                    db.tree.datum(datum).name,
                    err
                );
                db.tree.datum_mut(datum).state = DatumState::Disabling;
                self.ctx.changed = true;
                Ok(VisitOutcome::Continue)
            }
            Err(err) => Err(err),
        }
    }

    fn first_child(&mut self, db: &mut Database, parent: NodeId) -> Result<()> {
        match db.tree.flavor(parent) {
            Flavor::Call => {
                let macro_datum = match &db.tree.node(parent).payload {
                    Payload::Call { macro_ref, .. } => macro_ref.datum(),
                    _ => unreachable!("flavor matched Call"),
                };
                if let Some(macro_datum) = macro_datum {
                    for &frame in &self.ctx.callstack {
                        let frame_macro = match &db.tree.node(frame).payload {
                            Payload::Call { macro_ref, .. } => macro_ref.datum(),
                            _ => None,
                        };
                        if frame_macro == Some(macro_datum) {
                            return Err(CompileError::new(
                                ErrorKind::RecursiveCall,
                                db.tree.node(parent).location,
                                format!(
                                    "recursive call of macro {}",
                                    db.tree.datum(macro_datum).name
                                ),
                            ));
                        }
                    }
                }
                self.ctx.callstack.push(parent);
            }
            Flavor::Optional => self.ctx.optstack.push(parent),
            Flavor::Macro => self.ctx.macro_node = Some(parent),
            _ => {}
        }
        Ok(())
    }

    fn last_child(&mut self, db: &mut Database, parent: NodeId) -> Result<()> {
        match db.tree.flavor(parent) {
            Flavor::Call => {
                self.ctx.callstack.pop();
            }
            Flavor::Macro => self.ctx.macro_node = None,
            Flavor::Optional => {
                let datum = db
                    .tree
                    .node(parent)
                    .datum
                    .expect("optional declares a datum");
                if db.tree.datum(datum).state == DatumState::Disabling {
                    disable_children(&mut db.tree, parent);
                    db.tree.datum_mut(datum).state = DatumState::Disabled;
                }
                self.ctx.optstack.pop();
            }
            _ => {}
        }
        Ok(())
    }
}

/// Marks every declarative node under `node` disabled, leaving nested
/// already-disabled optionals alone.
fn disable_children(tree: &mut Tree, node: NodeId) {
    for child in tree.node(node).children.clone() {
        if tree.flavor(child) == Flavor::Optional {
            let datum = tree.node(child).datum.expect("optional declares a datum");
            if tree.datum(datum).state == DatumState::Disabled {
                continue;
            }
        }
        if let Some(datum) = tree.node(child).datum {
            tree.datum_mut(datum).state = DatumState::Disabled;
        }
        disable_children(tree, child);
    }
}

fn dispatch(db: &mut Database, ctx: &mut ResolveCtx, node: NodeId, flavor: Flavor) -> Result<()> {
    match ctx.pass {
        Pass::Tif => {
            if flavor == Flavor::TunableIf {
                calls::resolve_tunif(db, ctx, node)?;
            }
        }
        Pass::In => {
            if flavor == Flavor::In {
                calls::resolve_in(db, ctx, node)?;
            }
        }
        Pass::BlkIn => {
            if flavor == Flavor::BlockInherit {
                calls::resolve_blockinherit(db, ctx, node)?;
            }
        }
        Pass::BlkAbs => {
            if flavor == Flavor::BlockAbstract {
                calls::resolve_blockabstract(db, ctx, node)?;
            }
        }
        Pass::Macro => {
            if flavor == Flavor::Call && ctx.macro_node.is_some() {
                calls::resolve_call1(db, ctx, node)?;
            }
        }
        Pass::Call1 => {
            if flavor == Flavor::Call {
                calls::resolve_call1(db, ctx, node)?;
            }
        }
        Pass::Call2 => {
            if flavor == Flavor::Call {
                calls::resolve_call2(db, ctx, node)?;
            }
        }
        Pass::Misc1 => match flavor {
            Flavor::CatOrder => mls::resolve_catorder(db, ctx, node)?,
            Flavor::Dominance => mls::resolve_dominance(db, ctx, node)?,
            Flavor::BooleanIf => rules::resolve_boolif(db, ctx, node)?,
            Flavor::Class
            | Flavor::MapPerm
            | Flavor::Role
            | Flavor::Type
            | Flavor::User
            | Flavor::RoleAttribute
            | Flavor::TypeAttribute
            | Flavor::TypeAlias
            | Flavor::Sens
            | Flavor::Sid => reset_transient(db, node),
            _ => {}
        },
        Pass::Mls => match flavor {
            Flavor::CatRange => mls::resolve_catrange(db, ctx, node)?,
            Flavor::CatSet => mls::resolve_catset(db, ctx, node)?,
            Flavor::SensAlias => mls::resolve_sensalias(db, ctx, node)?,
            _ => {}
        },
        Pass::Misc2 => match flavor {
            Flavor::SensCat => mls::resolve_senscat(db, ctx, node)?,
            Flavor::ClassCommon => rules::resolve_classcommon(db, ctx, node)?,
            Flavor::TypeAlias => rules::resolve_typealias(db, ctx, node)?,
            _ => {}
        },
        Pass::Misc3 => match flavor {
            Flavor::TypeAttributeSet => rules::resolve_typeattributeset(db, ctx, node)?,
            Flavor::TypeAlias => rules::resolve_typealias_chain(db, node)?,
            Flavor::TypeBounds => rules::resolve_typebounds(db, ctx, node)?,
            Flavor::TypePermissive => rules::resolve_typepermissive(db, ctx, node)?,
            Flavor::NameTypeTransition => rules::resolve_nametypetransition(db, ctx, node)?,
            Flavor::RangeTransition => rules::resolve_rangetransition(db, ctx, node)?,
            Flavor::ClassPermSet => rules::resolve_classpermset(db, ctx, node)?,
            Flavor::ClassMapping => rules::resolve_classmapping(db, ctx, node)?,
            Flavor::AvRule => rules::resolve_avrule(db, ctx, node)?,
            Flavor::TypeRule => rules::resolve_type_rule(db, ctx, node)?,
            Flavor::UserRole => rules::resolve_userrole(db, ctx, node)?,
            Flavor::UserLevel => rules::resolve_userlevel(db, ctx, node)?,
            Flavor::UserRange => rules::resolve_userrange(db, ctx, node)?,
            Flavor::UserBounds => rules::resolve_userbounds(db, ctx, node)?,
            Flavor::UserPrefix => rules::resolve_userprefix(db, ctx, node)?,
            Flavor::SelinuxUser | Flavor::SelinuxUserDefault => {
                rules::resolve_selinuxuser(db, ctx, node)?
            }
            Flavor::RoleAttributeSet => rules::resolve_roleattributeset(db, ctx, node)?,
            Flavor::RoleType => rules::resolve_roletype(db, ctx, node)?,
            Flavor::RoleTransition => rules::resolve_roletransition(db, ctx, node)?,
            Flavor::RoleAllow => rules::resolve_roleallow(db, ctx, node)?,
            Flavor::RoleBounds => rules::resolve_rolebounds(db, ctx, node)?,
            Flavor::CatAlias => mls::resolve_catalias(db, ctx, node)?,
            Flavor::Level => mls::resolve_level(db, ctx, node)?,
            Flavor::LevelRange => mls::resolve_levelrange(db, ctx, node)?,
            Flavor::Constrain => contexts::resolve_constrain(db, ctx, node)?,
            Flavor::ValidateTrans => contexts::resolve_validatetrans(db, ctx, node)?,
            Flavor::Context => contexts::resolve_context(db, ctx, node)?,
            Flavor::FileCon
            | Flavor::PortCon
            | Flavor::GenfsCon
            | Flavor::PirqCon
            | Flavor::IomemCon
            | Flavor::IoportCon
            | Flavor::PciDeviceCon
            | Flavor::FsUse => contexts::resolve_single_context(db, ctx, node)?,
            Flavor::NodeCon => contexts::resolve_nodecon(db, ctx, node)?,
            Flavor::NetifCon => contexts::resolve_netifcon(db, ctx, node)?,
            Flavor::SidContext => contexts::resolve_sidcontext(db, ctx, node)?,
            _ => {}
        },
    }
    Ok(())
}

/// MISC1: clear attachment state a restarted resolution will rebuild.
fn reset_transient(db: &mut Database, node: NodeId) {
    match &mut db.tree.node_mut(node).payload {
        Payload::Class { common, .. } => *common = None,
        Payload::MapPerm { classperms } => classperms.clear(),
        Payload::Role { bounds } | Payload::Type { bounds } => *bounds = None,
        Payload::User {
            dftlevel,
            range,
            bounds,
        } => {
            *dftlevel = None;
            *range = None;
            *bounds = None;
        }
        Payload::RoleAttribute { exprs } | Payload::TypeAttribute { exprs } => exprs.clear(),
        Payload::TypeAlias { ty, .. } => *ty = None,
        Payload::Sens { cats } => cats.clear(),
        Payload::Sid { context } => *context = None,
        _ => {}
    }
}
