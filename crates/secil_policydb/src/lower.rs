//! Lowering: three ordered passes from the resolved AST to the policy
//! database.
//!
//! Pass 1 numbers the primary declarations (classes with their permission
//! tables, roles, types, attributes, policycaps, users, booleans, category
//! aliases, and — under MLS — the sensitivity category associations).
//! Between pass 1 and pass 2 the alias tables and attribute membership
//! bitmaps are materialized so pass 2 can expand through them in any
//! declaration order. Pass 2 builds every cross-reference record and
//! indexes neverallow rules; pass 3 emits conditional nodes and the
//! deferred access-vector rules, each insertion checked against the
//! neverallow index.
//!
//! The orders poured before pass 1 (categories, dominance) and the sorted
//! ocontext arrays consumed afterwards keep the output deterministic.

use crate::avtab::{AvtabKey, AvtabKind};
use crate::cond::{CondNode, CondToken};
use crate::constraint::{compile_expr, Constraint};
use crate::context::{lower_catset, lower_context, lower_level, lower_levelrange};
use crate::neverallow::{NeverallowIndex, NeverallowTuple};
use crate::options::{CompileOptions, TargetPlatform};
use crate::pdb::{
    BoolDatum, CatDatum, ClassDatum, CommonDatum, FilenameTransRec, FsUseKind, FsUseRec,
    GenfsGroup, IomemConRec, IoportConRec, IsidCon, LevelDatum, NetifConRec, Node6ConRec,
    NodeConRec, PciDeviceConRec, PermDatum, PirqConRec, PolicyDb, PortConRec, RangeTransRec,
    RoleAllowRec, RoleDatum, RoleTransRec, TypeDatum, UserDatum,
};
use crate::sort::{self, ContextSorts};
use secil_base::{Bitmap, CompileError, ErrorKind, Location, Result};
use secil_tree::{
    walk, AvRuleKind, AvTarget, BoolOp, BoolToken, ClassPermSetData, CondBranch, Database, DatumId,
    DatumState, Flavor, FsUseBehavior, NodeId, Payload, Protocol, Ref, SetOp, SetToken, Spec,
    Tree, TreeView, TypeRuleKind, VisitOutcome, Visitor,
};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

/// Datum → database value map, shared by every lowering helper.
#[derive(Debug, Default)]
pub struct LowerMaps {
    values: HashMap<DatumId, u32>,
}

impl LowerMaps {
    pub fn set(&mut self, datum: DatumId, value: u32) {
        self.values.insert(datum, value);
    }

    /// The database value of a datum; missing entries mean the reference
    /// points at something that never made it into the database.
    pub fn value(&self, tree: &Tree, datum: DatumId) -> Result<u32> {
        self.values.get(&datum).copied().ok_or_else(|| {
            CompileError::new(
                ErrorKind::UnresolvedName,
                tree.node(tree.datum(datum).primary()).location,
                format!("{} is not in the policy database", tree.datum(datum).name),
            )
        })
    }
}

struct LowerState<'a> {
    db: &'a Database,
    options: CompileOptions,
    pdb: PolicyDb,
    maps: LowerMaps,
    neverallows: NeverallowIndex,
    /// Declared (non-attribute) type values, by `value - 1`.
    types_bitmap: Bitmap,
    /// Declared role values, by `value - 1`.
    roles_bitmap: Bitmap,
    /// Type attribute members (type values, by `value - 1`).
    attr_members: HashMap<DatumId, Bitmap>,
    /// Role attribute members.
    role_attr_members: HashMap<DatumId, Vec<DatumId>>,
    pass: u8,
}

impl TreeView for LowerState<'_> {
    fn tree(&self) -> &Tree {
        &self.db.tree
    }
}

impl LowerState<'_> {
    fn tree(&self) -> &Tree {
        &self.db.tree
    }

    fn value(&self, datum: DatumId) -> Result<u32> {
        self.maps.value(&self.db.tree, datum)
    }

    fn datum_name(&self, datum: DatumId) -> &str {
        &self.db.tree.datum(datum).name
    }

    fn location(&self, node: NodeId) -> Location {
        self.db.tree.node(node).location
    }
}

/// Lowers a resolved database into a policy database.
pub fn lower(db: &Database, options: &CompileOptions) -> Result<PolicyDb> {
    let mut state = LowerState {
        db,
        options: options.clone(),
        pdb: PolicyDb::new(options.mls),
        maps: LowerMaps::default(),
        neverallows: NeverallowIndex::new(),
        types_bitmap: Bitmap::new(),
        roles_bitmap: Bitmap::new(),
        attr_members: HashMap::new(),
        role_attr_members: HashMap::new(),
        pass: 1,
    };

    pour_catorder(&mut state)?;
    if options.mls {
        pour_dominance(&mut state)?;
    }

    let root = db.tree.root();
    for pass in 1..=3 {
        state.pass = pass;
        log::debug!("lowering pass {}", pass);
        if pass == 2 {
            lower_aliases(&mut state)?;
            materialize_attributes(&mut state)?;
        }
        walk(&mut state, root, &mut LowerVisitor)?;
    }

    state.pdb.build_val_arrays()?;
    let sorts = sort::collect(&db.tree);
    lower_ocontexts(&mut state, &sorts)?;
    finalize_attr_maps(&mut state);

    Ok(state.pdb)
}

/// Numbers the categories by the merged total order.
fn pour_catorder(state: &mut LowerState<'_>) -> Result<()> {
    for &datum in &state.db.catorder {
        let name = qualified_name(&state.db.tree, datum);
        let value = state.pdb.cats.next_value();
        state.pdb.cats.insert(
            &name,
            CatDatum {
                value,
                isalias: false,
            },
            Location::NONE,
        )?;
        state.maps.set(datum, value);
    }
    Ok(())
}

/// Numbers the sensitivities by the dominance order.
fn pour_dominance(state: &mut LowerState<'_>) -> Result<()> {
    for &datum in &state.db.dominance {
        let name = qualified_name(&state.db.tree, datum);
        let value = state.pdb.levels.next_value();
        state.pdb.levels.insert(
            &name,
            LevelDatum {
                sens: value,
                ..Default::default()
            },
            Location::NONE,
        )?;
        state.maps.set(datum, value);
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════
// Walk driver
// ═══════════════════════════════════════════════════════════════════

struct LowerVisitor;

impl<'a> Visitor<LowerState<'a>> for LowerVisitor {
    fn visit(&mut self, state: &mut LowerState<'a>, node: NodeId) -> Result<VisitOutcome> {
        match state.tree().flavor(node) {
            Flavor::Macro => return Ok(VisitOutcome::SkipChildren),
            Flavor::Optional => {
                let datum = state.tree().node(node).datum.expect("optional has a datum");
                if state.tree().datum(datum).state != DatumState::Enabled {
                    return Ok(VisitOutcome::SkipChildren);
                }
            }
            Flavor::Block => {
                if let Payload::Block { is_abstract: true } = state.tree().node(node).payload {
                    return Ok(VisitOutcome::SkipChildren);
                }
            }
            Flavor::BooleanIf => {
                if state.pass == 3 {
                    lower_booleanif(state, node)?;
                }
                return Ok(VisitOutcome::SkipChildren);
            }
            _ => {}
        }
        dispatch(state, node)?;
        Ok(VisitOutcome::Continue)
    }
}

fn dispatch(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let flavor = state.tree().flavor(node);
    match state.pass {
        1 => match flavor {
            Flavor::Class => lower_class(state, node)?,
            Flavor::Role => lower_role(state, node)?,
            Flavor::Type => lower_type(state, node)?,
            Flavor::TypeAttribute => lower_typeattribute(state, node)?,
            Flavor::PolicyCap => lower_policycap(state, node)?,
            Flavor::User => lower_user(state, node)?,
            Flavor::Bool => lower_bool(state, node)?,
            Flavor::CatAlias => lower_catalias(state, node)?,
            Flavor::Sens => {
                if state.options.mls {
                    define_level(state, node)?;
                }
            }
            _ => {}
        },
        2 => match flavor {
            Flavor::TypePermissive => lower_typepermissive(state, node)?,
            Flavor::RoleType => lower_roletype(state, node)?,
            Flavor::Role => lower_rolebounds(state, node)?,
            Flavor::User => {
                if state.options.mls {
                    lower_user_mls(state, node)?;
                }
            }
            Flavor::UserRole => lower_userrole(state, node)?,
            Flavor::TypeRule => {
                lower_type_rule(state, node, false)?;
            }
            Flavor::AvRule => {
                if avrule_kind(state.tree(), node) == AvRuleKind::Neverallow {
                    index_neverallow(state, node)?;
                }
            }
            Flavor::RoleTransition => lower_roletransition(state, node)?,
            Flavor::RoleAllow => lower_roleallow(state, node)?,
            Flavor::NameTypeTransition => lower_nametypetransition(state, node)?,
            Flavor::Constrain => lower_constrain(state, node)?,
            Flavor::ValidateTrans => lower_validatetrans(state, node)?,
            Flavor::Sid => lower_sid(state, node)?,
            Flavor::RangeTransition => {
                if state.options.mls {
                    lower_rangetransition(state, node)?;
                }
            }
            _ => {}
        },
        3 => {
            if flavor == Flavor::AvRule
                && avrule_kind(state.tree(), node) != AvRuleKind::Neverallow
            {
                lower_avrule(state, node, AvSink::TopLevel)?;
            }
        }
        _ => unreachable!("three lowering passes"),
    }
    Ok(())
}

fn avrule_kind(tree: &Tree, node: NodeId) -> AvRuleKind {
    match &tree.node(node).payload {
        Payload::AvRule { kind, .. } => *kind,
        _ => unreachable!("dispatched on flavor"),
    }
}

/// Walks enabled statements outside macro bodies and conditionals,
/// invoking `f` on nodes of the wanted flavor. Used by the pass-2
/// preamble sweeps.
fn for_each_enabled(
    tree: &Tree,
    node: NodeId,
    flavor: Flavor,
    f: &mut impl FnMut(NodeId) -> Result<()>,
) -> Result<()> {
    match tree.flavor(node) {
        Flavor::Macro | Flavor::BooleanIf => return Ok(()),
        Flavor::Optional => {
            let datum = tree.node(node).datum.expect("optional has a datum");
            if tree.datum(datum).state != DatumState::Enabled {
                return Ok(());
            }
        }
        Flavor::Block => {
            if let Payload::Block { is_abstract: true } = tree.node(node).payload {
                return Ok(());
            }
        }
        f2 if f2 == flavor => f(node)?,
        _ => {}
    }
    for &child in &tree.node(node).children {
        for_each_enabled(tree, child, flavor, f)?;
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════
// Pass 1
// ═══════════════════════════════════════════════════════════════════

/// The fully qualified name of a datum: its declared name prefixed with
/// every enclosing named block. Scopes keep local names apart in the AST;
/// the database's flat tables need the qualification.
fn qualified_name(tree: &Tree, datum: DatumId) -> String {
    let mut parts = vec![tree.datum(datum).name.clone()];
    let mut node = tree.datum(datum).primary();
    while let Some(parent) = tree.node(node).parent {
        if let Payload::Block { .. } = tree.node(parent).payload {
            let block = tree.node(parent).datum.expect("block declares a datum");
            parts.push(tree.datum(block).name.clone());
        }
        node = parent;
    }
    parts.reverse();
    parts.join(".")
}

fn declared(tree: &Tree, node: NodeId) -> (DatumId, String) {
    let datum = tree.node(node).datum.expect("declaration has a datum");
    (datum, qualified_name(tree, datum))
}

fn lower_common(state: &mut LowerState<'_>, common: DatumId) -> Result<()> {
    let tree = &state.db.tree;
    let name = qualified_name(tree, common);
    let common_node = tree.datum(common).primary();
    let location = tree.node(common_node).location;

    let value = state.pdb.commons.next_value();
    let mut datum = CommonDatum {
        value,
        ..Default::default()
    };
    for &child in &tree.node(common_node).children {
        if tree.flavor(child) != Flavor::Perm {
            continue;
        }
        // Permissions keep their local names; the table is common-scoped.
        let perm_datum = tree.node(child).datum.expect("perm declares a datum");
        let perm_name = tree.datum(perm_datum).name.clone();
        let perm_value = datum.perms.next_value();
        datum
            .perms
            .insert(&perm_name, PermDatum { value: perm_value }, location)?;
        state.maps.set(perm_datum, perm_value);
    }
    state.maps.set(common, value);
    state.pdb.commons.insert(&name, datum, location)
}

fn lower_class(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let (datum, name) = declared(state.tree(), node);
    let location = state.location(node);
    let common = match &state.tree().node(node).payload {
        Payload::Class { common, .. } => *common,
        _ => unreachable!("dispatched on flavor"),
    };

    let value = state.pdb.classes.next_value();
    let mut class = ClassDatum {
        value,
        ..Default::default()
    };

    if let Some(common) = common {
        let common_name = qualified_name(&state.db.tree, common);
        // The common may not have been visited yet; create it on demand so
        // declaration order never matters.
        if state.pdb.commons.get(&common_name).is_none() {
            lower_common(state, common)?;
        }
        let common_datum = state
            .pdb
            .commons
            .get(&common_name)
            .expect("common was just created");
        class.common = Some(common_name);
        // Common permissions occupy the low bits of the class mask.
        class.perms.nprim += common_datum.perms.nprim;
    }

    let children = state.tree().node(node).children.clone();
    for child in children {
        if state.tree().flavor(child) != Flavor::Perm {
            continue;
        }
        // Permissions keep their local names; the table is class-scoped.
        let perm_datum = state.tree().node(child).datum.expect("perm declares a datum");
        let perm_name = state.tree().datum(perm_datum).name.clone();
        let perm_value = class.perms.next_value();
        class
            .perms
            .insert(&perm_name, PermDatum { value: perm_value }, location)?;
        state.maps.set(perm_datum, perm_value);
    }

    state.maps.set(datum, value);
    state.pdb.classes.insert(&name, class, location)
}

fn lower_role(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let (datum, name) = declared(state.tree(), node);
    if name == "object_r" {
        // Pre-seeded at value 1 by the policy database.
        state.maps.set(datum, 1);
        return Ok(());
    }
    let location = state.location(node);
    let value = state.pdb.roles.next_value();
    state.maps.set(datum, value);
    state.roles_bitmap.set((value - 1) as usize);
    state.pdb.roles.insert(
        &name,
        RoleDatum {
            value,
            ..Default::default()
        },
        location,
    )
}

fn lower_type(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let (datum, name) = declared(state.tree(), node);
    let location = state.location(node);
    let value = state.pdb.types.next_value();
    state.maps.set(datum, value);
    state.types_bitmap.set((value - 1) as usize);
    state.pdb.types.insert(
        &name,
        TypeDatum {
            value,
            primary: true,
            attribute: false,
        },
        location,
    )
}

fn lower_typeattribute(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let (datum, name) = declared(state.tree(), node);
    let location = state.location(node);
    let value = state.pdb.types.next_value();
    state.maps.set(datum, value);
    state.pdb.types.insert(
        &name,
        TypeDatum {
            value,
            primary: true,
            attribute: true,
        },
        location,
    )
}

/// The known policy capability numbers.
const POLICYCAPS: &[(&str, usize)] = &[
    ("network_peer_controls", 0),
    ("open_perms", 1),
    ("redhat1", 2),
    ("always_check_network", 3),
];

fn lower_policycap(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let (_, name) = declared(state.tree(), node);
    let capnum = POLICYCAPS
        .iter()
        .find(|(cap, _)| *cap == name)
        .map(|(_, num)| *num)
        .ok_or_else(|| {
            CompileError::new(
                ErrorKind::PolicycapUnknown,
                state.location(node),
                format!("{} is not a known policy capability", name),
            )
        })?;
    state.pdb.policycaps.set(capnum);
    Ok(())
}

fn lower_user(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let (datum, name) = declared(state.tree(), node);
    let location = state.location(node);
    let value = state.pdb.users.next_value();
    state.maps.set(datum, value);
    state.pdb.users.insert(
        &name,
        UserDatum {
            value,
            ..Default::default()
        },
        location,
    )
}

fn lower_bool(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let (datum, name) = declared(state.tree(), node);
    let location = state.location(node);
    let value_flag = match &state.tree().node(node).payload {
        Payload::Bool { value } => *value,
        _ => unreachable!("dispatched on flavor"),
    };
    let value = state.pdb.bools.next_value();
    state.maps.set(datum, value);
    state.pdb.bools.insert(
        &name,
        BoolDatum {
            value,
            state: value_flag,
        },
        location,
    )
}

fn lower_catalias(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let (datum, name) = declared(state.tree(), node);
    let location = state.location(node);
    let target = match &state.tree().node(node).payload {
        Payload::CatAlias { target } => target
            .datum()
            .expect("catalias was resolved"),
        _ => unreachable!("dispatched on flavor"),
    };
    let value = state.value(target)?;
    state.maps.set(datum, value);
    state.pdb.cats.insert(
        &name,
        CatDatum {
            value,
            isalias: true,
        },
        location,
    )
}

/// MLS pass 1: pour a sensitivity's associated categories into its level.
fn define_level(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let (_, name) = declared(state.tree(), node);
    let cats = match &state.tree().node(node).payload {
        Payload::Sens { cats } => cats.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    let mut bitmap = Bitmap::new();
    for spec in &cats {
        match spec {
            Spec::Inline(data) => lower_catset(state.tree(), &state.maps, data, &mut bitmap)?,
            Spec::Named(r) => {
                let datum = r.datum().expect("senscat was resolved");
                let set_node = state.tree().datum(datum).primary();
                match &state.tree().node(set_node).payload {
                    Payload::CatSet { data } => {
                        lower_catset(state.tree(), &state.maps, &data.clone(), &mut bitmap)?
                    }
                    _ => unreachable!("resolver required a category set"),
                }
            }
        }
    }
    let level = state.pdb.levels.get_mut(&name).ok_or_else(|| {
        CompileError::new(
            ErrorKind::MissingInOrder,
            state.db.tree.node(node).location,
            format!("sensitivity {} is not in the dominance order", name),
        )
    })?;
    level.level.sens = level.sens;
    level.level.cats = bitmap;
    level.defined = true;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════
// Pass 2 preamble: aliases and attribute membership
// ═══════════════════════════════════════════════════════════════════

fn lower_aliases(state: &mut LowerState<'_>) -> Result<()> {
    let tree = &state.db.tree;
    let root = tree.root();

    let mut typealiases = Vec::new();
    for_each_enabled(tree, root, Flavor::TypeAlias, &mut |n| {
        typealiases.push(n);
        Ok(())
    })?;
    for node in typealiases {
        let (datum, name) = declared(tree, node);
        let location = tree.node(node).location;
        let ty = match &tree.node(node).payload {
            Payload::TypeAlias { ty, .. } => ty.expect("typealias chain was collapsed"),
            _ => unreachable!("collected typealias nodes"),
        };
        let value = state.value(ty)?;
        state.maps.set(datum, value);
        state.pdb.types.insert(
            &name,
            TypeDatum {
                value,
                primary: false,
                attribute: false,
            },
            location,
        )?;
    }

    if state.options.mls {
        let mut sensaliases = Vec::new();
        for_each_enabled(tree, root, Flavor::SensAlias, &mut |n| {
            sensaliases.push(n);
            Ok(())
        })?;
        for node in sensaliases {
            let (datum, name) = declared(tree, node);
            let location = tree.node(node).location;
            let target = match &tree.node(node).payload {
                Payload::SensAlias { target } => {
                    target.datum().expect("sensalias was resolved")
                }
                _ => unreachable!("collected sensalias nodes"),
            };
            let value = state.value(target)?;
            let target_level = state
                .pdb
                .levels
                .get(&qualified_name(&state.db.tree, target))
                .expect("target sensitivity is in the level table")
                .level
                .clone();
            state.maps.set(datum, value);
            state.pdb.levels.insert(
                &name,
                LevelDatum {
                    sens: value,
                    level: target_level,
                    isalias: true,
                    defined: true,
                },
                location,
            )?;
        }
    }
    Ok(())
}

/// Evaluates every attribute's member expressions into bitmaps so pass 2
/// can expand attributes regardless of declaration order.
fn materialize_attributes(state: &mut LowerState<'_>) -> Result<()> {
    let tree = &state.db.tree;
    let root = tree.root();

    let mut type_attrs = Vec::new();
    for_each_enabled(tree, root, Flavor::TypeAttribute, &mut |n| {
        type_attrs.push(n);
        Ok(())
    })?;
    for node in &type_attrs {
        let datum = tree.node(*node).datum.expect("attribute has a datum");
        let mut visiting = HashSet::new();
        type_attr_members(state, datum, &mut visiting)?;
    }

    let mut role_attrs = Vec::new();
    for_each_enabled(tree, root, Flavor::RoleAttribute, &mut |n| {
        role_attrs.push(n);
        Ok(())
    })?;
    for node in &role_attrs {
        let datum = tree.node(*node).datum.expect("attribute has a datum");
        let mut visiting = HashSet::new();
        role_attr_members(state, datum, &mut visiting)?;
    }
    Ok(())
}

fn circular_attribute(state: &LowerState<'_>, datum: DatumId) -> CompileError {
    CompileError::new(
        ErrorKind::RecursiveAlias,
        state
            .db
            .tree
            .node(state.db.tree.datum(datum).primary())
            .location,
        format!("circular attribute set involving {}", state.datum_name(datum)),
    )
}

fn type_attr_members(
    state: &mut LowerState<'_>,
    attr: DatumId,
    visiting: &mut HashSet<DatumId>,
) -> Result<Bitmap> {
    if let Some(members) = state.attr_members.get(&attr) {
        return Ok(members.clone());
    }
    if !visiting.insert(attr) {
        return Err(circular_attribute(state, attr));
    }

    let attr_node = state.db.tree.datum(attr).primary();
    let exprs = match &state.db.tree.node(attr_node).payload {
        Payload::TypeAttribute { exprs } => exprs.clone(),
        _ => unreachable!("attribute datum has an attribute payload"),
    };

    let mut members = Bitmap::new();
    for expr in &exprs {
        let mut stack: Vec<Bitmap> = Vec::new();
        for token in &expr.tokens {
            match token {
                SetToken::Ref(r) => {
                    let datum = r.datum().expect("set expression was resolved");
                    let mut operand = Bitmap::new();
                    match state.db.tree.datum_flavor(datum) {
                        Flavor::TypeAttribute => {
                            operand = type_attr_members(state, datum, visiting)?;
                        }
                        _ => operand.set((state.value(datum)? - 1) as usize),
                    }
                    stack.push(operand);
                }
                SetToken::Op(op) => {
                    apply_set_op(&mut stack, *op, &state.types_bitmap, state.location(attr_node))?
                }
            }
        }
        for operand in stack {
            members.union_with(&operand);
        }
    }

    visiting.remove(&attr);
    state.attr_members.insert(attr, members.clone());
    Ok(members)
}

fn apply_set_op(
    stack: &mut Vec<Bitmap>,
    op: SetOp,
    universe: &Bitmap,
    location: Location,
) -> Result<()> {
    let underflow =
        || CompileError::new(ErrorKind::ParseInputMalformed, location, "malformed set expression");
    if op == SetOp::Not {
        let mut operand = stack.pop().ok_or_else(underflow)?;
        operand.complement_within(universe);
        stack.push(operand);
        return Ok(());
    }
    let rhs = stack.pop().ok_or_else(underflow)?;
    let mut lhs = stack.pop().ok_or_else(underflow)?;
    match op {
        SetOp::And => lhs.intersect_with(&rhs),
        SetOp::Or => lhs.union_with(&rhs),
        SetOp::Xor => lhs.symmetric_difference_with(&rhs),
        SetOp::Not => unreachable!("handled above"),
    }
    stack.push(lhs);
    Ok(())
}

fn role_attr_members(
    state: &mut LowerState<'_>,
    attr: DatumId,
    visiting: &mut HashSet<DatumId>,
) -> Result<Vec<DatumId>> {
    if let Some(members) = state.role_attr_members.get(&attr) {
        return Ok(members.clone());
    }
    if !visiting.insert(attr) {
        return Err(circular_attribute(state, attr));
    }

    let attr_node = state.db.tree.datum(attr).primary();
    let exprs = match &state.db.tree.node(attr_node).payload {
        Payload::RoleAttribute { exprs } => exprs.clone(),
        _ => unreachable!("attribute datum has an attribute payload"),
    };

    // Role attribute expressions in practice are unions; evaluate over
    // value bitmaps and convert back through the declared role list.
    let mut values = Bitmap::new();
    let mut datums_by_value: HashMap<u32, DatumId> = HashMap::new();
    for expr in &exprs {
        let mut stack: Vec<Bitmap> = Vec::new();
        for token in &expr.tokens {
            match token {
                SetToken::Ref(r) => {
                    let datum = r.datum().expect("set expression was resolved");
                    let mut operand = Bitmap::new();
                    match state.db.tree.datum_flavor(datum) {
                        Flavor::RoleAttribute => {
                            for member in role_attr_members(state, datum, visiting)? {
                                let value = state.value(member)?;
                                operand.set((value - 1) as usize);
                                datums_by_value.insert(value, member);
                            }
                        }
                        _ => {
                            let value = state.value(datum)?;
                            operand.set((value - 1) as usize);
                            datums_by_value.insert(value, datum);
                        }
                    }
                    stack.push(operand);
                }
                SetToken::Op(op) => apply_set_op(
                    &mut stack,
                    *op,
                    &state.roles_bitmap,
                    state.location(attr_node),
                )?,
            }
        }
        for operand in stack {
            values.union_with(&operand);
        }
    }

    let mut members = Vec::new();
    for bit in values.ones() {
        let value = (bit + 1) as u32;
        if let Some(&datum) = datums_by_value.get(&value) {
            members.push(datum);
        }
    }

    visiting.remove(&attr);
    state.role_attr_members.insert(attr, members.clone());
    Ok(members)
}

// ═══════════════════════════════════════════════════════════════════
// Pass 2
// ═══════════════════════════════════════════════════════════════════

fn ref_value(state: &LowerState<'_>, r: &Ref) -> Result<u32> {
    let datum = r.datum().expect("reference was resolved");
    state.value(datum)
}

fn lower_typepermissive(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let value = match &state.tree().node(node).payload {
        Payload::TypePermissive { ty } => ref_value(state, ty)?,
        _ => unreachable!("dispatched on flavor"),
    };
    // The kernel's permissive map indexes by value directly.
    state.pdb.permissive_map.set(value as usize);
    Ok(())
}

fn lower_roletype(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let (role, ty) = match &state.tree().node(node).payload {
        Payload::RoleType { role, ty } => (
            role.datum().expect("roletype was resolved"),
            ty.datum().expect("roletype was resolved"),
        ),
        _ => unreachable!("dispatched on flavor"),
    };

    let mut type_bits = Bitmap::new();
    if state.tree().datum_flavor(ty) == Flavor::TypeAttribute {
        let mut visiting = HashSet::new();
        type_bits = type_attr_members(state, ty, &mut visiting)?;
    } else {
        type_bits.set((state.value(ty)? - 1) as usize);
    }

    let roles: Vec<DatumId> = if state.tree().datum_flavor(role) == Flavor::RoleAttribute {
        let mut visiting = HashSet::new();
        role_attr_members(state, role, &mut visiting)?
    } else {
        vec![role]
    };

    for role in roles {
        let name = qualified_name(&state.db.tree, role);
        let datum = match state.pdb.roles.get_mut(&name) {
            Some(datum) => datum,
            None => return Err(missing(state, node, &name)),
        };
        datum.types.union_with(&type_bits);
    }
    Ok(())
}

fn missing(state: &LowerState<'_>, node: NodeId, name: &str) -> CompileError {
    CompileError::new(
        ErrorKind::UnresolvedName,
        state.db.tree.node(node).location,
        format!("{} is not in the policy database", name),
    )
}

fn lower_rolebounds(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let (_, name) = declared(state.tree(), node);
    let bounds = match &state.tree().node(node).payload {
        Payload::Role { bounds } => *bounds,
        _ => unreachable!("dispatched on flavor"),
    };
    if let Some(bounds) = bounds {
        let value = state.value(bounds)?;
        if let Some(role) = state.pdb.roles.get_mut(&name) {
            role.bounds = value;
        }
    }
    Ok(())
}

fn lower_user_mls(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let (_, name) = declared(state.tree(), node);
    let (dftlevel, range) = match &state.tree().node(node).payload {
        Payload::User {
            dftlevel, range, ..
        } => (dftlevel.clone(), range.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    let dftlevel = match &dftlevel {
        Some(Spec::Inline(data)) => Some(lower_level(state.tree(), &state.maps, data)?),
        Some(Spec::Named(r)) => {
            let datum = r.datum().expect("userlevel was resolved");
            let level_node = state.tree().datum(datum).primary();
            match &state.tree().node(level_node).payload {
                Payload::Level { data } => {
                    Some(lower_level(state.tree(), &state.maps, &data.clone())?)
                }
                _ => unreachable!("resolver checked the flavor"),
            }
        }
        None => None,
    };
    let range = match &range {
        Some(spec) => Some(lower_levelrange(state.tree(), &state.maps, spec)?),
        None => None,
    };
    if let Some(user) = state.pdb.users.get_mut(&name) {
        user.dfltlevel = dftlevel;
        user.range = range;
    }
    Ok(())
}

fn lower_userrole(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let (user, role) = match &state.tree().node(node).payload {
        Payload::UserRole { user, role } => (
            user.datum().expect("userrole was resolved"),
            role.datum().expect("userrole was resolved"),
        ),
        _ => unreachable!("dispatched on flavor"),
    };
    let role_value = state.value(role)?;
    let name = qualified_name(&state.db.tree, user);
    let datum = match state.pdb.users.get_mut(&name) {
        Some(datum) => datum,
        None => return Err(missing(state, node, &name)),
    };
    datum.roles.set((role_value - 1) as usize);
    Ok(())
}

fn lower_type_rule(state: &mut LowerState<'_>, node: NodeId, conditional: bool) -> Result<usize> {
    let (kind, src, tgt, obj, result) = match &state.tree().node(node).payload {
        Payload::TypeRule {
            kind,
            src,
            tgt,
            obj,
            result,
        } => (*kind, src.clone(), tgt.clone(), obj.clone(), result.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    let key = AvtabKey {
        source: ref_value(state, &src)?,
        target: ref_value(state, &tgt)?,
        class: ref_value(state, &obj)?,
        kind: match kind {
            TypeRuleKind::Transition => AvtabKind::Transition,
            TypeRuleKind::Change => AvtabKind::Change,
            TypeRuleKind::Member => AvtabKind::Member,
        },
    };
    let data = ref_value(state, &result)?;
    let idx = if conditional {
        state.pdb.te_cond_avtab.insert_nonunique(key, data)
    } else {
        state.pdb.te_avtab.insert_nonunique(key, data)
    };
    Ok(idx)
}

fn lower_roletransition(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let rec = match &state.tree().node(node).payload {
        Payload::RoleTransition {
            src,
            tgt,
            obj,
            result,
        } => RoleTransRec {
            role: ref_value(state, src)?,
            ty: ref_value(state, tgt)?,
            class: ref_value(state, obj)?,
            new_role: ref_value(state, result)?,
        },
        _ => unreachable!("dispatched on flavor"),
    };
    state.pdb.role_trans.push(rec);
    Ok(())
}

fn lower_roleallow(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let rec = match &state.tree().node(node).payload {
        Payload::RoleAllow { src, tgt } => RoleAllowRec {
            role: ref_value(state, src)?,
            new_role: ref_value(state, tgt)?,
        },
        _ => unreachable!("dispatched on flavor"),
    };
    state.pdb.role_allow.push(rec);
    Ok(())
}

fn lower_nametypetransition(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let rec = match &state.tree().node(node).payload {
        Payload::NameTypeTransition {
            src,
            exec,
            proc,
            dest,
            path,
        } => FilenameTransRec {
            stype: ref_value(state, src)?,
            ttype: ref_value(state, exec)?,
            tclass: ref_value(state, proc)?,
            otype: ref_value(state, dest)?,
            name: path.clone(),
        },
        _ => unreachable!("dispatched on flavor"),
    };
    state.pdb.filename_trans.push(rec);
    Ok(())
}

fn lower_rangetransition(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let rec = match &state.tree().node(node).payload {
        Payload::RangeTransition {
            src,
            exec,
            obj,
            range,
        } => RangeTransRec {
            source_type: ref_value(state, src)?,
            target_type: ref_value(state, exec)?,
            target_class: ref_value(state, obj)?,
            target_range: lower_levelrange(state.tree(), &state.maps, range)?,
        },
        _ => unreachable!("dispatched on flavor"),
    };
    state.pdb.range_trans.push(rec);
    Ok(())
}

fn lower_sid(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let (_, name) = declared(state.tree(), node);
    let context = match &state.tree().node(node).payload {
        Payload::Sid { context } => context.clone(),
        _ => unreachable!("dispatched on flavor"),
    };
    let context = match &context {
        Some(spec) => Some(lower_context(
            state.tree(),
            &state.maps,
            state.options.mls,
            spec,
        )?),
        None => None,
    };
    let sid = state.pdb.ocontexts.isids.len() as u32 + 1;
    state.pdb.ocontexts.isids.push(IsidCon { sid, name, context });
    Ok(())
}

/// Expands a constraint's class permissions and attaches the compiled
/// expression to each class.
fn lower_constrain(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let (mls, classperms, expr) = match &state.tree().node(node).payload {
        Payload::Constrain {
            mls,
            classperms,
            expr,
        } => (*mls, classperms.clone(), expr.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    if mls && !state.options.mls {
        return Ok(());
    }
    let location = state.location(node);
    let targets = expand_classperms(state, node, &classperms, false)?;
    let compiled = compile_expr(state.tree(), &state.maps, &expr, location)?;
    for (class_value, mask) in targets {
        let name = state.pdb.class_name_by_value(class_value)?;
        let class = state
            .pdb
            .classes
            .get_mut(&name)
            .expect("class value came from the table");
        class.constraints.push(Constraint {
            perm_mask: mask,
            expr: compiled.clone(),
        });
    }
    Ok(())
}

fn lower_validatetrans(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let (mls, class, expr) = match &state.tree().node(node).payload {
        Payload::ValidateTrans { mls, class, expr } => (*mls, class.clone(), expr.clone()),
        _ => unreachable!("dispatched on flavor"),
    };
    if mls && !state.options.mls {
        return Ok(());
    }
    let location = state.location(node);
    let class_value = ref_value(state, &class)?;
    let compiled = compile_expr(state.tree(), &state.maps, &expr, location)?;
    let name = state.pdb.class_name_by_value(class_value)?;
    let class = state
        .pdb
        .classes
        .get_mut(&name)
        .expect("class value came from the table");
    class.validatetrans.push(Constraint {
        perm_mask: 0,
        expr: compiled,
    });
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════
// Access-vector rules
// ═══════════════════════════════════════════════════════════════════

/// Where an avrule's expanded entries go.
enum AvSink {
    /// The main table, merging duplicate keys.
    TopLevel,
    /// The conditional table, keeping duplicates; collects entry
    /// positions for a branch list.
    Conditional(Vec<usize>),
    /// A neverallow record instead of a table.
    Neverallow(usize),
}

fn index_neverallow(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let record = state.neverallows.begin_record(state.location(node));
    lower_avrule(state, node, AvSink::Neverallow(record))?;
    Ok(())
}

fn lower_avrule(state: &mut LowerState<'_>, node: NodeId, sink: AvSink) -> Result<AvSink> {
    let (kind, src, tgt, classperms) = match &state.tree().node(node).payload {
        Payload::AvRule {
            kind,
            src,
            tgt,
            classperms,
        } => (*kind, src.clone(), tgt.clone(), classperms.clone()),
        _ => unreachable!("dispatched on flavor"),
    };

    if kind == AvRuleKind::DontAudit && state.options.disable_dontaudit {
        return Ok(sink);
    }

    let src_datum = src.datum().expect("avrule was resolved");
    let pairs: Vec<(u32, u32)> = match &tgt {
        AvTarget::SelfRef => {
            if state.tree().datum_flavor(src_datum) == Flavor::TypeAttribute {
                // Each member stands for itself on both sides.
                let mut visiting = HashSet::new();
                let members = type_attr_members(state, src_datum, &mut visiting)?;
                members
                    .ones()
                    .map(|bit| ((bit + 1) as u32, (bit + 1) as u32))
                    .collect()
            } else {
                let value = state.value(src_datum)?;
                vec![(value, value)]
            }
        }
        AvTarget::Ref(r) => {
            vec![(state.value(src_datum)?, ref_value(state, r)?)]
        }
    };

    let dontaudit = kind == AvRuleKind::DontAudit;
    let targets = expand_classperms(state, node, &classperms, dontaudit)?;
    let location = state.location(node);

    let mut sink = sink;
    for &(source, target) in &pairs {
        for &(class, mask) in &targets {
            match &mut sink {
                AvSink::Neverallow(record) => {
                    state.neverallows.add_tuple(
                        *record,
                        NeverallowTuple {
                            source,
                            target,
                            class,
                            mask,
                        },
                    );
                }
                AvSink::TopLevel => {
                    state
                        .neverallows
                        .check(source, target, class, mask, location)?;
                    let key = avtab_key(kind, source, target, class);
                    state.pdb.te_avtab.insert_merging(key, mask);
                }
                AvSink::Conditional(positions) => {
                    state
                        .neverallows
                        .check(source, target, class, mask, location)?;
                    let key = avtab_key(kind, source, target, class);
                    positions.push(state.pdb.te_cond_avtab.insert_nonunique(key, mask));
                }
            }
        }
    }
    Ok(sink)
}

fn avtab_key(kind: AvRuleKind, source: u32, target: u32, class: u32) -> AvtabKey {
    AvtabKey {
        source,
        target,
        class,
        kind: match kind {
            AvRuleKind::Allow => AvtabKind::Allowed,
            AvRuleKind::AuditAllow => AvtabKind::AuditAllow,
            AvRuleKind::DontAudit => AvtabKind::AuditDeny,
            AvRuleKind::Neverallow => unreachable!("neverallows are indexed, not inserted"),
        },
    }
}

/// Expands a class permission set into `(class value, permission mask)`
/// pairs, iterating classmap members when the class is a classmap.
fn expand_classperms(
    state: &LowerState<'_>,
    node: NodeId,
    spec: &Spec<ClassPermSetData>,
    dontaudit: bool,
) -> Result<Vec<(u32, u32)>> {
    let data = classperms_data(state, spec)?;
    let mut out = Vec::new();
    expand_cps_data(state, node, &data, dontaudit, &mut out)?;
    Ok(out)
}

fn classperms_data(state: &LowerState<'_>, spec: &Spec<ClassPermSetData>) -> Result<ClassPermSetData> {
    match spec {
        Spec::Inline(data) => Ok(data.clone()),
        Spec::Named(r) => {
            let datum = r.datum().expect("classperms were resolved");
            let node = state.tree().datum(datum).primary();
            match &state.tree().node(node).payload {
                Payload::ClassPermSet { data } => Ok(data.clone()),
                _ => unreachable!("resolver checked the flavor"),
            }
        }
    }
}

fn expand_cps_data(
    state: &LowerState<'_>,
    node: NodeId,
    data: &ClassPermSetData,
    dontaudit: bool,
    out: &mut Vec<(u32, u32)>,
) -> Result<()> {
    let class_datum = data.class.datum().expect("classperms were resolved");
    match state.tree().datum_flavor(class_datum) {
        Flavor::Class => {
            let class_value = state.value(class_datum)?;
            let mut mask = perms_to_mask(state, &data.perms)?;
            if dontaudit {
                mask = !mask;
            }
            out.push((class_value, mask));
        }
        Flavor::MapClass => {
            // Each referenced map permission carries its own list of
            // concrete class permission sets.
            for &map_perm in &data.perms {
                let perm_node = state.tree().datum(map_perm).primary();
                let sets = match &state.tree().node(perm_node).payload {
                    Payload::MapPerm { classperms } => classperms.clone(),
                    _ => unreachable!("classmap perms are map perms"),
                };
                for set in &sets {
                    let inner = classperms_data(state, set)?;
                    expand_cps_data(state, node, &inner, dontaudit, out)?;
                }
            }
        }
        _ => unreachable!("resolver checked the class flavor"),
    }
    Ok(())
}

fn perms_to_mask(state: &LowerState<'_>, perms: &[DatumId]) -> Result<u32> {
    let mut mask = 0u32;
    for &perm in perms {
        mask |= 1 << (state.value(perm)? - 1);
    }
    Ok(mask)
}

// ═══════════════════════════════════════════════════════════════════
// Pass 3: conditionals
// ═══════════════════════════════════════════════════════════════════

fn lower_booleanif(state: &mut LowerState<'_>, node: NodeId) -> Result<()> {
    let expr = match &state.tree().node(node).payload {
        Payload::BooleanIf { expr } => expr.clone(),
        _ => unreachable!("dispatched on flavor"),
    };

    let mut cond = CondNode::default();
    for token in &expr.tokens {
        cond.expr.push(match token {
            BoolToken::Ref(r) => CondToken::Bool(ref_value(state, r)?),
            BoolToken::Op(BoolOp::Not) => CondToken::Not,
            BoolToken::Op(BoolOp::And) => CondToken::And,
            BoolToken::Op(BoolOp::Or) => CondToken::Or,
            BoolToken::Op(BoolOp::Xor) => CondToken::Xor,
            BoolToken::Op(BoolOp::Eq) => CondToken::Eq,
            BoolToken::Op(BoolOp::Neq) => CondToken::Neq,
        });
    }

    for branch_node in state.tree().node(node).children.clone() {
        let branch = match &state.tree().node(branch_node).payload {
            Payload::CondBlock { branch } => *branch,
            _ => {
                return Err(CompileError::new(
                    ErrorKind::ParseInputMalformed,
                    state.location(branch_node),
                    "booleanif may contain only condition blocks",
                ))
            }
        };
        let mut positions = Vec::new();
        for rule in state.tree().node(branch_node).children.clone() {
            match state.tree().flavor(rule) {
                Flavor::AvRule => {
                    if avrule_kind(state.tree(), rule) == AvRuleKind::Neverallow {
                        return Err(CompileError::new(
                            ErrorKind::ParseInputMalformed,
                            state.location(rule),
                            "neverallow is not allowed inside a booleanif",
                        ));
                    }
                    let sink = lower_avrule(state, rule, AvSink::Conditional(positions))?;
                    positions = match sink {
                        AvSink::Conditional(p) => p,
                        _ => unreachable!("sink variant is preserved"),
                    };
                }
                Flavor::TypeRule => {
                    positions.push(lower_type_rule(state, rule, true)?);
                }
                _ => {
                    return Err(CompileError::new(
                        ErrorKind::ParseInputMalformed,
                        state.location(rule),
                        "invalid statement within booleanif",
                    ))
                }
            }
        }
        match branch {
            CondBranch::True => cond.true_list = positions,
            CondBranch::False => cond.false_list = positions,
        }
    }

    state.pdb.cond_list.push(cond);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════
// Object contexts
// ═══════════════════════════════════════════════════════════════════

fn ip_of(tree: &Tree, spec: &Spec<IpAddr>) -> IpAddr {
    match spec {
        Spec::Inline(addr) => *addr,
        Spec::Named(r) => {
            let datum = r.datum().expect("ipaddr was resolved");
            let node = tree.datum(datum).primary();
            match &tree.node(node).payload {
                Payload::IpAddr { addr } => *addr,
                _ => unreachable!("resolver checked the flavor"),
            }
        }
    }
}

fn lower_ocontexts(state: &mut LowerState<'_>, sorts: &ContextSorts) -> Result<()> {
    let mls = state.options.mls;

    for &node in &sorts.ports {
        let rec = match &state.tree().node(node).payload {
            Payload::PortCon {
                proto,
                low,
                high,
                context,
            } => PortConRec {
                protocol: match proto {
                    Protocol::Tcp => 6,
                    Protocol::Udp => 17,
                },
                low: *low,
                high: *high,
                context: lower_context(state.tree(), &state.maps, mls, context)?,
            },
            _ => unreachable!("sorted list holds portcons"),
        };
        state.pdb.ocontexts.ports.push(rec);
    }

    for &node in &sorts.netifs {
        let rec = match &state.tree().node(node).payload {
            Payload::NetifCon {
                interface,
                if_context,
                packet_context,
            } => NetifConRec {
                name: interface.clone(),
                if_context: lower_context(state.tree(), &state.maps, mls, if_context)?,
                packet_context: lower_context(state.tree(), &state.maps, mls, packet_context)?,
            },
            _ => unreachable!("sorted list holds netifcons"),
        };
        state.pdb.ocontexts.netifs.push(rec);
    }

    for &node in &sorts.nodes {
        let (addr, mask, context) = match &state.tree().node(node).payload {
            Payload::NodeCon {
                addr,
                mask,
                context,
            } => (
                ip_of(state.tree(), addr),
                ip_of(state.tree(), mask),
                lower_context(state.tree(), &state.maps, mls, context)?,
            ),
            _ => unreachable!("sorted list holds nodecons"),
        };
        match (addr, mask) {
            (IpAddr::V4(addr), IpAddr::V4(mask)) => {
                state
                    .pdb
                    .ocontexts
                    .nodes
                    .push(NodeConRec { addr, mask, context });
            }
            (IpAddr::V6(addr), IpAddr::V6(mask)) => {
                state
                    .pdb
                    .ocontexts
                    .nodes6
                    .push(Node6ConRec { addr, mask, context });
            }
            _ => unreachable!("resolver checked the families match"),
        }
    }

    for &node in &sorts.fsuse {
        let rec = match &state.tree().node(node).payload {
            Payload::FsUse {
                behavior,
                fs,
                context,
            } => FsUseRec {
                behavior: match behavior {
                    FsUseBehavior::Xattr => FsUseKind::Xattr,
                    FsUseBehavior::Task => FsUseKind::Task,
                    FsUseBehavior::Trans => FsUseKind::Trans,
                },
                name: fs.clone(),
                context: lower_context(state.tree(), &state.maps, mls, context)?,
            },
            _ => unreachable!("sorted list holds fsuse statements"),
        };
        state.pdb.ocontexts.fsuse.push(rec);
    }

    for &node in &sorts.genfs {
        let (fs, path, context) = match &state.tree().node(node).payload {
            Payload::GenfsCon { fs, path, context } => (
                fs.clone(),
                path.clone(),
                lower_context(state.tree(), &state.maps, mls, context)?,
            ),
            _ => unreachable!("sorted list holds genfscons"),
        };
        // The array is sorted by filesystem, so groups are contiguous.
        match state.pdb.genfs.last_mut() {
            Some(group) if group.fstype == fs => group.paths.push((path, context)),
            _ => state.pdb.genfs.push(GenfsGroup {
                fstype: fs,
                paths: vec![(path, context)],
            }),
        }
    }

    if state.options.target_platform == TargetPlatform::Xen {
        for &node in &sorts.pirqs {
            let rec = match &state.tree().node(node).payload {
                Payload::PirqCon { pirq, context } => PirqConRec {
                    pirq: *pirq,
                    context: lower_context(state.tree(), &state.maps, mls, context)?,
                },
                _ => unreachable!("sorted list holds pirqcons"),
            };
            state.pdb.ocontexts.pirqs.push(rec);
        }
        for &node in &sorts.iomems {
            let rec = match &state.tree().node(node).payload {
                Payload::IomemCon { low, high, context } => IomemConRec {
                    low: *low,
                    high: *high,
                    context: lower_context(state.tree(), &state.maps, mls, context)?,
                },
                _ => unreachable!("sorted list holds iomemcons"),
            };
            state.pdb.ocontexts.iomems.push(rec);
        }
        for &node in &sorts.ioports {
            let rec = match &state.tree().node(node).payload {
                Payload::IoportCon { low, high, context } => IoportConRec {
                    low: *low,
                    high: *high,
                    context: lower_context(state.tree(), &state.maps, mls, context)?,
                },
                _ => unreachable!("sorted list holds ioportcons"),
            };
            state.pdb.ocontexts.ioports.push(rec);
        }
        for &node in &sorts.pcidevices {
            let rec = match &state.tree().node(node).payload {
                Payload::PciDeviceCon { device, context } => PciDeviceConRec {
                    device: *device,
                    context: lower_context(state.tree(), &state.maps, mls, context)?,
                },
                _ => unreachable!("sorted list holds pcidevicecons"),
            };
            state.pdb.ocontexts.pcidevices.push(rec);
        }
    }
    Ok(())
}

/// Builds the type↔attribute maps: every type maps to itself, every
/// attribute to its members, and every member back to its attributes.
fn finalize_attr_maps(state: &mut LowerState<'_>) {
    let nprim = state.pdb.types.nprim as usize;
    let mut type_attr_map: Vec<Bitmap> = Vec::with_capacity(nprim);
    let mut attr_type_map: Vec<Bitmap> = Vec::with_capacity(nprim);
    for i in 0..nprim {
        let mut self_map = Bitmap::new();
        self_map.set(i);
        type_attr_map.push(self_map.clone());
        attr_type_map.push(self_map);
    }

    for (attr, members) in &state.attr_members {
        let value = match state.maps.value(&state.db.tree, *attr) {
            Ok(v) => v,
            Err(_) => continue,
        };
        attr_type_map[(value - 1) as usize] = members.clone();
        for member in members.ones() {
            type_attr_map[member].set((value - 1) as usize);
        }
    }

    state.pdb.type_attr_map = type_attr_map;
    state.pdb.attr_type_map = attr_type_map;
}
