//! Node payloads: one exhaustive enum with typed per-flavor data.
//!
//! The original implementation stored a numeric flavor plus a `void*`
//! payload and cast at each use site. Here every statement kind is a
//! [`Payload`] variant carrying exactly its own fields, and each name
//! reference is a [`Ref`] that starts as a string and is rewritten to a
//! datum id by the resolver.
//!
//! Compound positions — levels, level ranges, category sets, ip addresses,
//! class permission sets, contexts — may appear either as a reference to a
//! named declaration or as an inline literal. Those positions use
//! [`Spec<T>`], which replaces the original's "anonymous datum" objects:
//! a literal is simply carried (and later resolved) in place.

use crate::flavor::{Flavor, SymKind};
use crate::node::DatumId;
use crate::symtab::SymbolTable;
use std::net::IpAddr;

// ═══════════════════════════════════════════════════════════════════
// References
// ═══════════════════════════════════════════════════════════════════

/// A name reference, textual until the resolver rewrites it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ref {
    /// Unresolved textual reference, possibly qualified (`a.b.c`) or
    /// absolute (`.a.b`).
    Name(String),
    /// Resolved reference to a declared datum.
    Resolved(DatumId),
}

impl Ref {
    /// Builds an unresolved reference.
    pub fn name(s: impl Into<String>) -> Self {
        Ref::Name(s.into())
    }

    /// The resolved datum, if resolution has happened.
    pub fn datum(&self) -> Option<DatumId> {
        match self {
            Ref::Resolved(d) => Some(*d),
            Ref::Name(_) => None,
        }
    }
}

/// A reference-or-literal position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Spec<T> {
    /// Reference to a named declaration (or macro parameter).
    Named(Ref),
    /// Inline literal, resolved in place.
    Inline(T),
}

impl<T> Spec<T> {
    /// Builds a named spec from a string.
    pub fn named(s: impl Into<String>) -> Self {
        Spec::Named(Ref::name(s))
    }
}

// ═══════════════════════════════════════════════════════════════════
// MLS data
// ═══════════════════════════════════════════════════════════════════

/// One element of a category set: a single category or a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatItem {
    Name(Ref),
    Range(CatRangeData),
}

/// A category set literal: categories and category ranges.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatSetData {
    pub items: Vec<CatItem>,
}

/// A contiguous category range `(low high)` over the merged category order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatRangeData {
    pub low: Ref,
    pub high: Ref,
}

/// A sensitivity with an optional category set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelData {
    pub sens: Ref,
    pub cats: Option<Spec<CatSetData>>,
}

/// A low/high pair of levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelRangeData {
    pub low: Spec<LevelData>,
    pub high: Spec<LevelData>,
}

/// A security context `(user role type [range])`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextData {
    pub user: Ref,
    pub role: Ref,
    pub ty: Ref,
    pub range: Option<Spec<LevelRangeData>>,
}

// ═══════════════════════════════════════════════════════════════════
// Class permissions
// ═══════════════════════════════════════════════════════════════════

/// A class (or classmap) with a list of its permissions.
///
/// `perms` holds the resolved perm (or map-perm) datums; it is refilled on
/// every resolve so a restarted resolution does not accumulate duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassPermSetData {
    pub class: Ref,
    pub perm_names: Vec<String>,
    pub perms: Vec<DatumId>,
}

impl ClassPermSetData {
    /// Builds an unresolved set over the named class and permissions.
    pub fn new(class: impl Into<String>, perm_names: Vec<String>) -> Self {
        Self {
            class: Ref::name(class),
            perm_names,
            perms: Vec::new(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Expressions
// ═══════════════════════════════════════════════════════════════════

/// Boolean operators shared by tunable and boolean conditionals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    Not,
    And,
    Or,
    Xor,
    Eq,
    Neq,
}

/// One token of a postfix boolean expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoolToken {
    Ref(Ref),
    Op(BoolOp),
}

/// A postfix boolean expression over booleans or tunables.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoolExpr {
    pub tokens: Vec<BoolToken>,
}

impl BoolExpr {
    /// A single-name expression, the common case.
    pub fn name(s: impl Into<String>) -> Self {
        BoolExpr {
            tokens: vec![BoolToken::Ref(Ref::name(s))],
        }
    }
}

/// Set operators for attribute-set expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    And,
    Or,
    Xor,
    Not,
}

/// One token of a postfix set expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetToken {
    Ref(Ref),
    Op(SetOp),
}

/// A postfix set expression over type or role names and attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetExpr {
    pub tokens: Vec<SetToken>,
}

impl SetExpr {
    /// The union of the given names (no operators), the common case.
    pub fn names<I: IntoIterator<Item = S>, S: Into<String>>(names: I) -> Self {
        let mut tokens = Vec::new();
        for (i, n) in names.into_iter().enumerate() {
            tokens.push(SetToken::Ref(Ref::name(n)));
            if i > 0 {
                tokens.push(SetToken::Op(SetOp::Or));
            }
        }
        SetExpr { tokens }
    }
}

/// Constraint keyword operands (`u1`, `t2`, `l1`, …).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsKey {
    U1,
    U2,
    U3,
    R1,
    R2,
    R3,
    T1,
    T2,
    T3,
    L1,
    L2,
    H1,
    H2,
}

/// Comparison operators inside constraint expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsCmp {
    Eq,
    Neq,
    Dom,
    DomBy,
    Incomp,
}

/// Right operand of a constraint comparison: a keyword or a named
/// user/role/type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsOperand {
    Key(ConsKey),
    Name(Ref),
}

/// A prefix-form constraint expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsExpr {
    Cmp {
        op: ConsCmp,
        left: ConsKey,
        right: ConsOperand,
    },
    Not(Box<ConsExpr>),
    And(Box<ConsExpr>, Box<ConsExpr>),
    Or(Box<ConsExpr>, Box<ConsExpr>),
}

// ═══════════════════════════════════════════════════════════════════
// Rules and statements
// ═══════════════════════════════════════════════════════════════════

/// Access-vector rule kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvRuleKind {
    Allow,
    AuditAllow,
    DontAudit,
    Neverallow,
}

/// Type rule kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRuleKind {
    Transition,
    Change,
    Member,
}

/// The target of an access-vector rule: a type reference or the literal
/// `self`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvTarget {
    Ref(Ref),
    SelfRef,
}

impl AvTarget {
    /// Builds a target from source text, mapping the `self` keyword.
    pub fn name(s: impl Into<String>) -> Self {
        let s = s.into();
        if s == "self" {
            AvTarget::SelfRef
        } else {
            AvTarget::Ref(Ref::Name(s))
        }
    }
}

/// Macro parameter kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Type,
    Role,
    User,
    Sens,
    Cat,
    Bool,
    CatSet,
    Level,
    LevelRange,
    IpAddr,
    Class,
    MapClass,
    ClassPermSet,
}

impl ParamKind {
    /// Whether call arguments of this kind may be inline literals.
    pub fn is_compound(self) -> bool {
        matches!(
            self,
            ParamKind::CatSet
                | ParamKind::Level
                | ParamKind::LevelRange
                | ParamKind::IpAddr
                | ParamKind::ClassPermSet
        )
    }

    /// The symbol table a name argument of this kind resolves in.
    pub fn sym_kind(self) -> SymKind {
        match self {
            ParamKind::Type => SymKind::Types,
            ParamKind::Role => SymKind::Roles,
            ParamKind::User => SymKind::Users,
            ParamKind::Sens => SymKind::Sens,
            ParamKind::Cat | ParamKind::CatSet => SymKind::Cats,
            ParamKind::Bool => SymKind::Bools,
            ParamKind::Level => SymKind::Levels,
            ParamKind::LevelRange => SymKind::LevelRanges,
            ParamKind::IpAddr => SymKind::IpAddrs,
            ParamKind::Class | ParamKind::MapClass => SymKind::Classes,
            ParamKind::ClassPermSet => SymKind::ClassPermSets,
        }
    }
}

/// A macro parameter: kind plus name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub kind: ParamKind,
    pub name: String,
}

/// A raw call argument as delivered by the parser: a bare name or an
/// inline literal. Literals are validated against the parameter kind when
/// the call is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallArg {
    Name(String),
    CatSet(CatSetData),
    Level(LevelData),
    LevelRange(LevelRangeData),
    IpAddr(IpAddr),
    ClassPermSet(ClassPermSetData),
}

/// A typed call argument, built when the call resolves its macro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub param: String,
    pub kind: ParamKind,
    pub value: ArgValue,
}

/// The value of a typed call argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    /// A name, resolved against the call site in pass CALL2.
    Ref(Ref),
    /// An inline literal, cloned to each use site during resolution.
    CatSet(CatSetData),
    Level(LevelData),
    LevelRange(LevelRangeData),
    IpAddr(IpAddr),
    ClassPermSet(ClassPermSetData),
}

/// Which branch of a conditional a condblock holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondBranch {
    True,
    False,
}

/// Transport protocol of a portcon statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

/// Labeling behavior of an fsuse statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsUseBehavior {
    Xattr,
    Task,
    Trans,
}

// ═══════════════════════════════════════════════════════════════════
// Payload
// ═══════════════════════════════════════════════════════════════════

/// The data carried by one AST node, one variant per flavor.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Root,

    Block {
        is_abstract: bool,
    },
    Optional,
    Macro {
        params: Vec<Param>,
    },
    Perm,
    MapPerm {
        /// Class permission sets attached by classmapping statements.
        /// Refilled on every resolve.
        classperms: Vec<Spec<ClassPermSetData>>,
    },
    Common {
        perms: SymbolTable,
    },
    Class {
        /// Attached common, set by a classcommon statement.
        common: Option<DatumId>,
        perms: SymbolTable,
    },
    MapClass {
        perms: SymbolTable,
    },
    ClassPermSet {
        data: ClassPermSetData,
    },
    Sid {
        /// Context attached by a sidcontext statement.
        context: Option<Spec<ContextData>>,
    },
    User {
        dftlevel: Option<Spec<LevelData>>,
        range: Option<Spec<LevelRangeData>>,
        bounds: Option<DatumId>,
    },
    Role {
        bounds: Option<DatumId>,
    },
    RoleAttribute {
        /// Resolved role-set expressions appended by roleattributeset.
        exprs: Vec<SetExpr>,
    },
    Type {
        bounds: Option<DatumId>,
    },
    TypeAttribute {
        /// Resolved type-set expressions appended by typeattributeset.
        exprs: Vec<SetExpr>,
    },
    TypeAlias {
        target: Ref,
        /// The concrete type at the end of the alias chain.
        ty: Option<DatumId>,
    },
    Bool {
        value: bool,
    },
    Tunable {
        value: bool,
    },
    Sens {
        /// Category sets associated by sensitivitycategory statements.
        cats: Vec<Spec<CatSetData>>,
    },
    SensAlias {
        target: Ref,
    },
    Cat,
    CatAlias {
        target: Ref,
    },
    CatRange {
        data: CatRangeData,
    },
    CatSet {
        data: CatSetData,
    },
    Level {
        data: LevelData,
    },
    LevelRange {
        data: LevelRangeData,
    },
    Context {
        data: ContextData,
    },
    IpAddr {
        addr: IpAddr,
    },
    PolicyCap,

    Call {
        macro_ref: Ref,
        args_in: Vec<CallArg>,
        args: Vec<Arg>,
        copied: bool,
    },
    BooleanIf {
        expr: BoolExpr,
    },
    TunableIf {
        expr: BoolExpr,
    },
    CondBlock {
        branch: CondBranch,
    },
    In {
        block: Ref,
    },
    BlockInherit {
        block: Ref,
        /// Set once the body has been copied, so a restarted resolution
        /// does not duplicate it.
        copied: bool,
    },
    BlockAbstract {
        block: Ref,
    },
    ClassCommon {
        class: Ref,
        common: Ref,
    },
    ClassMapping {
        map_class: Ref,
        map_perm: String,
        classpermsets: Vec<Spec<ClassPermSetData>>,
    },
    SidContext {
        sid: Ref,
        context: Spec<ContextData>,
    },
    CatOrder {
        order: Vec<String>,
    },
    Dominance {
        order: Vec<String>,
    },
    SensCat {
        sens: Ref,
        cats: Spec<CatSetData>,
    },
    AvRule {
        kind: AvRuleKind,
        src: Ref,
        tgt: AvTarget,
        classperms: Spec<ClassPermSetData>,
    },
    TypeRule {
        kind: TypeRuleKind,
        src: Ref,
        tgt: Ref,
        obj: Ref,
        result: Ref,
    },
    TypeAttributeSet {
        attr: Ref,
        expr: SetExpr,
    },
    TypeBounds {
        ty: Ref,
        bounds: Ref,
    },
    TypePermissive {
        ty: Ref,
    },
    NameTypeTransition {
        src: Ref,
        exec: Ref,
        proc: Ref,
        dest: Ref,
        path: String,
    },
    RangeTransition {
        src: Ref,
        exec: Ref,
        obj: Ref,
        range: Spec<LevelRangeData>,
    },
    RoleTransition {
        src: Ref,
        tgt: Ref,
        obj: Ref,
        result: Ref,
    },
    RoleAllow {
        src: Ref,
        tgt: Ref,
    },
    RoleType {
        role: Ref,
        ty: Ref,
    },
    RoleAttributeSet {
        attr: Ref,
        expr: SetExpr,
    },
    RoleBounds {
        role: Ref,
        bounds: Ref,
    },
    UserRole {
        user: Ref,
        role: Ref,
    },
    UserLevel {
        user: Ref,
        level: Spec<LevelData>,
    },
    UserRange {
        user: Ref,
        range: Spec<LevelRangeData>,
    },
    UserBounds {
        user: Ref,
        bounds: Ref,
    },
    UserPrefix {
        user: Ref,
        prefix: String,
    },
    SelinuxUser {
        name: String,
        user: Ref,
        range: Option<Spec<LevelRangeData>>,
    },
    SelinuxUserDefault {
        user: Ref,
        range: Option<Spec<LevelRangeData>>,
    },
    FileCon {
        path: String,
        context: Option<Spec<ContextData>>,
    },
    PortCon {
        proto: Protocol,
        low: u16,
        high: u16,
        context: Spec<ContextData>,
    },
    NodeCon {
        addr: Spec<IpAddr>,
        mask: Spec<IpAddr>,
        context: Spec<ContextData>,
    },
    GenfsCon {
        fs: String,
        path: String,
        context: Spec<ContextData>,
    },
    NetifCon {
        interface: String,
        if_context: Spec<ContextData>,
        packet_context: Spec<ContextData>,
    },
    PirqCon {
        pirq: u32,
        context: Spec<ContextData>,
    },
    IomemCon {
        low: u64,
        high: u64,
        context: Spec<ContextData>,
    },
    IoportCon {
        low: u32,
        high: u32,
        context: Spec<ContextData>,
    },
    PciDeviceCon {
        device: u32,
        context: Spec<ContextData>,
    },
    FsUse {
        behavior: FsUseBehavior,
        fs: String,
        context: Spec<ContextData>,
    },
    Constrain {
        mls: bool,
        classperms: Spec<ClassPermSetData>,
        expr: ConsExpr,
    },
    ValidateTrans {
        mls: bool,
        class: Ref,
        expr: ConsExpr,
    },
}

impl Payload {
    /// The flavor tag of this payload.
    pub fn flavor(&self) -> Flavor {
        use Payload::*;
        match self {
            Root => Flavor::Root,
            Block { .. } => Flavor::Block,
            Optional => Flavor::Optional,
            Macro { .. } => Flavor::Macro,
            Perm => Flavor::Perm,
            MapPerm { .. } => Flavor::MapPerm,
            Common { .. } => Flavor::Common,
            Class { .. } => Flavor::Class,
            MapClass { .. } => Flavor::MapClass,
            ClassPermSet { .. } => Flavor::ClassPermSet,
            Sid { .. } => Flavor::Sid,
            User { .. } => Flavor::User,
            Role { .. } => Flavor::Role,
            RoleAttribute { .. } => Flavor::RoleAttribute,
            Type { .. } => Flavor::Type,
            TypeAttribute { .. } => Flavor::TypeAttribute,
            TypeAlias { .. } => Flavor::TypeAlias,
            Bool { .. } => Flavor::Bool,
            Tunable { .. } => Flavor::Tunable,
            Sens { .. } => Flavor::Sens,
            SensAlias { .. } => Flavor::SensAlias,
            Cat => Flavor::Cat,
            CatAlias { .. } => Flavor::CatAlias,
            CatRange { .. } => Flavor::CatRange,
            CatSet { .. } => Flavor::CatSet,
            Level { .. } => Flavor::Level,
            LevelRange { .. } => Flavor::LevelRange,
            Context { .. } => Flavor::Context,
            IpAddr { .. } => Flavor::IpAddr,
            PolicyCap => Flavor::PolicyCap,
            Call { .. } => Flavor::Call,
            BooleanIf { .. } => Flavor::BooleanIf,
            TunableIf { .. } => Flavor::TunableIf,
            CondBlock { .. } => Flavor::CondBlock,
            In { .. } => Flavor::In,
            BlockInherit { .. } => Flavor::BlockInherit,
            BlockAbstract { .. } => Flavor::BlockAbstract,
            ClassCommon { .. } => Flavor::ClassCommon,
            ClassMapping { .. } => Flavor::ClassMapping,
            SidContext { .. } => Flavor::SidContext,
            CatOrder { .. } => Flavor::CatOrder,
            Dominance { .. } => Flavor::Dominance,
            SensCat { .. } => Flavor::SensCat,
            AvRule { .. } => Flavor::AvRule,
            TypeRule { .. } => Flavor::TypeRule,
            TypeAttributeSet { .. } => Flavor::TypeAttributeSet,
            TypeBounds { .. } => Flavor::TypeBounds,
            TypePermissive { .. } => Flavor::TypePermissive,
            NameTypeTransition { .. } => Flavor::NameTypeTransition,
            RangeTransition { .. } => Flavor::RangeTransition,
            RoleTransition { .. } => Flavor::RoleTransition,
            RoleAllow { .. } => Flavor::RoleAllow,
            RoleType { .. } => Flavor::RoleType,
            RoleAttributeSet { .. } => Flavor::RoleAttributeSet,
            RoleBounds { .. } => Flavor::RoleBounds,
            UserRole { .. } => Flavor::UserRole,
            UserLevel { .. } => Flavor::UserLevel,
            UserRange { .. } => Flavor::UserRange,
            UserBounds { .. } => Flavor::UserBounds,
            UserPrefix { .. } => Flavor::UserPrefix,
            SelinuxUser { .. } => Flavor::SelinuxUser,
            SelinuxUserDefault { .. } => Flavor::SelinuxUserDefault,
            FileCon { .. } => Flavor::FileCon,
            PortCon { .. } => Flavor::PortCon,
            NodeCon { .. } => Flavor::NodeCon,
            GenfsCon { .. } => Flavor::GenfsCon,
            NetifCon { .. } => Flavor::NetifCon,
            PirqCon { .. } => Flavor::PirqCon,
            IomemCon { .. } => Flavor::IomemCon,
            IoportCon { .. } => Flavor::IoportCon,
            PciDeviceCon { .. } => Flavor::PciDeviceCon,
            FsUse { .. } => Flavor::FsUse,
            Constrain { .. } => Flavor::Constrain,
            ValidateTrans { .. } => Flavor::ValidateTrans,
        }
    }

    /// A human-readable statement name for diagnostics.
    pub fn statement_name(&self) -> &'static str {
        match self.flavor() {
            Flavor::Root => "root",
            Flavor::Block => "block",
            Flavor::Optional => "optional",
            Flavor::Macro => "macro",
            Flavor::Perm => "permission",
            Flavor::MapPerm => "classmap permission",
            Flavor::Common => "common",
            Flavor::Class => "class",
            Flavor::MapClass => "classmap",
            Flavor::ClassPermSet => "classpermissionset",
            Flavor::Sid => "sid",
            Flavor::User => "user",
            Flavor::Role => "role",
            Flavor::RoleAttribute => "roleattribute",
            Flavor::Type => "type",
            Flavor::TypeAttribute => "typeattribute",
            Flavor::TypeAlias => "typealias",
            Flavor::Bool => "boolean",
            Flavor::Tunable => "tunable",
            Flavor::Sens => "sensitivity",
            Flavor::SensAlias => "sensitivityalias",
            Flavor::Cat => "category",
            Flavor::CatAlias => "categoryalias",
            Flavor::CatRange => "categoryrange",
            Flavor::CatSet => "categoryset",
            Flavor::Level => "level",
            Flavor::LevelRange => "levelrange",
            Flavor::Context => "context",
            Flavor::IpAddr => "ipaddr",
            Flavor::PolicyCap => "policycap",
            Flavor::Call => "call",
            Flavor::BooleanIf => "booleanif",
            Flavor::TunableIf => "tunableif",
            Flavor::CondBlock => "condition block",
            Flavor::In => "in",
            Flavor::BlockInherit => "blockinherit",
            Flavor::BlockAbstract => "blockabstract",
            Flavor::ClassCommon => "classcommon",
            Flavor::ClassMapping => "classmapping",
            Flavor::SidContext => "sidcontext",
            Flavor::CatOrder => "categoryorder",
            Flavor::Dominance => "dominance",
            Flavor::SensCat => "sensitivitycategory",
            Flavor::AvRule => "avrule",
            Flavor::TypeRule => "typerule",
            Flavor::TypeAttributeSet => "typeattributeset",
            Flavor::TypeBounds => "typebounds",
            Flavor::TypePermissive => "typepermissive",
            Flavor::NameTypeTransition => "nametypetransition",
            Flavor::RangeTransition => "rangetransition",
            Flavor::RoleTransition => "roletransition",
            Flavor::RoleAllow => "roleallow",
            Flavor::RoleType => "roletype",
            Flavor::RoleAttributeSet => "roleattributeset",
            Flavor::RoleBounds => "rolebounds",
            Flavor::UserRole => "userrole",
            Flavor::UserLevel => "userlevel",
            Flavor::UserRange => "userrange",
            Flavor::UserBounds => "userbounds",
            Flavor::UserPrefix => "userprefix",
            Flavor::SelinuxUser => "selinuxuser",
            Flavor::SelinuxUserDefault => "selinuxuserdefault",
            Flavor::FileCon => "filecon",
            Flavor::PortCon => "portcon",
            Flavor::NodeCon => "nodecon",
            Flavor::GenfsCon => "genfscon",
            Flavor::NetifCon => "netifcon",
            Flavor::PirqCon => "pirqcon",
            Flavor::IomemCon => "iomemcon",
            Flavor::IoportCon => "ioportcon",
            Flavor::PciDeviceCon => "pcidevicecon",
            Flavor::FsUse => "fsuse",
            Flavor::Constrain => "constrain",
            Flavor::ValidateTrans => "validatetrans",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_flavor_matches_variant() {
        let p = Payload::Type { bounds: None };
        assert_eq!(p.flavor(), Flavor::Type);
        assert!(p.flavor().is_declarative());
    }

    #[test]
    fn av_target_maps_self_keyword() {
        assert_eq!(AvTarget::name("self"), AvTarget::SelfRef);
        assert_eq!(AvTarget::name("t_a"), AvTarget::Ref(Ref::name("t_a")));
    }

    #[test]
    fn set_expr_names_builds_postfix_union() {
        let expr = SetExpr::names(["a", "b", "c"]);
        assert_eq!(expr.tokens.len(), 5);
        assert_eq!(expr.tokens[0], SetToken::Ref(Ref::name("a")));
        assert_eq!(expr.tokens[2], SetToken::Op(SetOp::Or));
    }

    #[test]
    fn compound_params_accept_literals() {
        assert!(ParamKind::Level.is_compound());
        assert!(!ParamKind::Type.is_compound());
        assert_eq!(ParamKind::CatSet.sym_kind(), SymKind::Cats);
    }
}
