//! Node flavors and symbol kinds.
//!
//! Every AST node has a [`Flavor`] derived from its payload variant. The
//! original implementation tagged nodes with a numeric flavor and compared
//! against a `MIN_DECLARATIVE` threshold; here the same partition is an
//! explicit predicate, [`Flavor::is_declarative`], and the flavor → symbol
//! table mapping is [`Flavor::sym_kind`].

/// The kind of statement or declaration a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    Root,

    // Declarations (own a datum).
    Block,
    Optional,
    Macro,
    Perm,
    MapPerm,
    Common,
    Class,
    MapClass,
    ClassPermSet,
    Sid,
    User,
    Role,
    RoleAttribute,
    Type,
    TypeAttribute,
    TypeAlias,
    Bool,
    Tunable,
    Sens,
    SensAlias,
    Cat,
    CatAlias,
    CatRange,
    CatSet,
    Level,
    LevelRange,
    Context,
    IpAddr,
    PolicyCap,

    // Statements.
    Call,
    BooleanIf,
    TunableIf,
    CondBlock,
    In,
    BlockInherit,
    BlockAbstract,
    ClassCommon,
    ClassMapping,
    SidContext,
    CatOrder,
    Dominance,
    SensCat,
    AvRule,
    TypeRule,
    TypeAttributeSet,
    TypeBounds,
    TypePermissive,
    NameTypeTransition,
    RangeTransition,
    RoleTransition,
    RoleAllow,
    RoleType,
    RoleAttributeSet,
    RoleBounds,
    UserRole,
    UserLevel,
    UserRange,
    UserBounds,
    UserPrefix,
    SelinuxUser,
    SelinuxUserDefault,
    FileCon,
    PortCon,
    NodeCon,
    GenfsCon,
    NetifCon,
    PirqCon,
    IomemCon,
    IoportCon,
    PciDeviceCon,
    FsUse,
    Constrain,
    ValidateTrans,
}

impl Flavor {
    /// Whether nodes of this flavor declare a named entity and own a datum.
    pub fn is_declarative(self) -> bool {
        use Flavor::*;
        matches!(
            self,
            Block
                | Optional
                | Macro
                | Perm
                | MapPerm
                | Common
                | Class
                | MapClass
                | ClassPermSet
                | Sid
                | User
                | Role
                | RoleAttribute
                | Type
                | TypeAttribute
                | TypeAlias
                | Bool
                | Tunable
                | Sens
                | SensAlias
                | Cat
                | CatAlias
                | CatRange
                | CatSet
                | Level
                | LevelRange
                | Context
                | IpAddr
                | PolicyCap
        )
    }

    /// The scope-level symbol table this flavor declares into.
    ///
    /// Permissions (`Perm`, `MapPerm`) return `None`: they live in the
    /// private table of their class, classmap, or common.
    pub fn sym_kind(self) -> Option<SymKind> {
        use Flavor::*;
        Some(match self {
            Block | Optional | Macro => SymKind::Blocks,
            Class | MapClass => SymKind::Classes,
            ClassPermSet => SymKind::ClassPermSets,
            Common => SymKind::Commons,
            Role | RoleAttribute => SymKind::Roles,
            Type | TypeAttribute | TypeAlias => SymKind::Types,
            User => SymKind::Users,
            Bool => SymKind::Bools,
            Tunable => SymKind::Tunables,
            Sens | SensAlias => SymKind::Sens,
            Cat | CatAlias | CatRange | CatSet => SymKind::Cats,
            Level => SymKind::Levels,
            LevelRange => SymKind::LevelRanges,
            Context => SymKind::Contexts,
            Sid => SymKind::Sids,
            IpAddr => SymKind::IpAddrs,
            _ => return None,
        })
    }
}

/// Index of a per-scope symbol table partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymKind {
    Blocks,
    Classes,
    ClassPermSets,
    Commons,
    Roles,
    Types,
    Users,
    Bools,
    Tunables,
    Sens,
    Cats,
    Levels,
    LevelRanges,
    Contexts,
    Sids,
    IpAddrs,
}

/// Number of symbol kinds; the size of each scope's table array.
pub const SYM_KIND_COUNT: usize = 16;

impl SymKind {
    /// Index into a scope's table array.
    pub fn index(self) -> usize {
        self as usize
    }
}
