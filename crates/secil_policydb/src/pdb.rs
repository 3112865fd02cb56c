//! The policy database: the lowering output.
//!
//! Eight numbered symbol tables (values dense from 1, 0 reserved for
//! "unassigned"), the access-vector tables, conditional nodes, the
//! relation chains, object contexts, genfs groups, and the global bitmaps.
//! Chains that the original kept as singly-linked lists are vectors in
//! declaration order; the downstream serializer is promised logical
//! content and a deterministic order, nothing more.

use crate::avtab::Avtab;
use crate::cond::CondNode;
use crate::constraint::Constraint;
use crate::context::{MlsLevel, MlsRange, PdbContext};
use secil_base::{Bitmap, CompileError, ErrorKind, Location, Result};
use std::collections::HashMap;

/// An insertion-ordered symbol table with a primary-value counter.
///
/// `nprim` counts primary entries; aliases are inserted without bumping it
/// and share their target's value.
#[derive(Debug, Clone)]
pub struct PdbSymtab<T> {
    names: Vec<String>,
    data: Vec<T>,
    map: HashMap<String, usize>,
    pub nprim: u32,
}

impl<T> Default for PdbSymtab<T> {
    fn default() -> Self {
        PdbSymtab {
            names: Vec::new(),
            data: Vec::new(),
            map: HashMap::new(),
            nprim: 0,
        }
    }
}

impl<T> PdbSymtab<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the next primary value.
    pub fn next_value(&mut self) -> u32 {
        self.nprim += 1;
        self.nprim
    }

    /// Inserts `name`, failing on collision.
    pub fn insert(&mut self, name: &str, datum: T, location: Location) -> Result<()> {
        if self.map.contains_key(name) {
            return Err(CompileError::new(
                ErrorKind::DuplicateDeclaration,
                location,
                format!("{} is already in the policy database", name),
            ));
        }
        self.map.insert(name.to_owned(), self.data.len());
        self.names.push(name.to_owned());
        self.data.push(datum);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.map.get(name).map(|&i| &self.data[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        let i = *self.map.get(name)?;
        Some(&mut self.data[i])
    }

    /// Iterates `(name, datum)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.names.iter().map(|n| n.as_str()).zip(self.data.iter())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════
// Typed datums
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct PermDatum {
    pub value: u32,
}

#[derive(Debug, Clone, Default)]
pub struct CommonDatum {
    pub value: u32,
    pub perms: PdbSymtab<PermDatum>,
}

#[derive(Debug, Clone, Default)]
pub struct ClassDatum {
    pub value: u32,
    /// Name of the attached common, if any.
    pub common: Option<String>,
    pub perms: PdbSymtab<PermDatum>,
    pub constraints: Vec<Constraint>,
    pub validatetrans: Vec<Constraint>,
}

#[derive(Debug, Clone, Default)]
pub struct RoleDatum {
    pub value: u32,
    /// Bounding role value; 0 when unbounded.
    pub bounds: u32,
    /// Types authorized for the role, by `value - 1`.
    pub types: Bitmap,
}

#[derive(Debug, Clone, Default)]
pub struct TypeDatum {
    pub value: u32,
    /// Set on the declaration, clear on aliases sharing the value.
    pub primary: bool,
    /// Set when this entry is a type attribute.
    pub attribute: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UserDatum {
    pub value: u32,
    /// Roles authorized for the user, by `value - 1`.
    pub roles: Bitmap,
    pub dfltlevel: Option<MlsLevel>,
    pub range: Option<MlsRange>,
}

#[derive(Debug, Clone, Default)]
pub struct BoolDatum {
    pub value: u32,
    pub state: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LevelDatum {
    /// The sensitivity value (levels are numbered by dominance order).
    pub sens: u32,
    /// Categories associated with the sensitivity.
    pub level: MlsLevel,
    pub isalias: bool,
    pub defined: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CatDatum {
    pub value: u32,
    pub isalias: bool,
}

// ═══════════════════════════════════════════════════════════════════
// Relations and contexts
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleTransRec {
    pub role: u32,
    pub ty: u32,
    pub class: u32,
    pub new_role: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleAllowRec {
    pub role: u32,
    pub new_role: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameTransRec {
    pub stype: u32,
    pub ttype: u32,
    pub tclass: u32,
    pub otype: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeTransRec {
    pub source_type: u32,
    pub target_type: u32,
    pub target_class: u32,
    pub target_range: MlsRange,
}

/// Initial-sid context entry.
#[derive(Debug, Clone)]
pub struct IsidCon {
    pub sid: u32,
    pub name: String,
    pub context: Option<PdbContext>,
}

#[derive(Debug, Clone)]
pub struct PortConRec {
    /// IP protocol number (6 tcp, 17 udp).
    pub protocol: u8,
    pub low: u16,
    pub high: u16,
    pub context: PdbContext,
}

#[derive(Debug, Clone)]
pub struct NetifConRec {
    pub name: String,
    pub if_context: PdbContext,
    pub packet_context: PdbContext,
}

#[derive(Debug, Clone)]
pub struct NodeConRec {
    pub addr: std::net::Ipv4Addr,
    pub mask: std::net::Ipv4Addr,
    pub context: PdbContext,
}

#[derive(Debug, Clone)]
pub struct Node6ConRec {
    pub addr: std::net::Ipv6Addr,
    pub mask: std::net::Ipv6Addr,
    pub context: PdbContext,
}

#[derive(Debug, Clone)]
pub struct FsUseRec {
    pub behavior: FsUseKind,
    pub name: String,
    pub context: PdbContext,
}

/// fsuse labeling behaviors, numbered as the kernel expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsUseKind {
    Xattr = 1,
    Trans = 2,
    Task = 3,
}

#[derive(Debug, Clone)]
pub struct PirqConRec {
    pub pirq: u32,
    pub context: PdbContext,
}

#[derive(Debug, Clone)]
pub struct IomemConRec {
    pub low: u64,
    pub high: u64,
    pub context: PdbContext,
}

#[derive(Debug, Clone)]
pub struct IoportConRec {
    pub low: u32,
    pub high: u32,
    pub context: PdbContext,
}

#[derive(Debug, Clone)]
pub struct PciDeviceConRec {
    pub device: u32,
    pub context: PdbContext,
}

/// The per-kind object context lists.
#[derive(Debug, Clone, Default)]
pub struct OContexts {
    pub isids: Vec<IsidCon>,
    pub ports: Vec<PortConRec>,
    pub netifs: Vec<NetifConRec>,
    pub nodes: Vec<NodeConRec>,
    pub nodes6: Vec<Node6ConRec>,
    pub fsuse: Vec<FsUseRec>,
    pub pirqs: Vec<PirqConRec>,
    pub iomems: Vec<IomemConRec>,
    pub ioports: Vec<IoportConRec>,
    pub pcidevices: Vec<PciDeviceConRec>,
}

/// One genfs filesystem group: paths in declaration order.
#[derive(Debug, Clone)]
pub struct GenfsGroup {
    pub fstype: String,
    pub paths: Vec<(String, PdbContext)>,
}

// ═══════════════════════════════════════════════════════════════════
// The database
// ═══════════════════════════════════════════════════════════════════

/// The lowered policy database.
#[derive(Debug, Clone, Default)]
pub struct PolicyDb {
    /// Whether levels, ranges, and MLS constraints are populated.
    pub mls: bool,

    pub commons: PdbSymtab<CommonDatum>,
    pub classes: PdbSymtab<ClassDatum>,
    pub roles: PdbSymtab<RoleDatum>,
    pub types: PdbSymtab<TypeDatum>,
    pub users: PdbSymtab<UserDatum>,
    pub bools: PdbSymtab<BoolDatum>,
    pub levels: PdbSymtab<LevelDatum>,
    pub cats: PdbSymtab<CatDatum>,

    pub te_avtab: Avtab,
    pub te_cond_avtab: Avtab,
    pub cond_list: Vec<CondNode>,

    pub role_trans: Vec<RoleTransRec>,
    pub role_allow: Vec<RoleAllowRec>,
    pub filename_trans: Vec<FilenameTransRec>,
    pub range_trans: Vec<RangeTransRec>,

    pub ocontexts: OContexts,
    pub genfs: Vec<GenfsGroup>,

    /// Enabled policy capabilities by capability number.
    pub policycaps: Bitmap,
    /// Permissive types by value (as the kernel format indexes it).
    pub permissive_map: Bitmap,
    /// For each type value `v`, the attributes containing it (and itself),
    /// at `type_attr_map[v - 1]`.
    pub type_attr_map: Vec<Bitmap>,
    /// For each attribute value `v`, its member types at
    /// `attr_type_map[v - 1]`; plain types map to themselves.
    pub attr_type_map: Vec<Bitmap>,

    pub common_val_to_name: Vec<String>,
    pub class_val_to_name: Vec<String>,
    pub role_val_to_name: Vec<String>,
    pub type_val_to_name: Vec<String>,
    pub user_val_to_name: Vec<String>,
    pub bool_val_to_name: Vec<String>,
    pub sens_val_to_name: Vec<String>,
    pub cat_val_to_name: Vec<String>,
}

impl PolicyDb {
    /// Creates a database with the fixed `object_r` role pre-seeded at
    /// value 1, the way the kernel policy format expects.
    pub fn new(mls: bool) -> Self {
        let mut pdb = PolicyDb {
            mls,
            ..Default::default()
        };
        let value = pdb.roles.next_value();
        pdb.roles
            .insert(
                "object_r",
                RoleDatum {
                    value,
                    ..Default::default()
                },
                Location::NONE,
            )
            .expect("object_r inserts into an empty table");
        pdb
    }

    /// Finds a class name by value. Constraint lowering uses this to
    /// attach compiled expressions after classmap expansion.
    pub fn class_name_by_value(&self, value: u32) -> Result<String> {
        for (name, datum) in self.classes.iter() {
            if datum.value == value {
                return Ok(name.to_owned());
            }
        }
        Err(CompileError::new(
            ErrorKind::InvalidValue,
            Location::NONE,
            format!("no class has value {}", value),
        ))
    }

    /// Fills the `val_to_name` arrays from the symbol tables, checking
    /// every value lies in `[1, nprim]`.
    pub fn build_val_arrays(&mut self) -> Result<()> {
        self.common_val_to_name = val_array(&self.commons, |d| d.value, false)?;
        self.class_val_to_name = val_array(&self.classes, |d| d.value, false)?;
        self.role_val_to_name = val_array(&self.roles, |d| d.value, false)?;
        self.type_val_to_name = val_array(&self.types, |d| d.value, true)?;
        self.user_val_to_name = val_array(&self.users, |d| d.value, false)?;
        self.bool_val_to_name = val_array(&self.bools, |d| d.value, false)?;
        self.sens_val_to_name = sens_val_array(&self.levels)?;
        self.cat_val_to_name = cat_val_array(&self.cats)?;
        Ok(())
    }
}

fn invalid_value(name: &str, value: u32) -> CompileError {
    CompileError::new(
        ErrorKind::InvalidValue,
        Location::NONE,
        format!("{} has value {} outside the primary range", name, value),
    )
}

fn val_array<T>(
    table: &PdbSymtab<T>,
    value: impl Fn(&T) -> u32,
    skip_secondary: bool,
) -> Result<Vec<String>> {
    let mut names = vec![String::new(); table.nprim as usize];
    for (name, datum) in table.iter() {
        let v = value(datum);
        if v < 1 || v > table.nprim {
            return Err(invalid_value(name, v));
        }
        // Aliases share a primary's value; the primary's name wins.
        if skip_secondary && !names[(v - 1) as usize].is_empty() {
            continue;
        }
        if names[(v - 1) as usize].is_empty() {
            names[(v - 1) as usize] = name.to_owned();
        }
    }
    Ok(names)
}

fn sens_val_array(table: &PdbSymtab<LevelDatum>) -> Result<Vec<String>> {
    let mut names = vec![String::new(); table.nprim as usize];
    for (name, datum) in table.iter() {
        if datum.isalias {
            continue;
        }
        if datum.sens < 1 || datum.sens > table.nprim {
            return Err(invalid_value(name, datum.sens));
        }
        names[(datum.sens - 1) as usize] = name.to_owned();
    }
    Ok(names)
}

fn cat_val_array(table: &PdbSymtab<CatDatum>) -> Result<Vec<String>> {
    let mut names = vec![String::new(); table.nprim as usize];
    for (name, datum) in table.iter() {
        if datum.isalias {
            continue;
        }
        if datum.value < 1 || datum.value > table.nprim {
            return Err(invalid_value(name, datum.value));
        }
        names[(datum.value - 1) as usize] = name.to_owned();
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_r_is_preseeded() {
        let pdb = PolicyDb::new(false);
        assert_eq!(pdb.roles.get("object_r").unwrap().value, 1);
        assert_eq!(pdb.roles.nprim, 1);
    }

    #[test]
    fn symtab_assigns_dense_values() {
        let mut table: PdbSymtab<TypeDatum> = PdbSymtab::new();
        for name in ["t_a", "t_b", "t_c"] {
            let value = table.next_value();
            table
                .insert(
                    name,
                    TypeDatum {
                        value,
                        primary: true,
                        attribute: false,
                    },
                    Location::NONE,
                )
                .unwrap();
        }
        assert_eq!(table.nprim, 3);
        assert_eq!(table.get("t_b").unwrap().value, 2);
    }

    #[test]
    fn duplicate_pdb_insert_is_rejected() {
        let mut table: PdbSymtab<BoolDatum> = PdbSymtab::new();
        table
            .insert("b", BoolDatum::default(), Location::NONE)
            .unwrap();
        let err = table
            .insert("b", BoolDatum::default(), Location::NONE)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateDeclaration);
    }

    #[test]
    fn val_arrays_reject_out_of_range_values() {
        let mut table: PdbSymtab<TypeDatum> = PdbSymtab::new();
        table
            .insert(
                "broken",
                TypeDatum {
                    value: 7,
                    primary: true,
                    attribute: false,
                },
                Location::NONE,
            )
            .unwrap();
        // nprim is still 0: value 7 is out of range.
        let err = val_array(&table, |d| d.value, true).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidValue);
    }
}
