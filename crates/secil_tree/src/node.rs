//! The AST arena: nodes, datums, and scopes.
//!
//! All nodes, datums, and scopes live in one [`Tree`] and refer to each
//! other through index newtypes ([`NodeId`], [`DatumId`], [`ScopeId`]).
//! This breaks the datum ↔ node reference cycle by construction: a datum's
//! back-reference list and a payload's resolved references are both plain
//! indices into arenas owned by the tree.
//!
//! The tree doubles as the builder interface for the parser collaborator:
//! [`Tree::append`] adds a statement node, [`Tree::declare`] adds a
//! declaration (creating its datum and inserting it into the enclosing
//! scope), and [`Tree::add_perm`] adds a permission to a class, classmap,
//! or common.

use crate::flavor::{Flavor, SymKind, SYM_KIND_COUNT};
use crate::payload::Payload;
use crate::symtab::SymbolTable;
use secil_base::{CompileError, ErrorKind, Location, Result};

/// Index of a node in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// Index of a datum in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DatumId(u32);

/// Index of a scope in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl NodeId {
    pub fn from_index(i: usize) -> Self {
        NodeId(i as u32)
    }
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl DatumId {
    pub fn from_index(i: usize) -> Self {
        DatumId(i as u32)
    }
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ScopeId {
    pub fn from_index(i: usize) -> Self {
        ScopeId(i as u32)
    }
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Lifecycle state of a declared entity.
///
/// `Disabling` is transient: the resolver marks an optional `Disabling`
/// when a name inside it fails to resolve, and the walker's last-child
/// hook cascades the state to `Disabled` over the whole subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatumState {
    Enabled,
    Disabling,
    Disabled,
}

/// The identity record of a declared entity.
#[derive(Debug, Clone)]
pub struct Datum {
    /// The declared name, owned by the datum.
    pub name: String,
    /// Lifecycle state; only `Enabled` datums resolve.
    pub state: DatumState,
    /// Every node at which this datum appears. The head is the primary
    /// declaration site.
    pub nodes: Vec<NodeId>,
}

impl Datum {
    /// The primary declaration node.
    pub fn primary(&self) -> NodeId {
        self.nodes[0]
    }
}

/// One AST node.
#[derive(Debug, Clone)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub location: Location,
    pub payload: Payload,
    /// The datum this node declares, for declarative flavors.
    pub datum: Option<DatumId>,
    /// The lexical scope this node opens (root, block, macro).
    pub scope: Option<ScopeId>,
}

/// A lexical scope: one symbol table per symbol kind.
#[derive(Debug, Clone)]
pub struct Scope {
    tables: Vec<SymbolTable>,
}

impl Scope {
    fn new() -> Self {
        Scope {
            tables: vec![SymbolTable::new(); SYM_KIND_COUNT],
        }
    }

    /// The table for one symbol kind.
    pub fn table(&self, kind: SymKind) -> &SymbolTable {
        &self.tables[kind.index()]
    }

    /// Mutable access to the table for one symbol kind.
    pub fn table_mut(&mut self, kind: SymKind) -> &mut SymbolTable {
        &mut self.tables[kind.index()]
    }
}

/// The AST: an arena of nodes, datums, and scopes with a distinguished root.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    datums: Vec<Datum>,
    scopes: Vec<Scope>,
    root: NodeId,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Creates a tree holding only the root node and the global scope.
    pub fn new() -> Self {
        let mut tree = Tree {
            nodes: Vec::new(),
            datums: Vec::new(),
            scopes: vec![Scope::new()],
            root: NodeId(0),
        };
        tree.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            location: Location::NONE,
            payload: Payload::Root,
            datum: None,
            scope: Some(ScopeId(0)),
        });
        tree
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The global scope attached to the root.
    pub fn global_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn datum(&self, id: DatumId) -> &Datum {
        &self.datums[id.index()]
    }

    pub fn datum_mut(&mut self, id: DatumId) -> &mut Datum {
        &mut self.datums[id.index()]
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    /// The flavor of a node's payload.
    pub fn flavor(&self, id: NodeId) -> Flavor {
        self.node(id).payload.flavor()
    }

    /// The flavor of a datum's primary declaration.
    pub fn datum_flavor(&self, id: DatumId) -> Flavor {
        self.flavor(self.datum(id).primary())
    }

    /// The nearest scope at or above `node` (the node's own scope if it
    /// opens one).
    pub fn enclosing_scope(&self, node: NodeId) -> ScopeId {
        let mut current = Some(node);
        while let Some(id) = current {
            if let Some(scope) = self.node(id).scope {
                return scope;
            }
            current = self.node(id).parent;
        }
        ScopeId(0)
    }

    /// The nearest enclosing block, macro, or root node at or above `node`.
    pub fn enclosing_scope_node(&self, node: NodeId) -> NodeId {
        let mut current = node;
        loop {
            if self.node(current).scope.is_some() {
                return current;
            }
            match self.node(current).parent {
                Some(p) => current = p,
                None => return self.root,
            }
        }
    }

    /// Appends a statement node under `parent`.
    ///
    /// Declarative payloads must go through [`Tree::declare`] instead so
    /// their datum is created; this is enforced with a panic because it is
    /// a builder-API misuse, not a source-level error.
    pub fn append(&mut self, parent: NodeId, location: Location, payload: Payload) -> NodeId {
        assert!(
            !payload.flavor().is_declarative(),
            "declarative payloads must be added with declare()"
        );
        self.push_node(parent, location, payload, None)
    }

    /// Appends a declaration under `parent`, creating its datum and
    /// inserting it into the enclosing scope's table for the flavor's
    /// symbol kind.
    ///
    /// Block and macro declarations also open a fresh scope.
    pub fn declare(
        &mut self,
        parent: NodeId,
        location: Location,
        name: &str,
        payload: Payload,
    ) -> Result<NodeId> {
        let flavor = payload.flavor();
        assert!(
            flavor.is_declarative(),
            "non-declarative payloads must be added with append()"
        );

        let datum = DatumId(self.datums.len() as u32);
        self.datums.push(Datum {
            name: name.to_owned(),
            state: DatumState::Enabled,
            nodes: Vec::new(),
        });

        let node = self.push_node(parent, location, payload, Some(datum));
        self.datums[datum.index()].nodes.push(node);

        if matches!(flavor, Flavor::Block | Flavor::Macro) {
            let scope = ScopeId(self.scopes.len() as u32);
            self.scopes.push(Scope::new());
            self.nodes[node.index()].scope = Some(scope);
        }

        if let Some(kind) = flavor.sym_kind() {
            let scope = self.enclosing_scope(parent);
            self.insert_into_scope(scope, kind, name, datum, location)?;
        } else {
            // Perm / MapPerm: the parent class owns the table.
            self.insert_perm(parent, name, datum, location)?;
        }

        Ok(node)
    }

    /// Adds a permission to a class, classmap, or common.
    pub fn add_perm(&mut self, class: NodeId, location: Location, name: &str) -> Result<NodeId> {
        let payload = match self.flavor(class) {
            Flavor::MapClass => Payload::MapPerm {
                classperms: Vec::new(),
            },
            _ => Payload::Perm,
        };
        self.declare(class, location, name, payload)
    }

    /// Inserts `name → datum` into a scope table, mapping collisions to
    /// `DuplicateDeclaration`.
    pub fn insert_into_scope(
        &mut self,
        scope: ScopeId,
        kind: SymKind,
        name: &str,
        datum: DatumId,
        location: Location,
    ) -> Result<()> {
        self.scopes[scope.index()]
            .table_mut(kind)
            .insert(name, datum)
            .map_err(|_| {
                CompileError::new(
                    ErrorKind::DuplicateDeclaration,
                    location,
                    format!("{} is already declared in this scope", name),
                )
            })
    }

    pub(crate) fn insert_perm(
        &mut self,
        class: NodeId,
        name: &str,
        datum: DatumId,
        location: Location,
    ) -> Result<()> {
        let table = match &mut self.nodes[class.index()].payload {
            Payload::Class { perms, .. }
            | Payload::MapClass { perms }
            | Payload::Common { perms } => perms,
            other => {
                return Err(CompileError::new(
                    ErrorKind::ParseInputMalformed,
                    location,
                    format!("permission declared under a {}", other.statement_name()),
                ))
            }
        };
        table.insert(name, datum).map_err(|_| {
            CompileError::new(
                ErrorKind::DuplicateDeclaration,
                location,
                format!("permission {} is already declared", name),
            )
        })
    }

    fn push_node(
        &mut self,
        parent: NodeId,
        location: Location,
        payload: Payload,
        datum: Option<DatumId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            location,
            payload,
            datum,
            scope: None,
        });
        self.nodes[parent.index()].children.push(id);
        id
    }

    /// Allocates a detached node (no parent). Used by the copier, which
    /// attaches the node itself.
    pub(crate) fn alloc_node(&mut self, location: Location, payload: Payload) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            location,
            payload,
            datum: None,
            scope: None,
        });
        id
    }

    /// Allocates a datum. Used by the copier.
    pub(crate) fn alloc_datum(&mut self, name: &str) -> DatumId {
        let id = DatumId(self.datums.len() as u32);
        self.datums.push(Datum {
            name: name.to_owned(),
            state: DatumState::Enabled,
            nodes: Vec::new(),
        });
        id
    }

    /// Allocates a fresh scope. Used by the copier for copied blocks and
    /// macros.
    pub(crate) fn alloc_scope(&mut self) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope::new());
        id
    }

    /// Replaces the child `at` of `parent` with `replacements`, detaching
    /// the old child. Used when folding tunableifs.
    pub fn splice_children(&mut self, parent: NodeId, at: NodeId, replacements: Vec<NodeId>) {
        let idx = self.nodes[parent.index()]
            .children
            .iter()
            .position(|&c| c == at)
            .expect("splice target must be a child of parent");
        self.nodes[at.index()].parent = None;
        for &r in &replacements {
            self.nodes[r.index()].parent = Some(parent);
        }
        self.nodes[parent.index()]
            .children
            .splice(idx..idx + 1, replacements);
    }

    /// Detaches every child of `node`, returning them. Used when an `in`
    /// container's contents move into the named block.
    pub fn take_children(&mut self, node: NodeId) -> Vec<NodeId> {
        let children = std::mem::take(&mut self.nodes[node.index()].children);
        for &c in &children {
            self.nodes[c.index()].parent = None;
        }
        children
    }

    /// Detaches the last `n` children of `parent`, returning them in
    /// order. Used to reposition freshly copied nodes.
    pub fn detach_last_children(&mut self, parent: NodeId, n: usize) -> Vec<NodeId> {
        let len = self.nodes[parent.index()].children.len();
        let detached: Vec<NodeId> = self.nodes[parent.index()].children.split_off(len - n);
        for &c in &detached {
            self.nodes[c.index()].parent = None;
        }
        detached
    }

    /// Attaches `child` at the end of `parent`'s child list.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Payload;

    #[test]
    fn declare_inserts_into_global_scope() {
        let mut tree = Tree::new();
        let root = tree.root();
        let node = tree
            .declare(root, Location::line(1), "t_a", Payload::Type { bounds: None })
            .unwrap();
        let scope = tree.scope(tree.global_scope());
        let datum = scope.table(SymKind::Types).lookup("t_a").unwrap();
        assert_eq!(tree.datum(datum).primary(), node);
        assert_eq!(tree.datum(datum).name, "t_a");
        assert_eq!(tree.datum(datum).state, DatumState::Enabled);
    }

    #[test]
    fn duplicate_declaration_in_same_scope_fails() {
        let mut tree = Tree::new();
        let root = tree.root();
        tree.declare(root, Location::line(1), "t", Payload::Type { bounds: None })
            .unwrap();
        let err = tree
            .declare(root, Location::line(2), "t", Payload::Type { bounds: None })
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateDeclaration);
    }

    #[test]
    fn same_name_in_nested_block_is_allowed() {
        let mut tree = Tree::new();
        let root = tree.root();
        tree.declare(root, Location::line(1), "t", Payload::Type { bounds: None })
            .unwrap();
        let block = tree
            .declare(
                root,
                Location::line(2),
                "b",
                Payload::Block { is_abstract: false },
            )
            .unwrap();
        tree.declare(block, Location::line(3), "t", Payload::Type { bounds: None })
            .unwrap();
        assert!(tree.node(block).scope.is_some());
    }

    #[test]
    fn class_perms_live_in_the_class_table() {
        let mut tree = Tree::new();
        let root = tree.root();
        let class = tree
            .declare(
                root,
                Location::line(1),
                "file",
                Payload::Class {
                    common: None,
                    perms: SymbolTable::new(),
                },
            )
            .unwrap();
        tree.add_perm(class, Location::line(1), "read").unwrap();
        tree.add_perm(class, Location::line(1), "write").unwrap();
        match &tree.node(class).payload {
            Payload::Class { perms, .. } => {
                assert!(perms.lookup("read").is_some());
                assert_eq!(perms.len(), 2);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn splice_replaces_a_child_in_place() {
        let mut tree = Tree::new();
        let root = tree.root();
        let first = tree.append(
            root,
            Location::line(1),
            Payload::In {
                block: crate::payload::Ref::name("b"),
            },
        );
        let second = tree.append(
            root,
            Location::line(2),
            Payload::In {
                block: crate::payload::Ref::name("c"),
            },
        );
        let replacement = tree.alloc_node(
            Location::line(3),
            Payload::In {
                block: crate::payload::Ref::name("d"),
            },
        );
        tree.splice_children(root, first, vec![replacement]);
        assert_eq!(tree.node(root).children, vec![replacement, second]);
        assert_eq!(tree.node(replacement).parent, Some(root));
        assert_eq!(tree.node(first).parent, None);
    }
}
