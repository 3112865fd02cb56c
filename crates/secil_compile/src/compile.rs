//! The pipeline entry point.

use secil_base::Result;
use secil_policydb::{lower, CompileOptions, PolicyDb};
use secil_tree::{Database, Tree};

/// Compiles a parsed CIL tree into a policy database.
///
/// Resolution mutates the tree in place (expanding macros, folding
/// tunables, disabling optionals); lowering then reads the resolved tree
/// and produces the database. The tree is consumed: a failed compilation
/// releases it along with everything else.
///
/// # Example
///
/// ```
/// use secil_compile::{compile, CompileOptions};
/// use secil_tree::{Payload, SymbolTable, Tree};
/// use secil_base::Location;
///
/// let mut tree = Tree::new();
/// let root = tree.root();
/// let class = tree
///     .declare(root, Location::line(1), "file", Payload::Class {
///         common: None,
///         perms: SymbolTable::new(),
///     })
///     .unwrap();
/// tree.add_perm(class, Location::line(1), "read").unwrap();
/// tree.declare(root, Location::line(2), "t_a", Payload::Type { bounds: None })
///     .unwrap();
///
/// let pdb = compile(tree, &CompileOptions::default()).unwrap();
/// assert_eq!(pdb.types.get("t_a").unwrap().value, 1);
/// ```
pub fn compile(tree: Tree, options: &CompileOptions) -> Result<PolicyDb> {
    let mut db = Database::new(tree);
    secil_resolve::resolve(&mut db)?;
    log::debug!("resolution complete, lowering");
    lower(&db, options)
}
