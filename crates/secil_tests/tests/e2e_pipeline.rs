//! E2E: pipeline-level laws.

mod common;

use common::PolicyBuilder;
use secil_policydb::{lower, CompileOptions};
use secil_tree::Database;

fn sample_policy() -> PolicyBuilder {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read", "write"]);
    policy.ty(root, "t_a");
    policy.ty(root, "t_b");
    let optional = policy.declare(root, "opt", secil_tree::Payload::Optional);
    policy.allow(optional, "t_a", "missing", "file", &["read"]);
    policy.allow(root, "t_a", "t_b", "file", &["read"]);
    policy
}

#[test]
fn resolving_twice_changes_nothing_observable() {
    let policy = sample_policy();
    let mut db = Database::new(policy.tree);
    secil_resolve::resolve(&mut db).unwrap();
    let first = lower(&db, &CompileOptions::default()).unwrap();

    // A second full resolution over the already-resolved tree must leave
    // the observable output identical.
    secil_resolve::resolve(&mut db).unwrap();
    let second = lower(&db, &CompileOptions::default()).unwrap();

    assert_eq!(first.te_avtab.entries(), second.te_avtab.entries());
    assert_eq!(first.type_val_to_name, second.type_val_to_name);
    assert_eq!(first.class_val_to_name, second.class_val_to_name);
    assert_eq!(first.types.nprim, second.types.nprim);
}

#[test]
fn every_value_is_dense_and_named() {
    let policy = sample_policy();
    let pdb = policy.compile().unwrap();

    assert_eq!(pdb.type_val_to_name.len(), pdb.types.nprim as usize);
    for (i, name) in pdb.type_val_to_name.iter().enumerate() {
        assert!(!name.is_empty());
        assert_eq!(pdb.types.get(name).unwrap().value, (i + 1) as u32);
    }
    assert_eq!(pdb.role_val_to_name, vec!["object_r"]);
}

#[test]
fn attr_maps_cover_every_type() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read"]);
    policy.ty(root, "t_a");
    policy.ty(root, "t_b");
    policy.type_attribute(root, "domain");
    policy.append(
        root,
        secil_tree::Payload::TypeAttributeSet {
            attr: secil_tree::Ref::name("domain"),
            expr: secil_tree::SetExpr::names(["t_a"]),
        },
    );

    let pdb = policy.compile().unwrap();

    let attr_value = pdb.types.get("domain").unwrap().value;
    let t_a = pdb.types.get("t_a").unwrap().value;
    let t_b = pdb.types.get("t_b").unwrap().value;

    assert_eq!(pdb.type_attr_map.len(), pdb.types.nprim as usize);
    // Every type maps to itself...
    assert!(pdb.type_attr_map[(t_a - 1) as usize].get((t_a - 1) as usize));
    // ...members additionally map to their attribute...
    assert!(pdb.type_attr_map[(t_a - 1) as usize].get((attr_value - 1) as usize));
    assert!(!pdb.type_attr_map[(t_b - 1) as usize].get((attr_value - 1) as usize));
    // ...and the attribute's member set is recorded.
    assert!(pdb.attr_type_map[(attr_value - 1) as usize].get((t_a - 1) as usize));
}

#[test]
fn policycaps_use_the_known_table() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.declare(root, "open_perms", secil_tree::Payload::PolicyCap);

    let pdb = policy.compile().unwrap();
    assert!(pdb.policycaps.get(1));

    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.declare(root, "frobnicate", secil_tree::Payload::PolicyCap);

    let err = policy.compile().unwrap_err();
    assert_eq!(err.kind, secil_base::ErrorKind::PolicycapUnknown);
}
