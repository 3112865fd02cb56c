//! E2E: typealias chains.

mod common;

use common::PolicyBuilder;
use secil_base::ErrorKind;
use secil_tree::{Payload, Ref};

fn typealias(policy: &mut PolicyBuilder, name: &str, target: &str) {
    let root = policy.root();
    policy.declare(
        root,
        name,
        Payload::TypeAlias {
            target: Ref::name(target),
            ty: None,
        },
    );
}

#[test]
fn alias_chain_shares_the_type_value() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.ty(root, "t");
    typealias(&mut policy, "a1", "t");
    typealias(&mut policy, "a2", "a1");

    let pdb = policy.compile().unwrap();

    let t = pdb.types.get("t").unwrap();
    let a1 = pdb.types.get("a1").unwrap();
    let a2 = pdb.types.get("a2").unwrap();
    assert_eq!(t.value, 1);
    assert_eq!(a1.value, 1);
    assert_eq!(a2.value, 1);
    assert!(t.primary);
    assert!(!a1.primary);
    assert!(!a2.primary);
    // Only the primary name lands in the value array.
    assert_eq!(pdb.type_val_to_name, vec!["t"]);
}

#[test]
fn rules_through_an_alias_use_the_target_value() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read"]);
    policy.ty(root, "t");
    typealias(&mut policy, "a1", "t");
    policy.allow(root, "a1", "a1", "file", &["read"]);

    let pdb = policy.compile().unwrap();

    let entry = pdb.te_avtab.entries()[0];
    assert_eq!(entry.key.source, 1);
    assert_eq!(entry.key.target, 1);
}

#[test]
fn cyclic_alias_chain_is_rejected() {
    let mut policy = PolicyBuilder::new();
    typealias(&mut policy, "a1", "a2");
    typealias(&mut policy, "a2", "a1");

    let err = policy.compile().unwrap_err();
    assert_eq!(err.kind, ErrorKind::RecursiveAlias);
}

#[test]
fn alias_to_a_missing_type_is_unresolved() {
    let mut policy = PolicyBuilder::new();
    typealias(&mut policy, "a1", "nowhere");

    let err = policy.compile().unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnresolvedName);
}
