//! E2E: optional disable cascades.

mod common;

use common::PolicyBuilder;
use secil_base::ErrorKind;

#[test]
fn optional_with_unresolved_name_is_disabled() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read"]);
    policy.ty(root, "t_a");
    let optional = policy.declare(root, "opt", secil_tree::Payload::Optional);
    policy.ty(optional, "t_o");
    // "missing" is never declared; the whole optional must go.
    policy.allow(optional, "t_o", "missing", "file", &["read"]);

    let pdb = policy.compile().unwrap();

    assert!(pdb.types.get("t_o").is_none());
    assert!(pdb.types.get("t_a").is_some());
    assert!(pdb.te_avtab.is_empty());
}

#[test]
fn sibling_optionals_survive_a_disable() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read"]);
    policy.ty(root, "t_a");
    let broken = policy.declare(root, "broken", secil_tree::Payload::Optional);
    policy.allow(broken, "t_a", "missing", "file", &["read"]);
    let healthy = policy.declare(root, "healthy", secil_tree::Payload::Optional);
    policy.ty(healthy, "t_h");
    policy.allow(healthy, "t_h", "t_a", "file", &["read"]);

    let pdb = policy.compile().unwrap();

    assert!(pdb.types.get("t_h").is_some());
    assert_eq!(pdb.te_avtab.len(), 1);
}

#[test]
fn unresolved_name_outside_an_optional_is_fatal() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read"]);
    policy.ty(root, "t_a");
    policy.allow(root, "t_a", "missing", "file", &["read"]);

    let err = policy.compile().unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnresolvedName);
    assert!(err.message.contains("missing"));
}

#[test]
fn reference_into_a_disabled_optional_cascades() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read"]);
    policy.ty(root, "t_a");
    // First optional dies on its own unresolved reference.
    let broken = policy.declare(root, "broken", secil_tree::Payload::Optional);
    policy.ty(broken, "t_inner");
    policy.allow(broken, "t_inner", "missing", "file", &["read"]);
    // Second optional depends on the first one's type, so it dies too
    // when resolution re-runs.
    let dependent = policy.declare(root, "dependent", secil_tree::Payload::Optional);
    policy.allow(dependent, "t_a", "t_inner", "file", &["read"]);

    let pdb = policy.compile().unwrap();

    assert!(pdb.types.get("t_inner").is_none());
    assert!(pdb.te_avtab.is_empty());
}

#[test]
fn tunable_declared_inside_an_optional_is_rejected() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    let optional = policy.declare(root, "opt", secil_tree::Payload::Optional);
    policy.declare(optional, "tun", secil_tree::Payload::Tunable { value: true });

    let err = policy.compile().unwrap_err();
    assert_eq!(err.kind, ErrorKind::ParseInputMalformed);
}
