//! E2E: neverallow enforcement.

mod common;

use common::PolicyBuilder;
use secil_base::ErrorKind;
use secil_tree::AvRuleKind;

#[test]
fn allow_intersecting_a_neverallow_fails() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read", "write"]);
    policy.ty(root, "t_a");
    policy.ty(root, "t_b");
    policy.avrule(root, AvRuleKind::Neverallow, "t_a", "t_b", "file", &["read"]);
    let never_line = policy.next_line() - 1;
    policy.allow(root, "t_a", "t_b", "file", &["read"]);
    let allow_line = policy.next_line() - 1;

    let err = policy.compile().unwrap_err();

    assert_eq!(err.kind, ErrorKind::NeverallowViolation);
    // The diagnostic cites both statements.
    assert!(err.message.contains(&format!("line {}", never_line)));
    assert!(err.message.contains(&format!("line {}", allow_line)));
}

#[test]
fn disjoint_permissions_do_not_violate() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read", "write"]);
    policy.ty(root, "t_a");
    policy.ty(root, "t_b");
    policy.avrule(root, AvRuleKind::Neverallow, "t_a", "t_b", "file", &["read"]);
    policy.allow(root, "t_a", "t_b", "file", &["write"]);

    let pdb = policy.compile().unwrap();

    // The neverallow itself is never emitted.
    assert_eq!(pdb.te_avtab.len(), 1);
    assert_eq!(pdb.te_avtab.entries()[0].data, 0b10);
}

#[test]
fn different_target_does_not_violate() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read"]);
    policy.ty(root, "t_a");
    policy.ty(root, "t_b");
    policy.avrule(root, AvRuleKind::Neverallow, "t_a", "t_b", "file", &["read"]);
    policy.allow(root, "t_b", "t_a", "file", &["read"]);

    assert!(policy.compile().is_ok());
}

#[test]
fn neverallow_on_self_expands_like_an_allow() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read"]);
    policy.ty(root, "t_a");
    policy.avrule(root, AvRuleKind::Neverallow, "t_a", "self", "file", &["read"]);
    policy.allow(root, "t_a", "t_a", "file", &["read"]);

    let err = policy.compile().unwrap_err();
    assert_eq!(err.kind, ErrorKind::NeverallowViolation);
}

#[test]
fn conditional_rules_are_checked_too() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read"]);
    policy.ty(root, "t_a");
    policy.ty(root, "t_b");
    policy.declare(root, "b", secil_tree::Payload::Bool { value: true });
    policy.avrule(root, AvRuleKind::Neverallow, "t_a", "t_b", "file", &["read"]);
    let boolif = policy.append(
        root,
        secil_tree::Payload::BooleanIf {
            expr: secil_tree::BoolExpr::name("b"),
        },
    );
    let branch = policy.append(
        boolif,
        secil_tree::Payload::CondBlock {
            branch: secil_tree::CondBranch::True,
        },
    );
    policy.allow(branch, "t_a", "t_b", "file", &["read"]);

    let err = policy.compile().unwrap_err();
    assert_eq!(err.kind, ErrorKind::NeverallowViolation);
}
