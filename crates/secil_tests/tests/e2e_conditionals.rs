//! E2E: tunableif folding and booleanif lowering.

mod common;

use common::PolicyBuilder;
use secil_base::ErrorKind;
use secil_policydb::CondToken;
use secil_tree::{
    BoolExpr, BoolOp, BoolToken, CondBranch, Payload, Ref,
};

fn tunableif(
    policy: &mut PolicyBuilder,
    parent: secil_tree::NodeId,
    expr: BoolExpr,
) -> (secil_tree::NodeId, secil_tree::NodeId, secil_tree::NodeId) {
    let tif = policy.append(parent, Payload::TunableIf { expr });
    let true_branch = policy.append(
        tif,
        Payload::CondBlock {
            branch: CondBranch::True,
        },
    );
    let false_branch = policy.append(
        tif,
        Payload::CondBlock {
            branch: CondBranch::False,
        },
    );
    (tif, true_branch, false_branch)
}

#[test]
fn tunableif_keeps_only_the_selected_branch() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read", "write"]);
    policy.ty(root, "t_a");
    policy.ty(root, "t_b");
    policy.declare(root, "x", Payload::Tunable { value: true });
    let (_, true_branch, false_branch) = tunableif(&mut policy, root, BoolExpr::name("x"));
    policy.allow(true_branch, "t_a", "t_b", "file", &["read"]);
    policy.allow(false_branch, "t_a", "t_b", "file", &["write"]);

    let pdb = policy.compile().unwrap();

    assert_eq!(pdb.te_avtab.len(), 1);
    assert_eq!(pdb.te_avtab.entries()[0].data, 0b01);
    // Tunables never reach the database.
    assert!(pdb.bools.is_empty());
}

#[test]
fn false_tunable_selects_the_else_branch() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read", "write"]);
    policy.ty(root, "t_a");
    policy.ty(root, "t_b");
    policy.declare(root, "x", Payload::Tunable { value: false });
    let (_, true_branch, false_branch) = tunableif(&mut policy, root, BoolExpr::name("x"));
    policy.allow(true_branch, "t_a", "t_b", "file", &["read"]);
    policy.allow(false_branch, "t_a", "t_b", "file", &["write"]);

    let pdb = policy.compile().unwrap();

    assert_eq!(pdb.te_avtab.len(), 1);
    assert_eq!(pdb.te_avtab.entries()[0].data, 0b10);
}

#[test]
fn tunable_operators_fold_constant_expressions() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read", "write"]);
    policy.ty(root, "t_a");
    policy.declare(root, "x", Payload::Tunable { value: true });
    policy.declare(root, "y", Payload::Tunable { value: false });
    // postfix: x y XOR == true
    let expr = BoolExpr {
        tokens: vec![
            BoolToken::Ref(Ref::name("x")),
            BoolToken::Ref(Ref::name("y")),
            BoolToken::Op(BoolOp::Xor),
        ],
    };
    let (_, true_branch, false_branch) = tunableif(&mut policy, root, expr);
    policy.allow(true_branch, "t_a", "self", "file", &["read"]);
    policy.allow(false_branch, "t_a", "self", "file", &["write"]);

    let pdb = policy.compile().unwrap();

    assert_eq!(pdb.te_avtab.entries()[0].data, 0b01);
}

#[test]
fn booleanif_produces_a_conditional_node() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read", "write"]);
    policy.ty(root, "t_a");
    policy.ty(root, "t_b");
    policy.declare(root, "b", Payload::Bool { value: true });
    let boolif = policy.append(
        root,
        Payload::BooleanIf {
            expr: BoolExpr::name("b"),
        },
    );
    let true_branch = policy.append(
        boolif,
        Payload::CondBlock {
            branch: CondBranch::True,
        },
    );
    policy.allow(true_branch, "t_a", "t_b", "file", &["read"]);
    let false_branch = policy.append(
        boolif,
        Payload::CondBlock {
            branch: CondBranch::False,
        },
    );
    policy.allow(false_branch, "t_a", "t_b", "file", &["write"]);

    let pdb = policy.compile().unwrap();

    assert!(pdb.te_avtab.is_empty());
    assert_eq!(pdb.te_cond_avtab.len(), 2);
    assert_eq!(pdb.cond_list.len(), 1);
    let cond = &pdb.cond_list[0];
    assert_eq!(cond.expr, vec![CondToken::Bool(1)]);
    assert_eq!(cond.true_list.len(), 1);
    assert_eq!(cond.false_list.len(), 1);
    assert_eq!(pdb.te_cond_avtab.entries()[cond.true_list[0]].data, 0b01);
    assert_eq!(pdb.te_cond_avtab.entries()[cond.false_list[0]].data, 0b10);
}

#[test]
fn conditional_branches_keep_duplicate_keys() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read", "write"]);
    policy.ty(root, "t_a");
    policy.ty(root, "t_b");
    policy.declare(root, "b", Payload::Bool { value: true });
    let boolif = policy.append(
        root,
        Payload::BooleanIf {
            expr: BoolExpr::name("b"),
        },
    );
    let true_branch = policy.append(
        boolif,
        Payload::CondBlock {
            branch: CondBranch::True,
        },
    );
    policy.allow(true_branch, "t_a", "t_b", "file", &["read"]);
    policy.allow(true_branch, "t_a", "t_b", "file", &["write"]);

    let pdb = policy.compile().unwrap();

    // Same key twice: conditional entries never merge.
    assert_eq!(pdb.te_cond_avtab.len(), 2);
    assert_eq!(pdb.cond_list[0].true_list.len(), 2);
}

#[test]
fn non_rule_statement_inside_booleanif_is_malformed() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.declare(root, "b", Payload::Bool { value: true });
    policy.declare(root, "r1", Payload::Role { bounds: None });
    policy.declare(root, "r2", Payload::Role { bounds: None });
    let boolif = policy.append(
        root,
        Payload::BooleanIf {
            expr: BoolExpr::name("b"),
        },
    );
    let branch = policy.append(
        boolif,
        Payload::CondBlock {
            branch: CondBranch::True,
        },
    );
    // Role allows resolve fine but are not conditional rules.
    policy.append(
        branch,
        Payload::RoleAllow {
            src: Ref::name("r1"),
            tgt: Ref::name("r2"),
        },
    );

    let err = policy.compile().unwrap_err();
    assert_eq!(err.kind, ErrorKind::ParseInputMalformed);
}
