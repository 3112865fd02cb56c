//! E2E: macro expansion.

mod common;

use common::PolicyBuilder;
use secil_base::ErrorKind;
use secil_tree::{
    AvRuleKind, AvTarget, CallArg, ClassPermSetData, Param, ParamKind, Payload, Ref, Spec,
};

fn type_macro(policy: &mut PolicyBuilder, parent: secil_tree::NodeId) -> secil_tree::NodeId {
    let m = policy.declare(
        parent,
        "m",
        Payload::Macro {
            params: vec![Param {
                kind: ParamKind::Type,
                name: "T".into(),
            }],
        },
    );
    policy.append(
        m,
        Payload::AvRule {
            kind: AvRuleKind::Allow,
            src: Ref::name("T"),
            tgt: AvTarget::SelfRef,
            classperms: Spec::Inline(ClassPermSetData::new("file", vec!["read".into()])),
        },
    );
    m
}

fn call(policy: &mut PolicyBuilder, parent: secil_tree::NodeId, name: &str, args: Vec<CallArg>) {
    policy.append(
        parent,
        Payload::Call {
            macro_ref: Ref::name(name),
            args_in: args,
            args: Vec::new(),
            copied: false,
        },
    );
}

#[test]
fn macro_called_twice_expands_per_argument() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read"]);
    policy.ty(root, "t_a");
    policy.ty(root, "t_b");
    type_macro(&mut policy, root);
    call(&mut policy, root, "m", vec![CallArg::Name("t_a".into())]);
    call(&mut policy, root, "m", vec![CallArg::Name("t_b".into())]);

    let pdb = policy.compile().unwrap();

    assert_eq!(pdb.te_avtab.len(), 2);
    let pairs: Vec<(u32, u32)> = pdb
        .te_avtab
        .entries()
        .iter()
        .map(|e| (e.key.source, e.key.target))
        .collect();
    assert_eq!(pairs, vec![(1, 1), (2, 2)]);
}

#[test]
fn macro_body_declarations_land_at_the_call_site() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read"]);
    let m = policy.declare(
        root,
        "mk_type",
        Payload::Macro { params: Vec::new() },
    );
    policy.ty(m, "t_made");
    call(&mut policy, root, "mk_type", Vec::new());
    policy.allow(root, "t_made", "self", "file", &["read"]);

    let pdb = policy.compile().unwrap();

    assert!(pdb.types.get("t_made").is_some());
    assert_eq!(pdb.te_avtab.len(), 1);
}

#[test]
fn recursive_macro_call_is_rejected() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    let m1 = policy.declare(root, "m1", Payload::Macro { params: Vec::new() });
    let m2 = policy.declare(root, "m2", Payload::Macro { params: Vec::new() });
    call(&mut policy, m1, "m2", Vec::new());
    call(&mut policy, m2, "m1", Vec::new());
    call(&mut policy, root, "m1", Vec::new());

    let err = policy.compile().unwrap_err();
    assert_eq!(err.kind, ErrorKind::RecursiveCall);
}

#[test]
fn argument_count_mismatch_is_rejected() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read"]);
    policy.ty(root, "t_a");
    type_macro(&mut policy, root);
    call(&mut policy, root, "m", Vec::new());

    let err = policy.compile().unwrap_err();
    assert_eq!(err.kind, ErrorKind::ParseInputMalformed);
    assert!(err.message.contains("missing"));
}

#[test]
fn calling_a_block_is_a_type_mismatch() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.declare(root, "b", Payload::Block { is_abstract: false });
    call(&mut policy, root, "b", Vec::new());

    let err = policy.compile().unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
}

#[test]
fn compound_literal_argument_reaches_the_use_site() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.declare(root, "s0", Payload::Sens { cats: Vec::new() });
    policy.declare(root, "c0", Payload::Cat);
    policy.append(
        root,
        Payload::CatOrder {
            order: vec!["c0".into()],
        },
    );
    policy.append(
        root,
        Payload::Dominance {
            order: vec!["s0".into()],
        },
    );
    policy.declare(root, "u", Payload::User {
        dftlevel: None,
        range: None,
        bounds: None,
    });

    // macro with a levelrange parameter applied to a userrange
    let m = policy.declare(
        root,
        "set_range",
        Payload::Macro {
            params: vec![Param {
                kind: ParamKind::LevelRange,
                name: "LR".into(),
            }],
        },
    );
    policy.append(
        m,
        Payload::UserRange {
            user: Ref::name("u"),
            range: Spec::named("LR"),
        },
    );

    let literal = secil_tree::LevelRangeData {
        low: Spec::Inline(secil_tree::LevelData {
            sens: Ref::name("s0"),
            cats: None,
        }),
        high: Spec::Inline(secil_tree::LevelData {
            sens: Ref::name("s0"),
            cats: Some(Spec::Inline(common::catset(&["c0"]))),
        }),
    };
    call(
        &mut policy,
        root,
        "set_range",
        vec![CallArg::LevelRange(literal)],
    );

    let pdb = policy.compile_with(&common::mls_options()).unwrap();

    let user = pdb.users.get("u").unwrap();
    let range = user.range.as_ref().expect("range was attached");
    assert_eq!(range.low.sens, 1);
    assert_eq!(range.high.sens, 1);
    assert!(range.high.cats.get(0));
}
