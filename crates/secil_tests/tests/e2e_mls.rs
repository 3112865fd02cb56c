//! E2E: category orders, dominance, and range expansion.

mod common;

use common::{catrange_set, catset, mls_options, PolicyBuilder};
use secil_base::ErrorKind;
use secil_tree::{LevelData, Payload, Ref, Spec};

fn declare_cats(policy: &mut PolicyBuilder, names: &[&str]) {
    let root = policy.root();
    for name in names {
        policy.declare(root, name, Payload::Cat);
    }
}

fn mls_base(policy: &mut PolicyBuilder) {
    let root = policy.root();
    policy.declare(root, "s0", Payload::Sens { cats: Vec::new() });
    declare_cats(policy, &["c0", "c1", "c2", "c3"]);
    policy.append(
        root,
        Payload::CatOrder {
            order: vec!["c0".into(), "c1".into(), "c2".into(), "c3".into()],
        },
    );
    policy.append(
        root,
        Payload::Dominance {
            order: vec!["s0".into()],
        },
    );
}

fn user_with_range(
    policy: &mut PolicyBuilder,
    low_cats: Option<secil_tree::CatSetData>,
    high_cats: Option<secil_tree::CatSetData>,
) {
    let root = policy.root();
    policy.declare(
        root,
        "u",
        Payload::User {
            dftlevel: None,
            range: None,
            bounds: None,
        },
    );
    let range = secil_tree::LevelRangeData {
        low: Spec::Inline(LevelData {
            sens: Ref::name("s0"),
            cats: low_cats.map(Spec::Inline),
        }),
        high: Spec::Inline(LevelData {
            sens: Ref::name("s0"),
            cats: high_cats.map(Spec::Inline),
        }),
    };
    policy.append(
        root,
        Payload::UserRange {
            user: Ref::name("u"),
            range: Spec::Inline(range),
        },
    );
}

#[test]
fn category_range_expands_over_the_merged_order() {
    let mut policy = PolicyBuilder::new();
    mls_base(&mut policy);
    user_with_range(
        &mut policy,
        Some(catset(&["c0"])),
        Some(catrange_set("c0", "c3")),
    );

    let pdb = policy.compile_with(&mls_options()).unwrap();

    assert_eq!(pdb.cats.get("c0").unwrap().value, 1);
    assert_eq!(pdb.cats.get("c3").unwrap().value, 4);

    let range = pdb.users.get("u").unwrap().range.as_ref().unwrap();
    assert_eq!(range.low.cats.ones().collect::<Vec<_>>(), vec![0]);
    // (c0 c3) as a range covers every category between them.
    assert_eq!(range.high.cats.ones().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
}

#[test]
fn order_statements_merge_by_endpoints() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.declare(root, "s0", Payload::Sens { cats: Vec::new() });
    declare_cats(&mut policy, &["c0", "c1", "c2", "c3"]);
    policy.append(
        root,
        Payload::CatOrder {
            order: vec!["c0".into(), "c1".into()],
        },
    );
    policy.append(
        root,
        Payload::CatOrder {
            order: vec!["c2".into(), "c3".into()],
        },
    );
    policy.append(
        root,
        Payload::CatOrder {
            order: vec!["c1".into(), "c2".into()],
        },
    );
    policy.append(
        root,
        Payload::Dominance {
            order: vec!["s0".into()],
        },
    );

    let pdb = policy.compile_with(&mls_options()).unwrap();

    assert_eq!(
        pdb.cat_val_to_name,
        vec!["c0", "c1", "c2", "c3"]
    );
}

#[test]
fn contradictory_order_is_a_conflict() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    declare_cats(&mut policy, &["c0", "c1", "c2"]);
    policy.append(
        root,
        Payload::CatOrder {
            order: vec!["c0".into(), "c1".into(), "c2".into()],
        },
    );
    policy.append(
        root,
        Payload::CatOrder {
            order: vec!["c2".into(), "c0".into()],
        },
    );

    let err = policy.compile().unwrap_err();
    assert_eq!(err.kind, ErrorKind::OrderConflict);
}

#[test]
fn unconnected_orders_are_incomplete() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    declare_cats(&mut policy, &["c0", "c1", "c2", "c3"]);
    policy.append(
        root,
        Payload::CatOrder {
            order: vec!["c0".into(), "c1".into()],
        },
    );
    policy.append(
        root,
        Payload::CatOrder {
            order: vec!["c2".into(), "c3".into()],
        },
    );

    let err = policy.compile().unwrap_err();
    assert_eq!(err.kind, ErrorKind::IncompleteOrder);
}

#[test]
fn unordered_category_is_missing() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    declare_cats(&mut policy, &["c0", "c1", "c2"]);
    policy.append(
        root,
        Payload::CatOrder {
            order: vec!["c0".into(), "c1".into()],
        },
    );

    let err = policy.compile().unwrap_err();
    assert_eq!(err.kind, ErrorKind::MissingInOrder);
    assert!(err.message.contains("c2"));
}

#[test]
fn sensitivity_categories_define_the_level() {
    let mut policy = PolicyBuilder::new();
    mls_base(&mut policy);
    let root = policy.root();
    policy.append(
        root,
        Payload::SensCat {
            sens: Ref::name("s0"),
            cats: Spec::Inline(catset(&["c0", "c2"])),
        },
    );

    let pdb = policy.compile_with(&mls_options()).unwrap();

    let level = pdb.levels.get("s0").unwrap();
    assert!(level.defined);
    assert_eq!(level.level.cats.ones().collect::<Vec<_>>(), vec![0, 2]);
}

#[test]
fn non_mls_compilation_emits_categories_but_no_levels() {
    let mut policy = PolicyBuilder::new();
    mls_base(&mut policy);

    let pdb = policy.compile().unwrap();

    // The category order is poured regardless; dominance only under MLS.
    assert_eq!(pdb.cats.nprim, 4);
    assert!(pdb.levels.is_empty());
}
