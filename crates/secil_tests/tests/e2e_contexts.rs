//! E2E: object contexts, constraints, and role/user relations.

mod common;

use common::{mls_options, PolicyBuilder};
use secil_base::ErrorKind;
use secil_policydb::{ConsAttr, ConsNode};
use secil_tree::{
    ConsCmp, ConsExpr, ConsKey, ConsOperand, ContextData, Payload, Protocol, Ref, SetExpr, Spec,
};
use std::net::IpAddr;

fn context_base(policy: &mut PolicyBuilder) {
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
    policy.declare(root, "r", Payload::Role { bounds: None });
    policy.ty(root, "t");
    policy.append(
        root,
        Payload::RoleType {
            role: Ref::name("r"),
            ty: Ref::name("t"),
        },
    );
    policy.append(
        root,
        Payload::UserRole {
            user: Ref::name("u"),
            role: Ref::name("r"),
        },
    );
}

fn inline_context() -> Spec<ContextData> {
    Spec::Inline(ContextData {
        user: Ref::name("u"),
        role: Ref::name("r"),
        ty: Ref::name("t"),
        range: None,
    })
}

#[test]
fn sids_number_by_declaration_order() {
    let mut policy = PolicyBuilder::new();
    context_base(&mut policy);
    let root = policy.root();
    policy.declare(root, "kernel", Payload::Sid { context: None });
    policy.declare(root, "security", Payload::Sid { context: None });
    policy.append(
        root,
        Payload::SidContext {
            sid: Ref::name("kernel"),
            context: inline_context(),
        },
    );

    let pdb = policy.compile().unwrap();

    let isids = &pdb.ocontexts.isids;
    assert_eq!(isids.len(), 2);
    assert_eq!(isids[0].sid, 1);
    assert_eq!(isids[0].name, "kernel");
    assert!(isids[0].context.is_some());
    assert_eq!(isids[1].sid, 2);
    assert!(isids[1].context.is_none());

    let context = isids[0].context.as_ref().unwrap();
    assert_eq!(context.user, 1);
    assert_eq!(context.role, 2); // object_r holds value 1
    assert_eq!(context.ty, 1);
}

#[test]
fn portcons_sort_by_port_range() {
    let mut policy = PolicyBuilder::new();
    context_base(&mut policy);
    let root = policy.root();
    for (low, high) in [(8080u16, 8080u16), (22, 22), (80, 81)] {
        policy.append(
            root,
            Payload::PortCon {
                proto: Protocol::Tcp,
                low,
                high,
                context: inline_context(),
            },
        );
    }

    let pdb = policy.compile().unwrap();

    let ranges: Vec<(u16, u16)> = pdb
        .ocontexts
        .ports
        .iter()
        .map(|p| (p.low, p.high))
        .collect();
    assert_eq!(ranges, vec![(22, 22), (80, 81), (8080, 8080)]);
    assert_eq!(pdb.ocontexts.ports[0].protocol, 6);
}

#[test]
fn genfscons_group_by_filesystem() {
    let mut policy = PolicyBuilder::new();
    context_base(&mut policy);
    let root = policy.root();
    for (fs, path) in [("proc", "/"), ("sysfs", "/"), ("proc", "/net/tcp")] {
        policy.append(
            root,
            Payload::GenfsCon {
                fs: fs.into(),
                path: path.into(),
                context: inline_context(),
            },
        );
    }

    let pdb = policy.compile().unwrap();

    assert_eq!(pdb.genfs.len(), 2);
    assert_eq!(pdb.genfs[0].fstype, "proc");
    // Within a group, longer paths come first.
    assert_eq!(pdb.genfs[0].paths[0].0, "/net/tcp");
    assert_eq!(pdb.genfs[0].paths[1].0, "/");
    assert_eq!(pdb.genfs[1].fstype, "sysfs");
    assert_eq!(pdb.genfs[1].paths.len(), 1);
}

#[test]
fn nodecon_family_mismatch_is_rejected() {
    let mut policy = PolicyBuilder::new();
    context_base(&mut policy);
    let root = policy.root();
    policy.append(
        root,
        Payload::NodeCon {
            addr: Spec::Inline("10.0.0.0".parse::<IpAddr>().unwrap()),
            mask: Spec::Inline("ffff::".parse::<IpAddr>().unwrap()),
            context: inline_context(),
        },
    );

    let err = policy.compile().unwrap_err();
    assert_eq!(err.kind, ErrorKind::IpFamilyMismatch);
}

#[test]
fn nodecons_split_by_family() {
    let mut policy = PolicyBuilder::new();
    context_base(&mut policy);
    let root = policy.root();
    policy.append(
        root,
        Payload::NodeCon {
            addr: Spec::Inline("10.0.0.0".parse::<IpAddr>().unwrap()),
            mask: Spec::Inline("255.0.0.0".parse::<IpAddr>().unwrap()),
            context: inline_context(),
        },
    );
    policy.append(
        root,
        Payload::NodeCon {
            addr: Spec::Inline("fd00::".parse::<IpAddr>().unwrap()),
            mask: Spec::Inline("ff00::".parse::<IpAddr>().unwrap()),
            context: inline_context(),
        },
    );

    let pdb = policy.compile().unwrap();

    assert_eq!(pdb.ocontexts.nodes.len(), 1);
    assert_eq!(pdb.ocontexts.nodes6.len(), 1);
}

#[test]
fn xen_contexts_need_the_xen_target() {
    let mut policy = PolicyBuilder::new();
    context_base(&mut policy);
    let root = policy.root();
    policy.append(
        root,
        Payload::PirqCon {
            pirq: 9,
            context: inline_context(),
        },
    );

    let pdb = policy.compile().unwrap();
    assert!(pdb.ocontexts.pirqs.is_empty());

    let mut policy = PolicyBuilder::new();
    context_base(&mut policy);
    let root = policy.root();
    policy.append(
        root,
        Payload::PirqCon {
            pirq: 9,
            context: inline_context(),
        },
    );
    let options = secil_compile::CompileOptions {
        target_platform: secil_compile::TargetPlatform::Xen,
        ..Default::default()
    };
    let pdb = policy.compile_with(&options).unwrap();
    assert_eq!(pdb.ocontexts.pirqs.len(), 1);
    assert_eq!(pdb.ocontexts.pirqs[0].pirq, 9);
}

#[test]
fn constraints_attach_to_their_class() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read", "write"]);
    policy.ty(root, "t_a");
    policy.append(
        root,
        Payload::Constrain {
            mls: false,
            classperms: Spec::Inline(secil_tree::ClassPermSetData::new(
                "file",
                vec!["write".into()],
            )),
            expr: ConsExpr::Cmp {
                op: ConsCmp::Eq,
                left: ConsKey::T1,
                right: ConsOperand::Key(ConsKey::T2),
            },
        },
    );

    let pdb = policy.compile().unwrap();

    let class = pdb.classes.get("file").unwrap();
    assert_eq!(class.constraints.len(), 1);
    let constraint = &class.constraints[0];
    assert_eq!(constraint.perm_mask, 0b10);
    assert_eq!(
        constraint.expr,
        vec![ConsNode::Attr {
            op: ConsCmp::Eq,
            attr: ConsAttr::TYPE,
        }]
    );
}

#[test]
fn name_comparisons_compile_to_value_bitmaps() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read"]);
    policy.ty(root, "t_a");
    policy.ty(root, "t_b");
    policy.append(
        root,
        Payload::Constrain {
            mls: false,
            classperms: Spec::Inline(secil_tree::ClassPermSetData::new(
                "file",
                vec!["read".into()],
            )),
            expr: ConsExpr::Not(Box::new(ConsExpr::Cmp {
                op: ConsCmp::Eq,
                left: ConsKey::T1,
                right: ConsOperand::Name(Ref::name("t_b")),
            })),
        },
    );

    let pdb = policy.compile().unwrap();

    let class = pdb.classes.get("file").unwrap();
    let expr = &class.constraints[0].expr;
    assert_eq!(expr.len(), 2);
    match &expr[0] {
        ConsNode::Names { op, attr, names } => {
            assert_eq!(*op, ConsCmp::Eq);
            assert_eq!(*attr, ConsAttr::TYPE);
            // t_b holds value 2.
            assert_eq!(names.ones().collect::<Vec<_>>(), vec![1]);
        }
        other => panic!("expected a names node, got {:?}", other),
    }
    assert_eq!(expr[1], ConsNode::Not);
}

#[test]
fn mls_constraints_are_skipped_without_mls() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.class(root, "file", &["read"]);
    policy.append(
        root,
        Payload::Constrain {
            mls: true,
            classperms: Spec::Inline(secil_tree::ClassPermSetData::new(
                "file",
                vec!["read".into()],
            )),
            expr: ConsExpr::Cmp {
                op: ConsCmp::Dom,
                left: ConsKey::L1,
                right: ConsOperand::Key(ConsKey::L2),
            },
        },
    );

    let pdb = policy.compile().unwrap();
    assert!(pdb.classes.get("file").unwrap().constraints.is_empty());
}

#[test]
fn role_attributes_expand_in_roletype() {
    let mut policy = PolicyBuilder::new();
    let root = policy.root();
    policy.declare(root, "r1", Payload::Role { bounds: None });
    policy.declare(root, "r2", Payload::Role { bounds: None });
    policy.declare(
        root,
        "staff",
        Payload::RoleAttribute { exprs: Vec::new() },
    );
    policy.append(
        root,
        Payload::RoleAttributeSet {
            attr: Ref::name("staff"),
            expr: SetExpr::names(["r1", "r2"]),
        },
    );
    policy.ty(root, "t");
    policy.append(
        root,
        Payload::RoleType {
            role: Ref::name("staff"),
            ty: Ref::name("t"),
        },
    );

    let pdb = policy.compile().unwrap();

    // object_r is value 1; r1 and r2 follow.
    for role in ["r1", "r2"] {
        let datum = pdb.roles.get(role).unwrap();
        assert_eq!(datum.types.ones().collect::<Vec<_>>(), vec![0]);
    }
}

#[test]
fn userrole_sets_the_role_bit() {
    let mut policy = PolicyBuilder::new();
    context_base(&mut policy);

    let pdb = policy.compile().unwrap();

    let user = pdb.users.get("u").unwrap();
    let role_value = pdb.roles.get("r").unwrap().value;
    assert!(user.roles.get((role_value - 1) as usize));
}
