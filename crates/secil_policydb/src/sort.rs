//! Object-context collection and ordering.
//!
//! Lowering builds its ocontext lists from pre-sorted arrays, so the first
//! step collects every ocontext statement from the resolved tree (skipping
//! disabled optionals, abstract blocks, and macro bodies) and orders it:
//!
//! - portcons sort lexicographically by `(low, high)`;
//! - genfscons sort by filesystem, then by path length descending;
//! - everything else keeps declaration order.

use secil_tree::{DatumState, Flavor, NodeId, Payload, Tree};

/// Node lists per ocontext kind, already in emission order.
#[derive(Debug, Default)]
pub struct ContextSorts {
    pub ports: Vec<NodeId>,
    pub netifs: Vec<NodeId>,
    pub nodes: Vec<NodeId>,
    pub genfs: Vec<NodeId>,
    pub fsuse: Vec<NodeId>,
    pub pirqs: Vec<NodeId>,
    pub iomems: Vec<NodeId>,
    pub ioports: Vec<NodeId>,
    pub pcidevices: Vec<NodeId>,
}

/// Collects and sorts every ocontext statement.
pub fn collect(tree: &Tree) -> ContextSorts {
    let mut sorts = ContextSorts::default();
    visit(tree, tree.root(), &mut sorts);

    sorts.ports.sort_by_key(|&n| match &tree.node(n).payload {
        Payload::PortCon { low, high, .. } => (*low, *high),
        _ => unreachable!("ports holds portcon nodes"),
    });
    sorts.genfs.sort_by(|&a, &b| {
        let (fs_a, path_a) = genfs_key(tree, a);
        let (fs_b, path_b) = genfs_key(tree, b);
        fs_a.cmp(fs_b).then(path_b.len().cmp(&path_a.len()))
    });
    sorts
}

fn genfs_key(tree: &Tree, node: NodeId) -> (&str, &str) {
    match &tree.node(node).payload {
        Payload::GenfsCon { fs, path, .. } => (fs, path),
        _ => unreachable!("genfs holds genfscon nodes"),
    }
}

fn visit(tree: &Tree, node: NodeId, sorts: &mut ContextSorts) {
    match tree.flavor(node) {
        Flavor::Macro => return,
        Flavor::Optional => {
            let datum = tree.node(node).datum.expect("optional declares a datum");
            if tree.datum(datum).state != DatumState::Enabled {
                return;
            }
        }
        Flavor::Block => {
            if let Payload::Block { is_abstract: true } = tree.node(node).payload {
                return;
            }
        }
        Flavor::PortCon => sorts.ports.push(node),
        Flavor::NetifCon => sorts.netifs.push(node),
        Flavor::NodeCon => sorts.nodes.push(node),
        Flavor::GenfsCon => sorts.genfs.push(node),
        Flavor::FsUse => sorts.fsuse.push(node),
        Flavor::PirqCon => sorts.pirqs.push(node),
        Flavor::IomemCon => sorts.iomems.push(node),
        Flavor::IoportCon => sorts.ioports.push(node),
        Flavor::PciDeviceCon => sorts.pcidevices.push(node),
        _ => {}
    }
    for &child in &tree.node(node).children {
        visit(tree, child, sorts);
    }
}
