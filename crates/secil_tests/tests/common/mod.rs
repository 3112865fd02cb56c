//! Shared tree-building helpers for the e2e suite.
//!
//! Tests build parse trees through the same builder API the parser
//! collaborator uses, one statement per source line so diagnostics can be
//! checked against line numbers.

#![allow(dead_code)]

use secil_base::Location;
use secil_compile::{compile, CompileOptions, PolicyDb};
use secil_tree::{
    AvRuleKind, AvTarget, CatItem, CatRangeData, CatSetData, ClassPermSetData, NodeId, Payload,
    Ref, Spec, SymbolTable, Tree,
};

/// A tree under construction, with an automatically advancing line
/// counter.
pub struct PolicyBuilder {
    pub tree: Tree,
    line: u32,
}

impl PolicyBuilder {
    pub fn new() -> Self {
        PolicyBuilder {
            tree: Tree::new(),
            line: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// The line the next statement will be placed on.
    pub fn next_line(&self) -> u32 {
        self.line + 1
    }

    fn loc(&mut self) -> Location {
        self.line += 1;
        Location::line(self.line)
    }

    pub fn class(&mut self, parent: NodeId, name: &str, perms: &[&str]) -> NodeId {
        let loc = self.loc();
        let class = self
            .tree
            .declare(
                parent,
                loc,
                name,
                Payload::Class {
                    common: None,
                    perms: SymbolTable::new(),
                },
            )
            .expect("class declares");
        for perm in perms {
            self.tree.add_perm(class, loc, perm).expect("perm declares");
        }
        class
    }

    pub fn common(&mut self, parent: NodeId, name: &str, perms: &[&str]) -> NodeId {
        let loc = self.loc();
        let common = self
            .tree
            .declare(
                parent,
                loc,
                name,
                Payload::Common {
                    perms: SymbolTable::new(),
                },
            )
            .expect("common declares");
        for perm in perms {
            self.tree
                .add_perm(common, loc, perm)
                .expect("perm declares");
        }
        common
    }

    pub fn declare(&mut self, parent: NodeId, name: &str, payload: Payload) -> NodeId {
        let loc = self.loc();
        self.tree
            .declare(parent, loc, name, payload)
            .expect("declaration succeeds")
    }

    pub fn ty(&mut self, parent: NodeId, name: &str) -> NodeId {
        self.declare(parent, name, Payload::Type { bounds: None })
    }

    pub fn type_attribute(&mut self, parent: NodeId, name: &str) -> NodeId {
        self.declare(parent, name, Payload::TypeAttribute { exprs: Vec::new() })
    }

    pub fn append(&mut self, parent: NodeId, payload: Payload) -> NodeId {
        let loc = self.loc();
        self.tree.append(parent, loc, payload)
    }

    pub fn avrule(
        &mut self,
        parent: NodeId,
        kind: AvRuleKind,
        src: &str,
        tgt: &str,
        class: &str,
        perms: &[&str],
    ) -> NodeId {
        self.append(
            parent,
            Payload::AvRule {
                kind,
                src: Ref::name(src),
                tgt: AvTarget::name(tgt),
                classperms: Spec::Inline(ClassPermSetData::new(
                    class,
                    perms.iter().map(|p| p.to_string()).collect(),
                )),
            },
        )
    }

    pub fn allow(
        &mut self,
        parent: NodeId,
        src: &str,
        tgt: &str,
        class: &str,
        perms: &[&str],
    ) -> NodeId {
        self.avrule(parent, AvRuleKind::Allow, src, tgt, class, perms)
    }

    pub fn compile(self) -> secil_base::Result<PolicyDb> {
        compile(self.tree, &CompileOptions::default())
    }

    pub fn compile_with(self, options: &CompileOptions) -> secil_base::Result<PolicyDb> {
        compile(self.tree, options)
    }
}

/// Options with MLS enabled.
pub fn mls_options() -> CompileOptions {
    CompileOptions {
        mls: true,
        ..Default::default()
    }
}

/// A category set literal over single categories.
pub fn catset(names: &[&str]) -> CatSetData {
    CatSetData {
        items: names
            .iter()
            .map(|n| CatItem::Name(Ref::name(*n)))
            .collect(),
    }
}

/// A category set literal holding one range.
pub fn catrange_set(low: &str, high: &str) -> CatSetData {
    CatSetData {
        items: vec![CatItem::Range(CatRangeData {
            low: Ref::name(low),
            high: Ref::name(high),
        })],
    }
}
