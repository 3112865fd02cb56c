//! Partial-order merging.
//!
//! `categoryorder` and `dominance` statements each declare an adjacency
//! chain: `(categoryorder (c0 c1 c2))` says c0 < c1 < c2 *adjacently*.
//! The merger combines every declared chain into one total order by
//! extending and splicing chains at matching endpoints.
//!
//! Three failures are distinguished: a hint contradicting an existing
//! adjacency ([`ErrorKind::OrderConflict`]), hints that never connect into
//! a single chain ([`ErrorKind::IncompleteOrder`]), and a declared datum
//! that no hint placed ([`ErrorKind::MissingInOrder`]).

use secil_base::{CompileError, ErrorKind, Location, Result};
use secil_tree::{DatumId, Tree};

/// Incrementally merges adjacency hints into chains.
#[derive(Debug, Default)]
pub struct OrderMerger {
    chains: Vec<Vec<DatumId>>,
}

impl OrderMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one hint sequence, pair by pair.
    pub fn add_hint(&mut self, hint: &[DatumId], location: Location) -> Result<()> {
        if hint.len() == 1 {
            // A one-element order still places the element.
            if self.find(hint[0]).is_none() {
                self.chains.push(vec![hint[0]]);
            }
            return Ok(());
        }
        for pair in hint.windows(2) {
            self.add_adjacency(pair[0], pair[1], location)?;
        }
        Ok(())
    }

    fn add_adjacency(&mut self, a: DatumId, b: DatumId, location: Location) -> Result<()> {
        let pos_a = self.find(a);
        let pos_b = self.find(b);

        match (pos_a, pos_b) {
            (None, None) => {
                self.chains.push(vec![a, b]);
                Ok(())
            }
            (Some((ca, ia)), None) => {
                if ia + 1 == self.chains[ca].len() {
                    self.chains[ca].push(b);
                    Ok(())
                } else {
                    Err(conflict(location))
                }
            }
            (None, Some((cb, ib))) => {
                if ib == 0 {
                    self.chains[cb].insert(0, a);
                    Ok(())
                } else {
                    Err(conflict(location))
                }
            }
            (Some((ca, ia)), Some((cb, ib))) => {
                if ca == cb {
                    // Already ordered; it must be the same adjacency.
                    if ia + 1 == ib {
                        Ok(())
                    } else {
                        Err(conflict(location))
                    }
                } else if ia + 1 == self.chains[ca].len() && ib == 0 {
                    // a ends one chain, b begins another: splice.
                    let tail = self.chains.remove(cb);
                    let head = if cb < ca { ca - 1 } else { ca };
                    self.chains[head].extend(tail);
                    Ok(())
                } else {
                    Err(conflict(location))
                }
            }
        }
    }

    fn find(&self, datum: DatumId) -> Option<(usize, usize)> {
        for (ci, chain) in self.chains.iter().enumerate() {
            if let Some(i) = chain.iter().position(|&d| d == datum) {
                return Some((ci, i));
            }
        }
        None
    }

    /// Finishes the merge: exactly one chain must remain and it must cover
    /// every declared datum.
    pub fn finish(
        self,
        tree: &Tree,
        declared: &[DatumId],
        what: &str,
        location: Location,
    ) -> Result<Vec<DatumId>> {
        if self.chains.is_empty() && declared.is_empty() {
            return Ok(Vec::new());
        }
        if self.chains.len() != 1 {
            return Err(CompileError::new(
                ErrorKind::IncompleteOrder,
                location,
                format!(
                    "{} order statements form {} disconnected chains",
                    what,
                    self.chains.len()
                ),
            ));
        }
        let order = self.chains.into_iter().next().unwrap();
        for &datum in declared {
            if !order.contains(&datum) {
                return Err(CompileError::new(
                    ErrorKind::MissingInOrder,
                    location,
                    format!("{} {} does not appear in the {} order", what, tree.datum(datum).name, what),
                ));
            }
        }
        Ok(order)
    }
}

fn conflict(location: Location) -> CompileError {
    CompileError::new(
        ErrorKind::OrderConflict,
        location,
        "order statement contradicts an already merged adjacency",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(i: usize) -> DatumId {
        DatumId::from_index(i)
    }

    fn loc() -> Location {
        Location::line(1)
    }

    #[test]
    fn hints_extend_at_either_end() {
        let mut merger = OrderMerger::new();
        merger.add_hint(&[d(1), d(2)], loc()).unwrap();
        merger.add_hint(&[d(2), d(3)], loc()).unwrap();
        merger.add_hint(&[d(0), d(1)], loc()).unwrap();
        let order = merger
            .finish(&Tree::new(), &[], "category", loc())
            .unwrap();
        assert_eq!(order, vec![d(0), d(1), d(2), d(3)]);
    }

    #[test]
    fn hints_splice_two_chains() {
        let mut merger = OrderMerger::new();
        merger.add_hint(&[d(0), d(1)], loc()).unwrap();
        merger.add_hint(&[d(2), d(3)], loc()).unwrap();
        merger.add_hint(&[d(1), d(2)], loc()).unwrap();
        let order = merger
            .finish(&Tree::new(), &[], "category", loc())
            .unwrap();
        assert_eq!(order, vec![d(0), d(1), d(2), d(3)]);
    }

    #[test]
    fn contradicting_adjacency_is_a_conflict() {
        let mut merger = OrderMerger::new();
        merger.add_hint(&[d(0), d(1), d(2)], loc()).unwrap();
        let err = merger.add_hint(&[d(0), d(2)], loc()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::OrderConflict);
    }

    #[test]
    fn reversed_adjacency_is_a_conflict() {
        let mut merger = OrderMerger::new();
        merger.add_hint(&[d(0), d(1)], loc()).unwrap();
        let err = merger.add_hint(&[d(1), d(0)], loc()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::OrderConflict);
    }

    #[test]
    fn disconnected_chains_are_incomplete() {
        let mut merger = OrderMerger::new();
        merger.add_hint(&[d(0), d(1)], loc()).unwrap();
        merger.add_hint(&[d(2), d(3)], loc()).unwrap();
        let err = merger
            .finish(&Tree::new(), &[], "category", loc())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::IncompleteOrder);
    }

    #[test]
    fn unordered_declaration_is_missing() {
        let mut tree = Tree::new();
        let root = tree.root();
        let mut cats = Vec::new();
        for name in ["c0", "c1", "c5"] {
            let node = tree.declare(root, loc(), name, secil_tree::Payload::Cat).unwrap();
            cats.push(tree.node(node).datum.unwrap());
        }
        let mut merger = OrderMerger::new();
        merger.add_hint(&[cats[0], cats[1]], loc()).unwrap();
        // c5 is declared but never ordered.
        let err = merger.finish(&tree, &cats, "category", loc()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingInOrder);
    }

    #[test]
    fn single_element_hint_places_the_element() {
        let mut merger = OrderMerger::new();
        merger.add_hint(&[d(0)], loc()).unwrap();
        let order = merger
            .finish(&Tree::new(), &[d(0)], "category", loc())
            .unwrap();
        assert_eq!(order, vec![d(0)]);
    }
}
