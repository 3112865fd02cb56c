//! The neverallow index.
//!
//! Neverallow rules are never emitted; pass 2 expands each one (self and
//! classmap expansion included) into `(source, target, class, mask)`
//! tuples held here. Every later avtab insertion is checked against every
//! tuple: matching key with a non-empty mask intersection is a
//! [`ErrorKind::NeverallowViolation`] naming both source lines.

use secil_base::{CompileError, ErrorKind, Location, Result};

/// One expanded neverallow tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeverallowTuple {
    pub source: u32,
    pub target: u32,
    pub class: u32,
    pub mask: u32,
}

/// One neverallow statement with its expanded tuples.
#[derive(Debug, Clone)]
pub struct NeverallowRecord {
    /// The statement's source line, for the violation diagnostic.
    pub location: Location,
    pub tuples: Vec<NeverallowTuple>,
}

/// The on-the-fly index of every neverallow seen so far.
#[derive(Debug, Clone, Default)]
pub struct NeverallowIndex {
    records: Vec<NeverallowRecord>,
}

impl NeverallowIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a record for one neverallow statement and returns its
    /// position; expansion appends tuples to it.
    pub fn begin_record(&mut self, location: Location) -> usize {
        self.records.push(NeverallowRecord {
            location,
            tuples: Vec::new(),
        });
        self.records.len() - 1
    }

    /// Adds one expanded tuple to a record.
    pub fn add_tuple(&mut self, record: usize, tuple: NeverallowTuple) {
        self.records[record].tuples.push(tuple);
    }

    /// Checks a candidate avtab insertion against every recorded tuple.
    pub fn check(
        &self,
        source: u32,
        target: u32,
        class: u32,
        mask: u32,
        location: Location,
    ) -> Result<()> {
        for record in &self.records {
            for tuple in &record.tuples {
                if tuple.source == source
                    && tuple.target == target
                    && tuple.class == class
                    && tuple.mask & mask != 0
                {
                    return Err(CompileError::new(
                        ErrorKind::NeverallowViolation,
                        location,
                        format!(
                            "rule at {} intersects the neverallow at {}",
                            location, record.location
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersecting_rule_is_a_violation() {
        let mut index = NeverallowIndex::new();
        let record = index.begin_record(Location::line(3));
        index.add_tuple(
            record,
            NeverallowTuple {
                source: 1,
                target: 2,
                class: 1,
                mask: 0b01,
            },
        );
        let err = index.check(1, 2, 1, 0b11, Location::line(9)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NeverallowViolation);
        assert!(err.to_string().contains("line 3"));
        assert!(err.to_string().contains("line 9"));
    }

    #[test]
    fn disjoint_masks_pass() {
        let mut index = NeverallowIndex::new();
        let record = index.begin_record(Location::line(3));
        index.add_tuple(
            record,
            NeverallowTuple {
                source: 1,
                target: 2,
                class: 1,
                mask: 0b01,
            },
        );
        assert!(index.check(1, 2, 1, 0b10, Location::line(9)).is_ok());
        assert!(index.check(2, 2, 1, 0b01, Location::line(9)).is_ok());
    }
}
