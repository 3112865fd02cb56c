//! Per-scope, per-kind symbol tables.
//!
//! A [`SymbolTable`] maps declared names to [`DatumId`]s. Insertion rejects
//! duplicates; lookup has no side effects. Iteration follows insertion
//! order, which is what keeps downstream emission deterministic (spelled
//! out for the policy database, but cheap to guarantee here for everything).
//!
//! Each scope owns one table per [`SymKind`](crate::flavor::SymKind);
//! classes, commons, and classmaps additionally own a private permission
//! table of the same shape.

use crate::node::DatumId;
use std::collections::HashMap;

/// An insertion-ordered name → datum map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    map: HashMap<String, DatumId>,
    entries: Vec<(String, DatumId)>,
}

impl SymbolTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `name`, failing if it is already present.
    ///
    /// Returns `Err(existing)` with the previously inserted datum on
    /// collision; the caller turns that into a `DuplicateDeclaration`
    /// with the proper source location.
    pub fn insert(&mut self, name: &str, datum: DatumId) -> Result<(), DatumId> {
        if let Some(&existing) = self.map.get(name) {
            return Err(existing);
        }
        self.map.insert(name.to_owned(), datum);
        self.entries.push((name.to_owned(), datum));
        Ok(())
    }

    /// Looks up `name`. No side effects.
    pub fn lookup(&self, name: &str) -> Option<DatumId> {
        self.map.get(name).copied()
    }

    /// Iterates `(name, datum)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, DatumId)> {
        self.entries.iter().map(|(n, d)| (n.as_str(), *d))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_lookup() {
        let mut table = SymbolTable::new();
        table.insert("file", DatumId::from_index(0)).unwrap();
        assert_eq!(table.lookup("file"), Some(DatumId::from_index(0)));
        assert_eq!(table.lookup("dir"), None);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut table = SymbolTable::new();
        table.insert("t", DatumId::from_index(0)).unwrap();
        let err = table.insert("t", DatumId::from_index(1));
        assert_eq!(err, Err(DatumId::from_index(0)));
        assert_eq!(table.lookup("t"), Some(DatumId::from_index(0)));
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let mut table = SymbolTable::new();
        table.insert("zeta", DatumId::from_index(0)).unwrap();
        table.insert("alpha", DatumId::from_index(1)).unwrap();
        table.insert("mid", DatumId::from_index(2)).unwrap();
        let names: Vec<&str> = table.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }
}
