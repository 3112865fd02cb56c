//! The access-vector table.
//!
//! Entries are keyed by `(source, target, class, kind)` with a 32-bit
//! permission mask payload. Insertion is non-unique — conditional branches
//! need duplicate keys so the runtime can toggle them independently — but
//! top-level rules ask for merge mode, which ORs the mask into the first
//! existing entry instead of adding a second one.
//!
//! Entries are stored in insertion order with a hash index on the side, so
//! iteration is deterministic and merge lookup is O(1).

use std::collections::HashMap;

/// The rule kind of an access-vector entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AvtabKind {
    Allowed,
    AuditAllow,
    AuditDeny,
    Transition,
    Change,
    Member,
}

/// The key of an access-vector entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AvtabKey {
    pub source: u32,
    pub target: u32,
    pub class: u32,
    pub kind: AvtabKind,
}

/// One table entry: key plus permission mask (or result type value for
/// transition/change/member entries).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvtabEntry {
    pub key: AvtabKey,
    pub data: u32,
}

/// An access-vector table.
#[derive(Debug, Default, Clone)]
pub struct Avtab {
    entries: Vec<AvtabEntry>,
    index: HashMap<AvtabKey, Vec<usize>>,
}

impl Avtab {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry without looking for duplicates, returning its
    /// position (conditional branches keep these to toggle entries).
    pub fn insert_nonunique(&mut self, key: AvtabKey, data: u32) -> usize {
        let pos = self.entries.len();
        self.entries.push(AvtabEntry { key, data });
        self.index.entry(key).or_default().push(pos);
        pos
    }

    /// Inserts with duplicate-key merging: an existing entry absorbs the
    /// mask with OR. Returns the entry's position either way.
    pub fn insert_merging(&mut self, key: AvtabKey, data: u32) -> usize {
        if let Some(positions) = self.index.get(&key) {
            let pos = positions[0];
            self.entries[pos].data |= data;
            return pos;
        }
        self.insert_nonunique(key, data)
    }

    /// First entry with the given key, if any.
    pub fn search(&self, key: &AvtabKey) -> Option<&AvtabEntry> {
        self.index
            .get(key)
            .map(|positions| &self.entries[positions[0]])
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[AvtabEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(source: u32, target: u32) -> AvtabKey {
        AvtabKey {
            source,
            target,
            class: 1,
            kind: AvtabKind::Allowed,
        }
    }

    #[test]
    fn merging_insert_unions_masks() {
        let mut avtab = Avtab::new();
        avtab.insert_merging(key(1, 2), 0b01);
        avtab.insert_merging(key(1, 2), 0b10);
        assert_eq!(avtab.len(), 1);
        assert_eq!(avtab.search(&key(1, 2)).unwrap().data, 0b11);
    }

    #[test]
    fn nonunique_insert_keeps_duplicates() {
        let mut avtab = Avtab::new();
        let a = avtab.insert_nonunique(key(1, 2), 0b01);
        let b = avtab.insert_nonunique(key(1, 2), 0b10);
        assert_ne!(a, b);
        assert_eq!(avtab.len(), 2);
    }

    #[test]
    fn entries_preserve_insertion_order() {
        let mut avtab = Avtab::new();
        avtab.insert_merging(key(3, 4), 1);
        avtab.insert_merging(key(1, 2), 1);
        let keys: Vec<u32> = avtab.entries().iter().map(|e| e.key.source).collect();
        assert_eq!(keys, vec![3, 1]);
    }
}
