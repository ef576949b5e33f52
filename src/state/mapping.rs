//! Bidirectional source ↔ destination id table

use std::collections::BTreeMap;

/// One-to-one mapping between source ids and destination keys.
///
/// Both directions are updated together; inserting a pair evicts any
/// previous partner of either side, so each id maps to at most one other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    source_to_dest: BTreeMap<String, String>,
    dest_to_source: BTreeMap<String, String>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from source → dest pairs. Later pairs win on conflict.
    pub fn from_pairs<I, S, D>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, D)>,
        S: Into<String>,
        D: Into<String>,
    {
        let mut table = Self::new();
        for (source, dest) in pairs {
            table.insert(source, dest);
        }
        table
    }

    pub fn get_dest(&self, source_id: &str) -> Option<&str> {
        self.source_to_dest.get(source_id).map(String::as_str)
    }

    pub fn get_source(&self, dest_id: &str) -> Option<&str> {
        self.dest_to_source.get(dest_id).map(String::as_str)
    }

    /// Insert a pair, returning true if the table changed
    pub fn insert(&mut self, source_id: impl Into<String>, dest_id: impl Into<String>) -> bool {
        let source_id = source_id.into();
        let dest_id = dest_id.into();

        if self.get_dest(&source_id) == Some(dest_id.as_str()) {
            return false;
        }

        if let Some(old_dest) = self.source_to_dest.remove(&source_id) {
            self.dest_to_source.remove(&old_dest);
        }
        if let Some(old_source) = self.dest_to_source.remove(&dest_id) {
            self.source_to_dest.remove(&old_source);
        }

        self.source_to_dest.insert(source_id.clone(), dest_id.clone());
        self.dest_to_source.insert(dest_id, source_id);
        true
    }

    pub fn len(&self) -> usize {
        self.source_to_dest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source_to_dest.is_empty()
    }

    /// Iterate over (source, dest) pairs in source id order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.source_to_dest
            .iter()
            .map(|(s, d)| (s.as_str(), d.as_str()))
    }

    pub(crate) fn source_to_dest(&self) -> &BTreeMap<String, String> {
        &self.source_to_dest
    }

    pub(crate) fn dest_to_source(&self) -> &BTreeMap<String, String> {
        &self.dest_to_source
    }
}

/// Both directions as stored, before they are checked against each other
#[derive(Debug, Clone, Default)]
pub(crate) struct MappingSnapshot {
    pub source_to_dest: BTreeMap<String, String>,
    pub dest_to_source: BTreeMap<String, String>,
}

impl From<&MappingTable> for MappingSnapshot {
    fn from(table: &MappingTable) -> Self {
        Self {
            source_to_dest: table.source_to_dest().clone(),
            dest_to_source: table.dest_to_source().clone(),
        }
    }
}

impl MappingSnapshot {
    /// Rebuild a table from the forward map. Returns the table and whether
    /// the stored reverse map disagreed with it.
    pub fn into_table(self) -> (MappingTable, bool) {
        let table = MappingTable::from_pairs(self.source_to_dest);
        let consistent = table.dest_to_source() == &self.dest_to_source;
        (table, !consistent)
    }
}
