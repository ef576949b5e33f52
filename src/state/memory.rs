//! In-memory mapping store

use super::{default_last_sync_time, MappingStore, MappingTable};
use crate::Result;
use chrono::{DateTime, Utc};

/// Mapping store that lives for the duration of the process
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    table: MappingTable,
    last_sync_time: DateTime<Utc>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            table: MappingTable::new(),
            last_sync_time: default_last_sync_time(),
        }
    }

    pub fn with_last_sync_time(mut self, time: DateTime<Utc>) -> Self {
        self.last_sync_time = time;
        self
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingStore for InMemoryStore {
    fn get_dest(&self, source_id: &str) -> Option<String> {
        self.table.get_dest(source_id).map(str::to_string)
    }

    fn get_source(&self, dest_id: &str) -> Option<String> {
        self.table.get_source(dest_id).map(str::to_string)
    }

    fn put(&mut self, source_id: &str, dest_id: &str) -> Result<()> {
        self.table.insert(source_id, dest_id);
        Ok(())
    }

    fn last_sync_time(&self) -> DateTime<Utc> {
        self.last_sync_time
    }

    fn set_last_sync_time(&mut self, time: DateTime<Utc>) -> Result<()> {
        self.last_sync_time = time;
        Ok(())
    }

    fn len(&self) -> usize {
        self.table.len()
    }
}
