//! Mapping store
//!
//! Persistent cross-reference between source issue ids and destination issue
//! keys, plus the timestamp the next sync pass fetches from.
//!
//! Two backends:
//! - [`InMemoryStore`]: lives for one process, used for tests and one-off runs
//! - [`FileStore`]: a JSON document rewritten in full after every mutation

mod file;
mod mapping;
mod memory;

pub use file::FileStore;
pub use mapping::MappingTable;
pub use memory::InMemoryStore;

use crate::Result;
use chrono::{DateTime, Duration, Utc};

/// How far back the first sync pass looks when no state exists yet
pub const DEFAULT_LOOKBACK_DAYS: i64 = 365;

/// Default last-sync time for a fresh store
pub fn default_last_sync_time() -> DateTime<Utc> {
    Utc::now() - Duration::days(DEFAULT_LOOKBACK_DAYS)
}

/// Storage for source ↔ destination mappings and the sync window.
///
/// Implementations keep both lookup directions consistent on every `put`.
pub trait MappingStore: Send {
    /// Destination key mapped to a source id
    fn get_dest(&self, source_id: &str) -> Option<String>;

    /// Source id mapped to a destination key
    fn get_source(&self, dest_id: &str) -> Option<String>;

    /// Record a pair in both directions
    fn put(&mut self, source_id: &str, dest_id: &str) -> Result<()>;

    /// Lower bound of the next fetch window
    fn last_sync_time(&self) -> DateTime<Utc>;

    fn set_last_sync_time(&mut self, time: DateTime<Utc>) -> Result<()>;

    /// Number of recorded mappings
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
