//! Resolve a source issue to its destination key
//!
//! The mapping store is consulted first; only on a miss is the destination
//! searched by title. A title hit is recorded so the next pass takes the
//! fast path.

use crate::integrations::DestinationTracker;
use crate::state::MappingStore;
use crate::Result;
use tracing::{debug, info};

/// Lookup helper borrowing the destination client and the store for one call
pub struct Finder<'a, D: ?Sized> {
    dest: &'a D,
    store: &'a mut dyn MappingStore,
    record: bool,
}

impl<'a, D> Finder<'a, D>
where
    D: DestinationTracker + ?Sized,
{
    /// Finder that records title hits in the store
    pub fn new(dest: &'a D, store: &'a mut dyn MappingStore) -> Self {
        Self {
            dest,
            store,
            record: true,
        }
    }

    /// Finder that never writes to the store (dry runs)
    pub fn read_only(dest: &'a D, store: &'a mut dyn MappingStore) -> Self {
        Self {
            dest,
            store,
            record: false,
        }
    }

    /// Destination key for a source issue, or `None` when it has to be created
    pub async fn find_dest_key(&mut self, source_id: &str, title: &str) -> Result<Option<String>> {
        if let Some(key) = self.store.get_dest(source_id) {
            debug!(source_id = %source_id, dest_key = %key, "Mapping found in store");
            return Ok(Some(key));
        }

        match self.dest.find_issue_by_title(title).await? {
            Some(key) => {
                info!(
                    source_id = %source_id,
                    dest_key = %key,
                    tracker = self.dest.name(),
                    "Matched existing issue by title"
                );
                if self.record {
                    self.store.put(source_id, &key)?;
                }
                Ok(Some(key))
            }
            None => {
                debug!(source_id = %source_id, "No destination issue found");
                Ok(None)
            }
        }
    }
}
