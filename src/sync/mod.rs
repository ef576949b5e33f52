//! Sync orchestration
//!
//! - [`finder`]: resolve a source issue to its destination key
//! - [`strategy`]: merge rules between source and destination
//! - [`engine`]: the sync pass itself
//! - [`detect`]: title-based mapping discovery and CSV import

pub mod detect;
pub mod engine;
pub mod finder;
pub mod strategy;

pub use detect::{
    detect_mappings, detect_since, import_mappings, read_mappings_csv, write_mappings_csv,
    MappingPair,
};
pub use engine::{
    EngineOptions, IssueFailure, IssueOutcome, LastSyncAdvance, SyncEngine, SyncReport,
};
pub use finder::Finder;
pub use strategy::{OneWayStrategy, Reconciliation, SyncStrategy, DESCRIPTION_BANNER};
