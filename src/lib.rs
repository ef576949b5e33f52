//! issues-sync - One-directional issue tracker synchronization
//!
//! Mirrors the issues of a GitHub repository into a JIRA project. The source
//! owns title, description and comments; status closes on whichever side is
//! closed first and is pushed back to the source.
//!
//! # Architecture
//!
//! - **model**: Tracker-agnostic issue types
//! - **state**: Mapping store (source id ↔ destination key, last sync time)
//! - **integrations**: GitHub and JIRA clients behind tracker traits
//! - **sync**: Finder, merge strategy, sync engine and mapping detection
//! - **config**: TOML configuration with environment overrides
//! - **metrics**: Prometheus counters for sync passes

pub mod config;
pub mod error;
pub mod integrations;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod state;
pub mod sync;

// Re-exports
pub use error::{Result, SyncError};
