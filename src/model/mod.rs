//! Tracker-agnostic issue model
//!
//! - **Issue**: title, description, status and comments of one issue
//! - **Comment**: a comment body with its author
//! - **Field**: a value with the time it was last modified at its tracker

mod issue;

pub use issue::{Comment, Field, Issue, IssueStatus};
