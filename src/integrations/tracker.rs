//! Tracker client interfaces consumed by the sync engine

use crate::model::Issue;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// The system of record whose issues are mirrored.
///
/// Content is never written here by a sync pass; only a status push-back
/// through [`SourceTracker::update_issue`].
#[async_trait]
pub trait SourceTracker: Send + Sync {
    /// Short name used in logs (e.g. "GitHub")
    fn name(&self) -> &'static str;

    /// Issues changed at or after `since`, excluding pull requests
    async fn list_changed_issues(&self, since: DateTime<Utc>) -> Result<Vec<Issue>>;

    async fn get_issue(&self, id: &str) -> Result<Issue>;

    /// Apply state, title and body if they differ, then edit changed
    /// comments by position and append any extra ones
    async fn update_issue(&self, issue: &Issue) -> Result<()>;

    /// Create an issue with its comments, returning the new id
    async fn create_issue(&self, issue: &Issue) -> Result<String>;
}

/// The mirror that a sync pass creates and updates issues in.
#[async_trait]
pub trait DestinationTracker: Send + Sync {
    /// Short name used in logs (e.g. "JIRA")
    fn name(&self) -> &'static str;

    /// Key of the issue with exactly this title in the configured project
    async fn find_issue_by_title(&self, title: &str) -> Result<Option<String>>;

    async fn get_issue(&self, key: &str) -> Result<Issue>;

    /// Create an issue with its comments, returning the new key
    async fn create_issue(&self, issue: &Issue) -> Result<String>;

    /// Apply title, body, positional comment replacement and status
    async fn update_issue(&self, issue: &Issue) -> Result<()>;
}
