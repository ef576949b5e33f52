//! Tracker integrations
//!
//! Clients for the trackers a sync pass reads from and writes to.
//!
//! # Built-in Integrations
//!
//! - **GitHub**: REST v3 source client ([`GitHubClient`])
//! - **JIRA**: REST v2 destination client ([`JiraClient`])
//!
//! The sync engine only sees the [`SourceTracker`] and [`DestinationTracker`]
//! traits, so tests substitute in-memory trackers.

pub mod comments;
pub mod github;
pub mod jira;
pub mod retry;
pub mod tracker;

pub use comments::{plan_comment_sync, CommentOp};
pub use github::{GitHubClient, GitHubComment, GitHubIssue};
pub use jira::{JiraAuth, JiraClient, JiraIssue, JiraTransition};
pub use retry::{with_retry, RetryConfig, RetryDecision, RetryableError};
pub use tracker::{DestinationTracker, SourceTracker};

use crate::SyncError;
use reqwest::{Response, StatusCode};

/// Turn an unexpected HTTP response into an error, counting it per tracker
pub(crate) async fn http_error(tracker: &'static str, response: Response) -> SyncError {
    let status = response.status();
    let message = response.text().await.unwrap_or_default();

    crate::metrics::record_api_error(status.as_str(), tracker);

    match status {
        StatusCode::UNAUTHORIZED => SyncError::Auth(format!("{} authentication failed", tracker)),
        _ => SyncError::Tracker {
            tracker,
            status: status.as_u16(),
            message,
        },
    }
}
