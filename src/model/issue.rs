//! Issue data structure
//!
//! Tracker-agnostic representation shared by the GitHub and JIRA clients.
//! Each client converts to and from its own wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Issue status
///
/// Trackers with richer workflows are collapsed onto these two states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueStatus {
    #[default]
    Open,
    Closed,
}

impl IssueStatus {
    pub fn is_closed(self) -> bool {
        self == IssueStatus::Closed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IssueStatus::Open => "OPEN",
            IssueStatus::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value paired with the time it last changed at its tracker.
///
/// The timestamp is informational; merging never compares it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Field<T> {
    pub value: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> Field<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            updated_at: None,
        }
    }

    pub fn at(value: T, updated_at: Option<DateTime<Utc>>) -> Self {
        Self { value, updated_at }
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

/// A single issue comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub body: Field<String>,
    pub author: Field<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn new(body: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            body: Field::new(body.into()),
            author: Field::new(author.into()),
            updated_at: None,
        }
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }
}

/// Core issue structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Tracker-specific identifier; `None` until the tracker assigns one
    pub key: Option<String>,
    pub project: Field<String>,
    pub title: Field<String>,
    pub description: Field<String>,
    pub status: Field<IssueStatus>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Browser URL of the issue in its tracker
    #[serde(default)]
    pub external_url: String,
}

impl Issue {
    /// Create an open issue with no comments
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            project: Field::default(),
            title: Field::new(title.into()),
            description: Field::default(),
            status: Field::new(IssueStatus::Open),
            comments: Vec::new(),
            updated_at: None,
            external_url: String::new(),
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Field::new(project.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Field::new(description.into());
        self
    }

    pub fn with_status(mut self, status: IssueStatus) -> Self {
        self.status = Field::new(status);
        self
    }

    pub fn with_comment(mut self, comment: Comment) -> Self {
        self.comments.push(comment);
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn with_external_url(mut self, url: impl Into<String>) -> Self {
        self.external_url = url.into();
        self
    }

    /// Key as a string slice, empty when unassigned
    pub fn key_str(&self) -> &str {
        self.key.as_deref().unwrap_or("")
    }

    /// Compare what a tracker would store: title, description, status and
    /// the ordered comment bodies. Timestamps, keys and URLs are ignored.
    pub fn content_eq(&self, other: &Issue) -> bool {
        self.title.value == other.title.value
            && self.description.value == other.description.value
            && self.status.value == other.status.value
            && self.comments.len() == other.comments.len()
            && self
                .comments
                .iter()
                .zip(&other.comments)
                .all(|(a, b)| a.body.value == b.body.value)
    }
}
