//! Merge rules between a source issue and its destination mirror

use crate::model::{Comment, Field, Issue, IssueStatus};
use tracing::debug;

/// First line of every mirrored description
pub const DESCRIPTION_BANNER: &str = "Issue created by automatic sync.";

/// Separator between the banner block and the source description
pub const DESCRIPTION_SEPARATOR: &str =
    "------------------------------------------------------------";

/// Result of reconciling a destination issue with its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// The destination issue as it should be written
    pub dest_issue: Issue,
    /// Status the source issue should be pushed to, if any
    pub reciprocal_update: Option<IssueStatus>,
}

/// How source content is projected onto the destination
pub trait SyncStrategy: Send + Sync {
    /// Reconcile a fetched destination issue with its source
    fn reconcile(&self, dest: Issue, source: &Issue) -> Reconciliation;

    /// Destination issue for a source issue that has no mirror yet
    fn build_new_dest_issue(&self, source: &Issue) -> Issue;
}

/// One-way mirroring: the source owns content, closing wins on status
#[derive(Debug, Clone)]
pub struct OneWayStrategy {
    source_label: String,
}

impl Default for OneWayStrategy {
    fn default() -> Self {
        Self::new("GitHub")
    }
}

impl OneWayStrategy {
    /// `source_label` names the source tracker in mirrored comments
    pub fn new(source_label: impl Into<String>) -> Self {
        Self {
            source_label: source_label.into(),
        }
    }

    pub fn source_label(&self) -> &str {
        &self.source_label
    }

    fn mirror_description(source: &Issue) -> String {
        format!(
            "{}\nOriginal URL: {}\n\nDo not edit this issue manually as the sync is one direction.\nOnly status and labels can be changed.\n{}\n{}",
            DESCRIPTION_BANNER, source.external_url, DESCRIPTION_SEPARATOR, source.description.value
        )
    }

    fn mirror_comment(&self, comment: &Comment) -> Comment {
        Comment {
            body: Field::at(
                format!(
                    "{} wrote on {}:\n{}",
                    comment.author.value, self.source_label, comment.body.value
                ),
                comment.body.updated_at,
            ),
            author: comment.author.clone(),
            updated_at: comment.updated_at,
        }
    }
}

impl SyncStrategy for OneWayStrategy {
    fn reconcile(&self, mut dest: Issue, source: &Issue) -> Reconciliation {
        dest.title = source.title.clone();
        dest.description = Field::at(
            Self::mirror_description(source),
            source.description.updated_at,
        );
        dest.comments = source
            .comments
            .iter()
            .map(|c| self.mirror_comment(c))
            .collect();

        let mut reciprocal_update = None;
        if dest.status.value != source.status.value {
            // Closed on either side closes both
            if source.status.value == IssueStatus::Open {
                debug!(
                    source_id = %source.key_str(),
                    dest_key = %dest.key_str(),
                    "Destination closed, closing source"
                );
                reciprocal_update = Some(IssueStatus::Closed);
            } else {
                dest.status = source.status.clone();
            }
        }

        Reconciliation {
            dest_issue: dest,
            reciprocal_update,
        }
    }

    fn build_new_dest_issue(&self, source: &Issue) -> Issue {
        let mut fresh = source.clone();
        fresh.key = None;
        self.reconcile(fresh, source).dest_issue
    }
}
