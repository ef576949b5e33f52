//! Sync engine
//!
//! Runs one pass: fetch source issues changed since the last sync, resolve
//! each to a destination issue, then update or create it. Issues are
//! processed strictly one at a time in fetch order, and a failure on one
//! issue never aborts the pass.

use super::finder::Finder;
use super::strategy::{OneWayStrategy, Reconciliation, SyncStrategy};
use crate::integrations::{DestinationTracker, SourceTracker};
use crate::metrics;
use crate::model::Issue;
use crate::state::MappingStore;
use crate::{Result, SyncError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{error, info, warn};

/// When a pass moves the store's last-sync time forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastSyncAdvance {
    /// Never move it; every pass re-reads the same window
    Never,
    /// Move it to the pass start time when no issue failed
    #[default]
    OnCleanPass,
    /// Move it after every pass whose fetch succeeded
    Always,
}

/// Engine behavior switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// Log intended writes without performing them
    pub dry_run: bool,
    pub advance: LastSyncAdvance,
}

/// What happened to one source issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueOutcome {
    Created,
    Updated,
    /// Destination already matched; nothing written
    Unchanged,
    WouldCreate,
    WouldUpdate,
}

impl IssueOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueOutcome::Created => "created",
            IssueOutcome::Updated => "updated",
            IssueOutcome::Unchanged => "unchanged",
            IssueOutcome::WouldCreate => "would_create",
            IssueOutcome::WouldUpdate => "would_update",
        }
    }
}

/// A source issue that could not be synced
#[derive(Debug)]
pub struct IssueFailure {
    pub source_id: String,
    pub error: SyncError,
}

/// Summary of one sync pass
#[derive(Debug)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    /// Lower bound the source was queried with
    pub since: DateTime<Utc>,
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Status pushes back to the source
    pub reciprocal_updates: usize,
    pub would_create: usize,
    pub would_update: usize,
    pub failures: Vec<IssueFailure>,
    /// Whether the store's last-sync time was moved to `started_at`
    pub last_sync_advanced: bool,
}

impl SyncReport {
    fn new(started_at: DateTime<Utc>, since: DateTime<Utc>) -> Self {
        Self {
            started_at,
            since,
            fetched: 0,
            created: 0,
            updated: 0,
            unchanged: 0,
            reciprocal_updates: 0,
            would_create: 0,
            would_update: 0,
            failures: Vec::new(),
            last_sync_advanced: false,
        }
    }

    fn record(&mut self, outcome: IssueOutcome) {
        match outcome {
            IssueOutcome::Created => self.created += 1,
            IssueOutcome::Updated => self.updated += 1,
            IssueOutcome::Unchanged => self.unchanged += 1,
            IssueOutcome::WouldCreate => self.would_create += 1,
            IssueOutcome::WouldUpdate => self.would_update += 1,
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Writes performed against either tracker
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.reciprocal_updates
    }

    /// Label used for pass metrics
    pub fn status(&self) -> &'static str {
        if self.has_failures() {
            "partial"
        } else {
            "success"
        }
    }
}

struct Processed {
    outcome: IssueOutcome,
    reciprocal: bool,
}

/// One-directional sync from a source tracker into a destination tracker
pub struct SyncEngine<S, D> {
    source: S,
    dest: D,
    strategy: Box<dyn SyncStrategy>,
    store: Box<dyn MappingStore>,
    options: EngineOptions,
}

impl<S, D> SyncEngine<S, D>
where
    S: SourceTracker,
    D: DestinationTracker,
{
    /// Engine with the one-way strategy labelled after the source tracker
    pub fn new(source: S, dest: D, store: Box<dyn MappingStore>) -> Self {
        let strategy = Box::new(OneWayStrategy::new(source.name()));
        Self {
            source,
            dest,
            strategy,
            store,
            options: EngineOptions::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: Box<dyn SyncStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn dest(&self) -> &D {
        &self.dest
    }

    pub fn store(&self) -> &dyn MappingStore {
        self.store.as_ref()
    }

    /// Run one sync pass.
    ///
    /// Fails only when the source cannot be listed or the store cannot be
    /// written; per-issue failures are collected in the report.
    pub async fn sync(&mut self) -> Result<SyncReport> {
        let timer = Instant::now();
        let started_at = Utc::now();
        let since = self.store.last_sync_time();

        info!(
            since = %since,
            dry_run = self.options.dry_run,
            source = self.source.name(),
            dest = self.dest.name(),
            "Starting sync pass"
        );

        let issues = match self.source.list_changed_issues(since).await {
            Ok(issues) => issues,
            Err(e) => {
                error!(error = %e, kind = e.kind(), "Failed to fetch source issues");
                metrics::record_pass("failed", timer.elapsed().as_secs_f64());
                return Err(e);
            }
        };

        let mut report = SyncReport::new(started_at, since);
        report.fetched = issues.len();
        info!(count = issues.len(), "Fetched source issues to sync");

        for issue in &issues {
            match self.sync_issue(issue).await {
                Ok(processed) => {
                    metrics::record_issue_outcome(processed.outcome.as_str());
                    report.record(processed.outcome);
                    if processed.reciprocal {
                        report.reciprocal_updates += 1;
                    }
                }
                Err(e) => {
                    error!(
                        source_id = %issue.key_str(),
                        error = %e,
                        kind = e.kind(),
                        "Failed to sync issue"
                    );
                    metrics::record_issue_outcome("failed");
                    report.failures.push(IssueFailure {
                        source_id: issue.key_str().to_string(),
                        error: e,
                    });
                }
            }
        }

        if self.should_advance(&report) {
            self.store.set_last_sync_time(started_at)?;
            report.last_sync_advanced = true;
        } else if report.has_failures() && self.options.advance == LastSyncAdvance::OnCleanPass {
            warn!(
                failures = report.failures.len(),
                "Keeping last sync time so failed issues are retried"
            );
        }

        metrics::record_pass(report.status(), timer.elapsed().as_secs_f64());

        info!(
            fetched = report.fetched,
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            reciprocal = report.reciprocal_updates,
            failed = report.failures.len(),
            "Sync pass complete"
        );

        Ok(report)
    }

    fn should_advance(&self, report: &SyncReport) -> bool {
        if self.options.dry_run {
            return false;
        }
        match self.options.advance {
            LastSyncAdvance::Never => false,
            LastSyncAdvance::OnCleanPass => !report.has_failures(),
            LastSyncAdvance::Always => true,
        }
    }

    async fn sync_issue(&mut self, source_issue: &Issue) -> Result<Processed> {
        let source_id = source_issue.key_str();
        if source_id.is_empty() {
            return Err(SyncError::Other("Source issue has no id".to_string()));
        }

        info!(source_id = %source_id, "Syncing issue");

        let dry_run = self.options.dry_run;
        let found = {
            let mut finder = if dry_run {
                Finder::read_only(&self.dest, self.store.as_mut())
            } else {
                Finder::new(&self.dest, self.store.as_mut())
            };
            finder
                .find_dest_key(source_id, &source_issue.title.value)
                .await?
        };

        match found {
            Some(dest_key) => self.update_existing(&dest_key, source_issue).await,
            None => self.create_new(source_issue).await,
        }
    }

    async fn update_existing(&mut self, dest_key: &str, source_issue: &Issue) -> Result<Processed> {
        let source_id = source_issue.key_str();
        let dry_run = self.options.dry_run;

        let current = self.dest.get_issue(dest_key).await?;
        let Reconciliation {
            dest_issue,
            reciprocal_update,
        } = self.strategy.reconcile(current.clone(), source_issue);

        let outcome = if dest_issue.content_eq(&current) {
            info!(source_id = %source_id, dest_key = %dest_key, "Destination issue up to date");
            IssueOutcome::Unchanged
        } else if dry_run {
            info!(source_id = %source_id, dest_key = %dest_key, "DRY RUN: would update destination issue");
            IssueOutcome::WouldUpdate
        } else {
            self.dest.update_issue(&dest_issue).await?;
            info!(source_id = %source_id, dest_key = %dest_key, "Updated destination issue");
            IssueOutcome::Updated
        };

        let mut reciprocal = false;
        if let Some(status) = reciprocal_update {
            if dry_run {
                info!(source_id = %source_id, status = %status, "DRY RUN: would update source status");
            } else {
                let pushed = source_issue.clone().with_status(status);
                self.source.update_issue(&pushed).await?;
                info!(source_id = %source_id, status = %status, "Updated source status");
                reciprocal = true;
            }
        }

        Ok(Processed {
            outcome,
            reciprocal,
        })
    }

    async fn create_new(&mut self, source_issue: &Issue) -> Result<Processed> {
        let source_id = source_issue.key_str();
        let new_issue = self.strategy.build_new_dest_issue(source_issue);

        if self.options.dry_run {
            info!(source_id = %source_id, title = %new_issue.title.value, "DRY RUN: would create destination issue");
            return Ok(Processed {
                outcome: IssueOutcome::WouldCreate,
                reciprocal: false,
            });
        }

        let dest_key = self.dest.create_issue(&new_issue).await?;
        self.store.put(source_id, &dest_key)?;
        info!(source_id = %source_id, dest_key = %dest_key, "Created destination issue");

        Ok(Processed {
            outcome: IssueOutcome::Created,
            reciprocal: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_with_failures(count: usize) -> SyncReport {
        let mut report = SyncReport::new(Utc::now(), Utc::now());
        for i in 0..count {
            report.failures.push(IssueFailure {
                source_id: i.to_string(),
                error: SyncError::Other("boom".to_string()),
            });
        }
        report
    }

    #[test]
    fn test_report_counts() {
        let mut report = report_with_failures(0);
        report.record(IssueOutcome::Created);
        report.record(IssueOutcome::Updated);
        report.record(IssueOutcome::Unchanged);
        report.record(IssueOutcome::WouldCreate);
        report.reciprocal_updates = 1;

        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.would_create, 1);
        assert_eq!(report.total_changes(), 3);
        assert!(!report.has_failures());
        assert_eq!(report.status(), "success");
    }

    #[test]
    fn test_report_failures() {
        let report = report_with_failures(2);
        assert!(report.has_failures());
        assert_eq!(report.status(), "partial");
    }

    #[test]
    fn test_last_sync_advance_serde() {
        let value: LastSyncAdvance = serde_json::from_str("\"on_clean_pass\"").unwrap();
        assert_eq!(value, LastSyncAdvance::OnCleanPass);
        assert_eq!(
            serde_json::to_string(&LastSyncAdvance::Always).unwrap(),
            "\"always\""
        );
        assert_eq!(LastSyncAdvance::default(), LastSyncAdvance::OnCleanPass);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(IssueOutcome::Created.as_str(), "created");
        assert_eq!(IssueOutcome::WouldUpdate.as_str(), "would_update");
    }
}
