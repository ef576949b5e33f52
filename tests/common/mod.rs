//! In-memory trackers shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use issues_sync::integrations::{DestinationTracker, SourceTracker};
use issues_sync::model::{Issue, IssueStatus};
use issues_sync::{Result, SyncError};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Source issue as the GitHub client would produce it
pub fn source_issue(id: &str, title: &str, body: &str) -> Issue {
    Issue::new(id, title)
        .with_project("repo")
        .with_description(body)
        .with_external_url(format!("https://github.com/o/repo/issues/{}", id))
}

/// Source tracker holding issues in fetch order
#[derive(Default)]
pub struct MockSource {
    issues: Mutex<Vec<Issue>>,
    updates: Mutex<Vec<Issue>>,
    queries: Mutex<Vec<DateTime<Utc>>>,
    fail_list: AtomicBool,
}

impl MockSource {
    pub fn new(issues: Vec<Issue>) -> Self {
        Self {
            issues: Mutex::new(issues),
            ..Default::default()
        }
    }

    /// Make `list_changed_issues` fail with a server error
    pub fn failing() -> Self {
        let source = Self::default();
        source.fail_list.store(true, Ordering::SeqCst);
        source
    }

    pub fn push(&self, issue: Issue) {
        self.issues.lock().unwrap().push(issue);
    }

    /// Issues passed to `update_issue`, in call order
    pub fn updates(&self) -> Vec<Issue> {
        self.updates.lock().unwrap().clone()
    }

    /// `since` values the source was listed with
    pub fn queries(&self) -> Vec<DateTime<Utc>> {
        self.queries.lock().unwrap().clone()
    }

    pub fn status_of(&self, id: &str) -> Option<IssueStatus> {
        self.issues
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.key_str() == id)
            .map(|i| i.status.value)
    }
}

#[async_trait]
impl SourceTracker for MockSource {
    fn name(&self) -> &'static str {
        "GitHub"
    }

    async fn list_changed_issues(&self, since: DateTime<Utc>) -> Result<Vec<Issue>> {
        self.queries.lock().unwrap().push(since);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(SyncError::Tracker {
                tracker: "GitHub",
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(self
            .issues
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.updated_at.map_or(true, |t| t >= since))
            .cloned()
            .collect())
    }

    async fn get_issue(&self, id: &str) -> Result<Issue> {
        self.issues
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.key_str() == id)
            .cloned()
            .ok_or_else(|| SyncError::IssueNotFound(id.to_string()))
    }

    async fn update_issue(&self, issue: &Issue) -> Result<()> {
        self.updates.lock().unwrap().push(issue.clone());
        let mut issues = self.issues.lock().unwrap();
        if let Some(stored) = issues.iter_mut().find(|i| i.key == issue.key) {
            stored.status = issue.status.clone();
        }
        Ok(())
    }

    async fn create_issue(&self, issue: &Issue) -> Result<String> {
        let mut issues = self.issues.lock().unwrap();
        let key = (issues.len() + 1).to_string();
        let mut created = issue.clone();
        created.key = Some(key.clone());
        issues.push(created);
        Ok(key)
    }
}

/// Destination tracker keyed `DEST-<n>` that counts every call
#[derive(Default)]
pub struct MockDest {
    issues: Mutex<BTreeMap<String, Issue>>,
    fail_titles: Mutex<HashSet<String>>,
    next_key: AtomicUsize,
    pub searches: AtomicUsize,
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
}

impl MockDest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an issue directly, bypassing the call counters
    pub fn insert(&self, issue: Issue) -> String {
        let key = self.allocate_key();
        let mut stored = issue;
        stored.key = Some(key.clone());
        self.issues.lock().unwrap().insert(key.clone(), stored);
        key
    }

    /// Make `create_issue` fail for this title
    pub fn fail_create_for(&self, title: &str) {
        self.fail_titles.lock().unwrap().insert(title.to_string());
    }

    pub fn issue(&self, key: &str) -> Option<Issue> {
        self.issues.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.issues.lock().unwrap().len()
    }

    pub fn writes(&self) -> usize {
        self.creates.load(Ordering::SeqCst) + self.updates.load(Ordering::SeqCst)
    }

    fn allocate_key(&self) -> String {
        format!("DEST-{}", self.next_key.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl DestinationTracker for MockDest {
    fn name(&self) -> &'static str {
        "JIRA"
    }

    async fn find_issue_by_title(&self, title: &str) -> Result<Option<String>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .issues
            .lock()
            .unwrap()
            .values()
            .find(|i| i.title.value == title)
            .and_then(|i| i.key.clone()))
    }

    async fn get_issue(&self, key: &str) -> Result<Issue> {
        self.issue(key)
            .ok_or_else(|| SyncError::IssueNotFound(key.to_string()))
    }

    async fn create_issue(&self, issue: &Issue) -> Result<String> {
        if self.fail_titles.lock().unwrap().contains(&issue.title.value) {
            return Err(SyncError::Tracker {
                tracker: "JIRA",
                status: 400,
                message: "rejected".to_string(),
            });
        }
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(self.insert(issue.clone()))
    }

    async fn update_issue(&self, issue: &Issue) -> Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let key = issue.key_str().to_string();
        let mut issues = self.issues.lock().unwrap();
        let stored = issues
            .get_mut(&key)
            .ok_or_else(|| SyncError::IssueNotFound(key.clone()))?;

        // Positional replace; surplus comments stay
        let mut comments = issue.comments.clone();
        if stored.comments.len() > comments.len() {
            comments.extend(stored.comments[issue.comments.len()..].iter().cloned());
        }

        stored.title = issue.title.clone();
        stored.description = issue.description.clone();
        stored.status = issue.status.clone();
        stored.comments = comments;
        Ok(())
    }
}
