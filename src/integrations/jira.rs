//! JIRA destination client
//!
//! Mirrors issues into one JIRA project through the REST v2 API, which takes
//! plain-text descriptions and comment bodies.
//!
//! Reads and updates are wrapped in [`with_retry`] as a whole: an update
//! re-reads the remote issue and re-plans its comments on every attempt.
//! Creation is not repeatable, so only the `POST /issue` is retried there and
//! each follow-up comment and transition gets its own retry against the
//! created key.

use super::comments::{plan_comment_sync, CommentOp};
use super::http_error;
use super::retry::{with_retry, RetryConfig};
use super::tracker::DestinationTracker;
use crate::config::JiraConfig;
use crate::model::{Comment, Field, Issue, IssueStatus};
use crate::{Result, SyncError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const TRACKER: &str = "JIRA";

/// Per-request timeout for search/query operations
const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Per-request timeout for single issue fetches
const GET_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-request timeout for create/update operations
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);

/// Workflow statuses treated as closed (compared case-insensitively)
pub const DONE_STATUSES: &[&str] = &["done", "closed", "resolved", "fixed"];

const ISSUE_FIELDS: &str = "summary,description,status,project,updated,comment";

/// How requests authenticate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JiraAuth {
    Basic { user: String, password: String },
    Bearer(String),
    Anonymous,
}

impl JiraAuth {
    /// Basic auth when user and password are both set, else token, else none
    pub fn from_config(config: &JiraConfig) -> Self {
        match (&config.user, &config.password, &config.token) {
            (Some(user), Some(password), _) => JiraAuth::Basic {
                user: user.clone(),
                password: password.clone(),
            },
            (_, _, Some(token)) => JiraAuth::Bearer(token.clone()),
            _ => JiraAuth::Anonymous,
        }
    }
}

/// JIRA REST client bound to one project
pub struct JiraClient {
    client: Client,
    site_url: String,
    base_url: String,
    project: String,
    issue_type: String,
    done_transition: String,
    reopen_transition: String,
    auth: JiraAuth,
    retry: RetryConfig,
}

/// JIRA issue representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraIssue {
    pub key: String,
    #[serde(default)]
    pub id: Option<String>,
    pub fields: JiraFields,
}

/// JIRA issue fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraFields {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<JiraStatus>,
    #[serde(default)]
    pub project: Option<JiraProject>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub comment: Option<JiraCommentPage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraStatus {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraProject {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraCommentPage {
    #[serde(default)]
    pub comments: Vec<JiraComment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraComment {
    pub id: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub author: Option<JiraUser>,
    #[serde(default)]
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraUser {
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraTransition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub to: Option<JiraStatus>,
}

#[derive(Debug, Deserialize)]
struct JiraSearchResponse {
    #[serde(default)]
    total: u32,
    #[serde(default)]
    issues: Vec<JiraIssue>,
}

#[derive(Debug, Deserialize)]
struct JiraTransitionsResponse {
    #[serde(default)]
    transitions: Vec<JiraTransition>,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    key: String,
}

#[derive(Debug, Serialize)]
struct KeyRef<'a> {
    key: &'a str,
}

#[derive(Debug, Serialize)]
struct NameRef<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateFields<'a> {
    project: KeyRef<'a>,
    summary: &'a str,
    description: &'a str,
    #[serde(rename = "issuetype")]
    issue_type: NameRef<'a>,
}

#[derive(Debug, Serialize)]
struct UpdateFields<'a> {
    summary: &'a str,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct FieldsRequest<T> {
    fields: T,
}

#[derive(Debug, Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct TransitionRequest<'a> {
    transition: TransitionId<'a>,
}

#[derive(Debug, Serialize)]
struct TransitionId<'a> {
    id: &'a str,
}

/// Whether a workflow status name counts as closed
pub fn is_done_status(name: &str) -> bool {
    DONE_STATUSES.iter().any(|s| name.eq_ignore_ascii_case(s))
}

/// Parse a JIRA timestamp such as `2024-01-15T10:30:00.000+0000`
pub fn parse_jira_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Escape a title for use inside a quoted JQL phrase search
fn escape_jql_phrase(title: &str) -> String {
    let mut escaped = String::with_capacity(title.len());
    for c in title.chars() {
        match c {
            '\\' => escaped.push_str("\\\\\\\\"),
            '"' => escaped.push_str("\\\\\\\""),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// JQL matching issues whose summary contains `title` as a phrase
pub fn title_search_jql(project: &str, title: &str) -> String {
    format!(
        "project = \"{}\" AND summary ~ \"\\\"{}\\\"\"",
        project.replace('"', "\\\""),
        escape_jql_phrase(title)
    )
}

impl JiraClient {
    /// Create a client from configuration
    pub fn new(config: &JiraConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(SyncError::Config("jira.url is not set".to_string()));
        }

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let site_url = config.url.trim_end_matches('/').to_string();
        let auth = JiraAuth::from_config(config);

        match auth {
            JiraAuth::Basic { ref user, .. } => info!(user = %user, "Connecting to JIRA with basic auth"),
            JiraAuth::Bearer(_) => info!("Connecting to JIRA with token"),
            JiraAuth::Anonymous => info!("Connecting to JIRA without authentication"),
        }

        Ok(Self {
            client,
            base_url: format!("{}/rest/api/2", site_url),
            site_url,
            project: config.project.clone(),
            issue_type: config.issue_type.clone(),
            done_transition: config.done_transition.clone(),
            reopen_transition: config.reopen_transition.clone(),
            auth,
            retry: RetryConfig::default(),
        })
    }

    /// Replace the retry policy (tests use [`RetryConfig::none`])
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn auth(&self) -> &JiraAuth {
        &self.auth
    }

    /// Browser URL of an issue
    pub fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{}", self.site_url, key)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth {
            JiraAuth::Basic {
                ref user,
                ref password,
            } => request.basic_auth(user, Some(password)),
            JiraAuth::Bearer(ref token) => request.bearer_auth(token),
            JiraAuth::Anonymous => request,
        }
    }

    /// Search for issues using JQL
    pub async fn search(&self, jql: &str, max_results: u32) -> Result<Vec<JiraIssue>> {
        let url = format!("{}/search", self.base_url);
        let params = [
            ("jql", jql.to_string()),
            ("maxResults", max_results.to_string()),
            ("fields", "summary".to_string()),
        ];

        debug!(jql = %jql, max_results, "Searching JIRA issues");

        let response = self
            .authorized(self.client.get(&url).query(&params))
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let result: JiraSearchResponse = response.json().await?;
                debug!(
                    total = result.total,
                    returned = result.issues.len(),
                    "JIRA search complete"
                );
                Ok(result.issues)
            }
            _ => Err(http_error(TRACKER, response).await),
        }
    }

    async fn fetch_issue(&self, key: &str) -> Result<JiraIssue> {
        let url = format!("{}/issue/{}", self.base_url, key);

        debug!(key = %key, "Fetching JIRA issue");

        let response = self
            .authorized(self.client.get(&url).query(&[("fields", ISSUE_FIELDS)]))
            .timeout(GET_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(SyncError::IssueNotFound(key.to_string())),
            _ => Err(http_error(TRACKER, response).await),
        }
    }

    async fn update_fields(&self, key: &str, summary: &str, description: &str) -> Result<()> {
        let url = format!("{}/issue/{}", self.base_url, key);
        let body = FieldsRequest {
            fields: UpdateFields {
                summary,
                description,
            },
        };

        info!(key = %key, "Updating JIRA issue fields");

        let response = self
            .authorized(self.client.put(&url).json(&body))
            .timeout(WRITE_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => Err(SyncError::IssueNotFound(key.to_string())),
            _ => Err(http_error(TRACKER, response).await),
        }
    }

    async fn add_comment(&self, key: &str, body: &str) -> Result<()> {
        let url = format!("{}/issue/{}/comment", self.base_url, key);

        debug!(key = %key, "Adding comment to JIRA issue");

        let response = self
            .authorized(self.client.post(&url).json(&CommentRequest { body }))
            .timeout(WRITE_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED | StatusCode::OK => Ok(()),
            _ => Err(http_error(TRACKER, response).await),
        }
    }

    async fn edit_comment(&self, key: &str, comment_id: &str, body: &str) -> Result<()> {
        let url = format!("{}/issue/{}/comment/{}", self.base_url, key, comment_id);

        debug!(key = %key, comment_id = %comment_id, "Editing JIRA comment");

        let response = self
            .authorized(self.client.put(&url).json(&CommentRequest { body }))
            .timeout(WRITE_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            _ => Err(http_error(TRACKER, response).await),
        }
    }

    /// Get available transitions for an issue
    pub async fn get_transitions(&self, key: &str) -> Result<Vec<JiraTransition>> {
        let url = format!("{}/issue/{}/transitions", self.base_url, key);

        let response = self
            .authorized(self.client.get(&url))
            .timeout(GET_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let result: JiraTransitionsResponse = response.json().await?;
                Ok(result.transitions)
            }
            _ => Err(http_error(TRACKER, response).await),
        }
    }

    /// Apply the transition whose name or target status matches `name`
    pub async fn transition_by_name(&self, key: &str, name: &str) -> Result<()> {
        let transitions = self.get_transitions(key).await?;
        let transition = find_transition(&transitions, name).ok_or_else(|| {
            SyncError::Other(format!(
                "No JIRA transition '{}' available for {}",
                name, key
            ))
        })?;

        let url = format!("{}/issue/{}/transitions", self.base_url, key);
        let body = TransitionRequest {
            transition: TransitionId { id: &transition.id },
        };

        info!(key = %key, transition = %transition.name, "Transitioning JIRA issue");

        let response = self
            .authorized(self.client.post(&url).json(&body))
            .timeout(WRITE_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::OK => Ok(()),
            _ => Err(http_error(TRACKER, response).await),
        }
    }

    async fn find_once(&self, title: &str) -> Result<Option<String>> {
        let jql = title_search_jql(&self.project, title);
        info!(jql = %jql, "Searching JIRA for issue by title");

        let issues = self.search(&jql, 50).await?;
        Ok(issues
            .into_iter()
            .find(|i| i.fields.summary == title)
            .map(|i| i.key))
    }

    async fn post_issue(&self, issue: &Issue) -> Result<String> {
        let url = format!("{}/issue", self.base_url);
        let body = FieldsRequest {
            fields: CreateFields {
                project: KeyRef { key: &self.project },
                summary: &issue.title.value,
                description: &issue.description.value,
                issue_type: NameRef {
                    name: &self.issue_type,
                },
            },
        };

        info!(project = %self.project, title = %issue.title.value, "Creating JIRA issue");

        let response = self
            .authorized(self.client.post(&url).json(&body))
            .timeout(WRITE_TIMEOUT)
            .send()
            .await?;

        let created: CreatedIssue = match response.status() {
            StatusCode::CREATED | StatusCode::OK => response.json().await?,
            _ => return Err(http_error(TRACKER, response).await),
        };
        Ok(created.key)
    }

    /// Comments and closing for a freshly created issue, one retry scope per call
    async fn complete_created(&self, key: &str, issue: &Issue) -> Result<()> {
        for comment in &issue.comments {
            with_retry(&self.retry, "jira.add_comment", || {
                self.add_comment(key, &comment.body.value)
            })
            .await?;
        }

        if issue.status.value.is_closed() {
            with_retry(&self.retry, "jira.transition", || {
                self.transition_by_name(key, &self.done_transition)
            })
            .await?;
        }
        Ok(())
    }

    async fn update_once(&self, issue: &Issue) -> Result<()> {
        let key = issue.key_str();
        if key.is_empty() {
            return Err(SyncError::Other(
                "Cannot update a JIRA issue without a key".to_string(),
            ));
        }

        let current = self.fetch_issue(key).await?;

        let current_description = current.fields.description.as_deref().unwrap_or_default();
        if current.fields.summary != issue.title.value
            || current_description != issue.description.value
        {
            self.update_fields(key, &issue.title.value, &issue.description.value)
                .await?;
        }

        let existing: Vec<(String, String)> = current
            .fields
            .comment
            .map(|page| page.comments)
            .unwrap_or_default()
            .into_iter()
            .map(|c| (c.id, c.body))
            .collect();
        let desired: Vec<String> = issue.comments.iter().map(|c| c.body.value.clone()).collect();

        for op in plan_comment_sync(&existing, &desired) {
            match op {
                CommentOp::Edit { id, body } => self.edit_comment(key, &id, body).await?,
                CommentOp::Add { body } => self.add_comment(key, body).await?,
            }
        }

        let currently_closed = current
            .fields
            .status
            .as_ref()
            .map(|s| is_done_status(&s.name))
            .unwrap_or(false);
        match (issue.status.value, currently_closed) {
            (IssueStatus::Closed, false) => {
                self.transition_by_name(key, &self.done_transition).await?
            }
            (IssueStatus::Open, true) => {
                self.transition_by_name(key, &self.reopen_transition)
                    .await?
            }
            _ => {}
        }

        Ok(())
    }

    /// Convert a JIRA issue to the shared issue type
    pub fn to_issue(&self, issue: JiraIssue) -> Issue {
        let fields = issue.fields;
        let updated_at = fields.updated.as_deref().and_then(parse_jira_time);

        let status = match fields.status {
            Some(ref s) if is_done_status(&s.name) => IssueStatus::Closed,
            _ => IssueStatus::Open,
        };

        let comments = fields
            .comment
            .map(|page| page.comments)
            .unwrap_or_default()
            .into_iter()
            .map(|c| {
                let comment_updated = c.updated.as_deref().and_then(parse_jira_time);
                let author = c
                    .author
                    .and_then(|a| a.display_name.or(a.name))
                    .unwrap_or_default();
                Comment {
                    body: Field::at(c.body, comment_updated),
                    author: Field::at(author, comment_updated),
                    updated_at: comment_updated,
                }
            })
            .collect();

        let project = fields
            .project
            .map(|p| p.key)
            .unwrap_or_else(|| self.project.clone());

        Issue {
            external_url: self.browse_url(&issue.key),
            key: Some(issue.key),
            project: Field::new(project),
            title: Field::at(fields.summary, updated_at),
            description: Field::at(fields.description.unwrap_or_default(), updated_at),
            status: Field::at(status, updated_at),
            comments,
            updated_at,
        }
    }
}

fn find_transition<'a>(transitions: &'a [JiraTransition], name: &str) -> Option<&'a JiraTransition> {
    transitions.iter().find(|t| {
        t.name.eq_ignore_ascii_case(name)
            || t
                .to
                .as_ref()
                .map(|s| s.name.eq_ignore_ascii_case(name))
                .unwrap_or(false)
    })
}

#[async_trait]
impl DestinationTracker for JiraClient {
    fn name(&self) -> &'static str {
        TRACKER
    }

    async fn find_issue_by_title(&self, title: &str) -> Result<Option<String>> {
        with_retry(&self.retry, "jira.find_issue_by_title", || {
            self.find_once(title)
        })
        .await
    }

    async fn get_issue(&self, key: &str) -> Result<Issue> {
        let raw = with_retry(&self.retry, "jira.get_issue", || self.fetch_issue(key)).await?;
        Ok(self.to_issue(raw))
    }

    async fn create_issue(&self, issue: &Issue) -> Result<String> {
        let key = with_retry(&self.retry, "jira.create_issue", || self.post_issue(issue)).await?;

        // The issue exists now; a later pass finds it by title and finishes the mirror
        if let Err(e) = self.complete_created(&key, issue).await {
            warn!(key = %key, "JIRA issue created but not fully mirrored: {}", e);
            return Err(e);
        }

        info!(key = %key, "JIRA issue created");
        Ok(key)
    }

    async fn update_issue(&self, issue: &Issue) -> Result<()> {
        with_retry(&self.retry, "jira.update_issue", || self.update_once(issue)).await
    }
}
