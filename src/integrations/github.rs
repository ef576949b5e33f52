//! GitHub Issues source client
//!
//! Reads issues and comments from one repository through the REST v3 API and
//! pushes status (and, when asked, content) back.

use super::comments::{plan_comment_sync, CommentOp};
use super::http_error;
use super::tracker::SourceTracker;
use crate::config::GitHubConfig;
use crate::model::{Comment, Field, Issue, IssueStatus};
use crate::{Result, SyncError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const TRACKER: &str = "GitHub";

/// Per-request timeout for paginated list calls
const LIST_TIMEOUT: Duration = Duration::from_secs(30);
/// Per-request timeout for single issue fetches
const GET_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-request timeout for create/update operations
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);

/// Page size for list endpoints (the API maximum)
const PER_PAGE: usize = 100;

/// GitHub REST client bound to a single `owner/repo`
pub struct GitHubClient {
    client: Client,
    rest_base_url: String,
    owner: String,
    repo: String,
    auth_token: Option<String>,
}

/// GitHub issue (REST API format)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubIssue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    pub html_url: String,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Present only when the "issue" is a pull request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubComment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub user: Option<GitHubUser>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Issue creation request
#[derive(Debug, Clone, Serialize)]
pub struct CreateIssueRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Issue update request; only set fields are sent
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateIssueRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl UpdateIssueRequest {
    fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.state.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

/// REST base URL for a configured GitHub URL.
///
/// `github.com` and `api.github.com` map to the public API; anything else is
/// treated as GitHub Enterprise.
pub fn rest_base_url(url: &str) -> String {
    let base_url = url.trim_end_matches('/');
    if base_url.contains("api.github.com") {
        base_url.to_string()
    } else if base_url.contains("github.com") {
        "https://api.github.com".to_string()
    } else {
        format!("{}/api/v3", base_url)
    }
}

fn parse_github_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn github_state(status: IssueStatus) -> &'static str {
    match status {
        IssueStatus::Open => "open",
        IssueStatus::Closed => "closed",
    }
}

fn parse_number(id: &str) -> Result<u64> {
    id.trim()
        .parse()
        .map_err(|_| SyncError::Parse(format!("Invalid GitHub issue number: {}", id)))
}

impl GitHubClient {
    /// Create a client for `config.project` (`owner/repo`)
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let (owner, repo) = config
            .project
            .split_once('/')
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty())
            .ok_or_else(|| {
                SyncError::Config(format!(
                    "github.project must be 'owner/repo', got '{}'",
                    config.project
                ))
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers({
                let mut headers = header::HeaderMap::new();
                headers.insert(
                    header::USER_AGENT,
                    header::HeaderValue::from_static(concat!(
                        "issues-sync/",
                        env!("CARGO_PKG_VERSION")
                    )),
                );
                headers.insert(
                    header::ACCEPT,
                    header::HeaderValue::from_static("application/vnd.github.v3+json"),
                );
                headers
            })
            .build()?;

        Ok(Self {
            client,
            rest_base_url: rest_base_url(&config.url),
            owner: owner.to_string(),
            repo: repo.to_string(),
            auth_token: config.token.clone(),
        })
    }

    /// Override the base URL (GitHub Enterprise proxies, test servers)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.rest_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_token.is_some()
    }

    /// Repository as `owner/repo`
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn issues_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/issues",
            self.rest_base_url, self.owner, self.repo
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth_token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Fetch one page of issues (and pull requests) changed since `since`
    async fn list_issues_page(&self, since: DateTime<Utc>, page: usize) -> Result<Vec<GitHubIssue>> {
        let params = [
            ("state", "all".to_string()),
            ("since", since.to_rfc3339()),
            ("per_page", PER_PAGE.to_string()),
            ("page", page.to_string()),
        ];

        debug!(page, since = %since, "Listing GitHub issues");

        let response = self
            .authorized(self.client.get(self.issues_url()).query(&params))
            .timeout(LIST_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            _ => Err(http_error(TRACKER, response).await),
        }
    }

    async fn fetch_issue(&self, number: u64) -> Result<GitHubIssue> {
        let url = format!("{}/{}", self.issues_url(), number);

        debug!(number, "Fetching GitHub issue");

        let response = self
            .authorized(self.client.get(&url))
            .timeout(GET_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(SyncError::IssueNotFound(format!(
                "{}#{}",
                self.repository(),
                number
            ))),
            _ => Err(http_error(TRACKER, response).await),
        }
    }

    /// All comments of an issue, oldest first
    async fn list_comments(&self, number: u64) -> Result<Vec<GitHubComment>> {
        let url = format!("{}/{}/comments", self.issues_url(), number);
        let mut comments = Vec::new();

        for page in 1.. {
            let params = [("per_page", PER_PAGE.to_string()), ("page", page.to_string())];
            let response = self
                .authorized(self.client.get(&url).query(&params))
                .timeout(LIST_TIMEOUT)
                .send()
                .await?;

            let batch: Vec<GitHubComment> = match response.status() {
                StatusCode::OK => response.json().await?,
                _ => return Err(http_error(TRACKER, response).await),
            };

            let done = batch.len() < PER_PAGE;
            comments.extend(batch);
            if done {
                break;
            }
        }

        Ok(comments)
    }

    async fn comments_for(&self, issue: &GitHubIssue) -> Result<Vec<GitHubComment>> {
        if issue.comments == 0 {
            return Ok(Vec::new());
        }
        self.list_comments(issue.number).await
    }

    async fn patch_issue(&self, number: u64, request: &UpdateIssueRequest) -> Result<()> {
        let url = format!("{}/{}", self.issues_url(), number);

        info!(number, state = ?request.state, "Updating GitHub issue");

        let response = self
            .authorized(self.client.patch(&url).json(request))
            .timeout(WRITE_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => Err(SyncError::IssueNotFound(format!(
                "{}#{}",
                self.repository(),
                number
            ))),
            _ => Err(http_error(TRACKER, response).await),
        }
    }

    async fn add_comment(&self, number: u64, body: &str) -> Result<()> {
        let url = format!("{}/{}/comments", self.issues_url(), number);

        debug!(number, "Adding comment to GitHub issue");

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

    async fn edit_comment(&self, comment_id: u64, body: &str) -> Result<()> {
        let url = format!(
            "{}/repos/{}/{}/issues/comments/{}",
            self.rest_base_url, self.owner, self.repo, comment_id
        );

        debug!(comment_id, "Editing GitHub comment");

        let response = self
            .authorized(self.client.patch(&url).json(&CommentRequest { body }))
            .timeout(WRITE_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            _ => Err(http_error(TRACKER, response).await),
        }
    }

    /// Convert a GitHub issue and its comments to the shared issue type
    pub fn to_issue(&self, issue: GitHubIssue, comments: Vec<GitHubComment>) -> Issue {
        let updated_at = parse_github_time(issue.updated_at.as_deref());
        let status = if issue.state.eq_ignore_ascii_case("closed") {
            IssueStatus::Closed
        } else {
            IssueStatus::Open
        };

        let comments = comments
            .into_iter()
            .map(|c| {
                let comment_updated = parse_github_time(c.updated_at.as_deref());
                let author = c.user.map(|u| u.login).unwrap_or_default();
                Comment {
                    body: Field::at(c.body, comment_updated),
                    author: Field::at(author, comment_updated),
                    updated_at: comment_updated,
                }
            })
            .collect();

        Issue {
            key: Some(issue.number.to_string()),
            project: Field::new(self.repo.clone()),
            title: Field::at(issue.title, updated_at),
            description: Field::at(issue.body.unwrap_or_default(), updated_at),
            status: Field::at(status, updated_at),
            comments,
            updated_at,
            external_url: issue.html_url,
        }
    }
}

#[async_trait]
impl SourceTracker for GitHubClient {
    fn name(&self) -> &'static str {
        TRACKER
    }

    async fn list_changed_issues(&self, since: DateTime<Utc>) -> Result<Vec<Issue>> {
        let mut result = Vec::new();
        let mut pull_requests = 0usize;

        for page in 1.. {
            let batch = self.list_issues_page(since, page).await?;
            let done = batch.len() < PER_PAGE;

            for raw in batch {
                if raw.pull_request.is_some() {
                    pull_requests += 1;
                    continue;
                }
                let comments = self.comments_for(&raw).await?;
                result.push(self.to_issue(raw, comments));
            }

            if done {
                break;
            }
        }

        info!(
            repo = %self.repository(),
            count = result.len(),
            skipped_pull_requests = pull_requests,
            "Found GitHub issues to sync"
        );

        Ok(result)
    }

    async fn get_issue(&self, id: &str) -> Result<Issue> {
        let raw = self.fetch_issue(parse_number(id)?).await?;
        let comments = self.comments_for(&raw).await?;
        Ok(self.to_issue(raw, comments))
    }

    async fn update_issue(&self, issue: &Issue) -> Result<()> {
        let number = parse_number(issue.key_str())?;
        let current = self.fetch_issue(number).await?;

        let mut update = UpdateIssueRequest::default();
        let desired_state = github_state(issue.status.value);
        if !current.state.eq_ignore_ascii_case(desired_state) {
            update.state = Some(desired_state.to_string());
        }
        if current.title != issue.title.value {
            update.title = Some(issue.title.value.clone());
        }
        if current.body.as_deref().unwrap_or_default() != issue.description.value {
            update.body = Some(issue.description.value.clone());
        }
        if !update.is_empty() {
            self.patch_issue(number, &update).await?;
        }

        let existing: Vec<(u64, String)> = self
            .comments_for(&current)
            .await?
            .into_iter()
            .map(|c| (c.id, c.body))
            .collect();
        let desired: Vec<String> = issue.comments.iter().map(|c| c.body.value.clone()).collect();

        for op in plan_comment_sync(&existing, &desired) {
            match op {
                CommentOp::Edit { id, body } => self.edit_comment(id, body).await?,
                CommentOp::Add { body } => self.add_comment(number, body).await?,
            }
        }

        Ok(())
    }

    async fn create_issue(&self, issue: &Issue) -> Result<String> {
        let request = CreateIssueRequest {
            title: issue.title.value.clone(),
            body: Some(issue.description.value.clone()),
        };

        info!(repo = %self.repository(), title = %request.title, "Creating GitHub issue");

        let response = self
            .authorized(self.client.post(self.issues_url()).json(&request))
            .timeout(WRITE_TIMEOUT)
            .send()
            .await?;

        let created: GitHubIssue = match response.status() {
            StatusCode::CREATED => response.json().await?,
            _ => return Err(http_error(TRACKER, response).await),
        };

        for comment in &issue.comments {
            self.add_comment(created.number, &comment.body.value).await?;
        }

        info!(number = created.number, "GitHub issue created");
        Ok(created.number.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> GitHubConfig {
        GitHubConfig {
            url: "https://github.com".to_string(),
            project: "testorg/repo".to_string(),
            token: None,
        }
    }

    fn raw_issue(number: u64, state: &str) -> GitHubIssue {
        GitHubIssue {
            number,
            title: "Test issue".to_string(),
            body: Some("Test description".to_string()),
            state: state.to_string(),
            html_url: format!("https://github.com/testorg/repo/issues/{}", number),
            comments: 1,
            updated_at: Some("2026-01-02T00:00:00Z".to_string()),
            pull_request: None,
        }
    }

    #[test]
    fn test_client_creation() {
        let client = GitHubClient::new(&test_config()).unwrap();
        assert_eq!(client.repository(), "testorg/repo");
        assert_eq!(client.rest_base_url, "https://api.github.com");
        assert!(!client.is_authenticated());
    }

    #[test]
    fn test_rest_base_url() {
        assert_eq!(rest_base_url("https://github.com"), "https://api.github.com");
        assert_eq!(
            rest_base_url("https://api.github.com/"),
            "https://api.github.com"
        );
        assert_eq!(
            rest_base_url("https://github.ibm.com"),
            "https://github.ibm.com/api/v3"
        );
    }

    #[test]
    fn test_invalid_project() {
        let mut config = test_config();
        config.project = "no-owner".to_string();
        assert!(matches!(
            GitHubClient::new(&config),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn test_to_issue() {
        let client = GitHubClient::new(&test_config()).unwrap();
        let comments = vec![GitHubComment {
            id: 7,
            body: "me too".to_string(),
            user: Some(GitHubUser {
                login: "octocat".to_string(),
            }),
            updated_at: Some("2026-01-03T10:00:00Z".to_string()),
        }];

        let issue = client.to_issue(raw_issue(123, "closed"), comments);

        assert_eq!(issue.key_str(), "123");
        assert_eq!(issue.project.value, "repo");
        assert_eq!(issue.title.value, "Test issue");
        assert_eq!(issue.description.value, "Test description");
        assert_eq!(issue.status.value, IssueStatus::Closed);
        assert_eq!(
            issue.external_url,
            "https://github.com/testorg/repo/issues/123"
        );
        assert_eq!(issue.comments.len(), 1);
        assert_eq!(issue.comments[0].author.value, "octocat");
        assert_eq!(issue.comments[0].body.value, "me too");
        assert!(issue.updated_at.is_some());
    }

    #[test]
    fn test_missing_body_becomes_empty() {
        let client = GitHubClient::new(&test_config()).unwrap();
        let mut raw = raw_issue(5, "open");
        raw.body = None;

        let issue = client.to_issue(raw, Vec::new());
        assert_eq!(issue.description.value, "");
        assert_eq!(issue.status.value, IssueStatus::Open);
    }

    #[test]
    fn test_pull_request_marker_deserializes() {
        let json = r#"{
            "number": 9,
            "title": "Add feature",
            "state": "open",
            "html_url": "https://github.com/testorg/repo/pull/9",
            "pull_request": {"url": "https://api.github.com/repos/testorg/repo/pulls/9"}
        }"#;
        let raw: GitHubIssue = serde_json::from_str(json).unwrap();
        assert!(raw.pull_request.is_some());
        assert_eq!(raw.comments, 0);
    }

    #[test]
    fn test_update_request_skips_unset_fields() {
        let request = UpdateIssueRequest {
            state: Some("closed".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"state": "closed"}));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("42").unwrap(), 42);
        assert!(matches!(parse_number("PROJ-1"), Err(SyncError::Parse(_))));
    }
}
