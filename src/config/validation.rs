//! Configuration validation
//!
//! Validates issues-sync configuration before any tracker is contacted:
//! - Required project identifiers and URLs are present
//! - URLs use http(s)
//! - The GitHub project has the `owner/repo` shape
//! - JIRA basic auth has both halves

use super::sync_config::SyncConfig;
use crate::SyncError;

/// Validation error details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate a configuration, collecting every problem found
pub fn validate_config(config: &SyncConfig) -> ValidationResult {
    let mut errors = Vec::new();

    // GitHub
    check_url(&mut errors, "github.url", &config.github.url);
    if config.github.project.is_empty() {
        errors.push(ValidationError::new(
            "github.project",
            "GitHub repository cannot be empty",
        ));
    } else if !is_owner_repo(&config.github.project) {
        errors.push(ValidationError::new(
            "github.project",
            format!(
                "Expected 'owner/repo', got '{}'",
                config.github.project
            ),
        ));
    }

    // JIRA
    check_url(&mut errors, "jira.url", &config.jira.url);
    if config.jira.project.is_empty() {
        errors.push(ValidationError::new(
            "jira.project",
            "JIRA project key cannot be empty",
        ));
    }
    match (&config.jira.user, &config.jira.password) {
        (Some(_), None) => errors.push(ValidationError::new(
            "jira.password",
            "jira.user is set but jira.password is missing",
        )),
        (None, Some(_)) => errors.push(ValidationError::new(
            "jira.user",
            "jira.password is set but jira.user is missing",
        )),
        _ => {}
    }
    if config.jira.done_transition.trim().is_empty() {
        errors.push(ValidationError::new(
            "jira.done_transition",
            "Transition name cannot be empty",
        ));
    }

    if config.jira.token.is_none() && config.jira.user.is_none() {
        tracing::warn!("No JIRA credentials configured, requests will be anonymous");
    }
    if config.github.token.is_none() {
        tracing::warn!("No GitHub token configured, API rate limits will be low");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate and convert the error list into a [`SyncError::Validation`]
pub fn validate_config_result(config: &SyncConfig) -> crate::Result<()> {
    validate_config(config)
        .map_err(|errors| SyncError::Validation(errors.iter().map(|e| e.to_string()).collect()))
}

fn check_url(errors: &mut Vec<ValidationError>, field: &str, url: &str) {
    if url.is_empty() {
        errors.push(ValidationError::new(field, "URL cannot be empty"));
    } else if !url.starts_with("http://") && !url.starts_with("https://") {
        errors.push(ValidationError::new(field, format!("Invalid URL: {}", url)));
    }
}

fn is_owner_repo(project: &str) -> bool {
    let mut parts = project.split('/');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.github.project = "vmware/versatile-data-kit".to_string();
        config.github.token = Some("gh".to_string());
        config.jira.url = "https://jira.example.com".to_string();
        config.jira.project = "VDK".to_string();
        config.jira.token = Some("jira".to_string());
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_default_config_reports_every_missing_field() {
        let errors = validate_config(&SyncConfig::default()).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();

        assert!(fields.contains(&"github.project"));
        assert!(fields.contains(&"jira.url"));
        assert!(fields.contains(&"jira.project"));
    }

    #[test]
    fn test_invalid_url() {
        let mut config = valid_config();
        config.jira.url = "jira.example.com".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "jira.url");
    }

    #[test]
    fn test_owner_repo_shape() {
        assert!(is_owner_repo("owner/repo"));
        assert!(!is_owner_repo("repo"));
        assert!(!is_owner_repo("owner/"));
        assert!(!is_owner_repo("a/b/c"));

        let mut config = valid_config();
        config.github.project = "just-a-repo".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_basic_auth_needs_both_halves() {
        let mut config = valid_config();
        config.jira.user = Some("bot".to_string());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "jira.password");

        config.jira.password = Some("secret".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_config_result() {
        let result = validate_config_result(&SyncConfig::default());
        assert!(matches!(result, Err(SyncError::Validation(ref msgs)) if !msgs.is_empty()));
    }
}
