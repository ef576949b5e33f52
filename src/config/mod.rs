//! Configuration system
//!
//! Loads `config.toml` (current directory or ~/.issues-sync/config.toml) with
//! support for:
//! - GitHub source and JIRA destination connection settings
//! - Environment variable overrides (`JIRA_TOKEN`, `GITHUB_PROJECT`, ...)
//! - Dry-run, sync window and state backend settings

mod sync_config;
pub mod validation;

pub use sync_config::{
    env_var_name, GitHubConfig, JiraConfig, StateBackend, SyncConfig, SystemConfig,
};
pub use validation::{validate_config, validate_config_result, ValidationError};
