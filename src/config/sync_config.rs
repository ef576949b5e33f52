//! issues-sync configuration file handling
//!
//! Values resolve in three layers, highest precedence last:
//! 1. packaged defaults (the `Default` impls below)
//! 2. the TOML config file
//! 3. environment variables named `{SECTION}_{KEY}`, e.g. `JIRA_TOKEN`

use crate::sync::LastSyncAdvance;
use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Keys that may be overridden from the environment, per section
const ENV_KEYS: &[(&str, &[&str])] = &[
    ("github", &["url", "project", "token"]),
    (
        "jira",
        &[
            "url",
            "project",
            "token",
            "user",
            "password",
            "issue_type",
            "done_transition",
            "reopen_transition",
        ],
    ),
    (
        "system",
        &["dry_run", "advance_last_sync", "state_backend", "state_file"],
    ),
];

/// Overridable keys whose environment value is parsed as a boolean
const BOOL_KEYS: &[(&str, &str)] = &[("system", "dry_run")];

/// GitHub (source tracker) settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// API or instance URL ("https://api.github.com", "https://github.example.com")
    pub url: String,

    /// Repository as `owner/repo`
    pub project: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            url: "https://api.github.com".to_string(),
            project: String::new(),
            token: None,
        }
    }
}

/// JIRA (destination tracker) settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    pub url: String,

    /// Project key issues are searched and created in
    pub project: String,

    /// Personal access token (bearer auth)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Basic auth user; takes precedence over `token` when `password` is set too
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Issue type for created issues
    pub issue_type: String,

    /// Transition used to close an issue
    pub done_transition: String,

    /// Transition used to reopen an issue
    pub reopen_transition: String,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            project: String::new(),
            token: None,
            user: None,
            password: None,
            issue_type: "Story".to_string(),
            done_transition: "Done".to_string(),
            reopen_transition: "New".to_string(),
        }
    }
}

/// Which mapping store backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    #[default]
    File,
    Memory,
}

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SystemConfig {
    /// Log intended writes instead of performing them
    pub dry_run: bool,

    /// When a pass moves the fetch window forward
    pub advance_last_sync: LastSyncAdvance,

    pub state_backend: StateBackend,

    /// State file location (default ~/.issues-sync/mapping.state.json)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
}

/// Complete issues-sync configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SyncConfig {
    pub github: GitHubConfig,
    pub jira: JiraConfig,
    pub system: SystemConfig,
}

impl SyncConfig {
    /// Load configuration using the process environment for overrides.
    ///
    /// With `path = None` the default locations are searched; finding nothing
    /// falls back to defaults plus environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Load configuration with an explicit environment lookup
    pub fn load_with_env<F>(path: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut table = match path {
            Some(path) => Self::read_table(path)?,
            None => match Self::discover() {
                Some(found) => Self::read_table(&found)?,
                None => {
                    tracing::warn!(
                        "No config file found, using defaults and environment variables"
                    );
                    toml::Table::new()
                }
            },
        };

        apply_env_overrides(&mut table, env);

        let mut config = toml::Value::Table(table).try_into::<SyncConfig>()?;
        config.system.state_file = config.system.state_file.map(expand_home);

        tracing::debug!(
            github_project = %config.github.project,
            jira_project = %config.jira.project,
            dry_run = config.system.dry_run,
            "Configuration resolved"
        );

        Ok(config)
    }

    fn read_table(path: &Path) -> Result<toml::Table> {
        if !path.exists() {
            return Err(SyncError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading configuration");

        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Default config file locations, in search order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".issues-sync").join("config.toml"));
        }
        paths
    }

    fn discover() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|p| p.is_file())
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| SyncError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;

        Ok(())
    }

    /// Effective state file path
    pub fn state_file(&self) -> PathBuf {
        self.system
            .state_file
            .clone()
            .unwrap_or_else(crate::state::FileStore::default_path)
    }
}

/// Environment variable name for a config key
pub fn env_var_name(section: &str, key: &str) -> String {
    format!("{}_{}", section, key).to_uppercase()
}

fn apply_env_overrides<F>(table: &mut toml::Table, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    for (section, keys) in ENV_KEYS {
        for key in *keys {
            let name = env_var_name(section, key);
            let Some(raw) = env(&name) else {
                continue;
            };

            tracing::debug!(var = %name, "Config value overridden from environment");

            let value = if BOOL_KEYS.contains(&(*section, *key)) {
                match raw.parse::<bool>() {
                    Ok(flag) => toml::Value::Boolean(flag),
                    Err(_) => toml::Value::String(raw),
                }
            } else {
                toml::Value::String(raw)
            };

            let entry = table
                .entry(section.to_string())
                .or_insert_with(|| toml::Value::Table(toml::Table::new()));
            if let toml::Value::Table(section_table) = entry {
                section_table.insert(key.to_string(), value);
            }
        }
    }
}

fn expand_home(path: PathBuf) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.clone()),
        Err(_) => path,
    }
}
