//! Configuration management for revd
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags (`--config` selects the file)
//! 2. Environment variables (REVD_*, SLACK_WEBHOOK_URL)
//! 3. Config file (`./config.toml`, then ~/.config/revd/config.toml)
//! 4. Default values

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Skill used when a repository does not name one
pub const DEFAULT_SKILL: &str = "review-pr";

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Polling loop settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Seconds to sleep between poll cycles
    pub interval_seconds: u64,

    /// Global cap on simultaneously running reviews
    pub max_concurrent_reviews: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
            max_concurrent_reviews: 3,
        }
    }
}

impl PollingConfig {
    /// Interval between poll cycles
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Filesystem locations
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Persisted daemon state (JSON)
    pub state_file: PathBuf,

    /// Root directory holding one checkout per repository
    pub repo_dir: PathBuf,

    /// Directory for review job logs; job output is discarded when unset
    pub log_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("./state.json"),
            repo_dir: PathBuf::from("./repos"),
            log_dir: None,
        }
    }
}

/// Reviewer (Claude Code) settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Path to the claude executable
    pub claude_path: String,

    /// Model to use for Claude
    pub model: Option<String>,

    /// Maximum agentic turns per review
    pub max_turns: u32,

    /// Hard limit for one reviewer run
    #[serde(with = "humantime_serde")]
    pub review_timeout: Duration,

    /// Limit for each git command run by a review job
    #[serde(with = "humantime_serde")]
    pub git_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            claude_path: "claude".to_string(),
            model: None, // Let claude use its default
            max_turns: 50,
            review_timeout: Duration::from_secs(60 * 60),
            git_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Chat notification settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Slack incoming webhook; notifications are off when unset
    pub slack_webhook_url: Option<String>,
}

/// A watched repository
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RepoConfig {
    /// Repository in `owner/repo` form
    pub name: String,

    /// Skill injected into the reviewer
    #[serde(default = "default_skill")]
    pub skill: String,

    /// Base branches to review; empty means all
    #[serde(default)]
    pub branches: Vec<String>,

    /// Disabled repositories are never polled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_skill() -> String {
    DEFAULT_SKILL.to_string()
}

fn default_enabled() -> bool {
    true
}

impl RepoConfig {
    /// Create an enabled repository entry with the default skill
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            skill: default_skill(),
            branches: Vec::new(),
            enabled: true,
        }
    }

    /// Restrict reviews to PRs targeting these base branches
    pub fn with_branches(mut self, branches: Vec<String>) -> Self {
        self.branches = branches;
        self
    }

    /// Set the skill name
    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skill = skill.into();
        self
    }

    /// Whether a PR targeting `base_branch` passes the branch allow-list
    pub fn admits_branch(&self, base_branch: &str) -> bool {
        self.branches.is_empty() || self.branches.iter().any(|b| b == base_branch)
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub polling: PollingConfig,
    pub paths: PathsConfig,
    pub agent: AgentConfig,
    pub notify: NotifyConfig,
    pub repos: Vec<RepoConfig>,
}

impl Config {
    /// Load configuration from a specific file, normalizing and validating it
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&contents)
    }

    /// Parse, normalize and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        for repo in &mut config.repos {
            repo.name = parse_repo_name(&repo.name)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Find the config file to use
    ///
    /// An explicit path always wins. Otherwise `./config.toml`, then
    /// `~/.config/revd/config.toml`, whichever exists first.
    pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }

        Self::user_config_path().filter(|p| p.exists())
    }

    /// Get the per-user config file path
    ///
    /// Returns `~/.config/revd/config.toml` on Unix
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("revd").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - REVD_CLAUDE_PATH: Path to claude executable
    /// - REVD_MODEL: Model to use
    /// - SLACK_WEBHOOK_URL: Slack incoming webhook
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(claude_path) = std::env::var("REVD_CLAUDE_PATH") {
            self.agent.claude_path = claude_path;
        }

        if let Ok(model) = std::env::var("REVD_MODEL") {
            self.agent.model = Some(model);
        }

        if let Ok(url) = std::env::var("SLACK_WEBHOOK_URL") {
            if !url.trim().is_empty() {
                self.notify.slack_webhook_url = Some(url);
            }
        }

        self
    }

    /// Check invariants the daemon relies on
    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_seconds == 0 {
            return Err(Error::Config(
                "polling.interval_seconds must be at least 1".to_string(),
            ));
        }

        if self.polling.max_concurrent_reviews == 0 {
            return Err(Error::Config(
                "polling.max_concurrent_reviews must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for repo in &self.repos {
            if !seen.insert(repo.name.as_str()) {
                return Err(Error::Config(format!(
                    "Repository {} is listed more than once",
                    repo.name
                )));
            }
            if repo.skill.trim().is_empty() {
                return Err(Error::Config(format!(
                    "Repository {} has an empty skill name",
                    repo.name
                )));
            }
        }

        if let Some(ref webhook) = self.notify.slack_webhook_url {
            url::Url::parse(webhook)
                .map_err(|e| Error::Config(format!("Invalid slack_webhook_url: {}", e)))?;
        }

        Ok(())
    }

    /// Repositories that should be polled
    pub fn enabled_repos(&self) -> impl Iterator<Item = &RepoConfig> {
        self.repos.iter().filter(|r| r.enabled)
    }
}

/// Normalize a repository reference to `owner/repo`
///
/// Supports formats:
/// - owner/repo
/// - https://github.com/owner/repo
/// - git@github.com:owner/repo.git
pub fn parse_repo_name(reference: &str) -> Result<String> {
    let reference = reference.trim();
    let invalid = || {
        Error::Config(format!(
            "Invalid repository format: {}. Expected owner/repo",
            reference
        ))
    };

    let path = if reference.starts_with("https://") || reference.starts_with("http://") {
        let url = url::Url::parse(reference).map_err(|e| Error::Config(e.to_string()))?;
        url.path().trim_start_matches('/').to_string()
    } else if let Some(rest) = reference.strip_prefix("git@") {
        rest.split_once(':').map(|(_, p)| p.to_string()).ok_or_else(invalid)?
    } else {
        reference.to_string()
    };

    let path = path.trim_end_matches('/').trim_end_matches(".git");
    let parts: Vec<&str> = path.split('/').collect();
    match parts.as_slice() {
        [owner, repo] if !owner.is_empty() && !repo.is_empty() => {
            Ok(format!("{}/{}", owner, repo))
        }
        _ => Err(invalid()),
    }
}
