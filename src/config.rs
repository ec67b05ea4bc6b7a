//! Configuration module for Berth
//!
//! Implements the configuration hierarchy:
//! 1. Environment variables (BERTH_*)
//! 2. Config file (--config path, or /etc/berth.toml when present)
//! 3. Built-in defaults (lowest priority)
//!
//! The resolved `Config` is immutable and constructed exactly once at
//! startup; every operation receives it by reference.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BerthError, BerthResult};
use crate::retry::RetryPolicy;

/// Config file consulted when no --config flag is given
pub const DEFAULT_CONFIG_PATH: &str = "/etc/berth.toml";

/// Remote repository settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    /// URL of the Git remote holding the built site
    #[serde(default = "default_repo_url")]
    pub url: String,

    /// Branch that is the deployment source of truth
    #[serde(default = "default_branch")]
    pub branch: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            url: default_repo_url(),
            branch: default_branch(),
        }
    }
}

fn default_repo_url() -> String {
    "https://git.example.com/site.git".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

/// Checkout destination settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Directory served by the web server; becomes a sparse Git working tree
    #[serde(default = "default_target_dir")]
    pub target_dir: PathBuf,

    /// OS user that owns the checkout and runs every mutating git command
    #[serde(default = "default_deploy_user")]
    pub user: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            target_dir: default_target_dir(),
            user: default_deploy_user(),
        }
    }
}

fn default_target_dir() -> PathBuf {
    PathBuf::from("/var/www/site")
}

fn default_deploy_user() -> String {
    "deploy".to_string()
}

/// Log sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Append-only log file; never rotated or truncated by berth
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
        }
    }
}

fn default_log_file() -> PathBuf {
    PathBuf::from("/var/log/berth.log")
}

/// Retry policy for the fetch step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay_secs: default_delay_secs(),
        }
    }
}

fn default_attempts() -> u32 {
    5
}

fn default_delay_secs() -> u64 {
    10
}

impl RetryConfig {
    /// Convert to the policy consumed by the retry wrapper
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            delay: Duration::from_secs(self.delay_secs),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub repo: RepoConfig,

    #[serde(default)]
    pub deploy: DeployConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

/// Non-fatal configuration warning surfaced to CLI users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: String,
    pub file: PathBuf,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> BerthResult<Self> {
        let (config, _warnings) = Self::load_with_warnings(path)?;
        Ok(config)
    }

    /// Load configuration and collect non-fatal warnings for unknown keys.
    pub fn load_with_warnings(path: &Path) -> BerthResult<(Self, Vec<ConfigWarning>)> {
        let content = fs::read_to_string(path)?;

        let mut unknown_paths: Vec<String> = Vec::new();
        let deserializer = toml::de::Deserializer::new(&content);

        let config: Self = serde_ignored::deserialize(deserializer, |path| {
            unknown_paths.push(path.to_string());
        })
        .map_err(|e| BerthError::Config {
            file: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let warnings = unknown_paths
            .into_iter()
            .map(|key| ConfigWarning {
                key,
                file: path.to_path_buf(),
            })
            .collect();

        Ok((config, warnings))
    }

    /// Resolve config from an explicit path, the system default, or built-ins.
    ///
    /// An explicit path must exist and parse; the system default is only
    /// consulted when it exists. Environment overrides apply last.
    pub fn load_or_default(path: Option<&Path>) -> BerthResult<(Self, Vec<ConfigWarning>)> {
        if let Some(path) = path {
            let (config, warnings) = Self::load_with_warnings(path)?;
            return Ok((config.with_env_overrides(), warnings));
        }

        let system_path = Path::new(DEFAULT_CONFIG_PATH);
        if system_path.exists() {
            let (config, warnings) = Self::load_with_warnings(system_path)?;
            return Ok((config.with_env_overrides(), warnings));
        }

        Ok((Self::default().with_env_overrides(), Vec::new()))
    }

    /// Apply environment variable overrides (BERTH_* prefix)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("BERTH_REPO_URL") {
            self.repo.url = url;
        }

        if let Ok(branch) = std::env::var("BERTH_BRANCH") {
            self.repo.branch = branch;
        }

        if let Ok(dir) = std::env::var("BERTH_TARGET_DIR") {
            self.deploy.target_dir = PathBuf::from(dir);
        }

        if let Ok(user) = std::env::var("BERTH_DEPLOY_USER") {
            self.deploy.user = user;
        }

        if let Ok(file) = std::env::var("BERTH_LOG_FILE") {
            self.log.file = PathBuf::from(file);
        }

        self
    }
}
