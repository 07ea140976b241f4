use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for repomirror
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Root directory holding the `public` and `private` partitions
    #[serde(default = "default_storage_root")]
    pub storage_root: String,

    /// GitHub listing and credential settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Synchronization behavior settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Periodic runner configuration
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the GitHub token comes from
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// Environment, then credential file, then GitHub CLI
    #[default]
    Auto,
    /// `GITHUB_TOKEN` only
    Env,
    /// `gh auth token` only
    GhCli,
    /// The repomirror credential file only
    File,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    /// Account name used as the credential key (auto-detected if null)
    pub account: Option<String>,

    /// API endpoint override (GitHub Enterprise)
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Credential backend
    #[serde(default)]
    pub credential_store: CredentialSource,

    /// Repositories requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u8,

    /// Timeout for a single page request in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

/// How an existing working copy is brought up to date
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PullMode {
    /// `git pull --rebase`
    #[default]
    Rebase,
    /// `git pull --ff-only`
    FfOnly,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Maximum parallel actions
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Timeout for git operations in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Pull strategy for existing working copies
    #[serde(default)]
    pub pull_mode: PullMode,
}

/// Periodic runner configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DaemonConfig {
    /// Sync interval
    #[serde(default = "default_interval")]
    pub interval: String, // "30m"
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String, // "compact" or "json"

    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// JSON-lines file receiving every action and summary event
    #[serde(default)]
    pub event_log: Option<String>,
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_page_size() -> u8 {
    100
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_parallel() -> usize {
    4
}
fn default_timeout() -> u64 {
    300
}
fn default_interval() -> String {
    "30m".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            account: None,
            api_base_url: None,
            credential_store: CredentialSource::default(),
            page_size: default_page_size(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl GitHubConfig {
    /// Bound on a single API request, never zero
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            timeout: default_timeout(),
            pull_mode: PullMode::default(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_true(),
            event_log: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            let mut config = Self::default();

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            // Persist before expansion so the file keeps the portable form
            config.save(&config_path)?;
            config.expand_paths()?;

            tracing::info!("Created default configuration at: {:?}", config_path);
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("repomirror").join("config.yml"))
    }

    /// Expand environment variables in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.storage_root = shellexpand::full(&self.storage_root)
            .context("Failed to expand storage_root path")?
            .into_owned();

        if let Some(event_log) = &self.logging.event_log {
            self.logging.event_log = Some(
                shellexpand::full(event_log)
                    .context("Failed to expand event_log path")?
                    .into_owned(),
            );
        }

        Ok(())
    }

    pub fn storage_root(&self) -> PathBuf {
        PathBuf::from(&self.storage_root)
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.timeout)
    }
}

fn default_storage_root() -> String {
    "${HOME}/github-repos".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_root: default_storage_root(),
            github: GitHubConfig::default(),
            sync: SyncConfig::default(),
            daemon: DaemonConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
