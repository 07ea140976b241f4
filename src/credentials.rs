//! Credential store capability
//!
//! The sync core only needs `get`/`set` on a token keyed by account name.
//! Backends: environment variable, GitHub CLI, and a private credential file.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

use crate::config::{Config, CredentialSource};

/// Key used when no account name is configured
pub const DEFAULT_ACCOUNT: &str = "default";

/// Minimal token storage interface
pub trait CredentialStore: Send + Sync {
    /// Look up the token for `account`; `Ok(None)` when nothing is stored
    fn get(&self, account: &str) -> Result<Option<String>>;

    /// Persist `token` for `account`
    fn set(&self, account: &str, token: &str) -> Result<()>;

    /// Backend name for display/logging
    fn name(&self) -> &'static str;
}

/// Reads `GITHUB_TOKEN`
pub struct EnvCredentialStore {
    var: String,
}

impl EnvCredentialStore {
    pub fn new() -> Self {
        Self::with_var("GITHUB_TOKEN")
    }

    pub fn with_var(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for EnvCredentialStore {
    fn get(&self, _account: &str) -> Result<Option<String>> {
        debug!("Attempting environment variable authentication");

        let token = match env::var(&self.var) {
            Ok(token) if !token.trim().is_empty() => token.trim().to_string(),
            _ => return Ok(None),
        };

        if !looks_like_github_token(&token) {
            warn!(
                "{} doesn't look like a GitHub token (expected ghp_, gho_, ghs_ or github_pat_ prefix)",
                self.var
            );
        }

        Ok(Some(token))
    }

    fn set(&self, _account: &str, _token: &str) -> Result<()> {
        bail!("Cannot store tokens in the {} environment variable", self.var)
    }

    fn name(&self) -> &'static str {
        "environment"
    }
}

/// Reads the token the GitHub CLI is logged in with
pub struct GhCliCredentialStore;

impl CredentialStore for GhCliCredentialStore {
    fn get(&self, _account: &str) -> Result<Option<String>> {
        debug!("Attempting GitHub CLI authentication");

        let output = match Command::new("gh").args(["auth", "token"]).output() {
            Ok(output) => output,
            Err(e) => {
                debug!("GitHub CLI not available: {}", e);
                return Ok(None);
            }
        };

        if !output.status.success() {
            debug!(
                "GitHub CLI returned no token: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(None);
        }

        let token = String::from_utf8(output.stdout)
            .context("GitHub CLI token is not valid UTF-8")?
            .trim()
            .to_string();

        Ok((!token.is_empty()).then_some(token))
    }

    fn set(&self, _account: &str, _token: &str) -> Result<()> {
        bail!("GitHub CLI tokens are managed with: gh auth login")
    }

    fn name(&self) -> &'static str {
        "gh_cli"
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct CredentialFile {
    #[serde(default)]
    tokens: BTreeMap<String, String>,
}

/// YAML file mapping account names to tokens, readable only by the owner
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$XDG_DATA_HOME/repomirror/credentials.yml`
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().context("Failed to get user data directory")?;
        Ok(data_dir.join("repomirror").join("credentials.yml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<CredentialFile> {
        if !self.path.exists() {
            return Ok(CredentialFile::default());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read credential file: {:?}", self.path))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse credential file: {:?}", self.path))
    }

    fn write(&self, file: &CredentialFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let content = serde_yaml::to_string(file).context("Failed to serialize credentials")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write credential file: {:?}", self.path))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict permissions on {:?}", self.path))?;
        }

        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, account: &str) -> Result<Option<String>> {
        Ok(self.read()?.tokens.get(account).cloned())
    }

    fn set(&self, account: &str, token: &str) -> Result<()> {
        let mut file = self.read()?;
        file.tokens.insert(account.to_string(), token.to_string());
        self.write(&file)?;

        info!("Stored token for {} in {}", account, self.path.display());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Tries each backend in order; `set` goes to the first backend that accepts it
pub struct ChainCredentialStore {
    stores: Vec<Box<dyn CredentialStore>>,
}

impl ChainCredentialStore {
    pub fn new(stores: Vec<Box<dyn CredentialStore>>) -> Self {
        Self { stores }
    }
}

impl CredentialStore for ChainCredentialStore {
    fn get(&self, account: &str) -> Result<Option<String>> {
        for store in &self.stores {
            match store.get(account) {
                Ok(Some(token)) => {
                    info!("Using credentials from {}", store.name());
                    return Ok(Some(token));
                }
                Ok(None) => continue,
                Err(e) => warn!("Credential backend {} failed: {:#}", store.name(), e),
            }
        }
        Ok(None)
    }

    fn set(&self, account: &str, token: &str) -> Result<()> {
        let mut last_error = anyhow!("No writable credential backend configured");
        for store in &self.stores {
            match store.set(account, token) {
                Ok(()) => return Ok(()),
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }

    fn name(&self) -> &'static str {
        "auto"
    }
}

/// Build the credential backend selected in the configuration
pub fn from_config(config: &Config) -> Result<Box<dyn CredentialStore>> {
    let store: Box<dyn CredentialStore> = match config.github.credential_store {
        CredentialSource::Env => Box::new(EnvCredentialStore::new()),
        CredentialSource::GhCli => Box::new(GhCliCredentialStore),
        CredentialSource::File => Box::new(FileCredentialStore::new(
            FileCredentialStore::default_path()?,
        )),
        CredentialSource::Auto => Box::new(ChainCredentialStore::new(vec![
            Box::new(EnvCredentialStore::new()),
            Box::new(FileCredentialStore::new(FileCredentialStore::default_path()?)),
            Box::new(GhCliCredentialStore),
        ])),
    };
    Ok(store)
}

/// Account name used as the credential key
pub fn account_key(config: &Config) -> &str {
    config.github.account.as_deref().unwrap_or(DEFAULT_ACCOUNT)
}

/// Fetch a token or explain how to provide one
pub fn require_token(store: &dyn CredentialStore, account: &str) -> Result<String> {
    store.get(account)?.ok_or_else(|| {
        anyhow!(
            "No GitHub token found for account '{}'. Please either:\n\
             1. Set the GITHUB_TOKEN environment variable\n\
             2. Run: repomirror auth set-token <TOKEN>\n\
             3. Authenticate the GitHub CLI: gh auth login",
            account
        )
    })
}

fn looks_like_github_token(token: &str) -> bool {
    ["ghp_", "gho_", "ghs_", "ghu_", "github_pat_"]
        .iter()
        .any(|prefix| token.starts_with(prefix))
}
