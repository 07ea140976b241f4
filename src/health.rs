//! System health checks for repomirror
//!
//! Preflight checks run by `repomirror doctor`.

use std::path::Path;

use crate::config::Config;
use crate::credentials::{self, CredentialStore};

/// Result of system health checks
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Git installation status
    pub git: CheckResult,
    /// Credential availability
    pub credentials: CheckResult,
    /// Storage root status (missing root is only a warning)
    pub storage_root: CheckResult,
}

/// Result of an individual health check
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
    pub is_warning: bool,
}

impl CheckResult {
    fn ok_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: None,
            is_warning: false,
        }
    }

    fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn warning_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: true,
        }
    }
}

impl HealthCheck {
    /// Run all health checks
    pub fn run(config: &Config) -> Self {
        let credentials = match credentials::from_config(config) {
            Ok(store) => Self::check_credentials(store.as_ref(), credentials::account_key(config)),
            Err(e) => CheckResult::error_with_details("Credential store unavailable", format!("{:#}", e)),
        };

        Self {
            git: Self::check_git(),
            credentials,
            storage_root: Self::check_storage_root(&config.storage_root()),
        }
    }

    /// Check if all required checks passed (warnings still pass)
    pub fn all_passed(&self) -> bool {
        self.git.passed && self.credentials.passed && self.storage_root.passed
    }

    /// Get all checks for iteration
    pub fn all_checks(&self) -> [(&'static str, &CheckResult); 3] {
        [
            ("Git Installation", &self.git),
            ("GitHub Credentials", &self.credentials),
            ("Storage Root", &self.storage_root),
        ]
    }

    fn check_git() -> CheckResult {
        match std::process::Command::new("git").arg("--version").output() {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                CheckResult::ok_with_details("Git installed", version.trim().to_string())
            }
            Ok(_) => CheckResult::error("Git command failed"),
            Err(_) => CheckResult::error_with_details(
                "Git not found in PATH",
                "Install git: https://git-scm.com/downloads",
            ),
        }
    }

    fn check_credentials(store: &dyn CredentialStore, account: &str) -> CheckResult {
        match store.get(account) {
            Ok(Some(_)) => CheckResult::ok_with_details(
                "GitHub token available",
                format!("Account: {} (store: {})", account, store.name()),
            ),
            Ok(None) => CheckResult::error_with_details(
                "No GitHub token found",
                "Set GITHUB_TOKEN or run: repomirror auth set-token <TOKEN>",
            ),
            Err(e) => CheckResult::error_with_details("Credential lookup failed", format!("{:#}", e)),
        }
    }

    fn check_storage_root(root: &Path) -> CheckResult {
        if root.is_dir() {
            let partitions: Vec<&str> = crate::inventory::Partition::ALL
                .iter()
                .filter(|p| p.path(root).is_dir())
                .map(|p| p.dir_name())
                .collect();
            CheckResult::ok_with_details(
                "Storage root exists",
                format!("{} (partitions: {})", root.display(), partitions.join(", ")),
            )
        } else if root.exists() {
            CheckResult::error_with_details("Storage root is not a directory", root.display().to_string())
        } else {
            CheckResult::warning_with_details(
                "Storage root does not exist yet",
                format!("{} will be created on the first sync", root.display()),
            )
        }
    }
}
