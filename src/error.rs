//! Error taxonomy for a mirror run
//!
//! Fetch and storage errors are fatal for the run and surface as [`SyncError`].
//! Action errors are recorded per repository and never stop sibling actions.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while listing the remote repository set
#[derive(Debug, Error)]
pub enum FetchError {
    /// The service rejected the credential (HTTP 401)
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// Any other network or HTTP failure, including timeouts
    #[error("failed to fetch repositories: {0}")]
    Transient(String),
}

/// Failures while applying a single planned action
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("git {operation} failed: {detail}")]
    VcsOperation {
        operation: &'static str,
        detail: String,
    },
}

impl ActionError {
    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ActionError::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn vcs(operation: &'static str, detail: impl Into<String>) -> Self {
        ActionError::VcsOperation {
            operation,
            detail: detail.into(),
        }
    }

    /// Short label used in structured events
    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::Filesystem { .. } => "filesystem",
            ActionError::VcsOperation { .. } => "vcs_operation",
        }
    }
}

/// A repository directory exists in both visibility partitions at once
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("repository {name} exists in both the public and private partitions")]
pub struct InconsistentLocalState {
    pub name: String,
}

/// Fatal errors that abort a run before any action executes
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("storage root {} is not accessible: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SyncError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, SyncError::Fetch(FetchError::Authentication(_)))
    }
}
