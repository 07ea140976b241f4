//! Action executor - applies one planned action to the storage root
//!
//! Every action performs a single side effect: a git subprocess, one atomic
//! rename, or one recursive removal. Failures are returned as an [`Outcome`],
//! never raised, so the coordinator can keep going.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ActionError;
use crate::git::Vcs;
use crate::inventory::Partition;
use crate::plan::Action;

/// Result of applying one action
#[derive(Debug)]
pub enum Outcome {
    Success,
    Failure(ActionError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure(_) => "failure",
        }
    }
}

impl From<Result<(), ActionError>> for Outcome {
    fn from(result: Result<(), ActionError>) -> Self {
        match result {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::Failure(e),
        }
    }
}

/// Applies actions against one storage root
#[derive(Clone)]
pub struct ActionExecutor {
    storage_root: PathBuf,
    vcs: Arc<dyn Vcs>,
}

impl ActionExecutor {
    pub fn new(storage_root: impl Into<PathBuf>, vcs: Arc<dyn Vcs>) -> Self {
        Self {
            storage_root: storage_root.into(),
            vcs,
        }
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Apply `action` and emit one structured event describing the result
    pub async fn execute(&self, action: &Action) -> Outcome {
        let outcome: Outcome = match action {
            Action::Clone { name, url, target } => self.clone_repo(name, url, *target).await,
            Action::Update { name, partition } => self.update_repo(name, *partition).await,
            Action::Move { name, from, to } => self.move_repo(name, *from, *to).await,
            Action::Delete { name, partition } => self.delete_repo(name, *partition).await,
        }
        .into();

        match &outcome {
            Outcome::Success => info!(
                target: "repomirror::event",
                event = "action",
                action = action.kind().as_str(),
                repo = action.name(),
                partition = action.partition().dir_name(),
                outcome = outcome.as_str(),
                "{}",
                action
            ),
            Outcome::Failure(e) => warn!(
                target: "repomirror::event",
                event = "action",
                action = action.kind().as_str(),
                repo = action.name(),
                partition = action.partition().dir_name(),
                outcome = outcome.as_str(),
                error_kind = e.kind(),
                error = %e,
                "Failed to {}",
                action
            ),
        }

        outcome
    }

    async fn clone_repo(&self, name: &str, url: &str, target: Partition) -> Result<(), ActionError> {
        let partition_dir = target.path(&self.storage_root);
        tokio::fs::create_dir_all(&partition_dir)
            .await
            .map_err(|e| ActionError::filesystem(&partition_dir, e))?;

        let destination = target.repo_path(&self.storage_root, name);
        self.vcs.clone_repository(url, &destination).await
    }

    async fn update_repo(&self, name: &str, partition: Partition) -> Result<(), ActionError> {
        let working_copy = partition.repo_path(&self.storage_root, name);
        self.vcs.fast_forward_pull(&working_copy).await
    }

    /// Single rename; never falls back to copy-then-delete
    async fn move_repo(&self, name: &str, from: Partition, to: Partition) -> Result<(), ActionError> {
        let source = from.repo_path(&self.storage_root, name);
        let destination = to.repo_path(&self.storage_root, name);

        let partition_dir = to.path(&self.storage_root);
        tokio::fs::create_dir_all(&partition_dir)
            .await
            .map_err(|e| ActionError::filesystem(&partition_dir, e))?;

        if tokio::fs::try_exists(&destination).await.unwrap_or(true) {
            return Err(ActionError::filesystem(
                &destination,
                io::Error::new(io::ErrorKind::AlreadyExists, "destination already exists"),
            ));
        }

        tokio::fs::rename(&source, &destination)
            .await
            .map_err(|e| ActionError::filesystem(&source, e))
    }

    async fn delete_repo(&self, name: &str, partition: Partition) -> Result<(), ActionError> {
        let path = partition.repo_path(&self.storage_root, name);
        tokio::fs::remove_dir_all(&path)
            .await
            .map_err(|e| ActionError::filesystem(&path, e))
    }
}
