//! Sync Engine - drives one reconciliation pass
//!
//! A pass is strictly two-phase: snapshot the remote listing and the local
//! inventory once, compute a pure plan, then execute it. Deletes run to
//! completion before any clone/move/update so no directory name is reused
//! while its old owner still exists. The remaining actions are independent
//! per repository name and run on a bounded pool.

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{InconsistentLocalState, SyncError};
use crate::executor::{ActionExecutor, Outcome};
use crate::git::{GitClient, Vcs};
use crate::github::{GitHubLister, RemoteRepository, RepositoryLister};
use crate::inventory::{self, LocalInventory, Partition};
use crate::plan::{self, Action, ActionKind, Plan};

/// Per-run counters, reset for every pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub cloned: usize,
    pub updated: usize,
    pub moved: usize,
    pub deleted: usize,
    pub errors: usize,
}

impl RunStats {
    pub fn record(&mut self, kind: ActionKind, outcome: &Outcome) {
        if !outcome.is_success() {
            self.errors += 1;
            return;
        }
        match kind {
            ActionKind::Clone => self.cloned += 1,
            ActionKind::Update => self.updated += 1,
            ActionKind::Move => self.moved += 1,
            ActionKind::Delete => self.deleted += 1,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.cloned + self.updated + self.moved + self.deleted
    }

    /// True when the run finished but some repositories were not reconciled
    pub fn is_degraded(&self) -> bool {
        self.errors > 0
    }
}

/// One attempted action, kept for the run report
#[derive(Debug, Clone, Serialize)]
pub struct ActionRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: ActionKind,
    pub name: String,
    pub partition: Partition,
    pub success: bool,
    pub error: Option<String>,
}

impl ActionRecord {
    fn new(action: &Action, outcome: &Outcome) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: action.kind(),
            name: action.name().to_string(),
            partition: action.partition(),
            success: outcome.is_success(),
            error: match outcome {
                Outcome::Success => None,
                Outcome::Failure(e) => Some(e.to_string()),
            },
        }
    }
}

/// Results from a complete sync pass
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub stats: RunStats,
    pub records: Vec<ActionRecord>,
    pub conflicts: Vec<InconsistentLocalState>,
    pub rejected: Vec<String>,
    pub duration: Duration,
}

impl SyncReport {
    pub fn failures(&self) -> impl Iterator<Item = &ActionRecord> {
        self.records.iter().filter(|record| !record.success)
    }
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Upper bound on concurrently executing actions
    pub max_parallel: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self { max_parallel: 4 }
    }
}

/// Run coordinator: lister + inventory + planner + executor
#[derive(Clone)]
pub struct SyncEngine {
    lister: Arc<dyn RepositoryLister>,
    executor: ActionExecutor,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(
        lister: Arc<dyn RepositoryLister>,
        vcs: Arc<dyn Vcs>,
        storage_root: impl Into<PathBuf>,
        options: SyncOptions,
    ) -> Self {
        Self {
            lister,
            executor: ActionExecutor::new(storage_root, vcs),
            options,
        }
    }

    /// Wire the GitHub lister and git CLI from configuration
    pub fn from_config(config: &Config, token: String) -> anyhow::Result<Self> {
        let lister = GitHubLister::new(token, &config.github)
            .context("Failed to create GitHub repository lister")?;
        let git = GitClient::new(config.git_timeout(), config.sync.pull_mode);

        Ok(Self::new(
            Arc::new(lister),
            Arc::new(git),
            config.storage_root(),
            SyncOptions {
                max_parallel: config.sync.max_parallel,
            },
        ))
    }

    pub fn storage_root(&self) -> &Path {
        self.executor.storage_root()
    }

    /// Compute the plan without touching the filesystem
    pub async fn plan(&self) -> Result<Plan, SyncError> {
        let remote = self.fetch_remote().await?;
        let local = self.scan_local()?;
        Ok(plan::reconcile(&remote, &local))
    }

    /// Run a complete pass; a summary event is emitted on every path
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let start_time = Instant::now();
        info!("Starting repository synchronization");

        let plan = match self.prepare().await {
            Ok(plan) => plan,
            Err(e) => {
                error!("Sync aborted before planning: {}", e);
                log_summary(&RunStats::default(), start_time.elapsed(), Some(&e));
                return Err(e);
            }
        };

        let mut stats = RunStats::default();
        let mut records = Vec::with_capacity(plan.actions.len());

        for conflict in &plan.conflicts {
            error!(
                target: "repomirror::event",
                event = "action",
                action = "none",
                repo = conflict.name.as_str(),
                outcome = "failure",
                error_kind = "inconsistent_local_state",
                "{}",
                conflict
            );
            stats.errors += 1;
        }

        for name in &plan.rejected {
            error!(
                target: "repomirror::event",
                event = "action",
                action = "none",
                repo = name.as_str(),
                outcome = "failure",
                error_kind = "invalid_name",
                "Remote repository name {:?} is not usable as a directory name",
                name
            );
            stats.errors += 1;
        }

        let (deletes, others): (Vec<Action>, Vec<Action>) = plan
            .actions
            .into_iter()
            .partition(|action| action.kind() == ActionKind::Delete);

        debug!(
            "Executing {} deletes, then {} other actions",
            deletes.len(),
            others.len()
        );

        for phase in [deletes, others] {
            let executed = self.execute_all(phase).await;
            for (record, kind, outcome) in executed {
                stats.record(kind, &outcome);
                records.push(record);
            }
        }

        let duration = start_time.elapsed();
        log_summary(&stats, duration, None);

        Ok(SyncReport {
            stats,
            records,
            conflicts: plan.conflicts,
            rejected: plan.rejected,
            duration,
        })
    }

    async fn prepare(&self) -> Result<Plan, SyncError> {
        let remote = self.fetch_remote().await?;

        let root = self.storage_root();
        inventory::ensure_layout(root).map_err(|source| SyncError::Storage {
            path: root.to_path_buf(),
            source,
        })?;

        let local = self.scan_local()?;
        let plan = plan::reconcile(&remote, &local);

        info!(
            "Planned {} actions ({} clone, {} update, {} move, {} delete), {} conflicts",
            plan.actions.len(),
            plan.count(ActionKind::Clone),
            plan.count(ActionKind::Update),
            plan.count(ActionKind::Move),
            plan.count(ActionKind::Delete),
            plan.conflicts.len()
        );
        Ok(plan)
    }

    async fn fetch_remote(&self) -> Result<Vec<RemoteRepository>, SyncError> {
        let remote = self.lister.list_repositories().await?;
        info!("Found {} remote repositories", remote.len());
        Ok(remote)
    }

    fn scan_local(&self) -> Result<LocalInventory, SyncError> {
        let root = self.storage_root();
        LocalInventory::scan(root).map_err(|source| SyncError::Storage {
            path: root.to_path_buf(),
            source,
        })
    }

    /// Execute independent jobs with at most `max_parallel` in flight
    async fn execute_all(&self, actions: Vec<Action>) -> Vec<(ActionRecord, ActionKind, Outcome)> {
        let parallel = self.options.max_parallel.max(1);

        stream::iter(actions)
            .map(|action| self.execute_job(action))
            .buffer_unordered(parallel)
            .flat_map(stream::iter)
            .collect()
            .await
    }

    /// One repository's work; a successful move is followed by an update at
    /// the destination so the relocated copy is fresh in the same pass
    async fn execute_job(&self, action: Action) -> Vec<(ActionRecord, ActionKind, Outcome)> {
        let mut executed = Vec::with_capacity(2);

        let outcome = self.executor.execute(&action).await;
        let follow_up = match (&action, &outcome) {
            (Action::Move { name, to, .. }, Outcome::Success) => Some(Action::Update {
                name: name.clone(),
                partition: *to,
            }),
            _ => None,
        };
        executed.push((ActionRecord::new(&action, &outcome), action.kind(), outcome));

        if let Some(update) = follow_up {
            let outcome = self.executor.execute(&update).await;
            executed.push((ActionRecord::new(&update, &outcome), update.kind(), outcome));
        }

        executed
    }
}

fn log_summary(stats: &RunStats, duration: Duration, fatal: Option<&SyncError>) {
    let fatal_error = fatal.map(ToString::to_string);

    if fatal.is_some() || stats.is_degraded() {
        warn!(
            target: "repomirror::event",
            event = "summary",
            cloned = stats.cloned,
            updated = stats.updated,
            moved = stats.moved,
            deleted = stats.deleted,
            errors = stats.errors,
            duration_secs = duration.as_secs_f64(),
            fatal = fatal_error.as_deref(),
            "Sync finished with errors"
        );
    } else {
        info!(
            target: "repomirror::event",
            event = "summary",
            cloned = stats.cloned,
            updated = stats.updated,
            moved = stats.moved,
            deleted = stats.deleted,
            errors = stats.errors,
            duration_secs = duration.as_secs_f64(),
            "Sync completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ActionError, FetchError};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use mockall::mock;
    use tempfile::TempDir;

    mock! {
        Lister {}

        #[async_trait]
        impl RepositoryLister for Lister {
            async fn list_repositories(&self) -> Result<Vec<RemoteRepository>, FetchError>;
        }
    }

    struct NoopVcs;

    #[async_trait]
    impl Vcs for NoopVcs {
        async fn clone_repository(&self, _url: &str, destination: &Path) -> Result<(), ActionError> {
            std::fs::create_dir_all(destination).map_err(|e| ActionError::filesystem(destination, e))
        }

        async fn fast_forward_pull(&self, _working_copy: &Path) -> Result<(), ActionError> {
            Ok(())
        }
    }

    fn engine(lister: MockLister, root: &Path) -> SyncEngine {
        SyncEngine::new(
            Arc::new(lister),
            Arc::new(NoopVcs),
            root,
            SyncOptions::default(),
        )
    }

    #[test]
    fn test_stats_record_by_kind() {
        let mut stats = RunStats::default();
        stats.record(ActionKind::Clone, &Outcome::Success);
        stats.record(ActionKind::Update, &Outcome::Success);
        stats.record(ActionKind::Update, &Outcome::Success);
        stats.record(ActionKind::Move, &Outcome::Success);
        stats.record(ActionKind::Delete, &Outcome::Success);
        stats.record(
            ActionKind::Clone,
            &Outcome::Failure(ActionError::vcs("clone", "exit status: 128")),
        );

        assert_eq!(
            stats,
            RunStats {
                cloned: 1,
                updated: 2,
                moved: 1,
                deleted: 1,
                errors: 1,
            }
        );
        assert_eq!(stats.succeeded(), 5);
        assert!(stats.is_degraded());
    }

    #[tokio::test]
    async fn test_authentication_failure_is_fatal_and_touches_nothing() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("mirror");
        let mut lister = MockLister::new();
        lister
            .expect_list_repositories()
            .times(1)
            .returning(|| Err(FetchError::Authentication("Bad credentials".into())));

        let result = engine(lister, &root).run().await;

        assert_matches!(result, Err(ref e) if e.is_authentication());
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_transient_failure_is_fatal() {
        let temp = TempDir::new().unwrap();
        let mut lister = MockLister::new();
        lister
            .expect_list_repositories()
            .returning(|| Err(FetchError::Transient("connection reset".into())));

        let result = engine(lister, temp.path()).run().await;
        assert_matches!(result, Err(SyncError::Fetch(FetchError::Transient(_))));
    }

    #[tokio::test]
    async fn test_unusable_storage_root_is_fatal() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("not-a-dir");
        std::fs::write(&root, "file in the way").unwrap();
        let mut lister = MockLister::new();
        lister.expect_list_repositories().returning(|| Ok(vec![]));

        let result = engine(lister, &root).run().await;
        assert_matches!(result, Err(SyncError::Storage { .. }));
    }

    #[tokio::test]
    async fn test_plan_is_read_only() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("mirror");
        let mut lister = MockLister::new();
        lister.expect_list_repositories().returning(|| {
            Ok(vec![RemoteRepository::new("a", "https://github.com/o/a.git", false)])
        });

        let plan = engine(lister, &root).plan().await.unwrap();

        assert_eq!(plan.count(ActionKind::Clone), 1);
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_move_is_followed_by_update() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("public").join("a")).unwrap();
        let mut lister = MockLister::new();
        lister.expect_list_repositories().returning(|| {
            Ok(vec![RemoteRepository::new("a", "https://github.com/o/a.git", true)])
        });

        let report = engine(lister, temp.path()).run().await.unwrap();

        let kinds: Vec<ActionKind> = report.records.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![ActionKind::Move, ActionKind::Update]);
        assert_eq!(report.stats.moved, 1);
        assert_eq!(report.stats.updated, 1);
        assert!(temp.path().join("private").join("a").is_dir());
    }

    #[tokio::test]
    async fn test_conflicts_are_counted_as_errors() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("public").join("twin")).unwrap();
        std::fs::create_dir_all(temp.path().join("private").join("twin")).unwrap();
        let mut lister = MockLister::new();
        lister.expect_list_repositories().returning(|| {
            Ok(vec![RemoteRepository::new("twin", "https://github.com/o/twin.git", false)])
        });

        let report = engine(lister, temp.path()).run().await.unwrap();

        assert_eq!(report.stats.errors, 1);
        assert!(report.records.is_empty());
        assert_eq!(report.conflicts.len(), 1);
        assert!(temp.path().join("public").join("twin").is_dir());
        assert!(temp.path().join("private").join("twin").is_dir());
    }

    #[tokio::test]
    async fn test_unusable_remote_name_creates_nothing_outside_partitions() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("mirror");
        let mut lister = MockLister::new();
        lister.expect_list_repositories().returning(|| {
            Ok(vec![
                RemoteRepository::new("../escaped", "https://github.com/o/escaped.git", false),
                RemoteRepository::new("fine", "https://github.com/o/fine.git", false),
            ])
        });

        let report = engine(lister, &root).run().await.unwrap();

        assert_eq!(report.stats.errors, 1);
        assert_eq!(report.stats.cloned, 1);
        assert_eq!(report.rejected, vec!["../escaped".to_string()]);
        assert!(!root.join("escaped").exists());
        assert!(root.join("public").join("fine").is_dir());
    }
}
