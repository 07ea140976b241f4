//! Shared fixtures for the repomirror integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use repomirror::{
    ActionError, FetchError, LocalInventory, Partition, RemoteRepository, RepositoryLister,
    SyncEngine, SyncOptions, Vcs,
};

/// Lister that always returns the same listing
pub struct StaticLister {
    repositories: Vec<RemoteRepository>,
}

impl StaticLister {
    pub fn new(repositories: Vec<RemoteRepository>) -> Self {
        Self { repositories }
    }
}

#[async_trait]
impl RepositoryLister for StaticLister {
    async fn list_repositories(&self) -> Result<Vec<RemoteRepository>, FetchError> {
        Ok(self.repositories.clone())
    }
}

/// Lister whose fetch always fails with the given error
pub struct FailingLister {
    make_error: fn() -> FetchError,
}

impl FailingLister {
    pub fn new(make_error: fn() -> FetchError) -> Self {
        Self { make_error }
    }
}

#[async_trait]
impl RepositoryLister for FailingLister {
    async fn list_repositories(&self) -> Result<Vec<RemoteRepository>, FetchError> {
        Err((self.make_error)())
    }
}

/// Stand-in for git: clones create the directory, pulls only check it exists.
/// Names in `failing` fail every operation.
#[derive(Default)]
pub struct FakeVcs {
    failing: HashSet<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(names: &[&str]) -> Self {
        Self {
            failing: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Highest number of operations observed running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn enter(&self, operation: &'static str, path: &Path) -> Result<String, ActionError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.calls.lock().unwrap().push(format!("{} {}", operation, name));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&name) {
            return Err(ActionError::vcs(operation, format!("simulated failure for {}", name)));
        }
        Ok(name)
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn clone_repository(&self, _url: &str, destination: &Path) -> Result<(), ActionError> {
        self.enter("clone", destination).await?;
        std::fs::create_dir_all(destination.join(".git"))
            .map_err(|e| ActionError::filesystem(destination, e))
    }

    async fn fast_forward_pull(&self, working_copy: &Path) -> Result<(), ActionError> {
        self.enter("pull", working_copy).await?;
        if working_copy.is_dir() {
            Ok(())
        } else {
            Err(ActionError::vcs("pull", format!("{} is not a working copy", working_copy.display())))
        }
    }
}

pub fn public(name: &str) -> RemoteRepository {
    RemoteRepository::new(name, format!("https://github.com/octocat/{}.git", name), false)
}

pub fn private(name: &str) -> RemoteRepository {
    RemoteRepository::new(name, format!("https://github.com/octocat/{}.git", name), true)
}

/// Create `<root>/<partition>/<name>` as an existing working copy
pub fn seed_local(root: &Path, partition: Partition, name: &str) {
    std::fs::create_dir_all(partition.repo_path(root, name).join(".git")).unwrap();
}

pub fn inventory(public: &[&str], private: &[&str]) -> LocalInventory {
    let mut inventory = LocalInventory::new();
    for name in public {
        inventory.insert(Partition::Public, *name);
    }
    for name in private {
        inventory.insert(Partition::Private, *name);
    }
    inventory
}

pub fn engine(
    repositories: Vec<RemoteRepository>,
    vcs: Arc<FakeVcs>,
    root: &Path,
    max_parallel: usize,
) -> SyncEngine {
    SyncEngine::new(
        Arc::new(StaticLister::new(repositories)),
        vcs,
        root,
        SyncOptions { max_parallel },
    )
}
