//! repomirror - mirror a GitHub account onto local storage
//!
//! Every repository the account owns is kept under `<storage_root>/public/<name>`
//! or `<storage_root>/private/<name>` according to its current visibility. One
//! run clones new repositories, fast-forwards existing ones, moves the ones
//! whose visibility flipped, and deletes the ones gone from GitHub.
//!
//! ## Modules
//!
//! - [`github`]: paginated remote listing
//! - [`inventory`]: local partition scan
//! - [`plan`]: pure reconciliation planner
//! - [`executor`]: applies one action (git subprocess or filesystem)
//! - [`sync`]: run coordinator and per-run counters
//! - [`credentials`]: token storage backends
//! - [`config`]: YAML configuration
//! - [`logging`]: console and event-log subscriber

pub mod config;
pub mod credentials;
pub mod daemon;
pub mod error;
pub mod executor;
pub mod git;
pub mod github;
pub mod health;
pub mod inventory;
pub mod logging;
pub mod plan;
pub mod sync;

pub use config::Config;
pub use error::{ActionError, FetchError, InconsistentLocalState, SyncError};
pub use executor::{ActionExecutor, Outcome};
pub use git::{GitClient, Vcs};
pub use github::{GitHubLister, RemoteRepository, RepositoryLister};
pub use inventory::{LocalInventory, Partition};
pub use plan::{reconcile, Action, ActionKind, Plan};
pub use sync::{RunStats, SyncEngine, SyncOptions, SyncReport};
