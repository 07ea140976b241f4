use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tokio::time::timeout;
use tracing::debug;

use crate::config::PullMode;
use crate::error::ActionError;

/// Version-control operations the executor depends on
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Clone `url` into `destination`, which must not exist yet
    async fn clone_repository(&self, url: &str, destination: &Path) -> Result<(), ActionError>;

    /// Bring an existing working copy up to date without a merge commit
    async fn fast_forward_pull(&self, working_copy: &Path) -> Result<(), ActionError>;
}

/// Runs the `git` executable as a subprocess
#[derive(Debug, Clone)]
pub struct GitClient {
    program: String,
    timeout: Duration,
    pull_mode: PullMode,
}

impl GitClient {
    pub fn new(timeout: Duration, pull_mode: PullMode) -> Self {
        Self {
            program: "git".to_string(),
            timeout,
            pull_mode,
        }
    }

    /// Use a different executable (tests, non-standard installs)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn pull_args(&self) -> [&'static str; 2] {
        match self.pull_mode {
            PullMode::Rebase => ["pull", "--rebase"],
            PullMode::FfOnly => ["pull", "--ff-only"],
        }
    }

    async fn run(
        &self,
        operation: &'static str,
        mut command: AsyncCommand,
    ) -> Result<(), ActionError> {
        command
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ActionError::vcs(
                    operation,
                    format!("failed to execute {}: {}", self.program, e),
                ))
            }
            Err(_) => {
                return Err(ActionError::vcs(
                    operation,
                    format!("timed out after {}s", self.timeout.as_secs()),
                ))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ActionError::vcs(
                operation,
                format!("{}: {}", output.status, stderr.trim()),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl Vcs for GitClient {
    async fn clone_repository(&self, url: &str, destination: &Path) -> Result<(), ActionError> {
        debug!("git clone {} {}", url, destination.display());

        let mut command = AsyncCommand::new(&self.program);
        command.args(["clone", "--quiet", url]).arg(destination);
        self.run("clone", command).await
    }

    async fn fast_forward_pull(&self, working_copy: &Path) -> Result<(), ActionError> {
        debug!("git {:?} in {}", self.pull_args(), working_copy.display());

        let mut command = AsyncCommand::new(&self.program);
        command
            .arg("-C")
            .arg(working_copy)
            .args(self.pull_args())
            .arg("--quiet");
        self.run("pull", command).await
    }
}
