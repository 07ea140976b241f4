use anyhow::Context;
use async_trait::async_trait;
use octocrab::Octocrab;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::GitHubConfig;
use crate::error::FetchError;
use crate::inventory::Partition;

/// Snapshot of one remote repository for the current run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepository {
    pub name: String,
    pub clone_url: String,
    pub is_private: bool,
}

impl RemoteRepository {
    pub fn new(name: impl Into<String>, clone_url: impl Into<String>, is_private: bool) -> Self {
        Self {
            name: name.into(),
            clone_url: clone_url.into(),
            is_private,
        }
    }

    /// Partition implied by the current remote visibility
    pub fn target_partition(&self) -> Partition {
        Partition::for_visibility(self.is_private)
    }
}

/// Source of the complete remote repository set
#[async_trait]
pub trait RepositoryLister: Send + Sync {
    async fn list_repositories(&self) -> Result<Vec<RemoteRepository>, FetchError>;
}

/// Lists every repository of the authenticated account via the GitHub API
pub struct GitHubLister {
    client: Octocrab,
    page_size: u8,
    request_timeout: Duration,
}

impl GitHubLister {
    /// Create an authenticated client; no request is sent yet
    pub fn new(token: String, config: &GitHubConfig) -> anyhow::Result<Self> {
        let mut builder = Octocrab::builder().personal_token(token);

        if let Some(base_url) = &config.api_base_url {
            builder = builder.base_uri(base_url.as_str())?;
        }

        let client = builder.build().context("Failed to create GitHub client")?;

        Ok(Self {
            client,
            page_size: config.page_size.max(1),
            request_timeout: config.request_timeout(),
        })
    }

    /// Login of the account the token belongs to
    pub async fn current_login(&self) -> Result<String, FetchError> {
        let user = timeout(self.request_timeout, self.client.current().user())
            .await
            .map_err(|_| self.timed_out("user lookup"))?
            .map_err(classify_error)?;
        Ok(user.login)
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<octocrab::models::Repository>, FetchError> {
        debug!("Fetching repositories page {}", page);

        let request = self
            .client
            .current()
            .list_repos_for_authenticated_user()
            .per_page(self.page_size)
            .page(page)
            .send();

        let page_repos = timeout(self.request_timeout, request)
            .await
            .map_err(|_| self.timed_out(&format!("page {}", page)))?
            .map_err(classify_error)?;

        Ok(page_repos.items)
    }

    fn timed_out(&self, what: &str) -> FetchError {
        FetchError::Transient(format!(
            "{} timed out after {}s",
            what,
            self.request_timeout.as_secs()
        ))
    }
}

#[async_trait]
impl RepositoryLister for GitHubLister {
    async fn list_repositories(&self) -> Result<Vec<RemoteRepository>, FetchError> {
        let mut repositories = Vec::new();
        let mut page = 1u32;

        loop {
            let items = self.fetch_page(page).await?;
            if items.is_empty() {
                break;
            }

            for repo in items {
                // Skipping an entry would plan a delete of its local copy
                let (Some(clone_url), Some(is_private)) = (repo.clone_url.as_ref(), repo.private)
                else {
                    warn!("Repository {} is missing its clone URL or visibility", repo.name);
                    return Err(FetchError::Transient(format!(
                        "incomplete listing entry for {}",
                        repo.name
                    )));
                };
                repositories.push(RemoteRepository {
                    clone_url: clone_url.to_string(),
                    is_private,
                    name: repo.name,
                });
            }

            // Only an empty page ends the listing; a truncated one would plan deletes
            page = page.checked_add(1).ok_or_else(|| {
                FetchError::Transient("pagination limit reached".to_string())
            })?;
        }

        info!("Found {} repositories on GitHub", repositories.len());
        Ok(repositories)
    }
}

/// Unauthorized responses get their own variant so the caller can say so
fn classify_error(error: octocrab::Error) -> FetchError {
    match &error {
        octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == 401 => {
            FetchError::Authentication(source.message.clone())
        }
        _ => FetchError::Transient(error.to_string()),
    }
}
