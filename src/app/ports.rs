use crate::error::ApiError;
use crate::types::{AppDetails, AppId, CandidateRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Quota state reported by the remote API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateSnapshot {
    pub limit: i64,
    pub remaining: i64,
    pub reset: Option<DateTime<Utc>>,
}

// Remote repository side
#[async_trait]
pub trait RepositoryApiPort: Send + Sync {
    /// Current quota; read-only against the remote service.
    async fn rate_limit(&self) -> Result<RateSnapshot, ApiError>;

    /// Head commit of `branch`, or `None` when the branch does not exist.
    async fn branch_head(
        &self,
        repo: &CandidateRepository,
        branch: &str,
    ) -> Result<Option<String>, ApiError>;

    /// Number of code-search hits for `text` inside `repo`.
    async fn search_text(&self, repo: &CandidateRepository, text: &str) -> Result<u64, ApiError>;

    /// Every file path in the tree at `git_ref`.
    async fn list_files(
        &self,
        repo: &CandidateRepository,
        git_ref: &str,
    ) -> Result<Vec<String>, ApiError>;

    async fn fetch_file(
        &self,
        repo: &CandidateRepository,
        git_ref: &str,
        path: &str,
    ) -> Result<Vec<u8>, ApiError>;
}

// App catalog side
#[async_trait]
pub trait AppCatalogPort: Send + Sync {
    /// Best match for a free-text query.
    async fn search(&self, query: &str) -> Result<Option<AppId>, ApiError>;

    async fn details(&self, app_id: &AppId) -> Result<Option<AppDetails>, ApiError>;
}

// Local environment
pub trait ClientLocatorPort: Send + Sync {
    fn locate(&self) -> Option<PathBuf>;
}
