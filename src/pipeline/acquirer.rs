use crate::app::ports::RepositoryApiPort;
use crate::constants::ARTIFACT_EXTENSIONS;
use crate::error::{ApiError, PipelineError, Result};
use crate::types::{Artifact, FailureRecord, RepositoryMatch};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Downloaded artifacts plus the ones that failed, as an unordered set.
#[derive(Debug, Default)]
pub struct Acquisition {
    pub artifacts: Vec<Artifact>,
    pub failures: Vec<FailureRecord>,
}

impl Acquisition {
    pub fn succeeded(&self) -> usize {
        self.artifacts.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn total(&self) -> usize {
        self.succeeded() + self.failed()
    }
}

/// Lists a matched repository and downloads its artifacts concurrently.
pub struct FileAcquirer {
    api: Arc<dyn RepositoryApiPort>,
    max_concurrency: usize,
}

impl FileAcquirer {
    pub fn new(api: Arc<dyn RepositoryApiPort>, max_concurrency: usize) -> Self {
        Self {
            api,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Artifact names belonging to the match, in listing order.
    pub async fn list(&self, found: &RepositoryMatch) -> Result<Vec<String>> {
        let identifier = found.app_id.to_string();
        let paths = self
            .api
            .list_files(&found.repository, &found.git_ref)
            .await
            .map_err(|e| {
                if e.is_rate_limited() {
                    PipelineError::RateLimited {
                        identifier: identifier.clone(),
                    }
                } else {
                    PipelineError::ListingFailure {
                        identifier: identifier.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let names: Vec<String> = paths
            .into_iter()
            .filter(|path| match &found.path_prefix {
                Some(prefix) => path.starts_with(prefix.as_str()),
                None => true,
            })
            .filter(|path| is_artifact_name(path))
            .collect();

        if names.is_empty() {
            return Err(PipelineError::ListingFailure {
                identifier,
                reason: "no artifacts in repository listing".to_string(),
            });
        }
        Ok(names)
    }

    /// Downloads every listed artifact, at most `max_concurrency` at a time.
    ///
    /// Succeeds when at least one artifact arrived. A download that hit the
    /// API rate limit makes the whole run fail.
    pub async fn fetch_all(&self, found: &RepositoryMatch) -> Result<Acquisition> {
        let names = self.list(found).await?;
        info!("📦 Downloading {} artifacts for {}", names.len(), found.app_id);

        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut downloads = JoinSet::new();
        for name in names {
            let api = Arc::clone(&self.api);
            let permits = Arc::clone(&permits);
            let repository = found.repository.clone();
            let git_ref = found.git_ref.clone();
            downloads.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => api.fetch_file(&repository, &git_ref, &name).await,
                    Err(_) => Err(ApiError::Api {
                        message: "download pool closed".to_string(),
                    }),
                };
                (name, result)
            });
        }

        let mut acquisition = Acquisition::default();
        while let Some(joined) = downloads.join_next().await {
            match joined {
                Ok((name, Ok(bytes))) => {
                    debug!(artifact = %name, bytes = bytes.len(), "downloaded");
                    acquisition.artifacts.push(Artifact { name, bytes });
                }
                Ok((name, Err(e))) => {
                    warn!("⚠️ Download of {} failed: {}", name, e);
                    acquisition.failures.push(FailureRecord {
                        name,
                        reason: e.to_string(),
                        rate_limited: e.is_rate_limited(),
                    });
                }
                Err(e) => {
                    warn!("⚠️ Download task aborted: {}", e);
                    acquisition.failures.push(FailureRecord {
                        name: "<aborted>".to_string(),
                        reason: e.to_string(),
                        rate_limited: false,
                    });
                }
            }
        }

        let identifier = found.app_id.to_string();
        if acquisition.failures.iter().any(|f| f.rate_limited) {
            return Err(PipelineError::RateLimited { identifier });
        }
        if acquisition.artifacts.is_empty() {
            return Err(PipelineError::NothingAcquired {
                identifier,
                failed: acquisition.failed(),
            });
        }
        info!(
            "📥 Acquired {}/{} artifacts for {}",
            acquisition.succeeded(),
            acquisition.total(),
            found.app_id
        );
        Ok(acquisition)
    }
}

pub fn is_artifact_name(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| {
            ARTIFACT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}
