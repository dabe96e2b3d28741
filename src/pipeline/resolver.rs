use crate::app::ports::RepositoryApiPort;
use crate::config::ProbeStrategy;
use crate::error::{ApiError, PipelineError, Result};
use crate::types::{AppId, CandidateRepository, RepositoryMatch};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Finds the first candidate repository hosting an app id.
pub struct RepositoryResolver {
    api: Arc<dyn RepositoryApiPort>,
    strategy: ProbeStrategy,
}

impl RepositoryResolver {
    pub fn new(api: Arc<dyn RepositoryApiPort>, strategy: ProbeStrategy) -> Self {
        Self { api, strategy }
    }

    /// Probes candidates in order and returns the first positive answer.
    ///
    /// Probe errors count as a negative for that candidate. Only a
    /// rate-limit error stops the search.
    pub async fn find(
        &self,
        app_id: &AppId,
        candidates: &[CandidateRepository],
    ) -> Result<Option<RepositoryMatch>> {
        for candidate in candidates {
            debug!(repository = %candidate, "probing candidate");
            match self.probe(app_id, candidate).await {
                Ok(Some(found)) => {
                    info!("🔍 Found {} in repository {}", app_id, candidate);
                    return Ok(Some(found));
                }
                Ok(None) => debug!(repository = %candidate, "no match"),
                Err(e) if e.is_rate_limited() => {
                    return Err(PipelineError::RateLimited {
                        identifier: app_id.to_string(),
                    });
                }
                Err(e) => warn!("⚠️ Probe of {} failed, skipping: {}", candidate, e),
            }
        }
        Ok(None)
    }

    async fn probe(
        &self,
        app_id: &AppId,
        candidate: &CandidateRepository,
    ) -> std::result::Result<Option<RepositoryMatch>, ApiError> {
        match self.strategy {
            ProbeStrategy::Branch => {
                let head = self.api.branch_head(candidate, app_id.as_str()).await?;
                Ok(head.map(|sha| RepositoryMatch {
                    repository: candidate.clone(),
                    app_id: app_id.clone(),
                    git_ref: sha,
                    path_prefix: None,
                }))
            }
            ProbeStrategy::Search => {
                let hits = self.api.search_text(candidate, app_id.as_str()).await?;
                Ok((hits > 0).then(|| RepositoryMatch {
                    repository: candidate.clone(),
                    app_id: app_id.clone(),
                    git_ref: "HEAD".to_string(),
                    path_prefix: Some(format!("{}/", app_id)),
                }))
            }
        }
    }
}
