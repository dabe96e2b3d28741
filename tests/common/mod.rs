#![allow(dead_code)]

use async_trait::async_trait;
use depot_fetch::app::ports::{AppCatalogPort, RateSnapshot, RepositoryApiPort};
use depot_fetch::config::ProbeStrategy;
use depot_fetch::error::ApiError;
use depot_fetch::pipeline::acquirer::FileAcquirer;
use depot_fetch::pipeline::aggregator::ConfigAggregator;
use depot_fetch::pipeline::rate_limiter::{RateBudget, RateLimiter};
use depot_fetch::pipeline::resolver::RepositoryResolver;
use depot_fetch::pipeline::PipelineOrchestrator;
use depot_fetch::types::{AppDetails, AppId, CandidateRepository};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const KEY_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const KEY_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

/// In-memory stand-in for the repository host: one branch per app id.
pub struct MockHub {
    pub remaining: i64,
    branches: Mutex<HashMap<(String, String), Vec<(String, Option<Vec<u8>>)>>>,
    throttled: Mutex<HashSet<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockHub {
    pub fn new(remaining: i64) -> Self {
        Self {
            remaining,
            branches: Mutex::new(HashMap::new()),
            throttled: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `None` content makes that download fail.
    pub fn host(&self, repo: &str, app_id: &str, files: Vec<(&str, Option<Vec<u8>>)>) {
        self.branches.lock().unwrap().insert(
            (repo.to_string(), app_id.to_string()),
            files
                .into_iter()
                .map(|(name, bytes)| (name.to_string(), bytes))
                .collect(),
        );
    }

    /// Probes for this app id, or downloads of this path, answer 429.
    pub fn throttle(&self, key: &str) {
        self.throttled.lock().unwrap().insert(key.to_string());
    }

    fn is_throttled(&self, key: &str) -> bool {
        self.throttled.lock().unwrap().contains(key)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn branch_for_sha(
        &self,
        repo: &CandidateRepository,
        sha: &str,
    ) -> Option<Vec<(String, Option<Vec<u8>>)>> {
        let branch = sha.strip_prefix(&format!("sha-{}-", repo.full_name()))?;
        self.branches
            .lock()
            .unwrap()
            .get(&(repo.full_name(), branch.to_string()))
            .cloned()
    }
}

#[async_trait]
impl RepositoryApiPort for MockHub {
    async fn rate_limit(&self) -> Result<RateSnapshot, ApiError> {
        self.log("rate_limit".to_string());
        Ok(RateSnapshot {
            limit: 60,
            remaining: self.remaining,
            reset: None,
        })
    }

    async fn branch_head(
        &self,
        repo: &CandidateRepository,
        branch: &str,
    ) -> Result<Option<String>, ApiError> {
        self.log(format!("probe {} {}", repo, branch));
        if self.is_throttled(branch) {
            return Err(ApiError::RateLimited { reset: None });
        }
        let hosted = self
            .branches
            .lock()
            .unwrap()
            .contains_key(&(repo.full_name(), branch.to_string()));
        Ok(hosted.then(|| format!("sha-{}-{}", repo.full_name(), branch)))
    }

    async fn search_text(&self, repo: &CandidateRepository, text: &str) -> Result<u64, ApiError> {
        self.log(format!("search {} {}", repo, text));
        Ok(0)
    }

    async fn list_files(
        &self,
        repo: &CandidateRepository,
        git_ref: &str,
    ) -> Result<Vec<String>, ApiError> {
        self.log(format!("list {} {}", repo, git_ref));
        self.branch_for_sha(repo, git_ref)
            .map(|files| files.into_iter().map(|(name, _)| name).collect())
            .ok_or(ApiError::Status {
                status: 404,
                url: git_ref.to_string(),
            })
    }

    async fn fetch_file(
        &self,
        repo: &CandidateRepository,
        git_ref: &str,
        path: &str,
    ) -> Result<Vec<u8>, ApiError> {
        self.log(format!("fetch {} {}", repo, path));
        if self.is_throttled(path) {
            return Err(ApiError::RateLimited { reset: None });
        }
        let files = self.branch_for_sha(repo, git_ref).unwrap_or_default();
        match files.into_iter().find(|(name, _)| name == path) {
            Some((_, Some(bytes))) => Ok(bytes),
            _ => Err(ApiError::Api {
                message: format!("connection reset fetching {}", path),
            }),
        }
    }
}

#[derive(Default)]
pub struct MockCatalog {
    pub details: HashMap<String, AppDetails>,
}

impl MockCatalog {
    pub fn with_app(app_id: &str, name: &str, dlc: &[&str]) -> Self {
        let mut details = HashMap::new();
        details.insert(
            app_id.to_string(),
            AppDetails {
                name: Some(name.to_string()),
                dlc: dlc.iter().map(|id| AppId::from(*id)).collect(),
            },
        );
        Self { details }
    }
}

#[async_trait]
impl AppCatalogPort for MockCatalog {
    async fn search(&self, query: &str) -> Result<Option<AppId>, ApiError> {
        Ok(self
            .details
            .iter()
            .find(|(_, d)| d.name.as_deref() == Some(query))
            .map(|(id, _)| AppId::from(id.as_str())))
    }

    async fn details(&self, app_id: &AppId) -> Result<Option<AppDetails>, ApiError> {
        Ok(self.details.get(app_id.as_str()).cloned())
    }
}

pub fn orchestrator(
    hub: Arc<MockHub>,
    catalog: MockCatalog,
    client_dir: &Path,
    candidates: &[&str],
    fixed: bool,
) -> PipelineOrchestrator {
    let api: Arc<dyn RepositoryApiPort> = hub;
    PipelineOrchestrator::new(
        RateLimiter::new(api.clone(), RateBudget::new()),
        RepositoryResolver::new(api.clone(), ProbeStrategy::Branch),
        FileAcquirer::new(api, 4),
        Arc::new(catalog),
        ConfigAggregator::for_client(client_dir),
        candidates.iter().map(|c| c.parse().unwrap()).collect(),
        fixed,
    )
}

pub fn lua_keys(pairs: &[(u32, &str)]) -> Vec<u8> {
    pairs
        .iter()
        .map(|(depot, key)| format!("addappid({}, 1, \"{}\")\n", depot, key))
        .collect::<String>()
        .into_bytes()
}
