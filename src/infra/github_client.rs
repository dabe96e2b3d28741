use crate::app::ports::{RateSnapshot, RepositoryApiPort};
use crate::config::GithubConfig;
use crate::constants::USER_AGENT;
use crate::error::ApiError;
use crate::pipeline::rate_limiter::RateBudget;
use crate::types::CandidateRepository;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const RATE_REMAINING: &str = "x-ratelimit-remaining";
const RATE_RESET: &str = "x-ratelimit-reset";

/// GitHub REST API plus raw content host.
pub struct GithubClient {
    client: reqwest::Client,
    api_base: String,
    raw_base: String,
    token: Option<String>,
    budget: RateBudget,
}

#[derive(Deserialize)]
struct RateLimitResponse {
    resources: RateResources,
}

#[derive(Deserialize)]
struct RateResources {
    core: RateCore,
}

#[derive(Deserialize)]
struct RateCore {
    limit: i64,
    remaining: i64,
    reset: i64,
}

#[derive(Deserialize)]
struct BranchResponse {
    commit: BranchCommit,
}

#[derive(Deserialize)]
struct BranchCommit {
    sha: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    total_count: u64,
}

#[derive(Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

impl GithubClient {
    pub fn new(config: &GithubConfig, budget: RateBudget) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            raw_base: config.raw_base.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.trim().is_empty()),
            budget,
        })
    }

    fn repo_url(&self, repo: &CandidateRepository, rest: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_base, repo.owner, repo.name, rest)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn api_get(&self, url: &str, query: &[(&str, String)]) -> Result<Response, ApiError> {
        let request = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .query(query);
        let resp = self.authorized(request).send().await?;
        self.observe(resp.headers());
        debug!(url, status = resp.status().as_u16(), "github api");
        Ok(resp)
    }

    fn observe(&self, headers: &HeaderMap) {
        let parse = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<i64>().ok())
        };
        self.budget
            .observe_headers(parse(RATE_REMAINING), parse(RATE_RESET));
    }

    /// Maps quota rejections to `RateLimited` and other non-2xx to `Status`.
    ///
    /// Raw host responses carry no quota headers, so a 403 there is a plain `Status`.
    fn check(&self, resp: Response, from_api: bool) -> Result<Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if quota_rejected(status, self.budget.remaining(), from_api) {
            return Err(ApiError::RateLimited {
                reset: self.budget.reset(),
            });
        }
        Err(ApiError::Status {
            status: status.as_u16(),
            url: resp.url().to_string(),
        })
    }
}

fn quota_rejected(status: StatusCode, remaining: Option<i64>, from_api: bool) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (from_api && status == StatusCode::FORBIDDEN && remaining == Some(0))
}

#[async_trait]
impl RepositoryApiPort for GithubClient {
    async fn rate_limit(&self) -> Result<RateSnapshot, ApiError> {
        let url = format!("{}/rate_limit", self.api_base);
        let resp = self.check(self.api_get(&url, &[]).await?, true)?;
        let body: RateLimitResponse = serde_json::from_slice(&resp.bytes().await?)?;
        let core = body.resources.core;
        Ok(RateSnapshot {
            limit: core.limit,
            remaining: core.remaining,
            reset: Utc.timestamp_opt(core.reset, 0).single(),
        })
    }

    async fn branch_head(
        &self,
        repo: &CandidateRepository,
        branch: &str,
    ) -> Result<Option<String>, ApiError> {
        let url = self.repo_url(repo, &format!("branches/{}", branch));
        let resp = self.api_get(&url, &[]).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = self.check(resp, true)?;
        let body: BranchResponse = serde_json::from_slice(&resp.bytes().await?)?;
        Ok(Some(body.commit.sha))
    }

    async fn search_text(&self, repo: &CandidateRepository, text: &str) -> Result<u64, ApiError> {
        let url = format!("{}/search/code", self.api_base);
        let query = [("q", format!("{} repo:{}", text, repo.full_name()))];
        let resp = self.check(self.api_get(&url, &query).await?, true)?;
        let body: SearchResponse = serde_json::from_slice(&resp.bytes().await?)?;
        Ok(body.total_count)
    }

    async fn list_files(
        &self,
        repo: &CandidateRepository,
        git_ref: &str,
    ) -> Result<Vec<String>, ApiError> {
        let url = self.repo_url(repo, &format!("git/trees/{}", git_ref));
        let query = [("recursive", "1".to_string())];
        let resp = self.check(self.api_get(&url, &query).await?, true)?;
        let body: TreeResponse = serde_json::from_slice(&resp.bytes().await?)?;
        if body.truncated {
            warn!("⚠️ Tree listing for {}@{} was truncated", repo, git_ref);
        }
        Ok(body
            .tree
            .into_iter()
            .filter(|entry| entry.kind == "blob")
            .map(|entry| entry.path)
            .collect())
    }

    async fn fetch_file(
        &self,
        repo: &CandidateRepository,
        git_ref: &str,
        path: &str,
    ) -> Result<Vec<u8>, ApiError> {
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.raw_base, repo.owner, repo.name, git_ref, path
        );
        let resp = self.authorized(self.client.get(&url)).send().await?;
        let resp = self.check(resp, false)?;
        Ok(resp.bytes().await?.to_vec())
    }
}
