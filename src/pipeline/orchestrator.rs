use crate::app::ports::AppCatalogPort;
use crate::error::{PipelineError, Result};
use crate::pipeline::acquirer::FileAcquirer;
use crate::pipeline::aggregator::{ConfigAggregator, RecordStaging};
use crate::pipeline::decoder;
use crate::pipeline::rate_limiter::{RateLimiter, RateStatus};
use crate::pipeline::resolver::RepositoryResolver;
use crate::types::{AppDetails, AppId, CandidateRepository, FailureRecord, RepositoryMatch};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Stages of one app id's run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunStage {
    Idle,
    RateChecked,
    Resolved,
    Acquired,
    Decoded,
    Persisted,
    Done,
}

#[derive(Debug)]
pub enum RunStatus {
    Complete,
    /// Persisted, but some artifacts could not be downloaded or decoded
    Partial { failed: usize },
    /// Stopped while attempting `stage`
    Failed { stage: RunStage, error: PipelineError },
}

#[derive(Debug)]
pub struct IdentifierReport {
    pub app_id: AppId,
    pub display_name: Option<String>,
    pub stage: RunStage,
    pub status: RunStatus,
    pub succeeded: usize,
    pub failures: Vec<FailureRecord>,
    pub entry_path: Option<PathBuf>,
}

impl IdentifierReport {
    fn new(app_id: &AppId, display_name: Option<String>) -> Self {
        Self {
            app_id: app_id.clone(),
            display_name,
            stage: RunStage::RateChecked,
            status: RunStatus::Complete,
            succeeded: 0,
            failures: Vec::new(),
            entry_path: None,
        }
    }

    fn advance(&mut self, stage: RunStage) {
        debug!(app_id = %self.app_id, from = ?self.stage, to = ?stage, "stage transition");
        self.stage = stage;
    }

    fn fail(mut self, stage: RunStage, error: PipelineError) -> Self {
        error!("❌ {} failed: {}", self.app_id, error);
        self.status = RunStatus::Failed { stage, error };
        self
    }

    /// Not attempted because the quota ran out earlier in the invocation.
    fn skipped(app_id: &AppId) -> Self {
        let mut report = Self::new(app_id, None);
        report.status = RunStatus::Failed {
            stage: RunStage::Resolved,
            error: PipelineError::RateLimited {
                identifier: app_id.to_string(),
            },
        };
        report
    }

    pub fn rate_limited(&self) -> bool {
        matches!(
            self.status,
            RunStatus::Failed {
                error: PipelineError::RateLimited { .. },
                ..
            }
        )
    }

    pub fn persisted(&self) -> bool {
        self.entry_path.is_some()
    }

    pub fn label(&self) -> String {
        match &self.display_name {
            Some(name) => format!("{} ({})", name, self.app_id),
            None => self.app_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    Complete,
    Partial,
    Failed,
}

#[derive(Debug)]
pub struct InvocationReport {
    pub primary: IdentifierReport,
    pub dependents: Vec<IdentifierReport>,
}

impl InvocationReport {
    pub fn outcome(&self) -> InvocationOutcome {
        if !self.primary.persisted() {
            return InvocationOutcome::Failed;
        }
        let clean = std::iter::once(&self.primary)
            .chain(&self.dependents)
            .all(|r| matches!(r.status, RunStatus::Complete));
        if clean {
            InvocationOutcome::Complete
        } else {
            InvocationOutcome::Partial
        }
    }
}

/// Drives resolve → acquire → decode → persist for an app and its DLC.
pub struct PipelineOrchestrator {
    limiter: RateLimiter,
    resolver: RepositoryResolver,
    acquirer: FileAcquirer,
    catalog: Arc<dyn AppCatalogPort>,
    aggregator: ConfigAggregator,
    candidates: Vec<CandidateRepository>,
    fixed: bool,
}

impl PipelineOrchestrator {
    pub fn new(
        limiter: RateLimiter,
        resolver: RepositoryResolver,
        acquirer: FileAcquirer,
        catalog: Arc<dyn AppCatalogPort>,
        aggregator: ConfigAggregator,
        candidates: Vec<CandidateRepository>,
        fixed: bool,
    ) -> Self {
        Self {
            limiter,
            resolver,
            acquirer,
            catalog,
            aggregator,
            candidates,
            fixed,
        }
    }

    /// Runs the primary app id, then each of its DLC in turn.
    ///
    /// Returns `RateExhausted` before any other call when the quota is gone.
    pub async fn run(&self, app_id: &AppId) -> Result<InvocationReport> {
        if let RateStatus::Exhausted { reset } = self.limiter.check().await {
            return Err(PipelineError::RateExhausted { reset });
        }

        let mut primary = IdentifierReport::new(app_id, None);
        let found = match self.resolve(app_id).await {
            Ok(found) => found,
            Err(e) => {
                return Ok(InvocationReport {
                    primary: primary.fail(RunStage::Resolved, e),
                    dependents: Vec::new(),
                })
            }
        };
        primary.advance(RunStage::Resolved);

        let details = self.details(app_id).await;
        primary.display_name = details.name.clone();
        let primary = self
            .process(primary, found)
            .instrument(info_span!("app", id = %app_id))
            .await;

        let mut dependents = Vec::new();
        if primary.persisted() {
            let dlc = dependent_ids(app_id, details.dlc);
            if !dlc.is_empty() {
                info!("🎯 Found {} DLC for {}, processing...", dlc.len(), app_id);
            }
            let mut pending = dlc.into_iter();
            for dlc_id in pending.by_ref() {
                let report = self
                    .run_dependent(&dlc_id)
                    .instrument(info_span!("dlc", id = %dlc_id))
                    .await;
                let throttled = report.rate_limited();
                dependents.push(report);
                if throttled || self.limiter.budget().remaining() == Some(0) {
                    break;
                }
            }
            let skipped: Vec<AppId> = pending.collect();
            if !skipped.is_empty() {
                warn!(
                    limit = ?self.limiter.budget().limit(),
                    "⛔ API quota exhausted, skipping {} remaining DLC",
                    skipped.len()
                );
                dependents.extend(skipped.iter().map(IdentifierReport::skipped));
            }
        }

        Ok(InvocationReport {
            primary,
            dependents,
        })
    }

    async fn run_dependent(&self, app_id: &AppId) -> IdentifierReport {
        let mut report = IdentifierReport::new(app_id, None);
        match self.resolve(app_id).await {
            Ok(found) => {
                report.advance(RunStage::Resolved);
                self.process(report, found).await
            }
            Err(e) => report.fail(RunStage::Resolved, e),
        }
    }

    async fn resolve(&self, app_id: &AppId) -> Result<RepositoryMatch> {
        self.resolver
            .find(app_id, &self.candidates)
            .await?
            .ok_or_else(|| PipelineError::ResolutionFailure {
                identifier: app_id.to_string(),
            })
    }

    async fn details(&self, app_id: &AppId) -> AppDetails {
        match self.catalog.details(app_id).await {
            Ok(Some(details)) => details,
            Ok(None) => {
                warn!("⚠️ No store details for {}", app_id);
                AppDetails::default()
            }
            Err(e) => {
                warn!("⚠️ Could not fetch store details for {}: {}", app_id, e);
                AppDetails::default()
            }
        }
    }

    async fn process(
        &self,
        mut report: IdentifierReport,
        found: RepositoryMatch,
    ) -> IdentifierReport {
        let acquisition = match self.acquirer.fetch_all(&found).await {
            Ok(acquisition) => acquisition,
            Err(e) => return report.fail(RunStage::Acquired, e),
        };
        report.advance(RunStage::Acquired);
        report.succeeded = acquisition.succeeded();
        report.failures = acquisition.failures;

        // Downloads finish in any order; decode in name order so merges are deterministic.
        let mut artifacts = acquisition.artifacts;
        artifacts.sort_by(|a, b| a.name.cmp(&b.name));

        let mut staging = RecordStaging::new();
        for artifact in &artifacts {
            match decoder::decode(&report.app_id, artifact) {
                Ok(decoded) => {
                    debug!(
                        artifact = %artifact.name,
                        kind = ?decoded.kind,
                        records = decoded.records.len(),
                        "decoded"
                    );
                    staging.absorb(decoded);
                }
                Err(e) => {
                    warn!("⚠️ Could not decode {}: {}", artifact.name, e);
                    report.succeeded -= 1;
                    report.failures.push(FailureRecord {
                        name: artifact.name.clone(),
                        reason: e.to_string(),
                        rate_limited: false,
                    });
                }
            }
        }
        if staging.is_empty() {
            let failed = report.failures.len();
            let identifier = report.app_id.to_string();
            return report.fail(
                RunStage::Decoded,
                PipelineError::NothingDecoded { identifier, failed },
            );
        }
        info!("🧩 Decoded {} depots for {}", staging.len(), report.app_id);
        report.advance(RunStage::Decoded);

        let persisted = self.aggregator.persist_staged(
            &report.app_id,
            report.display_name.as_deref(),
            &staging,
            self.fixed,
        );
        match persisted {
            Ok(path) => report.entry_path = Some(path),
            Err(e) => return report.fail(RunStage::Persisted, e),
        }
        report.advance(RunStage::Persisted);

        if !report.failures.is_empty() {
            warn!(
                "❗ {} of {} artifacts for {} failed",
                report.failures.len(),
                report.failures.len() + report.succeeded,
                report.app_id
            );
            report.status = RunStatus::Partial {
                failed: report.failures.len(),
            };
        }
        report.advance(RunStage::Done);
        report
    }
}

fn dependent_ids(primary: &AppId, dlc: Vec<AppId>) -> Vec<AppId> {
    let mut seen = std::collections::HashSet::new();
    dlc.into_iter()
        .filter(|id| id != primary && seen.insert(id.clone()))
        .collect()
}

/// Turns a user query into an app id, searching the store for non-numeric input.
pub async fn lookup_app_id(catalog: &dyn AppCatalogPort, query: &str) -> Option<AppId> {
    let query = query.trim();
    if AppId::is_numeric(query) {
        return Some(AppId::from(query));
    }
    if query.is_empty() {
        return None;
    }
    match catalog.search(query).await {
        Ok(Some(app_id)) => {
            info!("🔎 \"{}\" resolved to app {}", query, app_id);
            Some(app_id)
        }
        Ok(None) => None,
        Err(e) => {
            warn!("⚠️ Store search for \"{}\" failed: {}", query, e);
            None
        }
    }
}
