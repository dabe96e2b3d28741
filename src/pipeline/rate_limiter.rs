use crate::app::ports::{RateSnapshot, RepositoryApiPort};
use crate::error::ApiError;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

const UNKNOWN: i64 = i64::MIN;

/// Process-wide advisory view of the remote quota.
///
/// Cloning hands out another handle to the same counters. Updates are
/// informal: the API client records whatever the last response reported, no
/// reservation happens per call.
#[derive(Clone, Debug)]
pub struct RateBudget {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    limit: AtomicI64,
    remaining: AtomicI64,
    reset_epoch: AtomicI64,
}

impl Default for RateBudget {
    fn default() -> Self {
        Self::new()
    }
}

impl RateBudget {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                limit: AtomicI64::new(UNKNOWN),
                remaining: AtomicI64::new(UNKNOWN),
                reset_epoch: AtomicI64::new(UNKNOWN),
            }),
        }
    }

    pub fn record(&self, snapshot: &RateSnapshot) {
        self.inner.limit.store(snapshot.limit, Ordering::Relaxed);
        self.inner.remaining.store(snapshot.remaining, Ordering::Relaxed);
        let reset = snapshot.reset.map(|r| r.timestamp()).unwrap_or(UNKNOWN);
        self.inner.reset_epoch.store(reset, Ordering::Relaxed);
    }

    /// Update from `x-ratelimit-*` response headers.
    pub fn observe_headers(&self, remaining: Option<i64>, reset_epoch: Option<i64>) {
        if let Some(remaining) = remaining {
            self.inner.remaining.store(remaining, Ordering::Relaxed);
        }
        if let Some(reset) = reset_epoch {
            self.inner.reset_epoch.store(reset, Ordering::Relaxed);
        }
    }

    pub fn remaining(&self) -> Option<i64> {
        match self.inner.remaining.load(Ordering::Relaxed) {
            UNKNOWN => None,
            n => Some(n),
        }
    }

    pub fn limit(&self) -> Option<i64> {
        match self.inner.limit.load(Ordering::Relaxed) {
            UNKNOWN => None,
            n => Some(n),
        }
    }

    pub fn reset(&self) -> Option<DateTime<Utc>> {
        match self.inner.reset_epoch.load(Ordering::Relaxed) {
            UNKNOWN => None,
            epoch => Utc.timestamp_opt(epoch, 0).single(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateStatus {
    Allowed { remaining: Option<i64> },
    Exhausted { reset: Option<DateTime<Utc>> },
}

/// Fail-fast quota gate, consulted once per invocation.
pub struct RateLimiter {
    api: Arc<dyn RepositoryApiPort>,
    budget: RateBudget,
}

impl RateLimiter {
    pub fn new(api: Arc<dyn RepositoryApiPort>, budget: RateBudget) -> Self {
        Self { api, budget }
    }

    pub fn budget(&self) -> &RateBudget {
        &self.budget
    }

    pub async fn check(&self) -> RateStatus {
        match self.api.rate_limit().await {
            Ok(snapshot) => {
                self.budget.record(&snapshot);
                debug!(
                    remaining = snapshot.remaining,
                    limit = snapshot.limit,
                    "rate limit queried"
                );
                if snapshot.remaining <= 0 {
                    RateStatus::Exhausted {
                        reset: snapshot.reset,
                    }
                } else {
                    info!(
                        "📊 API quota: {}/{} requests remaining",
                        snapshot.remaining, snapshot.limit
                    );
                    RateStatus::Allowed {
                        remaining: Some(snapshot.remaining),
                    }
                }
            }
            Err(ApiError::RateLimited { reset }) => RateStatus::Exhausted { reset },
            Err(e) => {
                warn!("⚠️ Could not query API rate limit, continuing: {}", e);
                RateStatus::Allowed { remaining: None }
            }
        }
    }
}
