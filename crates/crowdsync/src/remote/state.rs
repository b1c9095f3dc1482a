use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::Result;
use crate::http::{HttpHeaders, header_get};

/// Window assumed when a remote reports a remaining count without a reset.
const DEFAULT_WINDOW_SECS: i64 = 60;

/// Quota information extracted from rate-limit response headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: Option<u64>,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

/// Point-in-time copy of a [`RemoteClientState`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub remaining: Option<u64>,
    pub reset_at: Option<DateTime<Utc>>,
    pub refreshes: u64,
}

/// Outcome of asking the state for permission to make one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    Proceed,
    Exhausted { reset_at: DateTime<Utc> },
}

#[derive(Debug, Default)]
struct Inner {
    remaining: Option<u64>,
    reset_at: Option<DateTime<Utc>>,
    refreshes: u64,
}

/// Quota counter shared by every call made through one client.
///
/// Clones share the same counter. `None` means the remote has not reported a
/// quota yet, in which case calls proceed until the first headers arrive.
#[derive(Debug, Clone, Default)]
pub struct RemoteClientState {
    inner: Arc<Mutex<Inner>>,
}

impl RemoteClientState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take one call from the quota, or report when it refills.
    pub fn try_acquire(&self) -> Acquire {
        let mut inner = self.lock();
        match inner.remaining {
            Some(0) => Acquire::Exhausted {
                reset_at: inner.reset_at.unwrap_or_else(Utc::now),
            },
            Some(n) => {
                inner.remaining = Some(n - 1);
                Acquire::Proceed
            }
            None => Acquire::Proceed,
        }
    }

    /// Refresh the counter from response headers, if they carry quota data.
    pub fn observe(&self, headers: &HttpHeaders) -> Option<RateLimitInfo> {
        let info = parse_rate_limit_headers(headers)?;
        self.record(info.remaining, info.reset_at);
        Some(info)
    }

    pub fn record(&self, remaining: u64, reset_at: DateTime<Utc>) {
        let mut inner = self.lock();
        inner.remaining = Some(remaining);
        inner.reset_at = Some(reset_at);
    }

    /// Record the result of an explicit quota refresh.
    ///
    /// `None` means the remote reported no quota, so the counter goes back
    /// to unknown and calls proceed until headers say otherwise.
    pub fn record_refresh(&self, info: Option<&RateLimitInfo>) {
        let mut inner = self.lock();
        inner.remaining = info.map(|i| i.remaining);
        inner.reset_at = info.map(|i| i.reset_at);
        inner.refreshes += 1;
    }

    pub fn mark_exhausted(&self, reset_at: DateTime<Utc>) {
        self.record(0, reset_at);
    }

    #[must_use]
    pub fn snapshot(&self) -> RateLimitSnapshot {
        let inner = self.lock();
        RateLimitSnapshot {
            remaining: inner.remaining,
            reset_at: inner.reset_at,
            refreshes: inner.refreshes,
        }
    }

    /// Take one call from the quota, sleeping through exhaustion.
    ///
    /// Each wake-up runs `refresh` exactly once and records what it reports
    /// before trying again.
    pub async fn acquire<F, Fut>(&self, service: &str, refresh: F) -> Result<()>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Option<RateLimitInfo>>>,
    {
        loop {
            match self.try_acquire() {
                Acquire::Proceed => return Ok(()),
                Acquire::Exhausted { reset_at } => {
                    let wait = wait_until_reset(reset_at, Utc::now());
                    tracing::info!(
                        service,
                        wait_secs = wait.as_secs(),
                        reset_at = %reset_at,
                        "Quota exhausted, waiting for reset"
                    );
                    tokio::time::sleep(wait).await;
                    let info = refresh().await?;
                    tracing::debug!(
                        service,
                        remaining = info.as_ref().map(|i| i.remaining),
                        "Quota refreshed"
                    );
                    self.record_refresh(info.as_ref());
                }
            }
        }
    }
}

/// Time to sleep before the quota refills: `reset - now + 1s`, never negative.
#[must_use]
pub fn wait_until_reset(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    let secs = (reset_at - now).num_seconds().max(0) as u64;
    Duration::from_secs(secs + 1)
}

fn header_number<T: std::str::FromStr>(headers: &HttpHeaders, name: &str) -> Option<T> {
    header_get(headers, name).and_then(|v| v.trim().parse().ok())
}

/// Reset time announced by a `Retry-After` header, in delta-seconds form.
pub fn retry_after(headers: &HttpHeaders, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let secs: i64 = header_number(headers, "retry-after")?;
    Some(now + chrono::Duration::seconds(secs.max(0)))
}

/// Extract quota info from rate-limit headers.
///
/// GitHub and CrowdIn send `x-ratelimit-remaining` with an epoch
/// `x-ratelimit-reset`. Zendesk sends `x-rate-limit-remaining` and
/// `x-rate-limit` per minute, with `Retry-After` once it throttles.
pub fn parse_rate_limit_headers(headers: &HttpHeaders) -> Option<RateLimitInfo> {
    let now = Utc::now();
    if let Some(remaining) = header_number::<u64>(headers, "x-ratelimit-remaining") {
        let reset_epoch: i64 = header_number(headers, "x-ratelimit-reset")?;
        return Some(RateLimitInfo {
            limit: header_number(headers, "x-ratelimit-limit"),
            remaining,
            reset_at: DateTime::from_timestamp(reset_epoch, 0).unwrap_or(now),
        });
    }
    let remaining = header_number::<u64>(headers, "x-rate-limit-remaining")?;
    Some(RateLimitInfo {
        limit: header_number(headers, "x-rate-limit"),
        remaining,
        reset_at: retry_after(headers, now)
            .unwrap_or(now + chrono::Duration::seconds(DEFAULT_WINDOW_SECS)),
    })
}
