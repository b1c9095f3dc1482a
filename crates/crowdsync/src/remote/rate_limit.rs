use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default pacing per remote (requests per second).
pub mod rate_limits {
    /// GitHub: 5000 requests/hour; bursts of 10/sec stay well inside it.
    pub const GITHUB_DEFAULT_RPS: u32 = 10;
    /// CrowdIn: 20 simultaneous requests per account.
    pub const CROWDIN_DEFAULT_RPS: u32 = 10;
    /// Zendesk Help Center: 700 requests/minute on most plans.
    pub const ZENDESK_DEFAULT_RPS: u32 = 5;
}

/// Proactive request pacing on top of the reactive quota counter.
///
/// ```ignore
/// let limiter = ApiRateLimiter::new(rate_limits::GITHUB_DEFAULT_RPS);
/// limiter.wait().await;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// A zero rate is treated as one request per second.
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            inner: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
        }
    }

    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter").finish_non_exhaustive()
    }
}
