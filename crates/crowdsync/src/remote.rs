//! Shared plumbing for the GitHub, CrowdIn and Zendesk clients.
//!
//! Every client owns a [`RemoteClientState`] that tracks the remote's quota,
//! reports failures as [`RemoteError`], and walks result pages with the
//! helpers in [`pagination`].

mod errors;
pub mod pagination;
mod rate_limit;
mod state;

pub use errors::{RemoteError, Result, short_error_message};
pub use rate_limit::{ApiRateLimiter, rate_limits};
pub use state::{
    Acquire, RateLimitInfo, RateLimitSnapshot, RemoteClientState, parse_rate_limit_headers,
    retry_after, wait_until_reset,
};

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::retry::with_retry;

/// Reset time when `response` is a quota rejection rather than a plain error.
///
/// Either the quota headers report zero calls left, or the remote asked for
/// a pause with `Retry-After`.
pub(crate) fn quota_rejection(
    response: &HttpResponse,
    quota: Option<&RateLimitInfo>,
) -> Option<DateTime<Utc>> {
    if !matches!(response.status, 403 | 429) {
        return None;
    }
    match quota {
        Some(q) if q.remaining == 0 => Some(q.reset_at),
        _ => retry_after(&response.headers, Utc::now()),
    }
}

/// Send a cheap request only to read the quota headers off its response.
///
/// A throttled answer still reports the quota as spent until its reset.
pub(crate) async fn read_quota(
    transport: &dyn HttpTransport,
    request: HttpRequest,
) -> Result<Option<RateLimitInfo>> {
    let response = transport.send(request).await?;
    let quota = parse_rate_limit_headers(&response.headers);
    if response.is_success() {
        return Ok(quota);
    }
    match quota_rejection(&response, quota.as_ref()) {
        Some(reset_at) => Ok(Some(RateLimitInfo {
            limit: quota.and_then(|q| q.limit),
            remaining: 0,
            reset_at,
        })),
        None => Err(error_for_status(&response)),
    }
}

/// One logical request against a quota-tracked remote.
///
/// A quota rejection marks the counter exhausted and sends once more, which
/// waits for the reset first. Transient failures are retried with backoff.
pub(crate) async fn send_with_quota<T, F, Fut>(
    state: &RemoteClientState,
    label: &str,
    send: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let send = &send;
    with_retry(
        || async move {
            match send().await {
                Err(RemoteError::RateLimited { reset_at }) => {
                    state.mark_exhausted(reset_at);
                    send().await
                }
                other => other,
            }
        },
        RemoteError::is_transient,
        label,
        None,
    )
    .await
}

/// Classify a non-success response into the error taxonomy.
///
/// 5xx and 429 are transient and retried; everything else is surfaced.
pub(crate) fn error_for_status(response: &HttpResponse) -> RemoteError {
    let message = response.text();
    match response.status {
        401 => RemoteError::AuthRequired,
        429 | 500..=599 => RemoteError::Transient {
            status: response.status,
            message,
        },
        status => RemoteError::Api { status, message },
    }
}
