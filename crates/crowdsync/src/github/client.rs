//! GitHub REST/GraphQL client with quota-aware request discipline.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::pagination::GitHubPages;
use super::types::GitHubRateLimitResponse;
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpHeaders, HttpMethod, HttpRequest, HttpTransport};
use crate::remote::{
    self, ApiRateLimiter, RateLimitInfo, RemoteClientState, RemoteError, Result,
};

/// Default GitHub API root.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Items requested per page.
pub(crate) const PAGE_SIZE: u32 = 100;

/// A successful response body together with its headers.
#[derive(Debug, Clone)]
pub(crate) struct Fetched {
    pub body: Value,
    pub headers: HttpHeaders,
}

/// GitHub API client.
///
/// Clones share the transport and the quota counter.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    api_url: String,
    token: String,
    state: RemoteClientState,
    limiter: Option<ApiRateLimiter>,
}

impl GitHubClient {
    pub fn new(token: &str) -> Result<Self> {
        let transport = ReqwestTransport::with_timeout(StdDuration::from_secs(30))?;
        Ok(Self::new_with_transport(
            GITHUB_API_URL,
            token,
            Arc::new(transport),
        ))
    }

    pub fn new_with_transport(
        api_url: &str,
        token: &str,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            state: RemoteClientState::new(),
            limiter: None,
        }
    }

    /// Pace requests proactively in addition to the quota counter.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: ApiRateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn state(&self) -> &RemoteClientState {
        &self.state
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.api_url, path)
        }
    }

    fn build(&self, method: HttpMethod, path: &str, body: Option<&Value>) -> HttpRequest {
        let request = HttpRequest::new(method, self.url(path))
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", "crowdsync");
        match body {
            Some(body) => request.json(body),
            None => request,
        }
    }

    /// Query the quota without consuming it.
    pub async fn rate_limit(&self) -> Result<RateLimitInfo> {
        let request = self.build(HttpMethod::Get, "/rate_limit", None);
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(remote::error_for_status(&response));
        }
        let limits: GitHubRateLimitResponse =
            serde_json::from_slice(&response.body).map_err(|source| RemoteError::Decode {
                url: self.url("/rate_limit"),
                source,
            })?;
        let core = limits.resources.core;
        Ok(RateLimitInfo {
            limit: Some(core.limit),
            remaining: core.remaining,
            reset_at: core.reset_at(),
        })
    }

    async fn send_once(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Fetched>> {
        self.state
            .acquire("GitHub", || async { self.rate_limit().await.map(Some) })
            .await?;
        if let Some(limiter) = &self.limiter {
            limiter.wait().await;
        }

        let response = self.transport.send(self.build(method, path, body)).await?;
        let quota = self.state.observe(&response.headers);

        match response.status {
            s if (200..300).contains(&s) => {
                let body = if response.body.is_empty() {
                    Value::Null
                } else {
                    serde_json::from_slice(&response.body).map_err(|source| {
                        RemoteError::Decode {
                            url: self.url(path),
                            source,
                        }
                    })?
                };
                Ok(Some(Fetched {
                    body,
                    headers: response.headers,
                }))
            }
            404 | 410 => Ok(None),
            _ => match remote::quota_rejection(&response, quota.as_ref()) {
                Some(reset_at) => Err(RemoteError::RateLimited { reset_at }),
                None => Err(remote::error_for_status(&response)),
            },
        }
    }

    /// One logical request: a quota rejection is retried once after the
    /// reset, transient failures are retried with backoff.
    pub(crate) async fn fetch(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Fetched>> {
        let label = format!("{} {}", method.as_str(), path);
        remote::send_with_quota(&self.state, &label, || self.send_once(method, path, body)).await
    }

    /// Raw JSON request. `Ok(None)` when the resource does not exist.
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        Ok(self.fetch(method, path, body).await?.map(|f| f.body))
    }

    fn decode<T: DeserializeOwned>(&self, path: &str, value: Value) -> Result<T> {
        serde_json::from_value(value).map_err(|source| RemoteError::Decode {
            url: self.url(path),
            source,
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.request(HttpMethod::Get, path, None).await? {
            Some(value) => self.decode(path, value).map(Some),
            None => Ok(None),
        }
    }

    /// Mutating request whose target must exist.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        body: &Value,
    ) -> Result<T> {
        match self.request(method, path, Some(body)).await? {
            Some(value) => self.decode(path, value),
            None => Err(RemoteError::api(404, format!("{path} not found"))),
        }
    }

    /// Lazily walk every page of a list endpoint.
    pub fn request_all<T: DeserializeOwned>(&self, path: &str) -> GitHubPages<'_, T> {
        GitHubPages::new(self, path, PAGE_SIZE)
    }

    /// Run a GraphQL query and return its `data` object.
    pub async fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let body = serde_json::json!({ "query": query, "variables": variables });
        let response = self
            .request(HttpMethod::Post, "/graphql", Some(&body))
            .await?
            .ok_or_else(|| RemoteError::api(404, "graphql endpoint not found"))?;
        if let Some(errors) = response.get("errors").filter(|e| !e.is_null()) {
            return Err(RemoteError::api(200, errors.to_string()));
        }
        Ok(response.get("data").cloned().unwrap_or(Value::Null))
    }

    /// Whether `origin` (`owner/name`) is visible with the configured token.
    ///
    /// An unset origin has nothing to check and counts as accessible.
    pub async fn is_repository_accessible(&self, origin: Option<&str>) -> Result<bool> {
        let Some(origin) = origin else {
            return Ok(true);
        };
        Ok(self
            .request(HttpMethod::Get, &format!("/repos/{origin}"), None)
            .await?
            .is_some())
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_url", &self.api_url)
            .field("state", &self.state.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;

    use crate::http::{HttpResponse, MockTransport};

    pub(crate) const API: &str = "https://api.github.test";

    pub(crate) fn to_headers(pairs: Vec<(&str, &str)>) -> HttpHeaders {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    pub(crate) fn response(
        status: u16,
        headers: Vec<(&str, &str)>,
        body: impl AsRef<[u8]>,
    ) -> HttpResponse {
        HttpResponse {
            status,
            headers: to_headers(headers),
            body: body.as_ref().to_vec(),
        }
    }

    pub(crate) fn client(transport: &MockTransport) -> GitHubClient {
        GitHubClient::new_with_transport(API, "token", Arc::new(transport.clone()))
    }

    fn rate_limit_body(remaining: u64, reset: i64) -> String {
        serde_json::json!({
            "resources": { "core": { "limit": 5000, "used": 0, "remaining": remaining, "reset": reset } }
        })
        .to_string()
    }

    #[tokio::test]
    async fn not_found_is_none() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            format!("{API}/repos/acme/missing"),
            response(404, vec![], r#"{"message":"Not Found"}"#),
        );
        let client = client(&transport);
        assert!(
            !client
                .is_repository_accessible(Some("acme/missing"))
                .await
                .expect("404 is not an error")
        );
        assert!(client.is_repository_accessible(None).await.expect("none"));
    }

    #[tokio::test]
    async fn client_errors_surface() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            format!("{API}/repos/acme/docs/issues"),
            response(422, vec![], r#"{"message":"Validation Failed"}"#),
        );
        let err = client(&transport)
            .send_json::<Value>(
                HttpMethod::Post,
                "/repos/acme/docs/issues",
                &serde_json::json!({"title": "x"}),
            )
            .await
            .expect_err("422");
        assert!(matches!(err, RemoteError::Api { status: 422, .. }));
    }

    #[tokio::test]
    async fn headers_refresh_counter_on_every_call() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            format!("{API}/repos/acme/docs"),
            response(
                200,
                vec![
                    ("x-ratelimit-remaining", "4999"),
                    ("x-ratelimit-reset", "1700000000"),
                ],
                "{}",
            ),
        );
        let client = client(&transport);
        client
            .request(HttpMethod::Get, "/repos/acme/docs", None)
            .await
            .expect("ok");
        let snapshot = client.state().snapshot();
        assert_eq!(snapshot.remaining, Some(4999));
        assert_eq!(snapshot.refreshes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_quota_blocks_until_reset_then_refreshes_once() {
        let transport = MockTransport::new();
        let reset = Utc::now().timestamp() + 30;
        transport.push_response(
            HttpMethod::Get,
            format!("{API}/rate_limit"),
            response(200, vec![], rate_limit_body(5000, reset + 3600)),
        );
        transport.push_response(
            HttpMethod::Get,
            format!("{API}/repos/acme/docs"),
            response(200, vec![], r#"{"full_name":"acme/docs"}"#),
        );

        let client = client(&transport);
        client
            .state()
            .record(0, chrono::DateTime::from_timestamp(reset, 0).expect("ts"));

        let started = tokio::time::Instant::now();
        let body = client
            .request(HttpMethod::Get, "/repos/acme/docs", None)
            .await
            .expect("request")
            .expect("found");
        assert_eq!(body["full_name"], "acme/docs");
        assert!(started.elapsed() >= StdDuration::from_secs(30));

        let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![format!("{API}/rate_limit"), format!("{API}/repos/acme/docs")]
        );
        let snapshot = client.state().snapshot();
        assert_eq!(snapshot.refreshes, 1);
        assert_eq!(snapshot.remaining, Some(4999));
    }

    #[tokio::test(start_paused = true)]
    async fn quota_rejection_is_retried_after_reset() {
        let transport = MockTransport::new();
        let reset = Utc::now().timestamp() + 10;
        let url = format!("{API}/repos/acme/docs/issues/1");
        transport.push_response(
            HttpMethod::Get,
            url.clone(),
            response(
                403,
                vec![
                    ("x-ratelimit-remaining", "0"),
                    ("x-ratelimit-reset", &reset.to_string()),
                ],
                r#"{"message":"API rate limit exceeded"}"#,
            ),
        );
        transport.push_response(
            HttpMethod::Get,
            format!("{API}/rate_limit"),
            response(200, vec![], rate_limit_body(5000, reset + 3600)),
        );
        transport.push_response(HttpMethod::Get, url.clone(), response(200, vec![], "{}"));

        let client = client(&transport);
        client
            .request(HttpMethod::Get, "/repos/acme/docs/issues/1", None)
            .await
            .expect("retried");
        assert_eq!(transport.count(HttpMethod::Get, &url), 2);
        assert_eq!(client.state().snapshot().refreshes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_are_retried() {
        let transport = MockTransport::new();
        let url = format!("{API}/repos/acme/docs/milestones?state=all&per_page=100");
        transport.push_response(HttpMethod::Get, url.clone(), response(502, vec![], "bad"));
        transport.push_response(HttpMethod::Get, url.clone(), response(200, vec![], "[]"));

        let items: Vec<Value> = client(&transport)
            .request_all("/repos/acme/docs/milestones?state=all")
            .collect_all()
            .await
            .expect("retried");
        assert!(items.is_empty());
        assert_eq!(transport.count(HttpMethod::Get, &url), 2);
    }

    #[tokio::test]
    async fn graphql_errors_are_reported() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            format!("{API}/graphql"),
            response(200, vec![], r#"{"data":null,"errors":[{"message":"bad field"}]}"#),
        );
        let err = client(&transport)
            .graphql("query { viewer { login } }", serde_json::json!({}))
            .await
            .expect_err("errors");
        assert!(err.to_string().contains("bad field"));
    }
}
