//! Zendesk Help Center API client.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::types::{Article, Category, Section, Translation};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpMethod, HttpRequest, HttpTransport};
use crate::remote::{
    self, ApiRateLimiter, RateLimitInfo, RemoteClientState, RemoteError, Result,
};

/// Items requested per page; Zendesk's maximum.
pub(crate) const PER_PAGE: u32 = 100;

/// Help Center client for one Zendesk domain.
#[derive(Clone)]
pub struct ZendeskClient {
    transport: Arc<dyn HttpTransport>,
    api_url: String,
    token: String,
    state: RemoteClientState,
    limiter: Option<ApiRateLimiter>,
}

impl ZendeskClient {
    /// Client for `https://<domain>/api/v2`.
    pub fn new(domain: &str, token: &str) -> Result<Self> {
        let transport = ReqwestTransport::with_timeout(StdDuration::from_secs(60))?;
        Ok(Self::new_with_transport(
            &format!("https://{domain}/api/v2"),
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
        format!("{}{}", self.api_url, path)
    }

    fn authorized(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest::new(method, self.url(path))
            .header("Accept", "application/json")
            .header("Authorization", format!("Bearer {}", self.token))
    }

    /// Current per-minute quota, read from a request for the token's user.
    pub async fn quota(&self) -> Result<Option<RateLimitInfo>> {
        remote::read_quota(
            self.transport.as_ref(),
            self.authorized(HttpMethod::Get, "/users/me.json"),
        )
        .await
    }

    async fn send_once(&self, request: &HttpRequest) -> Result<Option<Value>> {
        self.state.acquire("Zendesk", || self.quota()).await?;
        if let Some(limiter) = &self.limiter {
            limiter.wait().await;
        }
        let response = self.transport.send(request.clone()).await?;
        let quota = self.state.observe(&response.headers);

        match response.status {
            s if (200..300).contains(&s) => {
                if response.body.is_empty() {
                    return Ok(Some(Value::Null));
                }
                serde_json::from_slice(&response.body)
                    .map(Some)
                    .map_err(|source| RemoteError::Decode {
                        url: request.url.clone(),
                        source,
                    })
            }
            404 | 410 => Ok(None),
            _ => match remote::quota_rejection(&response, quota.as_ref()) {
                Some(reset_at) => Err(RemoteError::RateLimited { reset_at }),
                None => Err(remote::error_for_status(&response)),
            },
        }
    }

    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        let request = self.authorized(method, path);
        let request = match body {
            Some(body) => request.json(body),
            None => request,
        };
        let label = format!("{} {}", request.method.as_str(), request.url);
        let request = &request;
        remote::send_with_quota(&self.state, &label, || self.send_once(request)).await
    }

    /// Decode the member named `attribute` of a response object.
    fn member<T: DeserializeOwned>(&self, path: &str, mut value: Value, attribute: &str) -> Result<T> {
        let inner = value
            .get_mut(attribute)
            .map(Value::take)
            .ok_or_else(|| RemoteError::api(200, format!("{path}: response has no `{attribute}`")))?;
        serde_json::from_value(inner).map_err(|source| RemoteError::Decode {
            url: self.url(path),
            source,
        })
    }

    /// Every item of a page-numbered listing.
    ///
    /// The first page decides how many pages are walked.
    pub async fn request_all<T: DeserializeOwned>(
        &self,
        path: &str,
        attribute: &str,
    ) -> Result<Vec<T>> {
        let base = remote::pagination::with_query(
            &remote::pagination::with_query(path, "per_page", PER_PAGE),
            "sort_by",
            "created_at",
        );
        let mut items = Vec::new();
        let mut pages = 1;
        let mut page = 1;
        while page <= pages {
            let page_path = remote::pagination::with_query(&base, "page", page);
            let Some(body) = self.request(HttpMethod::Get, &page_path, None).await? else {
                break;
            };
            if page == 1 {
                pages = remote::pagination::page_count(
                    body.get("page_count").and_then(Value::as_u64),
                    body.get("count").and_then(Value::as_u64),
                    PER_PAGE,
                );
            }
            let batch: Vec<T> = self.member(&page_path, body, attribute)?;
            items.extend(batch);
            page += 1;
        }
        Ok(items)
    }

    pub async fn list_articles(&self) -> Result<Vec<Article>> {
        self.request_all("/help_center/articles.json", "articles")
            .await
    }

    /// Articles changed since `start_time` (Unix seconds).
    pub async fn incremental_articles(&self, start_time: i64) -> Result<Vec<Article>> {
        self.request_all(
            &format!("/help_center/incremental/articles.json?start_time={start_time}"),
            "articles",
        )
        .await
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.request_all("/help_center/categories.json", "categories")
            .await
    }

    pub async fn list_sections(&self) -> Result<Vec<Section>> {
        self.request_all("/help_center/sections.json", "sections")
            .await
    }

    pub async fn get_translation(
        &self,
        article_id: u64,
        locale: &str,
    ) -> Result<Option<Translation>> {
        let path = format!("/help_center/articles/{article_id}/translations/{locale}.json");
        match self.request(HttpMethod::Get, &path, None).await? {
            Some(body) => self.member(&path, body, "translation").map(Some),
            None => Ok(None),
        }
    }

    pub async fn create_translation(
        &self,
        article_id: u64,
        locale: &str,
        title: &str,
        body: &str,
    ) -> Result<Translation> {
        let path = format!("/help_center/articles/{article_id}/translations.json");
        let payload = json!({ "translation": { "locale": locale, "title": title, "body": body } });
        self.send_translation(HttpMethod::Post, &path, &payload).await
    }

    pub async fn update_translation(
        &self,
        article_id: u64,
        locale: &str,
        title: &str,
        body: &str,
    ) -> Result<Translation> {
        let path = format!("/help_center/articles/{article_id}/translations/{locale}.json");
        let payload = json!({ "translation": { "title": title, "body": body } });
        self.send_translation(HttpMethod::Put, &path, &payload).await
    }

    /// Create the translation, or update it when the locale already exists.
    pub async fn publish_translation(
        &self,
        article_id: u64,
        locale: &str,
        title: &str,
        body: &str,
    ) -> Result<Translation> {
        if self.get_translation(article_id, locale).await?.is_some() {
            self.update_translation(article_id, locale, title, body)
                .await
        } else {
            self.create_translation(article_id, locale, title, body)
                .await
        }
    }

    async fn send_translation(
        &self,
        method: HttpMethod,
        path: &str,
        payload: &Value,
    ) -> Result<Translation> {
        match self.request(method, path, Some(payload)).await? {
            Some(body) => self.member(path, body, "translation"),
            None => Err(RemoteError::api(404, format!("{path} not found"))),
        }
    }
}

impl std::fmt::Debug for ZendeskClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZendeskClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::http::{HttpResponse, MockTransport};

    pub(crate) const API: &str = "https://help.example.test/api/v2";

    pub(crate) fn client(transport: &MockTransport) -> ZendeskClient {
        ZendeskClient::new_with_transport(API, "token", Arc::new(transport.clone()))
    }

    pub(crate) fn article_json(id: u64, section_id: u64, updated_at: &str) -> Value {
        json!({
            "id": id,
            "title": format!("Article {id}"),
            "body": format!("<p>Body {id}</p>"),
            "locale": "en-us",
            "section_id": section_id,
            "draft": false,
            "label_names": [],
            "updated_at": updated_at,
            "html_url": format!("https://help.example.test/hc/en-us/articles/{id}")
        })
    }

    #[tokio::test]
    async fn listing_walks_reported_page_count() {
        let transport = MockTransport::new();
        let base = format!("{API}/help_center/sections.json?per_page=100&sort_by=created_at");
        transport.push_json(
            HttpMethod::Get,
            format!("{base}&page=1"),
            json!({
                "sections": [{ "id": 1, "category_id": 9, "name": "Setup" }],
                "page_count": 2,
                "count": 2
            }),
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{base}&page=2"),
            json!({ "sections": [{ "id": 2, "category_id": 9, "name": "Billing" }] }),
        );

        let sections = client(&transport).list_sections().await.expect("sections");
        assert_eq!(sections.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(
            transport.requests()[0]
                .headers
                .iter()
                .any(|(k, v)| k == "Authorization" && v == "Bearer token")
        );
    }

    #[tokio::test]
    async fn page_count_falls_back_to_count() {
        let transport = MockTransport::new();
        let base = format!(
            "{API}/help_center/incremental/articles.json?start_time=1700000000&per_page=100&sort_by=created_at"
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{base}&page=1"),
            json!({ "articles": [article_json(1, 5, "2024-01-01T00:00:00Z")], "count": 101 }),
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{base}&page=2"),
            json!({ "articles": [article_json(2, 5, "2024-01-02T00:00:00Z")], "count": 101 }),
        );

        let articles = client(&transport)
            .incremental_articles(1_700_000_000)
            .await
            .expect("articles");
        assert_eq!(articles.len(), 2);
    }

    #[tokio::test]
    async fn publish_creates_missing_translation() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            format!("{API}/help_center/articles/42/translations/ja.json"),
            HttpResponse {
                status: 404,
                headers: Vec::new(),
                body: Vec::new(),
            },
        );
        transport.push_json(
            HttpMethod::Post,
            format!("{API}/help_center/articles/42/translations.json"),
            json!({ "translation": { "locale": "ja", "title": "題名", "body": "<p>本文</p>" } }),
        );

        let translation = client(&transport)
            .publish_translation(42, "ja", "題名", "<p>本文</p>")
            .await
            .expect("published");
        assert_eq!(translation.locale, "ja");

        let sent: Value =
            serde_json::from_slice(&transport.requests()[1].body).expect("json body");
        assert_eq!(sent["translation"]["locale"], "ja");
    }

    #[tokio::test]
    async fn publish_updates_existing_translation() {
        let transport = MockTransport::new();
        let url = format!("{API}/help_center/articles/42/translations/ja.json");
        transport.push_json(
            HttpMethod::Get,
            url.clone(),
            json!({ "translation": { "locale": "ja", "title": "古い", "body": "" } }),
        );
        transport.push_json(
            HttpMethod::Put,
            url.clone(),
            json!({ "translation": { "locale": "ja", "title": "新しい", "body": "<p>x</p>" } }),
        );

        let translation = client(&transport)
            .publish_translation(42, "ja", "新しい", "<p>x</p>")
            .await
            .expect("published");
        assert_eq!(translation.title, "新しい");
        assert_eq!(transport.count(HttpMethod::Put, &url), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_quota_waits_for_reset_then_refreshes_once() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            format!("{API}/users/me.json"),
            HttpResponse {
                status: 200,
                headers: vec![
                    ("X-Rate-Limit".to_string(), "700".to_string()),
                    ("X-Rate-Limit-Remaining".to_string(), "699".to_string()),
                ],
                body: br#"{"user":{"id":1}}"#.to_vec(),
            },
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{API}/help_center/articles/5.json"),
            json!({ "article": article_json(5, 2, "2024-01-01T00:00:00Z") }),
        );
        let client = client(&transport);
        client
            .state()
            .record(0, chrono::Utc::now() + chrono::Duration::seconds(60));

        let started = tokio::time::Instant::now();
        client
            .request(HttpMethod::Get, "/help_center/articles/5.json", None)
            .await
            .expect("request")
            .expect("found");
        assert!(started.elapsed() >= StdDuration::from_secs(60));

        let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![
                format!("{API}/users/me.json"),
                format!("{API}/help_center/articles/5.json")
            ]
        );
        let snapshot = client.state().snapshot();
        assert_eq!(snapshot.refreshes, 1);
        assert_eq!(snapshot.remaining, Some(698));
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_request_waits_for_retry_after() {
        let transport = MockTransport::new();
        let url = format!("{API}/help_center/articles/5.json");
        transport.push_response(
            HttpMethod::Get,
            url.clone(),
            HttpResponse {
                status: 429,
                headers: vec![
                    ("X-Rate-Limit".to_string(), "700".to_string()),
                    ("X-Rate-Limit-Remaining".to_string(), "0".to_string()),
                    ("Retry-After".to_string(), "45".to_string()),
                ],
                body: b"Too Many Requests".to_vec(),
            },
        );
        transport.push_json(HttpMethod::Get, format!("{API}/users/me.json"), json!({}));
        transport.push_json(
            HttpMethod::Get,
            url.clone(),
            json!({ "article": article_json(5, 2, "2024-01-01T00:00:00Z") }),
        );

        let client = client(&transport);
        let started = tokio::time::Instant::now();
        client
            .request(HttpMethod::Get, "/help_center/articles/5.json", None)
            .await
            .expect("retried after the pause")
            .expect("found");
        assert!(started.elapsed() >= StdDuration::from_secs(45));
        assert_eq!(transport.count(HttpMethod::Get, &url), 2);
        assert_eq!(client.state().snapshot().refreshes, 1);
    }
}
