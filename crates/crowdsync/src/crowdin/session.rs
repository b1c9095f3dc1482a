//! Browser-style session against the CrowdIn web backend.
//!
//! Phrase visibility is not exposed by the public API, so these calls go
//! through the same endpoints the editor uses, authenticated with a login
//! cookie. Sessions expire; every request detects a bounce to the login page
//! and signs in again, at most [`MAX_AUTH_ATTEMPTS`] times per request.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use rand::Rng;
use rand::distr::Alphanumeric;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::remote::{self, RemoteError, Result};

pub const CROWDIN_WEB_URL: &str = "https://crowdin.com";
pub const CROWDIN_ACCOUNTS_URL: &str = "https://accounts.crowdin.com";

/// Sign-in attempts per request before giving up with `AuthRequired`.
pub const MAX_AUTH_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

#[derive(Clone)]
pub struct SessionCredentials {
    pub login: String,
    pub password: String,
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("login", &self.login)
            .finish_non_exhaustive()
    }
}

/// Web endpoints and the project/language the session works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTarget {
    pub web_url: String,
    pub accounts_url: String,
    pub project_id: u64,
    /// Numeric language id used by the web backend (not the API code).
    pub language_id: u32,
}

fn random_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

fn form_body(fields: &[(&str, &str)]) -> Vec<u8> {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        serializer.append_pair(key, value);
    }
    serializer.finish().into_bytes()
}

/// Value of the first `<input name="_token">` on a page.
fn scrape_token(html: &str) -> Option<String> {
    let selector = Selector::parse(r#"input[name="_token"]"#).ok()?;
    Html::parse_document(html)
        .select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string)
}

fn is_login_page(html: &str) -> bool {
    let Ok(selector) = Selector::parse("form[action]") else {
        return false;
    };
    Html::parse_document(html).select(&selector).any(|form| {
        form.value()
            .attr("action")
            .is_some_and(|action| action.contains("/login"))
    })
}

/// Whether a response means the session has expired.
fn needs_login(response: &HttpResponse) -> bool {
    match response.status {
        401 => true,
        300..=399 => response
            .header("location")
            .is_some_and(|location| location.contains("/login")),
        _ => response.is_success() && is_login_page(&response.text()),
    }
}

pub struct CrowdinSession {
    transport: Arc<dyn HttpTransport>,
    target: SessionTarget,
    credentials: SessionCredentials,
    csrf_token: String,
    auth: Mutex<AuthState>,
    max_attempts: u32,
}

impl CrowdinSession {
    pub fn new(target: SessionTarget, credentials: SessionCredentials) -> Result<Self> {
        let transport = ReqwestTransport::with_session(StdDuration::from_secs(60))?;
        Ok(Self::new_with_transport(
            target,
            credentials,
            Arc::new(transport),
        ))
    }

    /// The transport must keep cookies between requests.
    pub fn new_with_transport(
        target: SessionTarget,
        credentials: SessionCredentials,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            target: SessionTarget {
                web_url: target.web_url.trim_end_matches('/').to_string(),
                accounts_url: target.accounts_url.trim_end_matches('/').to_string(),
                ..target
            },
            credentials,
            csrf_token: random_token(),
            auth: Mutex::new(AuthState::Unauthenticated),
            max_attempts: MAX_AUTH_ATTEMPTS,
        }
    }

    pub fn auth_state(&self) -> AuthState {
        *self.auth.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: AuthState) {
        *self.auth.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<HttpResponse> {
        let request = HttpRequest::new(HttpMethod::Post, url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("x-csrf-token", self.csrf_token.as_str())
            .body(form_body(fields));
        Ok(self.transport.send(request).await?)
    }

    /// Sign in through the accounts login form.
    async fn authenticate(&self) -> Result<()> {
        self.set_state(AuthState::Authenticating);
        let login_url = format!("{}/login", self.target.accounts_url);

        let page = self
            .transport
            .send(HttpRequest::new(HttpMethod::Get, &login_url))
            .await?;
        let Some(token) = scrape_token(&page.text()) else {
            // No form: the cookie jar still holds a live session.
            self.set_state(AuthState::Authenticated);
            return Ok(());
        };

        let continue_url = format!("{}/project/{}", self.target.web_url, self.target.project_id);
        let response = self
            .post_form(
                &login_url,
                &[
                    ("email_or_login", self.credentials.login.as_str()),
                    ("password", self.credentials.password.as_str()),
                    ("continue", continue_url.as_str()),
                    ("locale", "en"),
                    ("intended", "/auth/token"),
                    ("_token", token.as_str()),
                ],
            )
            .await?;

        if matches!(response.status, 401 | 403 | 422) {
            self.set_state(AuthState::Unauthenticated);
            return Err(RemoteError::InvalidCredentials {
                service: "CrowdIn".into(),
            });
        }

        let body = response.text();
        if body.contains("/remember-me/decline")
            && let Some(token) = scrape_token(&body)
        {
            let decline_url = format!("{}/remember-me/decline", self.target.accounts_url);
            self.post_form(&decline_url, &[("_token", token.as_str())])
                .await?;
        }

        tracing::debug!(login = %self.credentials.login, "Signed in to CrowdIn");
        self.set_state(AuthState::Authenticated);
        Ok(())
    }

    fn backend_url(&self, path: &str, params: &[(&str, String)]) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in params {
            query.append_pair(key, value);
        }
        query.append_pair("project_id", &self.target.project_id.to_string());
        query.append_pair("target_language_id", &self.target.language_id.to_string());
        format!("{}{}?{}", self.target.web_url, path, query.finish())
    }

    /// GET a backend endpoint, signing in first when needed.
    pub async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Vec<u8>> {
        let request = HttpRequest::new(HttpMethod::Get, self.backend_url(path, params))
            .header("x-csrf-token", self.csrf_token.as_str());

        let mut attempts = 0;
        loop {
            if self.auth_state() != AuthState::Authenticated {
                if attempts >= self.max_attempts {
                    self.set_state(AuthState::Unauthenticated);
                    return Err(RemoteError::AuthRequired);
                }
                attempts += 1;
                self.authenticate().await?;
            }

            let response = self.transport.send(request.clone()).await?;
            if needs_login(&response) {
                tracing::info!(path, "CrowdIn session expired, signing in again");
                self.set_state(AuthState::Unauthenticated);
                continue;
            }
            if !response.is_success() {
                return Err(remote::error_for_status(&response));
            }
            return Ok(response.body);
        }
    }

    /// The file's phrases rendered as HTML, one `.crowdin_phrase` per string.
    pub async fn phrases_html(&self, file_id: u64) -> Result<String> {
        let body = self
            .get(
                "/backend/phrases/phrases_as_html",
                &[("file_id", file_id.to_string())],
            )
            .await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Translation id -> hidden flag for every phrase of a file.
    pub async fn phrase_visibility(&self, file_id: u64) -> Result<BTreeMap<String, bool>> {
        let path = "/backend/phrases/load_preview";
        let body = self
            .get(path, &[("file_id", file_id.to_string())])
            .await?;
        let value: Value = serde_json::from_slice(&body).map_err(|source| RemoteError::Decode {
            url: path.to_string(),
            source,
        })?;
        Ok(parse_visibility(&value))
    }

    pub async fn set_phrase_hidden(&self, translation_id: &str, hidden: bool) -> Result<()> {
        self.get(
            "/backend/translation/change_visibility",
            &[
                ("translation_id", translation_id.to_string()),
                ("hidden", u8::from(hidden).to_string()),
            ],
        )
        .await
        .map(drop)
    }
}

impl std::fmt::Debug for CrowdinSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrowdinSession")
            .field("target", &self.target)
            .field("auth", &self.auth_state())
            .finish_non_exhaustive()
    }
}

fn parse_visibility(value: &Value) -> BTreeMap<String, bool> {
    let Some(entries) = value.get("data").and_then(Value::as_array) else {
        return BTreeMap::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let id = match entry.get("id")? {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let hidden = match entry.get("hidden") {
                Some(Value::String(s)) => s == "1",
                Some(Value::Bool(b)) => *b,
                Some(Value::Number(n)) => n.as_u64() == Some(1),
                _ => false,
            };
            Some((id, hidden))
        })
        .collect()
}
