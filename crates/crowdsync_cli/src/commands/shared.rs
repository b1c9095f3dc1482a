use std::sync::Arc;
use std::time::Duration;

use crowdsync::crowdin::{CROWDIN_ACCOUNTS_URL, CROWDIN_WEB_URL, SessionCredentials, SessionTarget};
use crowdsync::http::reqwest_transport::ReqwestTransport;
use crowdsync::remote::rate_limits;
use crowdsync::{
    ApiRateLimiter, CrowdinClient, CrowdinSession, GitHubClient, TranslationProjectDescriptor,
    ZendeskClient,
};

use crate::config::Config;

const API_TIMEOUT: Duration = Duration::from_secs(120);

/// Get a required token, naming where it can be configured when missing.
fn require_token<'a>(
    token: Option<&'a str>,
    section: &str,
) -> Result<&'a str, Box<dyn std::error::Error>> {
    token.filter(|t| !t.is_empty()).ok_or_else(|| {
        format!(
            "No {section} token configured. Set CROWDSYNC_{}_TOKEN or [{section}] token in the config file.",
            section.to_uppercase()
        )
        .into()
    })
}

/// Configured pacing, falling back to the service default when set to zero.
fn limiter(config: &Config, fallback: u32) -> ApiRateLimiter {
    match config.sync.requests_per_second {
        0 => ApiRateLimiter::new(fallback),
        rps => ApiRateLimiter::new(rps),
    }
}

pub(crate) fn github_client(config: &Config) -> Result<GitHubClient, Box<dyn std::error::Error>> {
    let token = require_token(config.github.token.as_deref(), "github")?;
    let client = match &config.github.api_url {
        Some(url) => GitHubClient::new_with_transport(
            url,
            token,
            Arc::new(ReqwestTransport::with_timeout(API_TIMEOUT)?),
        ),
        None => GitHubClient::new(token)?,
    };
    Ok(client.with_rate_limiter(limiter(config, rate_limits::GITHUB_DEFAULT_RPS)))
}

pub(crate) fn crowdin_client(config: &Config) -> Result<CrowdinClient, Box<dyn std::error::Error>> {
    let token = require_token(config.crowdin.token.as_deref(), "crowdin")?;
    let client = match &config.crowdin.api_url {
        Some(url) => CrowdinClient::new_with_transport(
            url,
            token,
            Arc::new(ReqwestTransport::with_timeout(API_TIMEOUT)?),
        ),
        None => CrowdinClient::new(token)?,
    };
    Ok(client.with_rate_limiter(limiter(config, rate_limits::CROWDIN_DEFAULT_RPS)))
}

pub(crate) fn zendesk_client(
    config: &Config,
    domain: &str,
) -> Result<ZendeskClient, Box<dyn std::error::Error>> {
    let token = require_token(config.zendesk.token.as_deref(), "zendesk")?;
    Ok(ZendeskClient::new(domain, token)?
        .with_rate_limiter(limiter(config, rate_limits::ZENDESK_DEFAULT_RPS)))
}

/// Web session for phrase visibility, when login and password are both set.
pub(crate) fn crowdin_session(
    config: &Config,
    project: &TranslationProjectDescriptor,
) -> Result<Option<CrowdinSession>, Box<dyn std::error::Error>> {
    let (Some(login), Some(password)) = (&config.crowdin.login, &config.crowdin.password) else {
        tracing::debug!("No CrowdIn web login configured, phrase visibility stays unchanged");
        return Ok(None);
    };
    let target = SessionTarget {
        web_url: config
            .crowdin
            .web_url
            .clone()
            .unwrap_or_else(|| CROWDIN_WEB_URL.to_string()),
        accounts_url: CROWDIN_ACCOUNTS_URL.to_string(),
        project_id: project.project_id(),
        language_id: config.crowdin.web_language_id,
    };
    let credentials = SessionCredentials {
        login: login.clone(),
        password: password.clone(),
    };
    Ok(Some(CrowdinSession::new(target, credentials)?))
}
