//! GitHub API data types.
//!
//! Only the fields the tracker reads are modelled; serde ignores the rest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single rate limit resource entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitResource {
    pub limit: u64,
    #[serde(default)]
    pub used: u64,
    pub remaining: u64,
    /// Unix timestamp when the rate limit resets.
    pub reset: i64,
}

impl RateLimitResource {
    pub fn reset_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.reset, 0).unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRateLimits {
    /// Core API rate limit (non-search REST endpoints).
    pub core: RateLimitResource,
    #[serde(default)]
    pub graphql: Option<RateLimitResource>,
}

/// Body of `GET /rate_limit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRateLimitResponse {
    pub resources: GitHubRateLimits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub number: u64,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// REST id; project cards reference issues by this.
    pub id: u64,
    /// GraphQL node id; project v2 items reference issues by this.
    #[serde(default)]
    pub node_id: String,
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: IssueState,
    #[serde(default)]
    pub milestone: Option<Milestone>,
}

/// Classic (REST) repository project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectColumn {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCard {
    pub id: u64,
    /// `https://api.github.com/repos/{owner}/{repo}/issues/{number}` for issue cards.
    #[serde(default)]
    pub content_url: Option<String>,
}

impl ProjectCard {
    /// Issue number referenced by the card, if it is an issue card.
    pub fn issue_number(&self) -> Option<u64> {
        let url = self.content_url.as_deref()?;
        let (head, number) = url.rsplit_once('/')?;
        if !head.ends_with("/issues") {
            return None;
        }
        number.parse().ok()
    }
}
