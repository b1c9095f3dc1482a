//! GitHub API client for the translation tracker.
//!
//! # Module Structure
//!
//! - [`types`] - Data structures returned by the API
//! - `client` - Client creation and quota-aware request discipline
//! - `pagination` - Lazy walker over `Link`-paginated listings
//! - `issues` - Milestone and issue endpoints
//! - `projects` - Classic project boards and projects v2 (GraphQL)
//!
//! Every endpoint reports a missing resource as `Ok(None)` (or an empty
//! listing) rather than an error. The synchronizers in [`crate::sync`] build
//! on top of these calls:
//!
//! ```ignore
//! use crowdsync::github::GitHubClient;
//!
//! let client = GitHubClient::new(&token)?;
//! let milestones = client.list_milestones("acme/docs").await?;
//! ```

pub(crate) mod client;
mod issues;
mod pagination;
mod projects;
pub mod types;

pub use client::{GITHUB_API_URL, GitHubClient};
pub use issues::IssueUpdate;
pub use pagination::GitHubPages;
pub use projects::ProjectV2;
pub use types::{
    GitHubRateLimitResponse, GitHubRateLimits, Issue, IssueState, Milestone, Project,
    ProjectCard, ProjectColumn, RateLimitResource,
};
