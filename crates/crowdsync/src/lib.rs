//! Crowdsync - keeps a git documentation tree, a CrowdIn translation project
//! and its GitHub/Zendesk trackers in agreement.
//!
//! Each cycle uploads changed sources, pre-translates what is behind, pulls
//! finished translations back into the tree and mirrors progress onto
//! tracking issues and project boards. The help-center variant mirrors
//! Zendesk articles into the tree and publishes their translations back.
//!
//! # Example
//!
//! ```ignore
//! use crowdsync::{CrowdinClient, GitHubClient, GitCli};
//! use crowdsync::sync::{Engine, Remotes, SyncOptions, check_repositories};
//!
//! let github = GitHubClient::new(&github_token)?;
//! let crowdin = CrowdinClient::new(&crowdin_token)?;
//! check_repositories(&github, &repos, None).await?;
//!
//! for repo in &repos {
//!     let git = GitCli::new(repo.git_root());
//!     let remotes = Remotes { github: &github, crowdin: &crowdin, session: None };
//!     Engine::new(remotes, &git, repo, &project, &options, &state_dir, &cancel)
//!         .run_cycle(None)
//!         .await?;
//! }
//! ```

pub mod crowdin;
pub mod descriptor;
pub mod files;
pub mod github;
pub mod http;
pub mod metadata;
pub mod remote;
pub mod retry;
pub mod state;
pub mod sync;
pub mod vcs;
pub mod zendesk;

pub use crowdin::{CrowdinClient, CrowdinSession};
pub use descriptor::{
    DescriptorError, RemoteTrackerBackend, RepositoryDescriptor, TranslationProjectDescriptor,
};
pub use files::FileMapper;
pub use github::GitHubClient;
pub use http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
pub use metadata::{BoardColumn, FileMetadata, MetadataSnapshot};
pub use remote::{ApiRateLimiter, RemoteError};
pub use state::{StateError, StateStore};
pub use vcs::{GitCli, Vcs, VcsError};
pub use zendesk::ZendeskClient;
