//! Reconciliation between a git working tree and the translation platform.
//!
//! # Module Structure
//!
//! - [`types`] - Options, engine chain and retry constants
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`upload`] - Source normalization and upload
//! - [`pretranslate`] - Engine dispatch and phrase visibility
//! - [`download`] - Export gate, builds and archive extraction
//! - [`tracker`] / [`board`] - Tracking issues and project boards
//! - [`orphans`] - Rename and orphan detection
//! - [`helpcenter`] - Zendesk article mirror and publish
//! - [`engine`] - One full cycle per repository
//!
//! # Example
//!
//! ```ignore
//! use crowdsync::sync::{Engine, Remotes, SyncOptions, check_repositories};
//!
//! check_repositories(&github, &repos, None).await?;
//! let remotes = Remotes { github: &github, crowdin: &crowdin, session: None };
//! let engine = Engine::new(remotes, &git, &repo, &project, &options, &state_dir, &cancel);
//! let report = engine.run_cycle(None).await?;
//! ```

pub mod board;
pub mod download;
pub mod drift;
pub mod engine;
mod error;
pub mod helpcenter;
pub mod orphans;
pub mod pretranslate;
mod progress;
pub mod tracker;
mod types;
pub mod upload;

pub use error::{Result, SyncError};

pub use types::{SyncOptions, TranslationEngine};

pub use types::{
    DEFAULT_BUILD_TIMEOUT, DEFAULT_EXPORT_COOLDOWN, DEFAULT_POLL_INTERVAL,
    DEFAULT_PRETRANSLATE_TIMEOUT, INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, MAX_RETRIES,
};

pub use progress::{ProgressCallback, SyncProgress, emit};

pub use download::{DownloadReport, Downloader, ExportGate};
pub use engine::{CycleReport, Engine, IssueSyncReport, Remotes, Scan, check_repositories};
pub use helpcenter::{HelpCenterReport, HelpCenterSync};
pub use orphans::OrphanReport;
pub use pretranslate::{PreTranslateReport, PreTranslator};
pub use upload::{IgnoreRegistry, UploadReport, Uploader};
