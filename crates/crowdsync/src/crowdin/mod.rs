//! CrowdIn access: the v2 REST API and the web session used for phrase
//! visibility.
//!
//! - [`types`] - API data types and the directory index
//! - `client` - REST client: files, storages, progress, pre-translations, builds,
//!   TM and glossary exports
//! - `session` - cookie session with a bounded sign-in state machine
//! - [`classify`] - which phrases must be hidden from machine translation

pub mod classify;
pub(crate) mod client;
mod session;
pub mod types;

pub use classify::{PhraseVisibility, classify_phrases};
pub use client::{CROWDIN_API_URL, CrowdinClient, PollOptions, PreTranslationRequest};
pub use session::{
    AuthState, CROWDIN_ACCOUNTS_URL, CROWDIN_WEB_URL, CrowdinSession, MAX_AUTH_ATTEMPTS,
    SessionCredentials, SessionTarget,
};
pub use types::{
    Build, CrowdinFile, Directory, DirectoryIndex, DownloadLink, FileProgress, JobStatus,
    PhraseCounts, PreTranslation, PreTranslationMethod, ReferenceExport, ReferenceKind, Storage,
};
