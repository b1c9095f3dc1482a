use std::path::PathBuf;

use thiserror::Error;

use crate::descriptor::DescriptorError;
use crate::remote::RemoteError;
use crate::state::StateError;
use crate::vcs::VcsError;

/// Errors that abort a reconciliation stage.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid translation archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// One or more configured repositories failed the accessibility check.
    #[error("inaccessible repositories: {}", failures.join(", "))]
    Configuration { failures: Vec<String> },
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
