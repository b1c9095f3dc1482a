//! Read-only descriptions of the repository and translation project.
//!
//! Both are validated at construction and never change during a run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("single folder {single} is not under project folder {project}")]
    SingleFolderOutsideProject { single: String, project: String },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("cannot derive owner/name from remote url {0}")]
    UnparseableRemote(String),

    #[error("language code {0} is not a valid locale")]
    InvalidLanguage(String),
}

/// Strip leading/trailing slashes so folders compare as plain prefixes.
pub(crate) fn normalize_folder(folder: &str) -> String {
    folder.trim_matches('/').to_string()
}

/// Whether `path` is `folder` itself or lies beneath it.
///
/// An empty folder is the repository root and contains everything.
pub fn is_within(path: &str, folder: &str) -> bool {
    folder.is_empty()
        || path == folder
        || (path.starts_with(folder) && path.as_bytes().get(folder.len()) == Some(&b'/'))
}

/// Parse `owner/name` from a git remote URL.
///
/// Accepts `https://host/owner/name(.git)` and `git@host:owner/name(.git)`.
pub fn parse_origin(remote_url: &str) -> Option<String> {
    let url = remote_url.trim();
    let path = if let Some(rest) = url.split_once("://").map(|(_, rest)| rest) {
        rest.split_once('/')?.1
    } else {
        url.split_once(':')?.1
    };
    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let mut parts = path.rsplitn(3, '/');
    let name = parts.next().filter(|s| !s.is_empty())?;
    let owner = parts.next().filter(|s| !s.is_empty())?;
    Some(format!("{owner}/{name}"))
}

/// A local working tree and the GitHub repositories it tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryDescriptor {
    name: String,
    git_root: PathBuf,
    origin: String,
    upstream: Option<String>,
    branch: String,
    project_folder: String,
    single_folder: Option<String>,
    check_upstream: bool,
}

impl RepositoryDescriptor {
    pub fn new(
        name: impl Into<String>,
        git_root: impl Into<PathBuf>,
        origin: impl Into<String>,
        branch: impl Into<String>,
        project_folder: &str,
    ) -> Result<Self, DescriptorError> {
        let name = name.into();
        let origin = origin.into();
        let branch = branch.into();
        if name.is_empty() {
            return Err(DescriptorError::Empty { field: "name" });
        }
        if origin.is_empty() {
            return Err(DescriptorError::Empty { field: "origin" });
        }
        if branch.is_empty() {
            return Err(DescriptorError::Empty { field: "branch" });
        }
        Ok(Self {
            name,
            git_root: git_root.into(),
            origin,
            upstream: None,
            branch,
            project_folder: normalize_folder(project_folder),
            single_folder: None,
            check_upstream: false,
        })
    }

    /// Track an upstream repository; changed files are then diffed against it.
    #[must_use]
    pub fn with_upstream(mut self, upstream: impl Into<String>, check_upstream: bool) -> Self {
        self.upstream = Some(upstream.into());
        self.check_upstream = check_upstream;
        self
    }

    /// Restrict the scope to one folder under the project folder.
    pub fn with_single_folder(mut self, single_folder: &str) -> Result<Self, DescriptorError> {
        let single = normalize_folder(single_folder);
        if !single.is_empty() {
            if !is_within(&single, &self.project_folder) {
                return Err(DescriptorError::SingleFolderOutsideProject {
                    single,
                    project: self.project_folder.clone(),
                });
            }
            self.single_folder = Some(single);
        }
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn git_root(&self) -> &std::path::Path {
        &self.git_root
    }

    /// `owner/name` of the repository that receives issues.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn upstream(&self) -> Option<&str> {
        self.upstream.as_deref()
    }

    pub fn check_upstream(&self) -> bool {
        self.check_upstream && self.upstream.is_some()
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn project_folder(&self) -> &str {
        &self.project_folder
    }

    pub fn single_folder(&self) -> Option<&str> {
        self.single_folder.as_deref()
    }

    /// The narrowest configured folder.
    pub fn scope(&self) -> &str {
        self.single_folder.as_deref().unwrap_or(&self.project_folder)
    }
}

/// A CrowdIn project and where this repository's files live inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationProjectDescriptor {
    project_id: u64,
    project_name: String,
    source_language: String,
    target_language: String,
    dest_folder: String,
    delete_enabled: bool,
    translation_memory: Option<u64>,
    glossary: Option<u64>,
}

impl TranslationProjectDescriptor {
    pub fn new(
        project_id: u64,
        project_name: impl Into<String>,
        source_language: &str,
        target_language: &str,
        dest_folder: &str,
    ) -> Result<Self, DescriptorError> {
        let project_name = project_name.into();
        if project_name.is_empty() {
            return Err(DescriptorError::Empty {
                field: "project_name",
            });
        }
        let dest_folder = normalize_folder(dest_folder);
        if dest_folder.is_empty() {
            return Err(DescriptorError::Empty {
                field: "dest_folder",
            });
        }
        Ok(Self {
            project_id,
            project_name,
            source_language: two_letter_code(source_language)?,
            target_language: two_letter_code(target_language)?,
            dest_folder,
            delete_enabled: false,
            translation_memory: None,
            glossary: None,
        })
    }

    /// Allow orphaned remote entries to be deleted.
    #[must_use]
    pub fn with_delete_enabled(mut self, enabled: bool) -> Self {
        self.delete_enabled = enabled;
        self
    }

    /// TM and glossary saved at the end of every cycle.
    #[must_use]
    pub fn with_references(
        mut self,
        translation_memory: Option<u64>,
        glossary: Option<u64>,
    ) -> Self {
        self.translation_memory = translation_memory;
        self.glossary = glossary;
        self
    }

    pub fn project_id(&self) -> u64 {
        self.project_id
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn source_language(&self) -> &str {
        &self.source_language
    }

    /// Two-letter target language id, as used in folder names and API calls.
    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    pub fn dest_folder(&self) -> &str {
        &self.dest_folder
    }

    pub fn delete_enabled(&self) -> bool {
        self.delete_enabled
    }

    pub fn translation_memory(&self) -> Option<u64> {
        self.translation_memory
    }

    pub fn glossary(&self) -> Option<u64> {
        self.glossary
    }
}

/// `ja-JP` -> `ja`, `en` -> `en`.
fn two_letter_code(locale: &str) -> Result<String, DescriptorError> {
    let code: String = locale
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(DescriptorError::InvalidLanguage(locale.to_string()));
    }
    Ok(code)
}

/// How tracking issues are laid out on a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RemoteTrackerBackend {
    /// Issues and milestones only.
    #[default]
    Issues,
    /// Repository projects with REST columns and cards.
    ProjectsClassic,
    /// GraphQL projects with a single-select `Status` field.
    ProjectsV2 { number: u64 },
}
