//! CrowdIn API v2 data types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A source file registered in a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrowdinFile {
    pub id: u64,
    pub name: String,
    /// Absolute remote path, e.g. `/docs-remote/guide/intro.md`.
    pub path: String,
    #[serde(default)]
    pub directory_id: Option<u64>,
}

impl CrowdinFile {
    /// Path without the leading slash, as used for metadata keys.
    pub fn relative_path(&self) -> &str {
        self.path.trim_start_matches('/')
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directory {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub directory_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseCounts {
    pub total: u64,
    pub translated: u64,
    pub approved: u64,
}

/// Per-file progress for one target language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileProgress {
    pub file_id: u64,
    pub phrases: PhraseCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Storage {
    pub id: u64,
}

/// Status shared by pre-translation jobs and builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    Created,
    InProgress,
    Finished,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Canceled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::InProgress => "inProgress",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreTranslation {
    pub identifier: String,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub id: u64,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLink {
    pub url: String,
}

/// Account-level resources a project translates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    TranslationMemory,
    Glossary,
}

impl ReferenceKind {
    /// API collection the resource lives under.
    pub fn collection(self) -> &'static str {
        match self {
            Self::TranslationMemory => "tms",
            Self::Glossary => "glossaries",
        }
    }

    /// Export format, also used as the file extension.
    pub fn format(self) -> &'static str {
        match self {
            Self::TranslationMemory => "tmx",
            Self::Glossary => "tbx",
        }
    }
}

/// A TM or glossary export job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceExport {
    pub identifier: String,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: u32,
}

/// Pre-translation method accepted by `POST /pre-translations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreTranslationMethod {
    Tm,
    Mt,
}

/// Directory paths of a project, resolved through their parent chains.
///
/// Keys have no leading slash: `docs-remote/guide`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryIndex {
    paths: BTreeMap<String, u64>,
}

impl DirectoryIndex {
    pub fn new(directories: &[Directory]) -> Self {
        let by_id: BTreeMap<u64, &Directory> = directories.iter().map(|d| (d.id, d)).collect();
        let mut paths = BTreeMap::new();
        for directory in directories {
            let mut segments = vec![directory.name.as_str()];
            let mut parent = directory.directory_id;
            // A broken chain (parent not listed) leaves the directory out.
            let mut complete = true;
            while let Some(id) = parent {
                match by_id.get(&id) {
                    Some(p) if segments.len() <= by_id.len() => {
                        segments.push(p.name.as_str());
                        parent = p.directory_id;
                    }
                    _ => {
                        complete = false;
                        break;
                    }
                }
            }
            if complete {
                segments.reverse();
                paths.insert(segments.join("/"), directory.id);
            }
        }
        Self { paths }
    }

    pub fn get(&self, path: &str) -> Option<u64> {
        self.paths.get(path.trim_matches('/')).copied()
    }

    pub fn insert(&mut self, path: &str, id: u64) {
        self.paths.insert(path.trim_matches('/').to_string(), id);
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
