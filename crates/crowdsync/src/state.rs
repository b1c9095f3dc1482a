//! Identifiers created on GitHub, cached on local disk.
//!
//! Layout under the state directory:
//!
//! ```text
//! <state_dir>/<owner>/<name>/milestones.json   {"human": 1, "machine": 2}
//! <state_dir>/<owner>/<name>/issues.json       {"main": {"docs/en/guide": 12}}
//! ```
//!
//! Every write replaces the file atomically so a crash never leaves a
//! half-written map behind.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::descriptor::is_within;

const MILESTONES_FILE: &str = "milestones.json";
const ISSUES_FILE: &str = "issues.json";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Milestone title -> milestone number.
pub type MilestoneMap = BTreeMap<String, u64>;

/// Root folder -> issue number, for one branch.
pub type IssueMap = BTreeMap<String, u64>;

type AllIssues = BTreeMap<String, IssueMap>;

/// Per-origin state directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(state_dir: &Path, origin: &str) -> Self {
        Self {
            dir: state_dir.join(origin),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cached milestones, or `None` before the first lookup for this origin.
    pub fn load_milestones(&self) -> Result<Option<MilestoneMap>, StateError> {
        read_json(&self.dir.join(MILESTONES_FILE))
    }

    pub fn save_milestones(&self, milestones: &MilestoneMap) -> Result<(), StateError> {
        write_json(&self.dir.join(MILESTONES_FILE), milestones)
    }

    /// Issue numbers for `branch`, limited to folders under `project_folder`.
    pub fn load_issues(&self, branch: &str, project_folder: &str) -> Result<IssueMap, StateError> {
        let all: AllIssues = read_json(&self.dir.join(ISSUES_FILE))?.unwrap_or_default();
        Ok(all
            .get(branch)
            .map(|issues| {
                issues
                    .iter()
                    .filter(|(folder, _)| is_within(folder, project_folder))
                    .map(|(folder, number)| (folder.clone(), *number))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Record one issue number, keeping every other branch and folder.
    pub fn save_issue(&self, branch: &str, folder: &str, number: u64) -> Result<(), StateError> {
        let path = self.dir.join(ISSUES_FILE);
        let mut all: AllIssues = read_json(&path)?.unwrap_or_default();
        all.entry(branch.to_string())
            .or_default()
            .insert(folder.to_string(), number);
        write_json(&path, &all)
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StateError> {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StateError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_slice(&content)
        .map(Some)
        .map_err(|source| StateError::Json {
            path: path.to_path_buf(),
            source,
        })
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StateError> {
    let io_err = |source| StateError::Io {
        path: path.to_path_buf(),
        source,
    };
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(io_err)?;

    let body = serde_json::to_vec_pretty(value).map_err(|source| StateError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    let mut file = std::fs::File::create(&tmp).map_err(io_err)?;
    file.write_all(&body).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_files_read_as_empty() {
        let dir = TempDir::new().expect("tempdir");
        let store = StateStore::new(dir.path(), "acme/docs");
        assert_eq!(store.load_milestones().expect("load"), None);
        assert!(store.load_issues("main", "docs").expect("load").is_empty());
    }

    #[test]
    fn milestones_round_trip() {
        let dir = TempDir::new().expect("tempdir");
        let store = StateStore::new(dir.path(), "acme/docs");
        let milestones = MilestoneMap::from([("human".into(), 1), ("machine".into(), 2)]);
        store.save_milestones(&milestones).expect("save");
        assert_eq!(store.load_milestones().expect("load"), Some(milestones));
        assert!(dir.path().join("acme/docs/milestones.json").exists());
    }

    #[test]
    fn issues_are_kept_per_branch_and_filtered_by_folder() {
        let dir = TempDir::new().expect("tempdir");
        let store = StateStore::new(dir.path(), "acme/docs");
        store.save_issue("main", "docs/en/guide", 12).expect("save");
        store.save_issue("main", "blog/en", 13).expect("save");
        store.save_issue("release", "docs/en/guide", 14).expect("save");

        let main = store.load_issues("main", "docs").expect("load");
        assert_eq!(main, IssueMap::from([("docs/en/guide".into(), 12)]));

        let release = store.load_issues("release", "").expect("load");
        assert_eq!(release.get("docs/en/guide"), Some(&14));
    }

    #[test]
    fn corrupt_state_is_reported() {
        let dir = TempDir::new().expect("tempdir");
        let store = StateStore::new(dir.path(), "acme/docs");
        std::fs::create_dir_all(store.dir()).expect("mkdir");
        std::fs::write(store.dir().join("issues.json"), b"{not json").expect("write");
        let err = store.load_issues("main", "docs").expect_err("corrupt");
        assert!(matches!(err, StateError::Json { .. }));
    }
}
