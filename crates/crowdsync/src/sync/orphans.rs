//! Rename and orphan detection over the remote file registry.
//!
//! A remote entry whose local source is gone is either a rename (exactly one
//! other known path shares its file name), an orphan (no such path) or
//! ambiguous (several). Ambiguous entries are reported and never acted on.

use std::collections::BTreeMap;

use crate::crowdin::CrowdinClient;
use crate::descriptor::TranslationProjectDescriptor;
use crate::files::FileMapper;
use crate::metadata::MetadataSnapshot;

use super::error::Result;
use super::progress::{ProgressCallback, SyncProgress, emit};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    /// Remote path of the stale entry.
    pub from: String,
    /// Remote path the file moved to.
    pub to: String,
    pub file_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orphan {
    pub path: String,
    pub file_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousRename {
    pub path: String,
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrphanReport {
    pub renames: Vec<Rename>,
    pub orphans: Vec<Orphan>,
    pub ambiguous: Vec<AmbiguousRename>,
}

impl OrphanReport {
    pub fn is_empty(&self) -> bool {
        self.renames.is_empty() && self.orphans.is_empty() && self.ambiguous.is_empty()
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

/// Classify uploaded remote entries whose local source no longer exists.
///
/// `exists` answers whether a local path (relative to the git root) is
/// present in the working tree.
pub fn detect_orphans<F>(snapshot: &MetadataSnapshot, mapper: &FileMapper, exists: F) -> OrphanReport
where
    F: Fn(&str) -> bool,
{
    let present: BTreeMap<&str, bool> = snapshot
        .keys()
        .map(|remote| {
            let found = mapper.to_local(remote).is_some_and(|local| exists(&local));
            (remote.as_str(), found)
        })
        .collect();

    let mut by_name: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (remote, found) in &present {
        if *found {
            by_name.entry(file_name(remote)).or_default().push(remote);
        }
    }

    let mut report = OrphanReport::default();
    for (remote, metadata) in snapshot {
        let Some(file_id) = metadata.id() else {
            continue;
        };
        if present.get(remote.as_str()).copied().unwrap_or(false) {
            continue;
        }
        let candidates: Vec<String> = by_name
            .get(file_name(remote))
            .map(|paths| {
                paths
                    .iter()
                    .filter(|p| **p != remote.as_str())
                    .map(|p| p.to_string())
                    .collect()
            })
            .unwrap_or_default();

        match candidates.as_slice() {
            [] => report.orphans.push(Orphan {
                path: remote.clone(),
                file_id,
            }),
            [to] => report.renames.push(Rename {
                from: remote.clone(),
                to: to.clone(),
                file_id,
            }),
            _ => report.ambiguous.push(AmbiguousRename {
                path: remote.clone(),
                candidates,
            }),
        }
    }
    report
}

/// Report every finding and, when the project allows it, delete the stale
/// remote entries of renames and orphans. Returns the number deleted.
pub async fn apply_orphans(
    crowdin: &CrowdinClient,
    project: &TranslationProjectDescriptor,
    report: &OrphanReport,
    on_progress: Option<&ProgressCallback>,
) -> Result<usize> {
    for rename in &report.renames {
        tracing::info!(from = %rename.from, to = %rename.to, "Remote file looks renamed");
        emit(
            on_progress,
            SyncProgress::RenameDetected {
                from: rename.from.clone(),
                to: rename.to.clone(),
            },
        );
    }
    for orphan in &report.orphans {
        tracing::info!(path = %orphan.path, "Remote file has no local source");
        emit(
            on_progress,
            SyncProgress::OrphanDetected {
                path: orphan.path.clone(),
            },
        );
    }
    for ambiguous in &report.ambiguous {
        tracing::warn!(
            path = %ambiguous.path,
            candidates = ?ambiguous.candidates,
            "Several rename candidates; leaving for manual review"
        );
        emit(
            on_progress,
            SyncProgress::AmbiguousRename {
                path: ambiguous.path.clone(),
                candidates: ambiguous.candidates.clone(),
            },
        );
    }

    if !project.delete_enabled() {
        return Ok(0);
    }
    let stale = report
        .renames
        .iter()
        .map(|r| (&r.from, r.file_id))
        .chain(report.orphans.iter().map(|o| (&o.path, o.file_id)));
    let mut deleted = 0;
    for (path, file_id) in stale {
        crowdin.delete_file(project.project_id(), file_id).await?;
        tracing::info!(path = %path, file_id, "Deleted remote file");
        emit(
            on_progress,
            SyncProgress::RemoteFileDeleted { path: path.clone() },
        );
        deleted += 1;
    }
    Ok(deleted)
}
