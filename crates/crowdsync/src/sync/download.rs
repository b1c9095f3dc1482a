//! Download reconciler: builds an export, waits for it and writes the
//! target-language files into the working tree.
//!
//! Builds are throttled by the platform, so requests go through an
//! [`ExportGate`] that enforces a cooldown between two builds.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::crowdin::CrowdinClient;
use crate::descriptor::{TranslationProjectDescriptor, is_within};
use crate::files::FileMapper;
use crate::metadata::FileMetadata;
use crate::remote::RemoteError;

use super::drift::{checksum, is_stale, write_companion};
use super::error::{Result, SyncError};
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::SyncOptions;

/// Earliest instant the next build may be requested.
///
/// CrowdIn throttles builds per account, so clones share one deadline and a
/// run over several repositories hands the same gate to every engine.
#[derive(Debug, Clone)]
pub struct ExportGate {
    cooldown: Duration,
    next_allowed: Arc<Mutex<Option<Instant>>>,
}

impl ExportGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            next_allowed: Arc::new(Mutex::new(None)),
        }
    }

    fn next_allowed(&self) -> Option<Instant> {
        *self.next_allowed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Time left before a build may be requested.
    pub fn remaining(&self) -> Duration {
        self.next_allowed()
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }

    /// Sleep until the gate opens.
    pub async fn wait(
        &self,
        cancel: &CancellationToken,
        on_progress: Option<&ProgressCallback>,
    ) -> std::result::Result<(), RemoteError> {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return Ok(());
        }
        tracing::info!("Waiting {:?} before requesting another build", remaining);
        emit(
            on_progress,
            SyncProgress::ExportGateWait {
                wait_ms: remaining.as_millis() as u64,
            },
        );
        tokio::select! {
            () = cancel.cancelled() => Err(RemoteError::Cancelled),
            () = tokio::time::sleep(remaining) => Ok(()),
        }
    }

    /// Record that a build was just requested.
    pub fn mark(&self) {
        *self.next_allowed.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(Instant::now() + self.cooldown);
    }
}

/// Whether a source file's translation must be pulled again.
///
/// True for files uploaded in this cycle, files with no local translation,
/// and files whose strings are not all approved yet.
pub fn needs_refresh(
    metadata: Option<&FileMetadata>,
    newly_uploaded: bool,
    has_translation: bool,
) -> bool {
    newly_uploaded || !has_translation || metadata.is_some_and(|m| !m.is_fully_approved())
}

/// Sources whose translation companion is missing or records another
/// source checksum.
pub fn outdated_sources(root: &Path, mapper: &FileMapper, sources: &[String]) -> Vec<String> {
    sources
        .iter()
        .filter(|source| {
            let Some(translation) = mapper.translation_path(source) else {
                return false;
            };
            match std::fs::read(root.join(source.as_str())) {
                Ok(content) => is_stale(&root.join(translation), checksum(&content)),
                Err(_) => false,
            }
        })
        .cloned()
        .collect()
}

/// Unpack target-language entries whose source is in `wanted`.
///
/// Each written translation gets a companion with the checksum of its
/// source. Returns the written paths, relative to `root`.
pub fn extract(
    archive: &[u8],
    root: &Path,
    mapper: &FileMapper,
    wanted: &BTreeSet<String>,
) -> Result<Vec<String>> {
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(archive))?;
    let language_root = mapper.language_root(mapper.target_language());
    let mut written = Vec::new();

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let Some(name) = entry
            .enclosed_name()
            .and_then(|p| p.to_str().map(|s| s.trim_start_matches('/').to_string()))
        else {
            continue;
        };
        if !is_within(&name, &language_root) {
            continue;
        }
        let Some(source) = mapper.source_path(&name) else {
            continue;
        };
        if !wanted.contains(&source) {
            continue;
        }

        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(SyncError::io(&name))?;
        let target = root.join(&name);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(SyncError::io(parent))?;
        }
        std::fs::write(&target, &content).map_err(SyncError::io(&target))?;
        if let Ok(source_content) = std::fs::read(root.join(&source)) {
            write_companion(&target, checksum(&source_content))?;
        }
        written.push(name);
    }
    written.sort();
    Ok(written)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub build_id: Option<u64>,
    /// Translation paths written, relative to the git root.
    pub written: Vec<String>,
}

pub struct Downloader<'a> {
    crowdin: &'a CrowdinClient,
    project: &'a TranslationProjectDescriptor,
    mapper: &'a FileMapper,
    root: &'a Path,
    options: &'a SyncOptions,
    cancel: &'a CancellationToken,
}

impl<'a> Downloader<'a> {
    pub fn new(
        crowdin: &'a CrowdinClient,
        project: &'a TranslationProjectDescriptor,
        mapper: &'a FileMapper,
        root: &'a Path,
        options: &'a SyncOptions,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            crowdin,
            project,
            mapper,
            root,
            options,
            cancel,
        }
    }

    /// Build, fetch and extract translations for `refresh` (source paths).
    pub async fn download(
        &self,
        gate: &ExportGate,
        refresh: &[String],
        on_progress: Option<&ProgressCallback>,
    ) -> Result<DownloadReport> {
        if refresh.is_empty() {
            return Ok(DownloadReport::default());
        }
        gate.wait(self.cancel, on_progress).await?;

        let project_id = self.project.project_id();
        let build = self
            .crowdin
            .build_translations(project_id, self.project.target_language())
            .await?;
        gate.mark();
        tracing::info!(build_id = build.id, files = refresh.len(), "Requested translation build");
        emit(on_progress, SyncProgress::BuildRequested { build_id: build.id });

        let build = self
            .crowdin
            .wait_for_build(
                project_id,
                build.id,
                self.options.build_poll(),
                self.cancel,
                on_progress,
            )
            .await?;

        let Some(link) = self.crowdin.build_download(project_id, build.id).await? else {
            tracing::warn!(build_id = build.id, "Build has no download link");
            return Ok(DownloadReport {
                build_id: Some(build.id),
                written: Vec::new(),
            });
        };
        let archive = self.crowdin.download(&link.url).await?;

        let wanted: BTreeSet<String> = refresh.iter().cloned().collect();
        let written = extract(&archive, self.root, self.mapper, &wanted)?;
        tracing::info!(written = written.len(), "Extracted translations");
        emit(
            on_progress,
            SyncProgress::TranslationsExtracted {
                written: written.len(),
            },
        );
        Ok(DownloadReport {
            build_id: Some(build.id),
            written,
        })
    }
}
