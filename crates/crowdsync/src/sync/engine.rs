//! Reconciliation engine.
//!
//! One [`Engine`] drives one repository through a cycle:
//!
//! 1. scan the working tree for changed and tracked files
//! 2. upload changed sources
//! 3. pre-translate files that are behind
//! 4. build, download and commit translations
//! 5. bring tracking issues and board items in line with progress
//! 6. report (and optionally delete) renamed or orphaned remote entries
//! 7. save the project's translation memory and glossary
//!
//! Every stage re-derives what it needs from the remote, so a cycle that
//! dies half way converges on the next run. [`check_repositories`] is the
//! gate a front end runs over every configured repository before any stage
//! mutates anything.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::crowdin::{CrowdinClient, CrowdinSession, ReferenceKind};
use crate::descriptor::{RemoteTrackerBackend, RepositoryDescriptor, TranslationProjectDescriptor};
use crate::files::FileMapper;
use crate::github::GitHubClient;
use crate::metadata::{MetadataSnapshot, folder_metadata, target_column, with_pending};
use crate::remote::RemoteError;
use crate::state::StateStore;
use crate::vcs::{Vcs, changed_files, commit_translations};

use super::board::{board_for, place_issue};
use super::download::{DownloadReport, Downloader, ExportGate, needs_refresh, outdated_sources};
use super::drift::companion_path;
use super::error::{Result, SyncError};
use super::orphans::{OrphanReport, apply_orphans, detect_orphans};
use super::pretranslate::{PreTranslateReport, PreTranslator};
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::tracker::{IssueTracker, folder_from_title, render_issue_body};
use super::types::SyncOptions;
use super::upload::{IgnoreRegistry, UploadReport, Uploader};

/// Fail unless every origin and upstream of `repos` is reachable.
pub async fn check_repositories(
    github: &GitHubClient,
    repos: &[RepositoryDescriptor],
    on_progress: Option<&ProgressCallback>,
) -> Result<()> {
    let origins: BTreeSet<&str> = repos
        .iter()
        .flat_map(|r| std::iter::once(r.origin()).chain(r.upstream()))
        .collect();

    let mut failures = Vec::new();
    for origin in origins {
        emit(
            on_progress,
            SyncProgress::CheckingAccess {
                origin: origin.to_string(),
            },
        );
        if !github.is_repository_accessible(Some(origin)).await? {
            tracing::error!(origin = %origin, "Repository is not accessible");
            emit(
                on_progress,
                SyncProgress::AccessDenied {
                    origin: origin.to_string(),
                },
            );
            failures.push(origin.to_string());
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(SyncError::Configuration { failures })
    }
}

/// Remote services one engine talks to.
#[derive(Clone, Copy)]
pub struct Remotes<'a> {
    pub github: &'a GitHubClient,
    pub crowdin: &'a CrowdinClient,
    /// Web session for phrase visibility; without it code strings stay as
    /// they are.
    pub session: Option<&'a CrowdinSession>,
}

/// Eligible source files found by a scan, relative to the git root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
    pub changed: Vec<String>,
    pub all: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueSyncReport {
    /// Root folder -> issue number, for every folder with remote progress.
    pub tracked: Vec<(String, u64)>,
    pub closed: Vec<u64>,
    pub moved: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub scan: Scan,
    pub upload: UploadReport,
    pub pretranslate: PreTranslateReport,
    pub download: DownloadReport,
    pub committed: bool,
    pub issues: IssueSyncReport,
    pub orphans: OrphanReport,
    pub deleted: usize,
    /// TM and glossary files written to the state directory.
    pub references: Vec<PathBuf>,
}

pub struct Engine<'a> {
    remotes: Remotes<'a>,
    vcs: &'a dyn Vcs,
    repo: &'a RepositoryDescriptor,
    project: &'a TranslationProjectDescriptor,
    options: &'a SyncOptions,
    state_dir: &'a Path,
    cancel: &'a CancellationToken,
    backend: RemoteTrackerBackend,
    ignore: IgnoreRegistry,
    mapper: FileMapper,
    gate: ExportGate,
}

impl<'a> Engine<'a> {
    pub fn new(
        remotes: Remotes<'a>,
        vcs: &'a dyn Vcs,
        repo: &'a RepositoryDescriptor,
        project: &'a TranslationProjectDescriptor,
        options: &'a SyncOptions,
        state_dir: &'a Path,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            remotes,
            vcs,
            repo,
            project,
            options,
            state_dir,
            cancel,
            backend: RemoteTrackerBackend::default(),
            ignore: IgnoreRegistry::default(),
            mapper: FileMapper::new(repo, project),
            gate: ExportGate::new(options.export_cooldown),
        }
    }

    #[must_use]
    pub fn with_backend(mut self, backend: RemoteTrackerBackend) -> Self {
        self.backend = backend;
        self
    }

    #[must_use]
    pub fn with_ignore(mut self, ignore: IgnoreRegistry) -> Self {
        self.ignore = ignore;
        self
    }

    /// Share a build cooldown with engines for other repositories.
    #[must_use]
    pub fn with_gate(mut self, gate: ExportGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn mapper(&self) -> &FileMapper {
        &self.mapper
    }

    fn root(&self) -> &Path {
        self.repo.git_root()
    }

    fn ensure_running(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(RemoteError::Cancelled.into());
        }
        Ok(())
    }

    fn remote_paths(&self, sources: &[String]) -> Vec<String> {
        sources
            .iter()
            .filter_map(|p| self.mapper.to_remote(p))
            .collect()
    }

    /// Changed and tracked eligible sources.
    pub async fn scan(&self, on_progress: Option<&ProgressCallback>) -> Result<Scan> {
        let changed = changed_files(self.vcs, self.repo).await?;
        let tracked = self.vcs.ls_tree(self.repo.branch()).await?;
        let changed = self
            .mapper
            .eligible_sources(changed.iter().map(String::as_str));
        let all = self.mapper.eligible_sources(
            tracked
                .iter()
                .chain(changed.iter())
                .map(String::as_str),
        );
        tracing::info!(
            repository = %self.repo.name(),
            changed = changed.len(),
            total = all.len(),
            "Scanned working tree"
        );
        emit(
            on_progress,
            SyncProgress::FilesScanned {
                repository: self.repo.name().to_string(),
                changed: changed.len(),
                total: all.len(),
            },
        );
        Ok(Scan { changed, all })
    }

    /// Remote metadata, with pending entries for `sources` not uploaded yet.
    pub async fn metadata(&self, sources: &[String]) -> Result<MetadataSnapshot> {
        let snapshot = self
            .remotes
            .crowdin
            .project_metadata(
                self.project.project_id(),
                self.project.target_language(),
                self.project.dest_folder(),
            )
            .await?;
        let remote = self.remote_paths(sources);
        Ok(with_pending(&snapshot, remote.iter().map(String::as_str)))
    }

    pub async fn upload(
        &self,
        files: &[String],
        on_progress: Option<&ProgressCallback>,
    ) -> Result<UploadReport> {
        let ignore_key = self.repo.upstream().unwrap_or(self.repo.origin());
        Uploader::new(
            self.remotes.crowdin,
            self.project,
            &self.mapper,
            self.root(),
            &self.ignore,
            ignore_key,
        )
        .upload(files, on_progress)
        .await
    }

    pub async fn translate(
        &self,
        sources: &[String],
        metadata: MetadataSnapshot,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<PreTranslateReport> {
        let remote = self.remote_paths(sources);
        PreTranslator::new(self.remotes.crowdin, self.project, self.options, self.cancel)
            .with_session(self.remotes.session)
            .dispatch(&remote, metadata, on_progress)
            .await
    }

    /// Sources whose translation should be pulled in the next build.
    pub fn refresh_list(
        &self,
        sources: &[String],
        metadata: &MetadataSnapshot,
        newly_uploaded: &[String],
    ) -> Vec<String> {
        let outdated: BTreeSet<String> = outdated_sources(self.root(), &self.mapper, sources)
            .into_iter()
            .collect();
        sources
            .iter()
            .filter(|source| {
                let Some(m) = self
                    .mapper
                    .to_remote(source)
                    .and_then(|remote| metadata.get(&remote))
                    .filter(|m| m.is_uploaded())
                else {
                    return false;
                };
                let has_translation = self
                    .mapper
                    .translation_path(source)
                    .is_some_and(|t| self.root().join(t).is_file());
                needs_refresh(Some(m), newly_uploaded.contains(source), has_translation)
                    || outdated.contains(*source)
            })
            .cloned()
            .collect()
    }

    /// Build and extract translations for `refresh`, then commit them.
    pub async fn download(
        &self,
        refresh: &[String],
        on_progress: Option<&ProgressCallback>,
    ) -> Result<(DownloadReport, bool)> {
        let downloader = Downloader::new(
            self.remotes.crowdin,
            self.project,
            &self.mapper,
            self.repo.git_root(),
            self.options,
            self.cancel,
        );
        let report = downloader
            .download(&self.gate, refresh, on_progress)
            .await?;

        let mut paths = Vec::new();
        for written in &report.written {
            paths.push(written.clone());
            let companion = companion_path(Path::new(written));
            if let Some(companion) = companion.to_str() {
                paths.push(companion.to_string());
            }
        }
        let committed = commit_translations(self.vcs, &paths).await?;
        if committed {
            tracing::info!(files = report.written.len(), "Committed translations");
        }
        Ok((report, committed))
    }

    /// Create, refresh or close tracking issues and place them on the board.
    pub async fn sync_issues(
        &self,
        metadata: &MetadataSnapshot,
        sources: &[String],
        on_progress: Option<&ProgressCallback>,
    ) -> Result<IssueSyncReport> {
        let store = StateStore::new(self.state_dir, self.repo.origin());
        let mut tracker = IssueTracker::new(
            self.remotes.github,
            &store,
            self.repo.origin(),
            self.repo.branch(),
            self.repo.project_folder(),
        );
        let mut board = board_for(self.backend, self.remotes.github, self.repo);
        let mut report = IssueSyncReport::default();

        let roots = self
            .mapper
            .root_folders(sources.iter().map(String::as_str));
        for folder in &roots {
            self.ensure_running()?;
            let Some(prefix) = self.mapper.to_remote(folder) else {
                continue;
            };
            let Some(progress) = folder_metadata(metadata, &prefix) else {
                continue;
            };
            let body = render_issue_body(
                self.project.project_name(),
                self.project.source_language(),
                self.project.target_language(),
                &prefix,
                metadata,
            );
            let issue = tracker.sync_issue(folder, &body, on_progress).await?;
            if place_issue(
                board.as_mut(),
                folder,
                &issue,
                target_column(Some(&progress)),
                on_progress,
            )
            .await?
            {
                report.moved += 1;
            }
            report.tracked.push((folder.clone(), issue.number));
        }

        let known = tracker.issues()?;
        for (folder, number) in &known {
            if roots.contains(folder) {
                continue;
            }
            let gone = self
                .mapper
                .to_remote(folder)
                .is_none_or(|prefix| folder_metadata(metadata, &prefix).is_none());
            if gone && tracker.close_issue(folder, *number, on_progress).await? {
                report.closed.push(*number);
            }
        }

        let tracked_numbers: BTreeSet<u64> = known.values().copied().collect();
        for issue in tracker.human_issues().await? {
            if tracked_numbers.contains(&issue.number) {
                continue;
            }
            let Some(folder) = folder_from_title(self.repo.branch(), &issue.title) else {
                continue;
            };
            let progress = self
                .mapper
                .to_remote(folder)
                .and_then(|prefix| folder_metadata(metadata, &prefix));
            if place_issue(
                board.as_mut(),
                folder,
                &issue,
                target_column(progress.as_ref()),
                on_progress,
            )
            .await?
            {
                report.moved += 1;
            }
        }
        Ok(report)
    }

    /// Detect renames and orphans; delete stale entries if the project allows.
    pub async fn orphans(
        &self,
        metadata: &MetadataSnapshot,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<(OrphanReport, usize)> {
        let root = self.root();
        let report = detect_orphans(metadata, &self.mapper, |local| root.join(local).is_file());
        let deleted =
            apply_orphans(self.remotes.crowdin, self.project, &report, on_progress).await?;
        Ok((report, deleted))
    }

    /// Save the project's TM and glossary into the state directory.
    ///
    /// An export CrowdIn refuses is logged and skipped.
    pub async fn save_references(&self) -> Result<Vec<PathBuf>> {
        let references = [
            (ReferenceKind::TranslationMemory, self.project.translation_memory()),
            (ReferenceKind::Glossary, self.project.glossary()),
        ];
        let mut saved = Vec::new();
        for (kind, id) in references {
            let Some(id) = id else {
                continue;
            };
            self.ensure_running()?;
            let bytes = match self
                .remotes
                .crowdin
                .download_reference(
                    kind,
                    id,
                    self.project.source_language(),
                    self.project.target_language(),
                    self.options.build_poll(),
                    self.cancel,
                )
                .await
            {
                Ok(bytes) => bytes,
                Err(RemoteError::Cancelled) => return Err(RemoteError::Cancelled.into()),
                Err(err) => {
                    tracing::warn!(kind = kind.format(), id, "Export failed: {}", err);
                    continue;
                }
            };
            let path = self.state_dir.join(format!(
                "{}.{}",
                self.project.project_name(),
                kind.format()
            ));
            std::fs::write(&path, &bytes).map_err(SyncError::io(path.clone()))?;
            tracing::info!(path = %path.display(), bytes = bytes.len(), "Saved {}", kind.format());
            saved.push(path);
        }
        Ok(saved)
    }

    /// One full reconciliation cycle.
    pub async fn run_cycle(
        &self,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<CycleReport> {
        let repository = self.repo.name().to_string();
        tracing::info!(repository = %repository, branch = %self.repo.branch(), "Starting cycle");
        emit(
            on_progress,
            SyncProgress::CycleStarted {
                repository: repository.clone(),
                branch: self.repo.branch().to_string(),
            },
        );

        self.vcs.checkout(self.repo.branch()).await?;
        let scan = self.scan(on_progress).await?;

        self.ensure_running()?;
        let upload = self.upload(&scan.changed, on_progress).await?;

        self.ensure_running()?;
        let remote = self.remote_paths(&scan.all);
        let pretranslate = self
            .translate(
                &scan.all,
                with_pending(&upload.after, remote.iter().map(String::as_str)),
                on_progress,
            )
            .await?;
        let metadata = with_pending(&pretranslate.metadata, remote.iter().map(String::as_str));

        self.ensure_running()?;
        let refresh = self.refresh_list(&scan.all, &metadata, &upload.uploaded);
        let (download, committed) = self.download(&refresh, on_progress).await?;

        self.ensure_running()?;
        let issues = self.sync_issues(&metadata, &scan.all, on_progress).await?;

        self.ensure_running()?;
        let (orphans, deleted) = self.orphans(&metadata, on_progress).await?;

        self.ensure_running()?;
        let references = self.save_references().await?;

        tracing::info!(repository = %repository, "Cycle complete");
        emit(on_progress, SyncProgress::CycleComplete { repository });
        Ok(CycleReport {
            scan,
            upload,
            pretranslate,
            download,
            committed,
            issues,
            orphans,
            deleted,
            references,
        })
    }
}
