use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crowdsync::sync::SyncProgress;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Consolidated progress state to avoid multiple mutex locks.
#[derive(Default)]
struct ProgressState {
    /// Repository whose cycle is running; used as the bar prefix.
    repository: String,
    /// Spinner describing the current stage.
    stage: Option<ProgressBar>,
    /// Percentage bars for platform jobs, keyed by job id.
    jobs: HashMap<String, ProgressBar>,
    uploaded: u64,
}

/// Interactive progress reporter using indicatif.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    /// Reporter that draws nothing.
    #[cfg(test)]
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden()),
            state: Mutex::new(ProgressState::default()),
        }
    }

    fn stage<'a>(&self, state: &'a mut ProgressState) -> &'a ProgressBar {
        let prefix = state.repository.clone();
        state.stage.get_or_insert_with(|| {
            let bar = self.multi.add(ProgressBar::new_spinner());
            bar.set_style(Self::spinner_style());
            bar.set_prefix(prefix);
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        })
    }

    fn job(&self, state: &mut ProgressState, key: String, label: String) {
        let bar = self.multi.add(ProgressBar::new(100));
        bar.set_style(Self::bar_style());
        bar.set_prefix(state.repository.clone());
        bar.set_message(label);
        if let Some(old) = state.jobs.insert(key, bar) {
            old.finish_and_clear();
        }
    }

    fn finish_job(state: &mut ProgressState, key: &str) {
        if let Some(bar) = state.jobs.remove(key) {
            bar.set_position(100);
            bar.finish();
        }
    }

    fn println(&self, line: String) {
        if self.multi.println(line).is_err() {
            tracing::debug!("Progress output unavailable");
        }
    }

    pub fn handle(&self, event: SyncProgress) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        match event {
            SyncProgress::CheckingAccess { origin } => {
                self.stage(&mut state)
                    .set_message(format!("Checking access to {origin}"));
            }

            SyncProgress::AccessDenied { origin } => {
                self.println(format!("  ✗ {origin} is not accessible"));
            }

            SyncProgress::CycleStarted { repository, branch } => {
                state.repository = repository.clone();
                state.uploaded = 0;
                let stage = self.stage(&mut state);
                stage.set_prefix(repository);
                stage.set_message(format!("Scanning {branch}"));
            }

            SyncProgress::FilesScanned { changed, total, .. } => {
                self.stage(&mut state)
                    .set_message(format!("{changed} changed of {total} files"));
            }

            SyncProgress::FileUploaded { path, created } => {
                state.uploaded += 1;
                let verb = if created { "Created" } else { "Updated" };
                let uploaded = state.uploaded;
                self.stage(&mut state)
                    .set_message(format!("Uploading ({uploaded}) {verb} {path}"));
            }

            SyncProgress::FileIgnored { .. } => {}

            SyncProgress::UploadComplete { uploaded, ignored } => {
                self.stage(&mut state)
                    .set_message(format!("Uploaded {uploaded}, ignored {ignored}"));
            }

            SyncProgress::PreTranslationSubmitted {
                engine,
                identifier,
                files,
            } => {
                self.job(
                    &mut state,
                    identifier,
                    format!("Pre-translating {files} files with {engine}"),
                );
            }

            SyncProgress::PreTranslationProgress {
                identifier,
                progress,
            } => {
                if let Some(bar) = state.jobs.get(&identifier) {
                    bar.set_position(u64::from(progress.min(100)));
                }
            }

            SyncProgress::PreTranslationComplete { engine, remaining } => {
                let keys: Vec<String> = state
                    .jobs
                    .keys()
                    .filter(|k| !k.starts_with("build:"))
                    .cloned()
                    .collect();
                for key in keys {
                    Self::finish_job(&mut state, &key);
                }
                self.stage(&mut state)
                    .set_message(format!("{engine} done, {remaining} files behind"));
            }

            SyncProgress::PhraseVisibilityChanged { hidden, shown, .. } => {
                self.stage(&mut state)
                    .set_message(format!("Hid {hidden} and restored {shown} phrases"));
            }

            SyncProgress::ExportGateWait { wait_ms } => {
                self.stage(&mut state)
                    .set_message(format!("Waiting {}s for export cooldown", wait_ms / 1000));
            }

            SyncProgress::BuildRequested { build_id } => {
                self.job(
                    &mut state,
                    format!("build:{build_id}"),
                    format!("Building translations #{build_id}"),
                );
            }

            SyncProgress::BuildProgress { build_id, progress } => {
                let key = format!("build:{build_id}");
                if progress >= 100 {
                    Self::finish_job(&mut state, &key);
                } else if let Some(bar) = state.jobs.get(&key) {
                    bar.set_position(u64::from(progress));
                }
            }

            SyncProgress::TranslationsExtracted { written } => {
                self.stage(&mut state)
                    .set_message(format!("Wrote {written} translated files"));
            }

            SyncProgress::IssueCreated { folder, number } => {
                self.println(format!("  + #{number} {folder}"));
            }

            SyncProgress::IssueReopened { folder, number } => {
                self.stage(&mut state)
                    .set_message(format!("Refreshed #{number} {folder}"));
            }

            SyncProgress::IssueClosed { folder, number } => {
                self.println(format!("  - #{number} {folder}"));
            }

            SyncProgress::CardMoved {
                issue, column, ..
            } => {
                self.stage(&mut state)
                    .set_message(format!("Moved #{issue} to {column}"));
            }

            SyncProgress::RenameDetected { from, to } => {
                self.println(format!("  ~ {from} -> {to}"));
            }

            SyncProgress::OrphanDetected { path } => {
                self.println(format!("  ? {path} has no local source"));
            }

            SyncProgress::AmbiguousRename { path, candidates } => {
                self.println(format!("  ? {path} could be {}", candidates.join(", ")));
            }

            SyncProgress::RemoteFileDeleted { path } => {
                self.println(format!("  - {path}"));
            }

            SyncProgress::ArticleWritten { path, .. } => {
                self.stage(&mut state).set_message(format!("Wrote {path}"));
            }

            SyncProgress::ArticlePublished { id, locale } => {
                self.stage(&mut state)
                    .set_message(format!("Published article {id} ({locale})"));
            }

            SyncProgress::RateLimitWait { service, wait_ms } => {
                self.stage(&mut state).set_message(format!(
                    "{service} quota exhausted, waiting {}s",
                    wait_ms / 1000
                ));
            }

            SyncProgress::RateLimitBackoff {
                operation,
                retry_after_ms,
                attempt,
            } => {
                self.stage(&mut state).set_message(format!(
                    "Retrying {operation} in {retry_after_ms}ms (attempt {attempt})"
                ));
            }

            SyncProgress::Warning { message } => {
                self.println(format!("  ⚠ {message}"));
            }

            SyncProgress::CycleComplete { repository } => {
                if let Some(stage) = state.stage.take() {
                    stage.finish_with_message(format!("{repository} reconciled"));
                }
                let keys: Vec<String> = state.jobs.keys().cloned().collect();
                for key in keys {
                    Self::finish_job(&mut state, &key);
                }
            }

            _ => {}
        }
    }

    pub fn finish(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(stage) = state.stage.take()
            && !stage.is_finished()
        {
            stage.finish();
        }
        for (_, bar) in state.jobs.drain() {
            if !bar.is_finished() {
                bar.finish();
            }
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}
