use crowdsync::sync::SyncProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::CheckingAccess { origin } => {
                tracing::debug!(origin = %origin, "Checking repository access");
            }

            SyncProgress::AccessDenied { origin } => {
                tracing::error!(origin = %origin, "Repository is not accessible");
            }

            SyncProgress::CycleStarted { repository, branch } => {
                tracing::info!(repository = %repository, branch = %branch, "Cycle started");
            }

            SyncProgress::FilesScanned {
                repository,
                changed,
                total,
            } => {
                tracing::info!(repository = %repository, changed, total, "Scanned files");
            }

            SyncProgress::FileUploaded { path, created } => {
                if created {
                    tracing::info!(path = %path, "Created remote file");
                } else {
                    tracing::info!(path = %path, "Updated remote file");
                }
            }

            SyncProgress::FileIgnored { path } => {
                tracing::debug!(path = %path, "Ignored");
            }

            SyncProgress::UploadComplete { uploaded, ignored } => {
                tracing::info!(uploaded, ignored, "Upload complete");
            }

            SyncProgress::PreTranslationSubmitted {
                engine,
                identifier,
                files,
            } => {
                tracing::info!(engine = %engine, identifier = %identifier, files, "Pre-translation submitted");
            }

            SyncProgress::PreTranslationProgress {
                identifier,
                progress,
            } => {
                tracing::debug!(identifier = %identifier, progress, "Pre-translation progress");
            }

            SyncProgress::PreTranslationComplete { engine, remaining } => {
                tracing::info!(engine = %engine, remaining, "Pre-translation round complete");
            }

            SyncProgress::PhraseVisibilityChanged {
                file_id,
                hidden,
                shown,
            } => {
                tracing::info!(file_id, hidden, shown, "Changed phrase visibility");
            }

            SyncProgress::ExportGateWait { wait_ms } => {
                tracing::info!(wait_ms, "Waiting for export cooldown");
            }

            SyncProgress::BuildRequested { build_id } => {
                tracing::info!(build_id, "Build requested");
            }

            SyncProgress::BuildProgress { build_id, progress } => {
                tracing::debug!(build_id, progress, "Build progress");
            }

            SyncProgress::TranslationsExtracted { written } => {
                tracing::info!(written, "Extracted translations");
            }

            SyncProgress::IssueCreated { folder, number } => {
                tracing::info!(folder = %folder, number, "Created tracking issue");
            }

            SyncProgress::IssueReopened { folder, number } => {
                tracing::info!(folder = %folder, number, "Reopened tracking issue");
            }

            SyncProgress::IssueClosed { folder, number } => {
                tracing::info!(folder = %folder, number, "Closed tracking issue");
            }

            SyncProgress::CardMoved {
                folder,
                issue,
                column,
            } => {
                tracing::info!(folder = %folder, issue, column = %column, "Moved card");
            }

            SyncProgress::RenameDetected { from, to } => {
                tracing::info!(from = %from, to = %to, "Rename detected");
            }

            SyncProgress::OrphanDetected { path } => {
                tracing::warn!(path = %path, "Orphaned remote file");
            }

            SyncProgress::AmbiguousRename { path, candidates } => {
                tracing::warn!(path = %path, candidates = ?candidates, "Ambiguous rename, left for review");
            }

            SyncProgress::RemoteFileDeleted { path } => {
                tracing::info!(path = %path, "Deleted remote file");
            }

            SyncProgress::ArticleWritten { id, path } => {
                tracing::info!(id, path = %path, "Mirrored article");
            }

            SyncProgress::ArticlePublished { id, locale } => {
                tracing::info!(id, locale = %locale, "Published translation");
            }

            SyncProgress::RateLimitWait { service, wait_ms } => {
                tracing::warn!(service = %service, wait_ms, "Quota exhausted, waiting for reset");
            }

            SyncProgress::RateLimitBackoff {
                operation,
                retry_after_ms,
                attempt,
            } => {
                tracing::warn!(
                    operation = %operation,
                    retry_after_ms,
                    attempt,
                    "Rate limited, backing off"
                );
            }

            SyncProgress::Warning { message } => {
                tracing::warn!(message = %message, "Warning");
            }

            SyncProgress::CycleComplete { repository } => {
                tracing::info!(repository = %repository, "Cycle complete");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
