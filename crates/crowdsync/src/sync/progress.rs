//! Progress events emitted while a reconciliation cycle runs.
//!
//! The library never prints; front ends subscribe through a
//! [`ProgressCallback`] and decide how to render each event.

/// Progress events emitted during reconciliation.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// Checking that a configured GitHub repository is reachable.
    CheckingAccess {
        /// `owner/name` of the repository.
        origin: String,
    },

    /// A configured repository failed the accessibility check.
    AccessDenied { origin: String },

    /// Starting a reconciliation cycle for one repository.
    CycleStarted {
        /// Configured repository name.
        repository: String,
        /// Tracked branch.
        branch: String,
    },

    /// Working tree scanned.
    FilesScanned {
        repository: String,
        /// Files changed since the last cycle.
        changed: usize,
        /// All eligible files.
        total: usize,
    },

    /// A source file was pushed to the translation platform.
    FileUploaded {
        /// Local path relative to the git root.
        path: String,
        /// Whether a new remote entry was created (vs. updated in place).
        created: bool,
    },

    /// A file was skipped because it is in the ignore registry.
    FileIgnored { path: String },

    /// Upload stage finished.
    UploadComplete {
        uploaded: usize,
        ignored: usize,
    },

    /// Pre-translation job submitted.
    PreTranslationSubmitted {
        /// Engine label (`tm`, `deepl`, ...).
        engine: String,
        /// Job identifier reported by the platform.
        identifier: String,
        files: usize,
    },

    /// Pre-translation job poll result.
    PreTranslationProgress {
        identifier: String,
        /// Percentage reported by the platform.
        progress: u32,
    },

    /// One engine round finished.
    PreTranslationComplete {
        engine: String,
        /// Files still below full coverage after this round.
        remaining: usize,
    },

    /// Phrase visibility was adjusted for code-like strings.
    PhraseVisibilityChanged {
        file_id: u64,
        hidden: usize,
        shown: usize,
    },

    /// Waiting for the export cooldown to elapse.
    ExportGateWait {
        /// Time to wait (ms).
        wait_ms: u64,
    },

    /// Translation build requested.
    BuildRequested { build_id: u64 },

    /// Translation build poll result.
    BuildProgress { build_id: u64, progress: u32 },

    /// Translated files written to the working tree.
    TranslationsExtracted { written: usize },

    /// Tracking issue created for a root folder.
    IssueCreated { folder: String, number: u64 },

    /// Tracking issue reopened or its body refreshed.
    IssueReopened { folder: String, number: u64 },

    /// Tracking issue closed because its folder disappeared.
    IssueClosed { folder: String, number: u64 },

    /// Board item moved to a new column.
    CardMoved {
        folder: String,
        issue: u64,
        column: String,
    },

    /// A remote entry looks renamed.
    RenameDetected { from: String, to: String },

    /// A remote entry has no local counterpart and no rename candidate.
    OrphanDetected { path: String },

    /// Several rename candidates exist; left for manual review.
    AmbiguousRename {
        path: String,
        candidates: Vec<String>,
    },

    /// Remote file removed (only with deletion enabled).
    RemoteFileDeleted { path: String },

    /// Help-center article written to the working tree.
    ArticleWritten { id: u64, path: String },

    /// Help-center translation published.
    ArticlePublished { id: u64, locale: String },

    /// Quota exhausted; sleeping until reset.
    RateLimitWait {
        /// Remote service name.
        service: String,
        /// Time to wait (ms).
        wait_ms: u64,
    },

    /// Transient failure, backing off before retry.
    RateLimitBackoff {
        /// Operation being retried.
        operation: String,
        /// Time to wait before retry (ms).
        retry_after_ms: u64,
        /// Current attempt number.
        attempt: u32,
    },

    /// Warning message (non-fatal).
    Warning { message: String },

    /// Cycle finished for one repository.
    CycleComplete { repository: String },
}

/// Callback for progress updates during reconciliation.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
///
/// ```ignore
/// emit(on_progress, SyncProgress::UploadComplete { uploaded: 2, ignored: 0 });
/// ```
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
