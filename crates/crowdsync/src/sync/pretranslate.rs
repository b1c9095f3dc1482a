//! Pre-translation dispatcher.
//!
//! Engines run in configured order, cheapest first. After each round the
//! metadata is fetched again and only files still below full coverage move
//! on, so machine-translation quota is not spent on strings translation
//! memory already filled.

use tokio_util::sync::CancellationToken;

use crate::crowdin::{CrowdinClient, CrowdinSession, PreTranslationRequest, classify_phrases};
use crate::descriptor::TranslationProjectDescriptor;
use crate::metadata::MetadataSnapshot;
use crate::remote::RemoteError;

use super::error::Result;
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::SyncOptions;

/// One engine pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRound {
    pub engine: String,
    pub identifier: String,
    pub files: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreTranslateReport {
    pub rounds: Vec<EngineRound>,
    /// Remote paths still below full coverage after the last engine.
    pub remaining: Vec<String>,
    /// Metadata as of the end of dispatch.
    pub metadata: MetadataSnapshot,
}

/// Remote paths among `paths` that are uploaded but not fully translated.
pub fn behind<'a>(metadata: &MetadataSnapshot, paths: &'a [String]) -> Vec<&'a String> {
    paths
        .iter()
        .filter(|p| {
            metadata
                .get(p.as_str())
                .is_some_and(|m| m.is_uploaded() && !m.is_fully_translated())
        })
        .collect()
}

/// Hide code-like phrases of a file and show the rest.
///
/// Only phrases whose visibility differs from the wanted state are touched.
/// Returns `(hidden, shown)` counts.
pub async fn apply_phrase_visibility(
    session: &CrowdinSession,
    file_id: u64,
    rst: bool,
) -> std::result::Result<(usize, usize), RemoteError> {
    let html = session.phrases_html(file_id).await?;
    let current = session.phrase_visibility(file_id).await?;
    let (mut hidden, mut shown) = (0, 0);
    for phrase in classify_phrases(&html, rst) {
        let is_hidden = current
            .get(&phrase.translation_id)
            .copied()
            .unwrap_or(false);
        if phrase.hide == is_hidden {
            continue;
        }
        session
            .set_phrase_hidden(&phrase.translation_id, phrase.hide)
            .await?;
        if phrase.hide {
            hidden += 1;
        } else {
            shown += 1;
        }
    }
    Ok((hidden, shown))
}

pub struct PreTranslator<'a> {
    crowdin: &'a CrowdinClient,
    session: Option<&'a CrowdinSession>,
    project: &'a TranslationProjectDescriptor,
    options: &'a SyncOptions,
    cancel: &'a CancellationToken,
}

impl<'a> PreTranslator<'a> {
    pub fn new(
        crowdin: &'a CrowdinClient,
        project: &'a TranslationProjectDescriptor,
        options: &'a SyncOptions,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            crowdin,
            session: None,
            project,
            options,
            cancel,
        }
    }

    /// Use a web session to hide code-like phrases before dispatch.
    #[must_use]
    pub fn with_session(mut self, session: Option<&'a CrowdinSession>) -> Self {
        self.session = session;
        self
    }

    async fn hide_code_strings(
        &self,
        metadata: &MetadataSnapshot,
        paths: &[&String],
        on_progress: Option<&ProgressCallback>,
    ) -> Result<()> {
        let Some(session) = self.session.filter(|_| self.options.hide_code_strings) else {
            return Ok(());
        };
        for path in paths {
            let Some(file_id) = metadata.get(path.as_str()).and_then(|m| m.id()) else {
                continue;
            };
            let rst = path.to_ascii_lowercase().ends_with(".rst");
            let (hidden, shown) = apply_phrase_visibility(session, file_id, rst).await?;
            if hidden + shown > 0 {
                tracing::info!(path = %path, hidden, shown, "Adjusted phrase visibility");
                emit(
                    on_progress,
                    SyncProgress::PhraseVisibilityChanged {
                        file_id,
                        hidden,
                        shown,
                    },
                );
            }
        }
        Ok(())
    }

    /// Pre-translate the files among `remote_paths` that are behind.
    pub async fn dispatch(
        &self,
        remote_paths: &[String],
        metadata: MetadataSnapshot,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<PreTranslateReport> {
        let mut report = PreTranslateReport {
            metadata,
            ..PreTranslateReport::default()
        };
        let mut pending = behind(&report.metadata, remote_paths);
        if pending.is_empty() {
            return Ok(report);
        }

        self.hide_code_strings(&report.metadata, &pending, on_progress)
            .await?;

        let project_id = self.project.project_id();
        let language = self.project.target_language();
        for engine in &self.options.engines {
            if pending.is_empty() {
                break;
            }
            if self.cancel.is_cancelled() {
                return Err(RemoteError::Cancelled.into());
            }

            let file_ids: Vec<u64> = pending
                .iter()
                .filter_map(|p| report.metadata.get(p.as_str()).and_then(|m| m.id()))
                .collect();
            let request = PreTranslationRequest {
                language_id: language.to_string(),
                file_ids,
                method: engine.method(),
                engine_id: engine.engine_id(),
            };
            let job = self.crowdin.pre_translate(project_id, &request).await?;
            tracing::info!(
                engine = engine.label(),
                identifier = %job.identifier,
                files = request.file_ids.len(),
                "Submitted pre-translation"
            );
            emit(
                on_progress,
                SyncProgress::PreTranslationSubmitted {
                    engine: engine.label().to_string(),
                    identifier: job.identifier.clone(),
                    files: request.file_ids.len(),
                },
            );
            self.crowdin
                .wait_for_pre_translation(
                    project_id,
                    &job.identifier,
                    self.options.pretranslate_poll(),
                    self.cancel,
                    on_progress,
                )
                .await?;
            report.rounds.push(EngineRound {
                engine: engine.label().to_string(),
                identifier: job.identifier,
                files: request.file_ids.len(),
            });

            report.metadata = self
                .crowdin
                .project_metadata(project_id, language, self.project.dest_folder())
                .await?;
            pending = behind(&report.metadata, remote_paths);
            emit(
                on_progress,
                SyncProgress::PreTranslationComplete {
                    engine: engine.label().to_string(),
                    remaining: pending.len(),
                },
            );
        }

        report.remaining = pending.into_iter().cloned().collect();
        Ok(report)
    }
}
