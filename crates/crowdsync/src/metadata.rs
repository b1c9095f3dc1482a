//! Per-file translation progress and the board column it implies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::descriptor::is_within;

/// Progress counts for one remote file.
///
/// Always satisfies `approved <= translated <= phrases`; out-of-range counts
/// reported by the platform are clamped on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawMetadata")]
pub struct FileMetadata {
    phrases: u64,
    translated: u64,
    approved: u64,
    id: Option<u64>,
}

#[derive(Deserialize)]
struct RawMetadata {
    phrases: u64,
    translated: u64,
    approved: u64,
    id: Option<u64>,
}

impl From<RawMetadata> for FileMetadata {
    fn from(raw: RawMetadata) -> Self {
        Self::new(raw.phrases, raw.translated, raw.approved, raw.id)
    }
}

impl FileMetadata {
    pub fn new(phrases: u64, translated: u64, approved: u64, id: Option<u64>) -> Self {
        let translated = translated.min(phrases);
        let approved = approved.min(translated);
        Self {
            phrases,
            translated,
            approved,
            id,
        }
    }

    /// A file that exists locally but has not been ingested by the platform.
    pub fn pending() -> Self {
        Self::new(0, 0, 0, None)
    }

    pub fn phrases(&self) -> u64 {
        self.phrases
    }

    pub fn translated(&self) -> u64 {
        self.translated
    }

    pub fn approved(&self) -> u64 {
        self.approved
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn is_uploaded(&self) -> bool {
        self.id.is_some()
    }

    pub fn is_fully_translated(&self) -> bool {
        self.translated == self.phrases
    }

    pub fn is_fully_approved(&self) -> bool {
        self.approved == self.phrases
    }

    /// Whole-percent translation coverage; an empty file counts as complete.
    pub fn translated_percent(&self) -> u64 {
        percent(self.translated, self.phrases)
    }

    /// Whole-percent approval coverage; an empty file counts as complete.
    pub fn approved_percent(&self) -> u64 {
        percent(self.approved, self.phrases)
    }

    /// Sum of several entries, or `None` when there are none.
    pub fn sum<'a, I>(entries: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a FileMetadata>,
    {
        entries.into_iter().fold(None, |acc, m| {
            let (p, t, a) = acc.map_or((0, 0, 0), |s: FileMetadata| {
                (s.phrases, s.translated, s.approved)
            });
            Some(Self::new(
                p + m.phrases,
                t + m.translated,
                a + m.approved,
                None,
            ))
        })
    }
}

fn percent(part: u64, whole: u64) -> u64 {
    if whole == 0 { 100 } else { part * 100 / whole }
}

/// Metadata keyed by remote path.
pub type MetadataSnapshot = BTreeMap<String, FileMetadata>;

/// Aggregate metadata for every uploaded entry under `remote_folder`.
///
/// Pending entries carry no counts and are left out, so a folder with
/// nothing uploaded yet has no metadata.
pub fn folder_metadata(snapshot: &MetadataSnapshot, remote_folder: &str) -> Option<FileMetadata> {
    FileMetadata::sum(
        snapshot
            .iter()
            .filter(|(path, m)| m.is_uploaded() && is_within(path, remote_folder))
            .map(|(_, m)| m),
    )
}

/// Add a pending entry for every remote path the platform does not know yet.
pub fn with_pending<'a, I>(snapshot: &MetadataSnapshot, remote_paths: I) -> MetadataSnapshot
where
    I: IntoIterator<Item = &'a str>,
{
    let mut merged = snapshot.clone();
    for path in remote_paths {
        merged
            .entry(path.to_string())
            .or_insert_with(FileMetadata::pending);
    }
    merged
}

/// Project board columns, in board order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BoardColumn {
    SelectedForTranslation,
    TranslationStarted,
    ReadyForProofreading,
    ProofreadingStarted,
    MergeRequestSent,
    MergeCompleted,
}

impl BoardColumn {
    pub const ALL: [BoardColumn; 6] = [
        BoardColumn::SelectedForTranslation,
        BoardColumn::TranslationStarted,
        BoardColumn::ReadyForProofreading,
        BoardColumn::ProofreadingStarted,
        BoardColumn::MergeRequestSent,
        BoardColumn::MergeCompleted,
    ];

    pub fn title(self) -> &'static str {
        match self {
            BoardColumn::SelectedForTranslation => "Selected for translation",
            BoardColumn::TranslationStarted => "Translation started",
            BoardColumn::ReadyForProofreading => "Ready for proofreading",
            BoardColumn::ProofreadingStarted => "Proofreading started",
            BoardColumn::MergeRequestSent => "Merge request sent",
            BoardColumn::MergeCompleted => "Merge completed",
        }
    }

    pub fn from_title(title: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.title() == title)
    }

    /// Position on the board, starting at 0.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Column implied by translation progress. Exactly one rule applies.
    pub fn for_progress(metadata: &FileMetadata) -> Self {
        if metadata.approved == metadata.phrases {
            BoardColumn::MergeRequestSent
        } else if metadata.approved > 0 {
            BoardColumn::ProofreadingStarted
        } else if metadata.translated == metadata.phrases {
            BoardColumn::ReadyForProofreading
        } else if metadata.translated > 0 {
            BoardColumn::TranslationStarted
        } else {
            BoardColumn::SelectedForTranslation
        }
    }
}

impl std::fmt::Display for BoardColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

/// Target column for a folder; absent metadata leaves the card untouched.
pub fn target_column(metadata: Option<&FileMetadata>) -> Option<BoardColumn> {
    metadata.map(BoardColumn::for_progress)
}
