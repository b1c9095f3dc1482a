//! Upload reconciler: pushes new and changed source files to CrowdIn.
//!
//! Markdown is unwrapped before upload so machine translation sees whole
//! paragraphs. Normalization happens on the uploaded bytes only; the working
//! tree is left as it is.

use std::collections::BTreeSet;
use std::path::Path;

use crate::crowdin::{CrowdinClient, CrowdinFile, DirectoryIndex};
use crate::descriptor::TranslationProjectDescriptor;
use crate::files::FileMapper;
use crate::metadata::{MetadataSnapshot, with_pending};

use super::error::{Result, SyncError};
use super::progress::{ProgressCallback, SyncProgress, emit};

/// Files that must never be uploaded, per repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreRegistry {
    entries: BTreeSet<(String, String)>,
}

impl IgnoreRegistry {
    pub fn new<I, R, F>(entries: I) -> Self
    where
        I: IntoIterator<Item = (R, F)>,
        R: Into<String>,
        F: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(repository, file)| (repository.into(), file.into()))
                .collect(),
        }
    }

    pub fn is_ignored(&self, repository: &str, path: &str) -> bool {
        self.entries
            .contains(&(repository.to_string(), path.to_string()))
    }
}

/// Before/after metadata of one upload pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub before: MetadataSnapshot,
    pub after: MetadataSnapshot,
    /// Local paths pushed to the platform.
    pub uploaded: Vec<String>,
    /// Local paths that had no remote entry before this pass.
    pub created: Vec<String>,
    pub ignored: Vec<String>,
}

fn is_markdown(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.ends_with(".md") || lower.ends_with(".markdown")
}

fn is_list_item(trimmed: &str) -> bool {
    if ["- ", "* ", "+ "].iter().any(|m| trimmed.starts_with(m)) {
        return true;
    }
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && (trimmed[digits..].starts_with(". ") || trimmed[digits..].starts_with(") "))
}

fn is_rule_or_underline(trimmed: &str) -> bool {
    let marks: Vec<char> = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    marks.len() >= 3
        && ['-', '=', '*', '_']
            .iter()
            .any(|m| marks.iter().all(|c| c == m))
}

/// Lines that never join a paragraph.
fn is_block_line(trimmed: &str) -> bool {
    trimmed.starts_with('#')
        || trimmed.starts_with('>')
        || trimmed.starts_with('|')
        || trimmed.starts_with('<')
        || trimmed.starts_with("[TOC")
        || (trimmed.starts_with('[') && trimmed.contains("]:"))
        || is_list_item(trimmed)
        || is_rule_or_underline(trimmed)
}

/// Join wrapped paragraph lines into one line each.
///
/// Front matter, fenced and indented code, headings, lists, tables, block
/// quotes and HTML blocks are copied unchanged. A line ending in two spaces
/// is a hard break and closes the paragraph.
pub fn normalize_markdown(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut in_paragraph = false;
    let mut in_front_matter = false;
    let mut in_html = false;
    let mut fence: Option<&'static str> = None;

    for (i, line) in text.lines().enumerate() {
        let trimmed = line.trim();

        if i == 0 && trimmed == "---" {
            in_front_matter = true;
            out.push(line.to_string());
            continue;
        }
        if in_front_matter {
            in_front_matter = trimmed != "---" && trimmed != "...";
            out.push(line.to_string());
            continue;
        }
        if let Some(marker) = fence {
            if trimmed.starts_with(marker) {
                fence = None;
            }
            out.push(line.to_string());
            continue;
        }
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            fence = Some(if trimmed.starts_with("```") { "```" } else { "~~~" });
            in_paragraph = false;
            out.push(line.to_string());
            continue;
        }

        // HTML blocks run until the next blank line.
        if in_html || (!in_paragraph && trimmed.starts_with('<')) {
            in_html = !trimmed.is_empty();
            in_paragraph = false;
            out.push(line.to_string());
            continue;
        }

        let indented = line.starts_with("    ") || line.starts_with('\t');
        if trimmed.is_empty() || is_block_line(trimmed) || (indented && !in_paragraph) {
            in_paragraph = false;
            out.push(line.to_string());
            continue;
        }

        let hard_break = line.ends_with("  ");
        let content = if hard_break {
            line.trim_start()
        } else {
            trimmed
        };
        match out.last_mut() {
            Some(last) if in_paragraph => {
                last.push(' ');
                last.push_str(content);
            }
            _ => out.push(if hard_break {
                line.to_string()
            } else {
                line.trim_end().to_string()
            }),
        }
        in_paragraph = !hard_break;
    }

    let mut normalized = out.join("\n");
    if text.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

/// Repair product-name placeholders mangled by earlier conversions.
///
/// `@<` and `@>` collapse to `@`, and `@ name @` becomes `@name@`.
pub fn fix_product_name_tokens(text: &str) -> String {
    let text = text.replace("@<", "@").replace("@>", "@");
    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(at) = rest.find("@ ") {
        out.push_str(&rest[..at]);
        let after = &rest[at + 2..];
        let token_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
            .unwrap_or(after.len());
        if token_len > 0 && after[token_len..].starts_with(" @") {
            out.push('@');
            out.push_str(&after[..token_len]);
            out.push('@');
            rest = &after[token_len + 2..];
        } else {
            out.push_str("@ ");
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

/// Bytes actually sent to the platform for `path`.
pub fn upload_content(path: &str, raw: Vec<u8>) -> Vec<u8> {
    if !is_markdown(path) {
        return raw;
    }
    match String::from_utf8(raw) {
        Ok(text) => fix_product_name_tokens(&normalize_markdown(&text)).into_bytes(),
        Err(e) => e.into_bytes(),
    }
}

fn split_remote(remote_path: &str) -> (&str, &str) {
    remote_path.rsplit_once('/').unwrap_or(("", remote_path))
}

/// Pushes source files and reports metadata before and after.
pub struct Uploader<'a> {
    crowdin: &'a CrowdinClient,
    project: &'a TranslationProjectDescriptor,
    mapper: &'a FileMapper,
    root: &'a Path,
    ignore: &'a IgnoreRegistry,
    /// Key used for ignore lookups (upstream origin when there is one).
    ignore_key: &'a str,
}

impl<'a> Uploader<'a> {
    pub fn new(
        crowdin: &'a CrowdinClient,
        project: &'a TranslationProjectDescriptor,
        mapper: &'a FileMapper,
        root: &'a Path,
        ignore: &'a IgnoreRegistry,
        ignore_key: &'a str,
    ) -> Self {
        Self {
            crowdin,
            project,
            mapper,
            root,
            ignore,
            ignore_key,
        }
    }

    async fn metadata(&self) -> Result<MetadataSnapshot> {
        Ok(self
            .crowdin
            .project_metadata(
                self.project.project_id(),
                self.project.target_language(),
                self.project.dest_folder(),
            )
            .await?)
    }

    /// Upload `files` (local source paths), creating remote directories and
    /// entries as needed.
    ///
    /// An entry with the same name in the same remote directory is updated
    /// in place, so repeating a pass never duplicates remote files.
    pub async fn upload(
        &self,
        files: &[String],
        on_progress: Option<&ProgressCallback>,
    ) -> Result<UploadReport> {
        let before = self.metadata().await?;
        let mut report = UploadReport {
            before: before.clone(),
            ..UploadReport::default()
        };

        let mut candidates = Vec::new();
        for path in self.mapper.eligible_sources(files.iter().map(String::as_str)) {
            if self.ignore.is_ignored(self.ignore_key, &path) {
                tracing::info!(path = %path, "Skipping ignored file");
                emit(on_progress, SyncProgress::FileIgnored { path: path.clone() });
                report.ignored.push(path);
            } else if self.root.join(&path).is_file() {
                candidates.push(path);
            }
        }

        if candidates.is_empty() {
            report.after = before;
            emit(
                on_progress,
                SyncProgress::UploadComplete {
                    uploaded: 0,
                    ignored: report.ignored.len(),
                },
            );
            return Ok(report);
        }

        let project_id = self.project.project_id();
        let mut remote_files: Vec<CrowdinFile> = self.crowdin.list_files(project_id).await?;
        let mut directories =
            DirectoryIndex::new(&self.crowdin.list_directories(project_id).await?);

        for path in candidates {
            let Some(remote_path) = self.mapper.to_remote(&path) else {
                continue;
            };
            let (directory, name) = split_remote(&remote_path);
            let directory_id = self
                .crowdin
                .ensure_directory(project_id, &mut directories, directory)
                .await?;

            let absolute = self.root.join(&path);
            let raw = tokio::fs::read(&absolute)
                .await
                .map_err(SyncError::io(absolute))?;
            let storage = self
                .crowdin
                .add_storage(name, upload_content(&path, raw))
                .await?;

            let existing = remote_files
                .iter()
                .find(|f| f.directory_id == directory_id && f.name == name)
                .map(|f| f.id);
            let created = match existing {
                Some(file_id) => {
                    tracing::info!(path = %path, file_id, "Updating CrowdIn file");
                    self.crowdin
                        .update_file(project_id, file_id, storage.id)
                        .await?;
                    false
                }
                None => {
                    let pattern = self
                        .mapper
                        .export_pattern(&path)
                        .unwrap_or_else(|| format!("/{path}"));
                    tracing::info!(path = %path, "Creating CrowdIn file");
                    let file = self
                        .crowdin
                        .create_file(project_id, storage.id, name, directory_id, &pattern)
                        .await?;
                    remote_files.push(file);
                    report.created.push(path.clone());
                    true
                }
            };
            emit(
                on_progress,
                SyncProgress::FileUploaded {
                    path: path.clone(),
                    created,
                },
            );
            report.uploaded.push(path);
        }

        let after = self.metadata().await?;
        let pending: Vec<String> = report
            .uploaded
            .iter()
            .filter_map(|p| self.mapper.to_remote(p))
            .collect();
        report.after = with_pending(&after, pending.iter().map(String::as_str));

        emit(
            on_progress,
            SyncProgress::UploadComplete {
                uploaded: report.uploaded.len(),
                ignored: report.ignored.len(),
            },
        );
        Ok(report)
    }
}
