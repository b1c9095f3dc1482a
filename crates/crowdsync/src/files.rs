//! Local path <-> remote path translation.
//!
//! Local source files live at `<project_folder>/<source_lang>/<rel>` and
//! their translations at `<project_folder>/<target_lang>/<rel>`. On the
//! translation platform both are the single entry `<dest_folder>/<rel>`.

use std::collections::BTreeSet;

use crate::descriptor::{RepositoryDescriptor, TranslationProjectDescriptor, is_within};

/// Extensions the translation platform accepts for this project.
pub const ELIGIBLE_EXTENSIONS: [&str; 4] = ["md", "markdown", "html", "rst"];

/// Placeholder the platform substitutes with the two-letter language code.
pub const LANGUAGE_PLACEHOLDER: &str = "%two_letters_code%";

fn join(base: &str, rest: &str) -> String {
    match (base.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{base}/{rest}"),
    }
}

/// Strip `folder/` from `path`; `folder` itself maps to the empty string.
fn strip_folder<'a>(path: &'a str, folder: &str) -> Option<&'a str> {
    if !is_within(path, folder) {
        return None;
    }
    if folder.is_empty() {
        return Some(path);
    }
    Some(path[folder.len()..].trim_start_matches('/'))
}

/// Replace the first language segment (`from/` prefix or `/from/` infix).
pub fn swap_language(path: &str, from: &str, to: &str) -> Option<String> {
    if path == from {
        return Some(to.to_string());
    }
    if let Some(rest) = path.strip_prefix(&format!("{from}/")) {
        return Some(format!("{to}/{rest}"));
    }
    let infix = format!("/{from}/");
    if path.contains(&infix) {
        return Some(path.replacen(&infix, &format!("/{to}/"), 1));
    }
    path.strip_suffix(&format!("/{from}"))
        .map(|head| format!("{head}/{to}"))
}

fn has_language_segment(path: &str, language: &str) -> bool {
    path.starts_with(&format!("{language}/")) || path.contains(&format!("/{language}/"))
}

fn has_eligible_extension(path: &str) -> bool {
    std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ELIGIBLE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Translates paths between the working tree and the translation platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMapper {
    project_folder: String,
    single_folder: Option<String>,
    source_language: String,
    target_language: String,
    dest_folder: String,
}

impl FileMapper {
    pub fn new(repo: &RepositoryDescriptor, project: &TranslationProjectDescriptor) -> Self {
        Self {
            project_folder: repo.project_folder().to_string(),
            single_folder: repo.single_folder().map(str::to_string),
            source_language: project.source_language().to_string(),
            target_language: project.target_language().to_string(),
            dest_folder: project.dest_folder().to_string(),
        }
    }

    pub fn source_language(&self) -> &str {
        &self.source_language
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    pub fn dest_folder(&self) -> &str {
        &self.dest_folder
    }

    /// `<project_folder>/<language>`.
    pub fn language_root(&self, language: &str) -> String {
        join(&self.project_folder, language)
    }

    /// The configured scope rendered for `language`.
    fn scope_for(&self, language: &str) -> String {
        let scope = self.single_folder.as_deref().unwrap_or(&self.project_folder);
        swap_language(scope, &self.source_language, language).unwrap_or_else(|| scope.to_string())
    }

    /// Remote path for a local source path, or `None` when out of scope.
    pub fn to_remote(&self, local_path: &str) -> Option<String> {
        let rel = strip_folder(local_path, &self.language_root(&self.source_language))?;
        Some(join(&self.dest_folder, rel))
    }

    /// Local source path for a remote path, or `None` when outside the
    /// destination folder.
    pub fn to_local(&self, remote_path: &str) -> Option<String> {
        let rel = strip_folder(remote_path, &self.dest_folder)?;
        Some(join(&self.language_root(&self.source_language), rel))
    }

    /// Whether `path` is a translatable file for `language` inside the scope.
    pub fn is_eligible(&self, path: &str, language: &str) -> bool {
        is_within(path, &self.scope_for(language))
            && is_within(path, &self.language_root(language))
            && has_language_segment(path, language)
            && has_eligible_extension(path)
    }

    /// Where the translation of a local source file lives.
    pub fn translation_path(&self, source_path: &str) -> Option<String> {
        let rel = strip_folder(source_path, &self.language_root(&self.source_language))?;
        Some(join(&self.language_root(&self.target_language), rel))
    }

    /// Inverse of [`FileMapper::translation_path`].
    pub fn source_path(&self, translation_path: &str) -> Option<String> {
        let rel = strip_folder(translation_path, &self.language_root(&self.target_language))?;
        Some(join(&self.language_root(&self.source_language), rel))
    }

    /// Export pattern the platform uses to place the translation in a build.
    pub fn export_pattern(&self, source_path: &str) -> Option<String> {
        let rel = strip_folder(source_path, &self.language_root(&self.source_language))?;
        Some(format!(
            "/{}",
            join(&self.language_root(LANGUAGE_PLACEHOLDER), rel)
        ))
    }

    /// Eligible source files among `paths`, sorted and de-duplicated.
    pub fn eligible_sources<'a, I>(&self, paths: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        paths
            .into_iter()
            .filter(|p| self.is_eligible(p, &self.source_language))
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Collapse file paths to the minimal set of folders that covers them.
    ///
    /// Folders are visited in lexicographic order; a folder beneath an
    /// already selected root is skipped, so no result is an ancestor of
    /// another.
    pub fn root_folders<'a, I>(&self, paths: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let base = self.language_root(&self.source_language);
        let scope = self.scope_for(&self.source_language);
        let folders: BTreeSet<&str> = paths
            .into_iter()
            .map(parent_dir)
            .filter(|dir| is_within(dir, &base) && is_within(dir, &scope))
            .collect();

        let mut roots: Vec<String> = Vec::new();
        for folder in folders {
            if roots.iter().any(|root| is_within(folder, root)) {
                continue;
            }
            roots.push(folder.to_string());
        }
        roots
    }
}
