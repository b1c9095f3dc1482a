//! Help-center variant: mirror Zendesk articles into the working tree and
//! publish their translations back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::files::swap_language;
use crate::zendesk::{
    ArticleCache, ArticleMap, HelpCenterSite, TrackedArticle, ZendeskClient, article_id,
    split_document, tracked_articles,
};

use super::drift::{checksum, companion_path, is_stale, write_companion};
use super::error::{Result, SyncError};
use super::progress::{ProgressCallback, SyncProgress, emit};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelpCenterReport {
    /// Cached articles added or changed by this refresh.
    pub refreshed: usize,
    /// Mirrored files written, relative to the git root.
    pub written: Vec<String>,
    /// Mirrored files removed because their article moved.
    pub removed: Vec<String>,
    /// Article ids whose translation was published.
    pub published: Vec<u64>,
    /// Checksum companions written for published translations, relative to
    /// the git root.
    pub companions: Vec<String>,
}

/// Every `<id>.html` under `dir`, keyed by article id.
fn mirrored_files(root: &Path, dir: &Path) -> Result<BTreeMap<u64, String>> {
    let mut found = BTreeMap::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = match std::fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(SyncError::io(&current)(e)),
        };
        for entry in entries {
            let path = entry.map_err(SyncError::io(&current))?.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let Some(relative) = path
                .strip_prefix(root)
                .ok()
                .and_then(Path::to_str)
                .map(|p| p.replace('\\', "/"))
            else {
                continue;
            };
            if let Some(id) = article_id(&relative) {
                found.insert(id, relative);
            }
        }
    }
    Ok(found)
}

pub struct HelpCenterSync<'a> {
    zendesk: &'a ZendeskClient,
    site: &'a HelpCenterSite,
    cache: ArticleCache,
    root: PathBuf,
    project_folder: &'a str,
}

impl<'a> HelpCenterSync<'a> {
    pub fn new(
        zendesk: &'a ZendeskClient,
        site: &'a HelpCenterSite,
        state_dir: &Path,
        root: &Path,
        project_folder: &'a str,
    ) -> Self {
        Self {
            zendesk,
            site,
            cache: ArticleCache::new(state_dir, &site.domain),
            root: root.to_path_buf(),
            project_folder,
        }
    }

    /// Bring the article cache up to date. An empty cache is filled from
    /// the full listing, otherwise only changes since the newest entry are
    /// fetched.
    pub async fn refresh(&self) -> Result<(ArticleMap, usize)> {
        let mut articles = self.cache.load()?;
        let updates = match crate::zendesk::cache::start_time(&articles) {
            Some(start) => self.zendesk.incremental_articles(start).await?,
            None => self.zendesk.list_articles().await?,
        };
        let changed = crate::zendesk::cache::merge(&mut articles, updates);
        if changed > 0 {
            self.cache.save(&articles)?;
        }
        tracing::info!(domain = %self.site.domain, cached = articles.len(), changed, "Refreshed article cache");
        Ok((articles, changed))
    }

    /// Write every tracked article whose content differs from the mirror.
    pub async fn mirror(
        &self,
        articles: &ArticleMap,
        report: &mut HelpCenterReport,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<TrackedArticle>> {
        let categories = self.zendesk.list_categories().await?;
        let sections = self.zendesk.list_sections().await?;
        let tracked = tracked_articles(
            articles,
            &categories,
            &sections,
            self.site,
            self.project_folder,
        );

        let locale_root = self
            .root
            .join(self.project_folder)
            .join(&self.site.source_locale);
        let existing = mirrored_files(&self.root, &locale_root)?;

        for entry in &tracked {
            let id = entry.article.id;
            if let Some(old) = existing.get(&id).filter(|old| **old != entry.path) {
                let old_path = self.root.join(old);
                std::fs::remove_file(&old_path).map_err(SyncError::io(&old_path))?;
                tracing::info!(id, from = %old, to = %entry.path, "Article moved");
                report.removed.push(old.clone());
            }

            let target = self.root.join(&entry.path);
            let content = entry.article.document();
            if std::fs::read_to_string(&target).ok().as_deref() == Some(content.as_str()) {
                continue;
            }
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(SyncError::io(parent))?;
            }
            std::fs::write(&target, content).map_err(SyncError::io(&target))?;
            emit(
                on_progress,
                SyncProgress::ArticleWritten {
                    id,
                    path: entry.path.clone(),
                },
            );
            report.written.push(entry.path.clone());
        }
        Ok(tracked)
    }

    /// Publish translated files whose companion checksum is missing or
    /// differs, then record the published checksum.
    pub async fn publish(
        &self,
        tracked: &[TrackedArticle],
        report: &mut HelpCenterReport,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<()> {
        let locale = &self.site.target_locale;
        for entry in tracked {
            let Some(translated) =
                swap_language(&entry.path, &self.site.source_locale, locale)
            else {
                continue;
            };
            let path = self.root.join(&translated);
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            let crc = checksum(content.as_bytes());
            if !is_stale(&path, crc) {
                continue;
            }

            let (title, body) = split_document(&content, &entry.article.title);
            self.zendesk
                .publish_translation(entry.article.id, locale, &title, &body)
                .await?;
            write_companion(&path, crc)?;
            if let Some(companion) = companion_path(Path::new(&translated)).to_str() {
                report.companions.push(companion.to_string());
            }
            tracing::info!(id = entry.article.id, locale = %locale, "Published translation");
            emit(
                on_progress,
                SyncProgress::ArticlePublished {
                    id: entry.article.id,
                    locale: locale.clone(),
                },
            );
            report.published.push(entry.article.id);
        }
        Ok(())
    }

    /// Refresh, mirror and publish in that order.
    pub async fn run(&self, on_progress: Option<&ProgressCallback>) -> Result<HelpCenterReport> {
        let (articles, refreshed) = self.refresh().await?;
        let mut report = HelpCenterReport {
            refreshed,
            ..HelpCenterReport::default()
        };
        let tracked = self.mirror(&articles, &mut report, on_progress).await?;
        self.publish(&tracked, &mut report, on_progress).await?;
        Ok(report)
    }
}
