//! On-disk cache of a help center's article listing.
//!
//! Full listings are slow on large help centers, so after the first run only
//! the incremental endpoint is queried, starting from the newest
//! `updated_at` already cached.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::types::Article;
use crate::state::{StateError, read_json, write_json};

/// Cached articles keyed by id.
pub type ArticleMap = BTreeMap<u64, Article>;

/// `articles_<domain>.json` in the state directory.
#[derive(Debug, Clone)]
pub struct ArticleCache {
    path: PathBuf,
}

impl ArticleCache {
    pub fn new(state_dir: &Path, domain: &str) -> Self {
        Self {
            path: state_dir.join(format!("articles_{domain}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached articles; empty before the first refresh.
    pub fn load(&self) -> Result<ArticleMap, StateError> {
        Ok(read_json(&self.path)?.unwrap_or_default())
    }

    pub fn save(&self, articles: &ArticleMap) -> Result<(), StateError> {
        write_json(&self.path, articles)
    }
}

/// Start time for an incremental refresh, or `None` for an empty cache.
pub fn start_time(articles: &ArticleMap) -> Option<i64> {
    articles.values().map(|a| a.updated_at.timestamp()).max()
}

/// Replace cached entries with fresher copies, by id.
pub fn merge(articles: &mut ArticleMap, updates: Vec<Article>) -> usize {
    let mut changed = 0;
    for article in updates {
        if articles.get(&article.id) != Some(&article) {
            changed += 1;
        }
        articles.insert(article.id, article);
    }
    changed
}
