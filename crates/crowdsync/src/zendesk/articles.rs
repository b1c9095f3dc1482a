//! Which articles are tracked and where they live in the working tree.

use std::collections::BTreeMap;

use scraper::{Html, Selector};

use super::cache::ArticleMap;
use super::types::{Article, Category, Section};

/// One help center mirrored into a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpCenterSite {
    pub domain: String,
    pub source_locale: String,
    pub target_locale: String,
    /// Category ids or names to track.
    pub categories: Vec<String>,
    /// Labels that make an article tracked regardless of its category.
    pub labels: Vec<String>,
}

impl HelpCenterSite {
    fn tracks_category(&self, category: &Category) -> bool {
        self.categories.iter().any(|wanted| {
            wanted == &category.id.to_string() || wanted.eq_ignore_ascii_case(&category.name)
        })
    }

    fn tracks_labels(&self, labels: &[String]) -> bool {
        labels
            .iter()
            .any(|label| self.labels.iter().any(|wanted| wanted.eq_ignore_ascii_case(label)))
    }

    fn tracks_everything(&self) -> bool {
        self.categories.is_empty() && self.labels.is_empty()
    }
}

/// A tracked article and its path relative to the git root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedArticle {
    pub article: Article,
    pub path: String,
}

/// `<project_folder>/<locale>/<category>/<section>/<id>.html`
pub fn article_path(
    project_folder: &str,
    locale: &str,
    category: &Category,
    section: &Section,
    article_id: u64,
) -> String {
    let relative = format!(
        "{locale}/{}/{}/{article_id}.html",
        category.slug(),
        section.slug()
    );
    let folder = project_folder.trim_matches('/');
    if folder.is_empty() {
        relative
    } else {
        format!("{folder}/{relative}")
    }
}

/// Article id encoded in a mirrored file name.
pub fn article_id(path: &str) -> Option<u64> {
    path.rsplit('/').next()?.strip_suffix(".html")?.parse().ok()
}

/// Articles to mirror, in id order.
///
/// Drafts, other locales and articles in unknown sections are skipped. With
/// neither categories nor labels configured every published article counts.
pub fn tracked_articles(
    articles: &ArticleMap,
    categories: &[Category],
    sections: &[Section],
    site: &HelpCenterSite,
    project_folder: &str,
) -> Vec<TrackedArticle> {
    let categories: BTreeMap<u64, &Category> = categories.iter().map(|c| (c.id, c)).collect();
    let sections: BTreeMap<u64, &Section> = sections.iter().map(|s| (s.id, s)).collect();

    articles
        .values()
        .filter(|a| !a.draft && a.locale.eq_ignore_ascii_case(&site.source_locale))
        .filter_map(|article| {
            let section = sections.get(&article.section_id?)?;
            let category = categories.get(&section.category_id)?;
            let wanted = site.tracks_everything()
                || site.tracks_category(category)
                || site.tracks_labels(&article.label_names);
            wanted.then(|| TrackedArticle {
                path: article_path(
                    project_folder,
                    &site.source_locale,
                    category,
                    section,
                    article.id,
                ),
                article: article.clone(),
            })
        })
        .collect()
}

/// Title and body of a mirrored document.
///
/// The title is the first `<h1>`, else `<title>`, else `fallback`. A leading
/// heading line is not part of the body.
pub fn split_document(content: &str, fallback: &str) -> (String, String) {
    let document = Html::parse_document(content);
    let title = ["h1", "title"]
        .into_iter()
        .filter_map(|tag| Selector::parse(tag).ok())
        .find_map(|selector| {
            document
                .select(&selector)
                .next()
                .map(|e| e.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty())
        })
        .unwrap_or_else(|| fallback.to_string());

    let trimmed = content.trim_start();
    let body = if trimmed.starts_with("<h1") {
        match trimmed.find("</h1>") {
            Some(end) => trimmed[end + "</h1>".len()..].trim_start_matches(['\r', '\n']),
            None => trimmed,
        }
    } else {
        trimmed
    };
    (title, body.to_string())
}
