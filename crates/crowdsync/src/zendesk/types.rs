//! Zendesk Help Center data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A help-center article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub locale: String,
    #[serde(default)]
    pub section_id: Option<u64>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub label_names: Vec<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub html_url: String,
}

impl Article {
    /// Content written to the working tree: the title as a heading, then the body.
    pub fn document(&self) -> String {
        format!(
            "<h1>{}</h1>\n{}",
            self.title,
            self.body.as_deref().unwrap_or_default()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub html_url: String,
}

impl Category {
    pub fn slug(&self) -> String {
        slug(&self.html_url, &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: u64,
    pub category_id: u64,
    pub name: String,
    #[serde(default)]
    pub html_url: String,
}

impl Section {
    pub fn slug(&self) -> String {
        slug(&self.html_url, &self.name)
    }
}

/// One locale's rendition of an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub locale: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
}

/// Path segment for a category or section.
///
/// Zendesk URLs end in `<id>-<Readable-Name>`; the last URL segment is used
/// when present, otherwise the name is slugified.
fn slug(html_url: &str, name: &str) -> String {
    let tail = html_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|tail| !tail.is_empty() && !tail.contains(':'));
    slugify(tail.unwrap_or(name))
}

/// Lowercase ASCII alphanumerics separated by single dashes.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_prefers_url_tail() {
        let section = Section {
            id: 360001,
            category_id: 1,
            name: "Getting started".into(),
            html_url: "https://help.example.com/hc/en-us/sections/360001-Getting-Started".into(),
        };
        assert_eq!(section.slug(), "360001-getting-started");
    }

    #[test]
    fn slug_falls_back_to_name() {
        let category = Category {
            id: 7,
            name: "Billing & Accounts".into(),
            html_url: String::new(),
        };
        assert_eq!(category.slug(), "billing-accounts");
        assert_eq!(slugify("  --Hello,  World!--"), "hello-world");
    }

    #[test]
    fn article_parses_api_shape() {
        let article: Article = serde_json::from_value(serde_json::json!({
            "id": 42,
            "title": "Reset your password",
            "body": "<p>Open settings.</p>",
            "locale": "en-us",
            "source_locale": "en-us",
            "section_id": 360001,
            "draft": false,
            "label_names": ["account"],
            "updated_at": "2024-03-01T10:00:00Z",
            "html_url": "https://help.example.com/hc/en-us/articles/42"
        }))
        .expect("parse");
        assert_eq!(article.section_id, Some(360001));
        assert_eq!(
            article.document(),
            "<h1>Reset your password</h1>\n<p>Open settings.</p>"
        );
    }
}
