//! Zendesk Help Center access for the help-center variant of the cycle.
//!
//! - `client` - page-numbered REST client for articles, sections, categories
//!   and translations
//! - [`cache`] - the incremental article cache
//! - [`articles`] - tracking rules, mirrored paths and document titles

pub mod articles;
pub mod cache;
pub(crate) mod client;
pub mod types;

pub use articles::{HelpCenterSite, TrackedArticle, article_id, article_path, split_document, tracked_articles};
pub use cache::{ArticleCache, ArticleMap};
pub use client::ZendeskClient;
pub use types::{Article, Category, Section, Translation, slugify};
