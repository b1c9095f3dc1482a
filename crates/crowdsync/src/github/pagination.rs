//! Lazy page walker for GitHub list endpoints.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use super::client::GitHubClient;
use crate::http::{HttpMethod, header_get};
use crate::remote::pagination::{parse_link_header, relative_to, with_query};
use crate::remote::{RemoteError, Result};

/// Pages of a GitHub list endpoint, fetched one at a time.
///
/// Walking stops at the first short page or when the `Link` header has no
/// `rel="next"` entry. A 404 on the first page yields no items.
pub struct GitHubPages<'a, T> {
    client: &'a GitHubClient,
    next: Option<String>,
    page_size: u32,
    _marker: PhantomData<T>,
}

impl<'a, T: DeserializeOwned> GitHubPages<'a, T> {
    pub(crate) fn new(client: &'a GitHubClient, path: &str, page_size: u32) -> Self {
        Self {
            client,
            next: Some(with_query(path, "per_page", page_size)),
            page_size,
            _marker: PhantomData,
        }
    }

    /// Fetch the next page, or `None` once the listing is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>> {
        let Some(path) = self.next.take() else {
            return Ok(None);
        };
        let Some(fetched) = self.client.fetch(HttpMethod::Get, &path, None).await? else {
            return Ok(None);
        };

        let items: Vec<T> =
            serde_json::from_value(fetched.body).map_err(|source| RemoteError::Decode {
                url: path.clone(),
                source,
            })?;

        if items.len() >= self.page_size as usize {
            self.next = header_get(&fetched.headers, "link")
                .and_then(|link| parse_link_header(link).next_url)
                .map(|url| relative_to(self.client.api_url(), &url));
        }

        Ok(Some(items))
    }

    /// Drain every remaining page.
    pub async fn collect_all(mut self) -> Result<Vec<T>> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await? {
            all.extend(page);
        }
        Ok(all)
    }
}
