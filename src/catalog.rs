//! Client for the TMDB movie catalog.

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Catalog responded with status {0}")]
    Status(u16),
}

/// A catalog entry. Only `id` and `title` are interpreted, every other
/// upstream field is passed through as is.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CatalogMovie {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
impl CatalogMovie {
    pub fn new<S: Into<String>>(id: u64, title: S) -> Self {
        CatalogMovie {
            id,
            title: title.into(),
            extra: Map::new(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Deserialize, Debug)]
struct Keyword {
    id: u64,
}

#[async_trait]
pub trait MovieCatalog: Send + Sync {
    /// Popular movies, narrowed to `keyword_ids` (a `|`-separated list) when given.
    async fn discover(&self, keyword_ids: Option<&str>) -> Result<Vec<CatalogMovie>, CatalogError>;
    async fn search_by_title(&self, title: &str) -> Result<Vec<CatalogMovie>, CatalogError>;
    /// Resolves free text to keyword ids; `None` if nothing matches.
    async fn keyword_ids(&self, keyword: &str) -> Result<Option<String>, CatalogError>;
}

pub struct TmdbClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TmdbClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        TmdbClient {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
        }
    }

    async fn fetch<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<Page<T>, CatalogError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, query);
        let response = self
            .http
            .get(&url)
            .query(query)
            .header("accept", "application/json")
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl MovieCatalog for TmdbClient {
    async fn discover(&self, keyword_ids: Option<&str>) -> Result<Vec<CatalogMovie>, CatalogError> {
        let query: Vec<(&str, &str)> = keyword_ids
            .map(|ids| ("with_keywords", ids))
            .into_iter()
            .collect();
        Ok(self.fetch("/discover/movie", &query).await?.results)
    }

    async fn search_by_title(&self, title: &str) -> Result<Vec<CatalogMovie>, CatalogError> {
        Ok(self
            .fetch("/search/movie", &[("query", title)])
            .await?
            .results)
    }

    async fn keyword_ids(&self, keyword: &str) -> Result<Option<String>, CatalogError> {
        let page: Page<Keyword> = self.fetch("/search/keyword", &[("query", keyword)]).await?;
        Ok(join_ids(&page.results))
    }
}

fn join_ids(keywords: &[Keyword]) -> Option<String> {
    if keywords.is_empty() {
        return None;
    }
    let ids: Vec<String> = keywords.iter().map(|keyword| keyword.id.to_string()).collect();
    Some(ids.join("|"))
}
