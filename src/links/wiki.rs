//! MediaWiki link fetcher.
//!
//! Uses `action=query&prop=links`, following `plcontinue` cursors until the page's
//! link list is exhausted. Every HTTP round trip takes one permit from the shared
//! [`RateLimiter`].

use super::{LinkError, LinkSource, RateLimiter};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

pub const ENGLISH_WIKIPEDIA_URL: &str = "https://en.wikipedia.org/w/api.php";

#[derive(Debug, Deserialize)]
struct LinksResponse {
    #[serde(rename = "continue")]
    cont: Option<Continue>,
    #[serde(default)]
    query: Option<Query>,
}

#[derive(Debug, Deserialize)]
struct Continue {
    plcontinue: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Query {
    #[serde(default)]
    pages: HashMap<String, Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    links: Vec<Link>,
    /// Present (with any value) when the title does not exist.
    #[serde(default)]
    missing: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Link {
    title: String,
}

/// Client for a MediaWiki `api.php` endpoint.
#[derive(Clone)]
pub struct WikiClient {
    http: reqwest::Client,
    api_url: String,
    limiter: Arc<RateLimiter>,
}

impl WikiClient {
    /// Build a client with its own limiter at `max_rps` requests per second.
    pub fn new(api_url: impl Into<String>, max_rps: u32, timeout: Duration) -> Result<Self, LinkError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("wiki-graph/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_http_client(
            http,
            api_url,
            Arc::new(RateLimiter::new(max_rps)),
        ))
    }

    /// Build a client from an existing HTTP client and a (possibly shared) limiter.
    pub fn with_http_client(
        http: reqwest::Client,
        api_url: impl Into<String>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            http,
            api_url: api_url.into(),
            limiter,
        }
    }

    /// Titles of all pages linked from `title`.
    pub async fn get_mentioned_pages(&self, title: &str) -> Result<Vec<String>, LinkError> {
        let mut titles = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let (batch, next) = self.get_links(title, cursor.as_deref()).await?;
            titles.extend(batch);

            match next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(titles)
    }

    async fn get_links(
        &self,
        title: &str,
        cursor: Option<&str>,
    ) -> Result<(Vec<String>, Option<String>), LinkError> {
        let mut params: Vec<(&str, &str)> = vec![
            ("action", "query"),
            ("prop", "links"),
            ("pllimit", "max"),
            ("format", "json"),
            ("titles", title),
        ];
        if let Some(cursor) = cursor {
            params.push(("plcontinue", cursor));
        }

        self.limiter.acquire().await;

        let response = self.http.get(&self.api_url).query(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LinkError::Status(status.as_u16()));
        }

        let body: LinksResponse = response
            .json()
            .await
            .map_err(|e| LinkError::Decode(e.to_string()))?;

        let Some(page) = body.query.and_then(|q| q.pages.into_values().next()) else {
            return Ok((Vec::new(), None));
        };

        if page.missing.is_some() {
            return Err(LinkError::Unavailable(title.to_string()));
        }

        let titles: Vec<String> = page.links.into_iter().map(|link| link.title).collect();
        let next = body.cont.and_then(|c| c.plcontinue);

        trace!(title, count = titles.len(), has_more = next.is_some(), "fetched links batch");

        Ok((titles, next))
    }
}

#[async_trait]
impl LinkSource for WikiClient {
    async fn get_edges(&self, node: &str) -> Result<Vec<String>, LinkError> {
        self.get_mentioned_pages(node).await
    }
}
