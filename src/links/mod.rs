//! Link sources: where the search learns a page's outbound links.

mod rate_limit;
mod wiki;

pub use rate_limit::RateLimiter;
pub use wiki::{WikiClient, ENGLISH_WIKIPEDIA_URL};

use async_trait::async_trait;
use thiserror::Error;

/// Failure to fetch the edges of one node.
///
/// The search treats these as dead ends, never as fatal.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected http status {0}")]
    Status(u16),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("page unavailable: {0}")]
    Unavailable(String),
}

/// Capability the shortest-path engine needs from the outside world.
#[async_trait]
pub trait LinkSource: Send + Sync {
    /// Return every outbound edge of `node`, following pagination as needed.
    async fn get_edges(&self, node: &str) -> Result<Vec<String>, LinkError>;
}
