//! Fast HTTP tier of content acquisition.
//!
//! A single GET plus a markup parse. Both operations swallow network and
//! extraction failures, answering `None` or empty content so the caller
//! can move on to the renderer tier.

mod config;
pub mod extract;
pub mod http_fetcher;
mod rules;

pub use config::FetcherConfig;
pub use http_fetcher::HttpFetcher;
pub use rules::ExtractRules;

use async_trait::async_trait;

use crate::domain::{ArticleContent, ArticleMeta};

/// One tier of the acquisition pipeline
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Title and link of the top result on a search page
    async fn fetch_metadata(&self, search_url: &str) -> Option<ArticleMeta>;

    /// Body text and lead image of an article page
    async fn fetch_content(&self, article_url: &str) -> ArticleContent;
}

/// Why a tier gave up on a page. Logged, never returned to callers.
#[derive(Debug, thiserror::Error)]
pub(crate) enum FetchFailure {
    #[error("request failed: {0}")]
    Transient(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),

    #[error("expected markup not found")]
    ExtractionMiss,
}
