//! Two-tier content acquisition.
//!
//! ```text
//! query → search URL → primary.fetch_metadata ─None→ fallback.fetch_metadata
//!       → link       → primary.fetch_content  ─empty→ fallback.fetch_content
//!       → ArticleRecord
//! ```
//!
//! Each tier is tried at most once per stage. A record whose body could not
//! be fetched by either tier still carries its title and link.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::domain::{ArticleContent, ArticleMeta, ArticleRecord};
use crate::fetcher::{ArticleSource, FetcherConfig};

pub struct AcquisitionPipeline {
    config: FetcherConfig,
    primary: Arc<dyn ArticleSource>,
    fallback: Arc<dyn ArticleSource>,
}

impl AcquisitionPipeline {
    pub fn new(
        config: FetcherConfig,
        primary: Arc<dyn ArticleSource>,
        fallback: Arc<dyn ArticleSource>,
    ) -> Self {
        Self {
            config,
            primary,
            fallback,
        }
    }

    /// Resolve the top search result for a query and fetch its article.
    ///
    /// `None` means neither tier found a search result, so there is no link
    /// to key a job on. A record whose body neither tier could fetch is
    /// still returned with `content = None`; callers treat it as a soft
    /// failure and do not summarize it.
    #[instrument(level = "info", skip(self))]
    pub async fn get_article(&self, query: &str) -> Option<ArticleRecord> {
        let search_url = self.config.search_url(query);

        let Some(meta) = self.resolve_metadata(&search_url).await else {
            warn!(query, "No article found for query");
            return None;
        };

        let content = self.resolve_content(&meta.link).await;
        if content.has_content() {
            info!(query, title = %meta.title, "Acquired article");
        } else {
            warn!(query, link = %meta.link, "Acquired article without content");
        }

        Some(ArticleRecord::new(meta, content))
    }

    pub async fn resolve_metadata(&self, search_url: &str) -> Option<ArticleMeta> {
        if let Some(meta) = self.primary.fetch_metadata(search_url).await {
            return Some(meta);
        }

        info!(
            url = search_url,
            tier = self.fallback.name(),
            "Falling back for metadata"
        );
        self.fallback.fetch_metadata(search_url).await
    }

    pub async fn resolve_content(&self, article_url: &str) -> ArticleContent {
        let content = self.primary.fetch_content(article_url).await;
        if content.has_content() {
            return content;
        }

        info!(
            url = article_url,
            tier = self.fallback.name(),
            "Falling back for content"
        );
        let fallback = self.fallback.fetch_content(article_url).await;
        if fallback.has_content() {
            return fallback;
        }

        // Keep whatever image the first tier found
        ArticleContent {
            content: None,
            image_url: fallback.image_url.or(content.image_url),
        }
    }
}
