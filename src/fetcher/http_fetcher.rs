use async_trait::async_trait;
use rand::seq::IndexedRandom;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, REFERER, USER_AGENT,
};
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::app::Result;
use crate::domain::{ArticleContent, ArticleMeta};
use crate::fetcher::extract::{extract_content, extract_metadata};
use crate::fetcher::{ArticleSource, ExtractRules, FetchFailure, FetcherConfig};

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

pub struct HttpFetcher {
    client: Client,
    config: FetcherConfig,
    rules: ExtractRules,
    base_url: Url,
}

impl HttpFetcher {
    pub fn new(config: FetcherConfig, rules: ExtractRules) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .build()?;
        let base_url = Url::parse(&config.base_url)?;

        Ok(Self {
            client,
            config,
            rules,
            base_url,
        })
    }

    fn random_user_agent(&self) -> Option<String> {
        self.config.user_agents.choose(&mut rand::rng()).cloned()
    }

    fn headers(&self, with_referer: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Some(ua) = self.random_user_agent() {
            if let Ok(value) = HeaderValue::from_str(&ua) {
                headers.insert(USER_AGENT, value);
            }
        }
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        if let Ok(value) = HeaderValue::from_str(&self.config.accept_language) {
            headers.insert(ACCEPT_LANGUAGE, value);
        }
        if with_referer {
            if let Some(value) = self
                .config
                .referer
                .as_deref()
                .and_then(|r| HeaderValue::from_str(r).ok())
            {
                headers.insert(REFERER, value);
            }
        }
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        headers
    }

    async fn get_page(&self, url: &str, with_referer: bool) -> std::result::Result<String, FetchFailure> {
        let response = self
            .client
            .get(url)
            .headers(self.headers(with_referer))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status(status));
        }

        Ok(response.text().await?)
    }

    async fn try_metadata(&self, search_url: &str) -> std::result::Result<ArticleMeta, FetchFailure> {
        let html = self.get_page(search_url, true).await?;
        extract_metadata(&html, &self.rules, &self.base_url).ok_or(FetchFailure::ExtractionMiss)
    }

    async fn try_content(&self, article_url: &str) -> std::result::Result<ArticleContent, FetchFailure> {
        let html = self.get_page(article_url, false).await?;
        Ok(extract_content(&html, &self.rules))
    }
}

#[async_trait]
impl ArticleSource for HttpFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch_metadata(&self, search_url: &str) -> Option<ArticleMeta> {
        match self.try_metadata(search_url).await {
            Ok(meta) => {
                debug!(url = search_url, title = %meta.title, "Fetched search metadata");
                Some(meta)
            }
            Err(e) => {
                warn!(url = search_url, error = %e, "HTTP metadata fetch failed");
                None
            }
        }
    }

    async fn fetch_content(&self, article_url: &str) -> ArticleContent {
        match self.try_content(article_url).await {
            Ok(content) => {
                if !content.has_content() {
                    warn!(url = article_url, error = %FetchFailure::ExtractionMiss, "HTTP content fetch found no body");
                }
                content
            }
            Err(e) => {
                warn!(url = article_url, error = %e, "HTTP content fetch failed");
                ArticleContent::empty()
            }
        }
    }
}
