use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::{Result, SummaristError};
use crate::domain::{ArticleContent, ArticleMeta};
use crate::fetcher::extract::normalize_image_src;
use crate::fetcher::{ArticleSource, ExtractRules};
use crate::renderer::config::RendererConfig;
use crate::renderer::script::ExtractionScript;

/// A launched browser plus the task pumping its CDP events
struct Engine {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// Chrome-based fallback tier using chromiumoxide.
///
/// The browser is launched on first use and kept alive across calls; only
/// [`ChromeRenderer::cleanup`] tears it down. Every render holds the engine
/// lock for its whole navigation, so concurrent callers are serialized.
pub struct ChromeRenderer {
    config: RendererConfig,
    script: ExtractionScript,
    engine: Mutex<Option<Engine>>,
}

impl ChromeRenderer {
    pub fn new(config: RendererConfig, rules: ExtractRules) -> Self {
        Self {
            config,
            script: ExtractionScript::new(rules),
            engine: Mutex::new(None),
        }
    }

    async fn launch(&self) -> Result<Engine> {
        let mut builder = BrowserConfig::builder().request_timeout(self.config.page_load_timeout());
        for arg in self.config.browser_args() {
            builder = builder.arg(arg);
        }

        if !self.config.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| SummaristError::Renderer(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            SummaristError::Renderer(format!(
                "Failed to launch browser: {}. Is Chrome or Chromium installed and in PATH?",
                e
            ))
        })?;

        let handler = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        info!("Render engine launched");
        Ok(Engine { browser, handler })
    }

    /// Navigate, wait the settle delay, then evaluate `script` in-page.
    ///
    /// Navigation and evaluation each get the page-load budget. The page is
    /// closed on every path, so a slow site never leaves a tab behind in the
    /// shared browser.
    async fn render(
        &self,
        url: &str,
        settle: Duration,
        script: String,
    ) -> Result<serde_json::Value> {
        let budget = self.config.page_load_timeout();
        let mut slot = self.engine.lock().await;

        if slot.is_none() {
            *slot = Some(self.launch().await?);
        }
        let Some(engine) = slot.as_ref() else {
            return Err(SummaristError::Renderer("Render engine unavailable".to_string()));
        };

        let opened = bounded(budget, engine.browser.new_page("about:blank"), "Opening a page").await;
        let page = match opened {
            Ok(page) => page,
            Err(e) => {
                // A dead CDP connection will not recover; relaunch next time
                if let Some(engine) = slot.take() {
                    engine.handler.abort();
                }
                return Err(e);
            }
        };

        let result = match bounded(budget, page.goto(url), "Page load").await {
            Ok(_) => {
                tokio::time::sleep(settle).await;
                bounded(budget, page.evaluate(script), "Script execution")
                    .await
                    .and_then(|r| {
                        r.into_value::<serde_json::Value>().map_err(|e| {
                            SummaristError::Renderer(format!("Failed to parse result: {:?}", e))
                        })
                    })
            }
            Err(e) => Err(e),
        };

        if let Err(e) = page.close().await {
            debug!(error = %e, "Failed to close page");
        }

        result
    }

    /// Dispose of the cached browser. Called once at process shutdown.
    pub async fn cleanup(&self) {
        let Some(mut engine) = self.engine.lock().await.take() else {
            return;
        };

        if let Err(e) = engine.browser.close().await {
            warn!(error = %e, "Failed to close browser");
        }
        let _ = engine.browser.wait().await;
        engine.handler.abort();
        info!("Render engine disposed");
    }

    /// Whether a browser is currently cached
    pub async fn is_running(&self) -> bool {
        self.engine.lock().await.is_some()
    }
}

/// Run a browser step under `budget`, folding timeout and CDP errors
/// into [`SummaristError::Renderer`]
async fn bounded<T, E, F>(budget: Duration, step: F, what: &str) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(budget, step).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(SummaristError::Renderer(format!("{} failed: {}", what, e))),
        Err(_) => Err(SummaristError::Renderer(format!(
            "{} exceeded {}s",
            what,
            budget.as_secs_f32()
        ))),
    }
}

fn string_field(value: &serde_json::Value, key: &str) -> Option<String> {
    value[key]
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Map the metadata script's result onto [`ArticleMeta`]
pub(crate) fn meta_from_value(value: &serde_json::Value) -> Option<ArticleMeta> {
    Some(ArticleMeta {
        title: string_field(value, "title")?,
        link: string_field(value, "link")?,
    })
}

/// Map the content script's result onto [`ArticleContent`]
pub(crate) fn content_from_value(value: &serde_json::Value) -> ArticleContent {
    ArticleContent {
        content: string_field(value, "content"),
        image_url: string_field(value, "image_url").and_then(|s| normalize_image_src(&s)),
    }
}

#[async_trait]
impl ArticleSource for ChromeRenderer {
    fn name(&self) -> &'static str {
        "chrome"
    }

    async fn fetch_metadata(&self, search_url: &str) -> Option<ArticleMeta> {
        if !self.config.enabled {
            return None;
        }

        let script = self.script.metadata_script();
        match self.render(search_url, self.config.metadata_settle(), script).await {
            Ok(value) => {
                let meta = meta_from_value(&value);
                if meta.is_none() {
                    warn!(url = search_url, "Rendered search page had no result");
                }
                meta
            }
            Err(e) => {
                warn!(url = search_url, error = %e, "Rendered metadata fetch failed");
                None
            }
        }
    }

    async fn fetch_content(&self, article_url: &str) -> ArticleContent {
        if !self.config.enabled {
            return ArticleContent::empty();
        }

        let script = self.script.content_script();
        match self.render(article_url, self.config.content_settle(), script).await {
            Ok(value) => content_from_value(&value),
            Err(e) => {
                warn!(url = article_url, error = %e, "Rendered content fetch failed");
                ArticleContent::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_bounded_step_times_out() {
        let stalled = std::future::pending::<std::result::Result<(), String>>();
        let result = bounded(Duration::from_millis(20), stalled, "Page load").await;
        match result {
            Err(SummaristError::Renderer(msg)) => assert!(msg.starts_with("Page load exceeded")),
            other => panic!("expected renderer timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bounded_step_passes_value_and_error() {
        let ok = bounded(Duration::from_secs(1), async { Ok::<_, String>(7) }, "Step").await;
        assert_eq!(ok.unwrap(), 7);

        let failed = bounded(
            Duration::from_secs(1),
            async { Err::<(), _>("target crashed".to_string()) },
            "Script execution",
        )
        .await;
        match failed {
            Err(SummaristError::Renderer(msg)) => {
                assert_eq!(msg, "Script execution failed: target crashed")
            }
            other => panic!("expected renderer error, got {:?}", other),
        }
    }

    #[test]
    fn test_meta_from_value() {
        let meta = meta_from_value(&json!({
            "title": "  Fed holds rates ",
            "link": "https://kr.investing.com/news/9"
        }))
        .unwrap();
        assert_eq!(meta.title, "Fed holds rates");
        assert_eq!(meta.link, "https://kr.investing.com/news/9");
    }

    #[test]
    fn test_meta_from_value_miss() {
        assert!(meta_from_value(&json!({ "title": "", "link": "" })).is_none());
        assert!(meta_from_value(&json!({ "title": "x", "link": "" })).is_none());
        assert!(meta_from_value(&serde_json::Value::Null).is_none());
    }

    #[test]
    fn test_content_from_value() {
        let content = content_from_value(&json!({
            "content": "Para one\n\nPara two",
            "image_url": "//cdn.example/x.jpg"
        }));
        assert_eq!(content.content.as_deref(), Some("Para one\n\nPara two"));
        assert_eq!(content.image_url.as_deref(), Some("https://cdn.example/x.jpg"));

        let content = content_from_value(&json!({ "content": null, "image_url": null }));
        assert!(!content.has_content());
        assert!(content.image_url.is_none());
    }

    #[tokio::test]
    async fn test_disabled_renderer_never_launches() {
        let config = RendererConfig {
            enabled: false,
            ..RendererConfig::default()
        };
        let renderer = ChromeRenderer::new(config, ExtractRules::default());

        assert!(renderer.fetch_metadata("https://example.com").await.is_none());
        assert!(!renderer.fetch_content("https://example.com").await.has_content());
        assert!(!renderer.is_running().await);

        // Nothing to dispose
        renderer.cleanup().await;
    }
}
