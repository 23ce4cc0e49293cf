use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the headless-browser fallback tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Use the browser when the HTTP tier comes back empty (default: true)
    pub enabled: bool,

    /// Whether to run the browser in headless mode (default: true)
    pub headless: bool,

    /// Page load budget in seconds (default: 15)
    pub page_load_timeout_secs: u64,

    /// Settle delay after navigating to a search page in milliseconds (default: 2000)
    pub metadata_settle_ms: u64,

    /// Settle delay after navigating to an article in milliseconds (default: 5000)
    pub content_settle_ms: u64,

    /// Whether to block images for faster loading (default: true)
    pub block_images: bool,

    /// User agent string to use
    pub user_agent: Option<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            headless: true,
            page_load_timeout_secs: 15,
            metadata_settle_ms: 2000,
            content_settle_ms: 5000,
            block_images: true,
            user_agent: Some(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                    .to_string(),
            ),
        }
    }
}

impl RendererConfig {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn metadata_settle(&self) -> Duration {
        Duration::from_millis(self.metadata_settle_ms)
    }

    pub fn content_settle(&self) -> Duration {
        Duration::from_millis(self.content_settle_ms)
    }

    /// Chromium flags trimming everything the extraction does not need
    pub fn browser_args(&self) -> Vec<String> {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-gpu".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-software-rasterizer".to_string(),
            "--disable-extensions".to_string(),
            "--disable-notifications".to_string(),
            "--disk-cache-size=1".to_string(),
            "--media-cache-size=1".to_string(),
        ];
        if self.block_images {
            args.push("--blink-settings=imagesEnabled=false".to_string());
        }
        if let Some(ref ua) = self.user_agent {
            args.push(format!("--user-agent={}", ua));
        }
        args
    }
}
