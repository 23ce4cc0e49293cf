use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the plain HTTP fetch tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Request timeout in seconds (default: 10)
    pub timeout_secs: u64,

    /// Search page URL, `{query}` is replaced with the url-encoded query
    pub search_url_template: String,

    /// Base for resolving relative article links
    pub base_url: String,

    /// User agents rotated per request
    pub user_agents: Vec<String>,

    pub accept_language: String,

    /// Referer sent with search requests
    pub referer: Option<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            search_url_template: "https://kr.investing.com/search/?q={query}&tab=news".to_string(),
            base_url: "https://kr.investing.com".to_string(),
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36"
                    .to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 \
                 (KHTML, like Gecko) Version/16.2 Safari/605.1.15"
                    .to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:108.0) Gecko/20100101 Firefox/108.0"
                    .to_string(),
            ],
            accept_language: "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
            referer: Some("https://kr.investing.com/".to_string()),
        }
    }
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build the search URL for a ticker or free-text query
    pub fn search_url(&self, query: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(query.trim().as_bytes()).collect();
        self.search_url_template.replace("{query}", &encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = FetcherConfig::default();
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.user_agents.len(), 3);
        assert!(config.referer.is_some());
    }

    #[test]
    fn test_search_url_encodes_query() {
        let config = FetcherConfig::default();
        assert_eq!(
            config.search_url("AAPL"),
            "https://kr.investing.com/search/?q=AAPL&tab=news"
        );
        assert_eq!(
            config.search_url(" Samsung Electronics & Co "),
            "https://kr.investing.com/search/?q=Samsung+Electronics+%26+Co&tab=news"
        );
    }
}
