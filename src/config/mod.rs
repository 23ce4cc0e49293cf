//! Configuration management for summarist.
//!
//! Configuration is read from `~/.config/summarist/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::fetcher::{ExtractRules, FetcherConfig};
use crate::pool::PoolConfig;
use crate::remote::RemoteConfig;
use crate::renderer::RendererConfig;
use crate::worker::SummarizerConfig;

/// Where persisted summaries live
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Defaults to `<data dir>/summarist/results`
    pub results_dir: Option<PathBuf>,
}

impl StoreConfig {
    pub fn results_dir(&self) -> Result<PathBuf, ConfigError> {
        match self.results_dir {
            Some(ref dir) => Ok(dir.clone()),
            None => {
                let data_dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
                Ok(data_dir.join("summarist").join("results"))
            }
        }
    }
}

/// Main configuration struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fetcher: FetcherConfig,
    pub extract: ExtractRules,
    pub renderer: RendererConfig,
    pub pool: PoolConfig,
    pub remote: RemoteConfig,
    pub store: StoreConfig,
    pub summarizer: SummarizerConfig,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file, which must exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/summarist/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("summarist").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# summarist configuration
#
# Every key is optional; anything left out falls back to the value shown.

[fetcher]
# Plain HTTP request timeout in seconds
timeout_secs = 10

# Search page, {query} is replaced with the url-encoded query
search_url_template = "https://kr.investing.com/search/?q={query}&tab=news"

# Relative article links are resolved against this
base_url = "https://kr.investing.com"

# One is picked at random per request
user_agents = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
]

accept_language = "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7"
referer = "https://kr.investing.com/"

[extract]
# First search result and its title link
result_item_selector = "div.articleItem"
result_link_selector = "div.textDiv a.title"

# Article body containers, tried in order
article_selectors = ["div.WYSIWYG.articlePage"]

# Lead image candidates, tried in order
image_selectors = [
    "img.h-full.w-full.object-contain",
    "div.WYSIWYG.articlePage img",
    "div.articlePage img",
]

# Outside a container, only paragraphs longer than this count as body
min_paragraph_chars = 20

[renderer]
# Fall back to a headless browser when plain HTTP finds nothing
enabled = true
headless = true

# Navigation budget in seconds
page_load_timeout_secs = 15

# Wait after load for scripts to fill the page (milliseconds)
metadata_settle_ms = 2000
content_settle_ms = 5000

block_images = true

[pool]
# Local worker processes
workers = 2

# Dispatch attempts before a job is marked failed
max_attempts = 3

health_interval_secs = 5
reconcile_interval_secs = 1

# Time a worker gets to exit before it is killed
shutdown_grace_secs = 1

# Status poll interval while a worker is busy (milliseconds)
status_poll_ms = 2000

# Worker command, defaults to this binary with "worker"
# worker_program = "/usr/local/bin/summarist"
# worker_args = ["worker"]

[remote]
# Accept workers started with `summarist worker --connect <addr>`
enabled = false
listen = "127.0.0.1:6666"

[store]
# Defaults to <data dir>/summarist/results
# results_dir = "/var/lib/summarist/results"

[summarizer]
# Any OpenAI-compatible chat completion endpoint
base_url = "http://127.0.0.1:8080/v1"
model = "gemma-3-1b-it"

# Environment variable holding the API key, unset for local servers
api_key_env = "OPENAI_API_KEY"

# prompt_file = "prompt.txt"
temperature = 0.2
top_p = 0.95
max_tokens = 512
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Could not determine data directory")]
    NoDataDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
