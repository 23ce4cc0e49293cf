use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::app::{Result, SummaristError};

/// The long-running model call behind every worker
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String>;
}

/// Configuration for the chat-completion summarizer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// OpenAI-compatible API root, e.g. a local llama.cpp server
    pub base_url: String,

    pub model: String,

    /// Environment variable holding the bearer token, if any
    pub api_key_env: String,

    /// Instruction prepended to every article
    pub prompt: String,

    /// Read the instruction from this file instead of `prompt`
    pub prompt_file: Option<PathBuf>,

    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,

    /// Request timeout in seconds; unset means wait indefinitely
    pub timeout_secs: Option<u64>,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/v1".to_string(),
            model: "gemma-3-1b-it".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            prompt: "Summarize the following news article in three short sentences. \
                     Keep company names and figures exact.\n\n"
                .to_string(),
            prompt_file: None,
            temperature: 0.2,
            top_p: 0.95,
            max_tokens: 512,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Summarizer backed by an OpenAI-compatible `/chat/completions` endpoint
pub struct ChatSummarizer {
    client: Client,
    config: SummarizerConfig,
    prompt: String,
    api_key: Option<String>,
}

impl ChatSummarizer {
    /// Build the client and load the prompt. Done once per worker, before
    /// it reports ready.
    pub fn load(config: SummarizerConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        let prompt = match config.prompt_file {
            Some(ref path) => std::fs::read_to_string(path).map_err(|e| {
                SummaristError::Summarizer(format!(
                    "Failed to read prompt file {}: {}",
                    path.display(),
                    e
                ))
            })?,
            None => config.prompt.clone(),
        };
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());

        info!(model = %config.model, base_url = %config.base_url, "Summarizer loaded");
        Ok(Self {
            client,
            config,
            prompt,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "messages": [
                { "role": "user", "content": format!("{}{}", self.prompt, text) }
            ],
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
            "max_tokens": self.config.max_tokens,
        })
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        let mut request = self.client.post(self.endpoint()).json(&self.request_body(text));
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let started = std::time::Instant::now();
        let response = request.send().await?.error_for_status()?;
        let body: ChatResponse = response.json().await?;

        let summary = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SummaristError::Summarizer("Model returned no content".to_string()))?;

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = summary.len(),
            "Summary generated"
        );
        Ok(summary)
    }
}
