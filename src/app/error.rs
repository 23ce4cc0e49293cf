use thiserror::Error;

use crate::config::ConfigError;
use crate::protocol::ProtocolError;

#[derive(Error, Debug)]
pub enum SummaristError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Renderer error: {0}")]
    Renderer(String),

    #[error("Summarizer error: {0}")]
    Summarizer(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Invalid job id: {0}")]
    InvalidJobId(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, SummaristError>;

impl From<ConfigError> for SummaristError {
    fn from(e: ConfigError) -> Self {
        SummaristError::Config(e.to_string())
    }
}
