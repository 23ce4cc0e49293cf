//! Headless-browser fallback tier.
//!
//! Used only when the HTTP tier returns nothing. One browser instance is
//! launched lazily and reused for every call, because startup dominates
//! latency.
//!
//! ```text
//! search/article URL → ChromeRenderer (settle delay) → in-page script → ArticleMeta / ArticleContent
//! ```

mod chrome;
mod config;
mod script;

pub use chrome::ChromeRenderer;
pub use config::RendererConfig;
pub use script::ExtractionScript;
