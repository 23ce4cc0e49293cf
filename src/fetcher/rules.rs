use serde::{Deserialize, Serialize};

/// Selector chain shared by the HTTP fetcher and the fallback renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractRules {
    /// A single search result
    pub result_item_selector: String,

    /// Title anchor inside a search result
    pub result_link_selector: String,

    /// Article containers tried in order; their non-empty paragraphs form the body
    pub article_selectors: Vec<String>,

    /// Image selectors tried in order; only the first match is kept
    pub image_selectors: Vec<String>,

    /// Paragraphs outside any article container must be longer than this
    pub min_paragraph_chars: usize,
}

impl Default for ExtractRules {
    fn default() -> Self {
        Self {
            result_item_selector: "div.articleItem".to_string(),
            result_link_selector: "div.textDiv a.title".to_string(),
            article_selectors: vec!["div.WYSIWYG.articlePage".to_string()],
            image_selectors: vec![
                "img.h-full.w-full.object-contain".to_string(),
                "div.WYSIWYG.articlePage img".to_string(),
                "div.articlePage img".to_string(),
            ],
            min_paragraph_chars: 20,
        }
    }
}
