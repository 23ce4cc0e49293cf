use serde::{Deserialize, Serialize};

/// Title and link of the top search result for a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleMeta {
    pub title: String,
    pub link: String,
}

/// Body text and lead image extracted from an article page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleContent {
    pub content: Option<String>,
    pub image_url: Option<String>,
}

impl ArticleContent {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the page yielded any usable body text
    pub fn has_content(&self) -> bool {
        self.content.as_ref().is_some_and(|c| !c.trim().is_empty())
    }
}

/// Normalized article produced by the acquisition pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: String,
    pub link: String,
    pub content: Option<String>,
    pub image_url: Option<String>,
}

impl ArticleRecord {
    pub fn new(meta: ArticleMeta, content: ArticleContent) -> Self {
        Self {
            title: meta.title,
            link: meta.link,
            content: content.content,
            image_url: content.image_url,
        }
    }

    /// Record carrying only metadata, for when no tier produced a body
    pub fn from_meta(meta: ArticleMeta) -> Self {
        Self::new(meta, ArticleContent::empty())
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "(Untitled)"
        } else {
            &self.title
        }
    }

    /// Whether there is a body worth summarizing
    pub fn has_content(&self) -> bool {
        self.content.as_ref().is_some_and(|c| !c.trim().is_empty())
    }

    /// Text handed to the summarizer: title, blank line, body.
    ///
    /// `None` without a body; a title alone is not summarized.
    pub fn summary_input(&self) -> Option<String> {
        match self.content.as_deref() {
            Some(body) if !body.trim().is_empty() => Some(format!("{}\n\n{}", self.title, body)),
            _ => None,
        }
    }
}
