//! HTML extraction for search results and article pages.
//!
//! The functions here are pure so that both the HTTP tier and tests can
//! feed them markup directly. The renderer runs the same chain in-page,
//! see [`crate::renderer::ExtractionScript`].

use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use url::Url;

use crate::domain::{ArticleContent, ArticleMeta};
use crate::fetcher::ExtractRules;

fn parse_selector(raw: &str) -> Option<Selector> {
    match Selector::parse(raw) {
        Ok(selector) => Some(selector),
        Err(e) => {
            warn!(selector = raw, error = ?e, "Ignoring invalid selector");
            None
        }
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Resolve a possibly relative link against `base`
pub fn absolutize(link: &str, base: &Url) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }
    if link.starts_with("http") {
        return Some(link.to_string());
    }
    base.join(link).ok().map(|u| u.to_string())
}

/// Keep absolute and protocol-relative image sources, dropping the rest
pub fn normalize_image_src(src: &str) -> Option<String> {
    let src = src.trim();
    if let Some(rest) = src.strip_prefix("//") {
        Some(format!("https://{}", rest))
    } else if src.starts_with("http") {
        Some(src.to_string())
    } else {
        None
    }
}

/// Title and link of the first search result, if any
pub fn extract_metadata(html: &str, rules: &ExtractRules, base: &Url) -> Option<ArticleMeta> {
    let document = Html::parse_document(html);
    let item_selector = parse_selector(&rules.result_item_selector)?;
    let link_selector = parse_selector(&rules.result_link_selector)?;

    let item = document.select(&item_selector).next()?;
    let anchor = item.select(&link_selector).next()?;

    let title = element_text(anchor);
    let link = absolutize(anchor.value().attr("href")?, base)?;

    if title.is_empty() {
        return None;
    }

    Some(ArticleMeta { title, link })
}

/// Body paragraphs and lead image of an article page
pub fn extract_content(html: &str, rules: &ExtractRules) -> ArticleContent {
    let document = Html::parse_document(html);
    ArticleContent {
        content: extract_body(&document, rules),
        image_url: extract_image(&document, rules),
    }
}

fn extract_body(document: &Html, rules: &ExtractRules) -> Option<String> {
    let paragraph = parse_selector("p")?;

    for raw in &rules.article_selectors {
        let Some(selector) = parse_selector(raw) else {
            continue;
        };
        let Some(container) = document.select(&selector).next() else {
            continue;
        };

        let paragraphs: Vec<String> = container
            .select(&paragraph)
            .map(element_text)
            .filter(|text| !text.is_empty())
            .collect();

        if !paragraphs.is_empty() {
            return Some(paragraphs.join("\n\n"));
        }
    }

    // No container matched: keep only paragraphs long enough to be prose
    let paragraphs: Vec<String> = document
        .select(&paragraph)
        .map(element_text)
        .filter(|text| text.chars().count() > rules.min_paragraph_chars)
        .collect();

    if paragraphs.is_empty() {
        None
    } else {
        Some(paragraphs.join("\n\n"))
    }
}

fn extract_image(document: &Html, rules: &ExtractRules) -> Option<String> {
    for raw in &rules.image_selectors {
        let Some(selector) = parse_selector(raw) else {
            continue;
        };
        if let Some(img) = document.select(&selector).next() {
            return img.value().attr("src").and_then(normalize_image_src);
        }
    }
    None
}
