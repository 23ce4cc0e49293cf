use crate::fetcher::ExtractRules;

/// Builds the in-page JavaScript mirroring [`crate::fetcher::extract`]
pub struct ExtractionScript {
    rules: ExtractRules,
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn js_array(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

impl ExtractionScript {
    pub fn new(rules: ExtractRules) -> Self {
        Self { rules }
    }

    /// Script returning `{ title, link }` of the first search result.
    ///
    /// Both fields are empty strings when nothing matched.
    pub fn metadata_script(&self) -> String {
        let item_selector = js_string(&self.rules.result_item_selector);
        let link_selector = js_string(&self.rules.result_link_selector);

        format!(
            r#"
            (() => {{
                const item = document.querySelector({item_selector});
                const anchor = item ? item.querySelector({link_selector}) : null;
                if (!anchor) {{
                    return {{ title: '', link: '' }};
                }}
                return {{
                    title: (anchor.textContent || '').trim(),
                    link: anchor.href || ''
                }};
            }})()
            "#
        )
    }

    /// Script returning `{ content, image_url }` for an article page
    pub fn content_script(&self) -> String {
        let article_selectors = js_array(&self.rules.article_selectors);
        let image_selectors = js_array(&self.rules.image_selectors);
        let min_chars = self.rules.min_paragraph_chars;

        format!(
            r#"
            (() => {{
                const safeAll = (root, selector) => {{
                    try {{ return Array.from(root.querySelectorAll(selector)); }}
                    catch (e) {{ return []; }}
                }};

                let imageUrl = null;
                for (const selector of {image_selectors}) {{
                    const imgs = safeAll(document, selector);
                    if (imgs.length > 0) {{
                        const src = (imgs[0].getAttribute('src') || '').trim();
                        if (src.startsWith('//')) {{
                            imageUrl = 'https:' + src;
                        }} else if (src.startsWith('http')) {{
                            imageUrl = src;
                        }}
                        break;
                    }}
                }}

                let paragraphs = [];
                for (const selector of {article_selectors}) {{
                    const containers = safeAll(document, selector);
                    if (containers.length === 0) continue;
                    paragraphs = safeAll(containers[0], 'p')
                        .map(p => (p.textContent || '').trim())
                        .filter(t => t.length > 0);
                    if (paragraphs.length > 0) break;
                }}

                if (paragraphs.length === 0) {{
                    paragraphs = safeAll(document, 'p')
                        .map(p => (p.textContent || '').trim())
                        .filter(t => t.length > {min_chars});
                }}

                return {{
                    content: paragraphs.length > 0 ? paragraphs.join('\n\n') : null,
                    image_url: imageUrl
                }};
            }})()
            "#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_script_embeds_selectors() {
        let script = ExtractionScript::new(ExtractRules::default()).metadata_script();
        assert!(script.contains("\"div.articleItem\""));
        assert!(script.contains("\"div.textDiv a.title\""));
    }

    #[test]
    fn test_content_script_embeds_selector_chain() {
        let script = ExtractionScript::new(ExtractRules::default()).content_script();
        assert!(script.contains("[\"div.WYSIWYG.articlePage\"]"));
        assert!(script.contains("\"img.h-full.w-full.object-contain\""));
        assert!(script.contains("t.length > 20"));
    }

    #[test]
    fn test_selectors_with_quotes_are_escaped() {
        let rules = ExtractRules {
            result_item_selector: r#"div[data-kind="news"]"#.to_string(),
            ..ExtractRules::default()
        };
        let script = ExtractionScript::new(rules).metadata_script();
        assert!(script.contains(r#""div[data-kind=\"news\"]""#));
    }
}
