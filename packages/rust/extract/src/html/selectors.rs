//! Priority-ordered CSS selectors, from site-specific to bare `article`.

use scraper::{Html, Selector};

use newsdesk_shared::clean_text;

use super::{HtmlMethod, TextStrategy, char_len, strip_elements};

/// Tried in order; the first container that yields enough text wins.
pub const ARTICLE_SELECTORS: &[&str] = &[
    // Indonesian portals
    "div.detail-in",
    "div.article",
    ".detail__body-text",
    ".read__content",
    ".article__content",
    // Common CMS classes
    ".article-body",
    ".post-content",
    ".entry-content",
    ".story-body",
    ".content-body",
    ".detail-content",
    ".newsDetail",
    // Partial class matches
    r#"[class*="article-body"]"#,
    r#"[class*="article-content"]"#,
    r#"[class*="post-content"]"#,
    r#"[class*="entry-content"]"#,
    r#"[class*="story-body"]"#,
    r#"[class*="content-body"]"#,
    r#"[class*="detail-content"]"#,
    r#"[itemprop="articleBody"]"#,
    "article",
];

const NOISE: &str = "script, style, nav, aside, footer, iframe, noscript, \
     [class*='related'], [class*='banner'], [class*='ads'], [class*='promo'], \
     [class*='social'], [class*='share'], [class*='comment'], [class*='sidebar'], \
     [class*='widget'], [class*='tag']";

/// Paragraphs shorter than this inside a matched container are boilerplate.
const MIN_PARAGRAPH_CHARS: usize = 20;

/// Paragraphs shorter than this are ignored by the whole-body fallback.
const MIN_LOOSE_PARAGRAPH_CHARS: usize = 30;

/// Selector-list strategy with a whole-body paragraph fallback.
pub struct SelectorStrategy;

impl TextStrategy for SelectorStrategy {
    fn extract(&self, _html: &str, doc: &Html, min_len: usize) -> Option<String> {
        let noise = Selector::parse(NOISE).unwrap();

        for sel_str in ARTICLE_SELECTORS {
            let Ok(sel) = Selector::parse(sel_str) else {
                continue;
            };
            let Some(container) = doc.select(&sel).next() else {
                continue;
            };

            let cleaned = strip_elements(&container.inner_html(), &noise);
            if let Some(text) = container_text(&cleaned, min_len) {
                tracing::debug!(selector = sel_str, "selector matched");
                return Some(text);
            }
        }

        loose_paragraphs(doc, min_len)
    }

    fn method(&self) -> HtmlMethod {
        HtmlMethod::Selectors
    }

    fn name(&self) -> &str {
        "selectors"
    }
}

/// Paragraph text of a cleaned container, else all of its text.
fn container_text(html: &str, min_len: usize) -> Option<String> {
    let fragment = Html::parse_fragment(html);
    let p_sel = Selector::parse("p").unwrap();

    let paragraphs: Vec<String> = fragment
        .select(&p_sel)
        .map(|p| clean_text(&p.text().collect::<String>()))
        .filter(|t| char_len(t) > MIN_PARAGRAPH_CHARS)
        .collect();
    let joined = paragraphs.join("\n\n");
    if char_len(&joined) >= min_len {
        return Some(joined);
    }

    let all = clean_text(&fragment.root_element().text().collect::<Vec<_>>().join(" "));
    (char_len(&all) >= min_len).then_some(all)
}

/// Every `<p>` in the body long enough to be prose.
fn loose_paragraphs(doc: &Html, min_len: usize) -> Option<String> {
    let p_sel = Selector::parse("body p").unwrap();
    let joined = doc
        .select(&p_sel)
        .map(|p| clean_text(&p.text().collect::<String>()))
        .filter(|t| char_len(t) > MIN_LOOSE_PARAGRAPH_CHARS)
        .collect::<Vec<_>>()
        .join("\n\n");
    (char_len(&joined) >= min_len).then_some(joined)
}
