//! Generic article extraction via trafilatura: main content only, with
//! navigation, ads and other boilerplate dropped.

use scraper::Html;

use newsdesk_shared::clean_text;

use super::{HtmlMethod, TextStrategy, char_len};

/// Library-backed main-content pass. Works on arbitrary news pages.
pub struct ReadableStrategy;

impl TextStrategy for ReadableStrategy {
    fn extract(&self, html: &str, _doc: &Html, min_len: usize) -> Option<String> {
        let result = match rs_trafilatura::extract(html) {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(error = %e, "trafilatura found no content");
                return None;
            }
        };
        let text = clean_text(&result.content_text);
        (!text.is_empty() && char_len(&text) >= min_len).then_some(text)
    }

    fn method(&self) -> HtmlMethod {
        HtmlMethod::Readable
    }

    fn name(&self) -> &str {
        "readable"
    }
}
