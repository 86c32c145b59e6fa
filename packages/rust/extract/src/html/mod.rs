//! Article-text strategies over parsed HTML.
//!
//! Strategies run in priority order: the readability pass first, then the
//! ordered CSS-selector list. The first one to produce enough text wins.

mod readable;
mod selectors;

use scraper::{Html, Selector};

pub use readable::ReadableStrategy;
pub use selectors::{ARTICLE_SELECTORS, SelectorStrategy};

/// Which family of strategy produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlMethod {
    Readable,
    Selectors,
}

/// A way of pulling article text out of a page.
pub trait TextStrategy: Send + Sync {
    /// Return article text at least `min_len` characters long, or `None`.
    /// `doc` is `html` already parsed.
    fn extract(&self, html: &str, doc: &Html, min_len: usize) -> Option<String>;

    fn method(&self) -> HtmlMethod;

    /// Human-readable strategy name for tracing.
    fn name(&self) -> &str;
}

/// Holds registered strategies in priority order.
pub struct StrategyChain {
    strategies: Vec<Box<dyn TextStrategy>>,
}

impl StrategyChain {
    /// Readable first, selectors last.
    pub fn new() -> Self {
        Self {
            strategies: vec![Box::new(ReadableStrategy), Box::new(SelectorStrategy)],
        }
    }

    /// Run every strategy until one yields enough text.
    pub fn extract(&self, html: &str, min_len: usize) -> Option<(String, HtmlMethod)> {
        let doc = Html::parse_document(html);
        for strategy in &self.strategies {
            if let Some(text) = strategy.extract(html, &doc, min_len) {
                tracing::debug!(strategy = strategy.name(), chars = text.len(), "text extracted");
                return Some((text, strategy.method()));
            }
        }
        None
    }
}

impl Default for StrategyChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Title plus visible body text, for interstitial detection.
pub fn visible_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let title_sel = Selector::parse("title").unwrap();
    let body_sel = Selector::parse("body").unwrap();

    let title = doc
        .select(&title_sel)
        .next()
        .map(|t| t.text().collect::<String>())
        .unwrap_or_default();
    let body = doc
        .select(&body_sel)
        .next()
        .map(|b| b.text().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();

    format!("{}\n{}", title.trim(), body.trim())
}

/// Remove every element matching `selector` from an HTML fragment.
pub(crate) fn strip_elements(html: &str, selector: &Selector) -> String {
    let doc = Html::parse_fragment(html);
    let mut result = html.to_string();
    for el in doc.select(selector) {
        let outer = el.html();
        result = result.replace(&outer, "");
    }
    result
}

pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = r#"<html><head><title>Harga emas naik</title></head><body>
        <nav><a href="/">Home</a></nav>
        <article>
          <h1>Harga emas naik</h1>
          <p>Harga emas dunia naik tajam pada perdagangan hari ini seiring melemahnya dolar AS.</p>
          <p>Analis memperkirakan tren kenaikan berlanjut hingga akhir pekan karena permintaan aset aman.</p>
          <p>Di dalam negeri, harga emas batangan produksi Antam ikut terkerek naik mengikuti pergerakan global.</p>
          <div class="share-buttons"><p>Bagikan artikel ini ke media sosial Anda sekarang juga</p></div>
        </article>
        <footer>Copyright</footer>
    </body></html>"#;

    #[test]
    fn readable_wins_on_article_page() {
        let (text, method) = StrategyChain::new().extract(ARTICLE, 100).expect("text");
        assert_eq!(method, HtmlMethod::Readable);
        assert!(text.contains("Harga emas dunia naik tajam"));
        assert!(!text.contains("Copyright"));
        assert!(!text.contains("Home"));
    }

    #[test]
    fn too_short_yields_nothing() {
        let html = "<html><body><article><p>Pendek sekali.</p></article></body></html>";
        assert!(StrategyChain::new().extract(html, 100).is_none());
    }

    #[test]
    fn visible_text_includes_title() {
        let text = visible_text("<html><head><title>Just a moment...</title></head><body>x</body></html>");
        assert!(newsdesk_shared::is_challenge_page(&text));
    }
}
