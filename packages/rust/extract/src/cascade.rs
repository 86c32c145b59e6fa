//! The escalating extraction cascade.
//!
//! HTML: plain fetch → text strategies → browser render → text strategies.
//! Documents: direct download → browser in-page fetch or real download.
//! The cascade stops at the first step that yields enough text.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::runtime::Handle;
use tracing::{debug, info, instrument};

use newsdesk_browser::BrowserSession;
use newsdesk_shared::{
    ExtractionResult, ExtractionStrategy, HttpConfig, NewsdeskError, Result, is_challenge_page,
};

use crate::html::{HtmlMethod, StrategyChain, char_len, visible_text};
use crate::{network, pdf};

/// Runs the cascade against one shared browser handle.
pub struct Extractor {
    client: Client,
    browser: Arc<dyn BrowserSession>,
    chain: StrategyChain,
    min_content_length: usize,
    document_timeout: Duration,
    runtime: Handle,
}

impl Extractor {
    /// Build an extractor bound to the current Tokio runtime.
    pub fn new(
        http: &HttpConfig,
        min_content_length: usize,
        browser: Arc<dyn BrowserSession>,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| NewsdeskError::Extraction(format!("no tokio runtime: {e}")))?;
        Ok(Self {
            client: network::build_client(http)?,
            browser,
            chain: StrategyChain::new(),
            min_content_length,
            document_timeout: Duration::from_secs(http.document_timeout_secs),
            runtime,
        })
    }

    /// The browser this extractor escalates to.
    pub fn browser(&self) -> &Arc<dyn BrowserSession> {
        &self.browser
    }

    /// Extract article text from `url`.
    ///
    /// Errors mean "no usable text"; callers fall back to the feed teaser.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn extract(&self, url: &str) -> Result<ExtractionResult> {
        let result = if pdf::is_pdf_url(url) {
            self.extract_document(url).await
        } else {
            self.extract_html(url).await
        };

        match &result {
            Ok(r) => info!(strategy = r.strategy.as_str(), chars = r.text.len(), "extracted"),
            Err(e) => info!(error = %e, "extraction failed"),
        }
        result
    }

    /// Blocking form of [`Extractor::extract`], for synchronous callers and
    /// `spawn_blocking` workers.
    pub fn extract_blocking(&self, url: &str) -> Result<ExtractionResult> {
        self.runtime.block_on(self.extract(url))
    }

    async fn extract_html(&self, url: &str) -> Result<ExtractionResult> {
        match network::fetch_html(&self.client, url).await {
            Ok(html) => {
                if let Some(result) = self.from_html(&html, false) {
                    return Ok(result);
                }
                debug!("plain fetch gave too little text, escalating");
            }
            Err(e) => debug!(error = %e, "plain fetch failed, escalating"),
        }

        let html = self.browser.render(url).await?;
        if is_challenge_page(&visible_text(&html)) {
            return Err(NewsdeskError::Blocked(url.to_string()));
        }
        self.from_html(&html, true).ok_or_else(|| {
            NewsdeskError::Extraction(format!(
                "less than {} characters of text at {url}",
                self.min_content_length
            ))
        })
    }

    fn from_html(&self, html: &str, rendered: bool) -> Option<ExtractionResult> {
        let (text, method) = self.chain.extract(html, self.min_content_length)?;
        let strategy = match (rendered, method) {
            (false, HtmlMethod::Readable) => ExtractionStrategy::NetworkReadable,
            (false, HtmlMethod::Selectors) => ExtractionStrategy::NetworkSelectors,
            (true, HtmlMethod::Readable) => ExtractionStrategy::BrowserReadable,
            (true, HtmlMethod::Selectors) => ExtractionStrategy::BrowserSelectors,
        };
        Some(ExtractionResult { text, strategy })
    }

    async fn extract_document(&self, url: &str) -> Result<ExtractionResult> {
        match pdf::download_direct(&self.client, url, self.document_timeout).await {
            Ok(bytes) => match pdf::pdf_text(bytes).await {
                Ok(text) if char_len(&text) >= self.min_content_length => {
                    return Ok(ExtractionResult {
                        text,
                        strategy: ExtractionStrategy::DocumentDirect,
                    });
                }
                Ok(_) => debug!("direct document has too little text"),
                Err(e) => debug!(error = %e, "direct document unreadable"),
            },
            Err(e) => debug!(error = %e, "direct download failed, escalating"),
        }

        let document = self
            .browser
            .fetch_document(url, pdf::warmup_for(url))
            .await?;
        let text = pdf::pdf_text(document.bytes).await?;
        if char_len(&text) < self.min_content_length {
            return Err(NewsdeskError::Extraction(format!(
                "document at {url} has too little text"
            )));
        }

        let strategy = if document.downloaded {
            ExtractionStrategy::DocumentDownload
        } else {
            ExtractionStrategy::DocumentInPage
        };
        Ok(ExtractionResult { text, strategy })
    }
}
