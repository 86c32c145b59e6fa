//! Shared headless browser for pages that resist plain HTTP.
//!
//! One Chromium process is launched lazily on first use and reused for the
//! life of the [`BrowserManager`]. Every fetch runs in its own browser
//! context so cookies and storage never leak between sites.
//!
//! Async callers use the [`BrowserSession`] trait. Synchronous callers (the
//! on-demand analysis path runs on a blocking thread) use the `*_blocking`
//! methods on [`BrowserManager`], which drive the same instance through the
//! runtime handle captured at construction.

mod manager;
mod scripts;

use async_trait::async_trait;

use newsdesk_shared::Result;

pub use manager::BrowserManager;

/// Bytes of a document retrieved through the browser.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,
    /// `true` when the bytes came from a real file download rather than an
    /// in-page fetch.
    pub downloaded: bool,
}

/// Operations the rest of the pipeline needs from a real browser.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate to `url`, get past interstitials, and return the final HTML.
    async fn render(&self, url: &str) -> Result<String>;

    /// Load `page_url` and return the first JSON response whose request URL
    /// contains `marker`. Falls back to parsing the page's own body text.
    async fn capture_json(&self, page_url: &str, marker: &str) -> Result<serde_json::Value>;

    /// Download a binary document with the browser's cookies. When
    /// `warmup_url` is set it is visited first to establish a session.
    async fn fetch_document(&self, url: &str, warmup_url: Option<&str>) -> Result<FetchedDocument>;

    /// Shut the browser down. Safe to call repeatedly.
    async fn close(&self) -> Result<()>;
}
