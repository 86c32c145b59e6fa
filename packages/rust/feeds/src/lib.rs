//! Feed adapters: syndication feeds, the exchange disclosure API, and the
//! social news API.
//!
//! Every adapter turns one [`SourceDescriptor`] into an ordered list of
//! [`RawEntry`] values, newest first, with timestamps already normalized to
//! UTC. [`FeedRouter`] picks the adapter by source type.

pub mod disclosure;
pub mod rss;
pub mod social;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use newsdesk_browser::BrowserSession;
use newsdesk_shared::{
    HttpConfig, RawEntry, Result, SourceDescriptor, SourceType, clean_text, strip_html,
    truncate_chars,
};

pub use disclosure::{DisclosureFetcher, parse_disclosures};
pub use rss::RssFetcher;
pub use social::{SocialFetcher, parse_social};

/// Feed teasers are capped at this many characters.
pub const SUMMARY_MAX_CHARS: usize = 500;

/// Fetches the current entries of one source.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<RawEntry>>;
}

/// Dispatches to the adapter matching the source type.
pub struct FeedRouter {
    rss: RssFetcher,
    disclosure: DisclosureFetcher,
    social: SocialFetcher,
}

impl FeedRouter {
    pub fn new(http: &HttpConfig, browser: Arc<dyn BrowserSession>) -> Result<Self> {
        Ok(Self {
            rss: RssFetcher::new(http)?,
            disclosure: DisclosureFetcher::new(http, browser)?,
            social: SocialFetcher::new(http)?,
        })
    }
}

#[async_trait]
impl FeedFetcher for FeedRouter {
    #[instrument(skip_all, fields(source = %source.name, kind = %source.source_type))]
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<RawEntry>> {
        let entries = match source.source_type {
            SourceType::Rss => self.rss.fetch(source).await?,
            SourceType::DisclosureApi => self.disclosure.fetch(source).await?,
            SourceType::SocialApi => self.social.fetch(source).await?,
        };
        info!(entries = entries.len(), "source fetched");
        Ok(entries)
    }
}

/// Strip markup, collapse whitespace and cap the length of a teaser.
pub fn teaser(raw: &str) -> String {
    let text = clean_text(&strip_html(raw));
    truncate_chars(&text, SUMMARY_MAX_CHARS).to_string()
}

/// Order entries newest first. Stable, so same-instant entries keep the
/// upstream order.
pub fn newest_first(entries: &mut [RawEntry]) {
    entries.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}
