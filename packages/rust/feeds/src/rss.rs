//! RSS / Atom adapter.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use feed_rs::model::Entry;
use reqwest::Client;
use tracing::debug;

use newsdesk_shared::{
    EntryPayload, HttpConfig, NewsdeskError, RawEntry, Result, SourceDescriptor, SourceType,
    parse_timestamp,
};

use crate::{FeedFetcher, newest_first, teaser};

/// Fetches and parses syndication feeds.
pub struct RssFetcher {
    client: Client,
}

impl RssFetcher {
    pub fn new(http: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&http.user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(http.feed_timeout_secs))
            .build()
            .map_err(|e| NewsdeskError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for RssFetcher {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<RawEntry>> {
        let response = self
            .client
            .get(&source.endpoint)
            .send()
            .await
            .map_err(|e| NewsdeskError::fetch(&source.name, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewsdeskError::fetch(&source.name, format!("HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| NewsdeskError::fetch(&source.name, e.to_string()))?;
        parse_feed(&body).map_err(|e| NewsdeskError::fetch(&source.name, e))
    }
}

/// Parse a feed document into entries, newest first.
///
/// Dates go through the shared timestamp rules, so a naive `pubDate` is
/// read as UTC instead of being dropped.
pub fn parse_feed(body: &[u8]) -> std::result::Result<Vec<RawEntry>, String> {
    let feed = feed_rs::parser::Builder::new()
        .timestamp_parser(|raw| parse_timestamp(raw, SourceType::Rss))
        .build()
        .parse(body)
        .map_err(|e| format!("failed to parse feed: {e}"))?;

    let mut entries: Vec<RawEntry> = feed.entries.into_iter().filter_map(to_raw_entry).collect();
    newest_first(&mut entries);
    debug!(entries = entries.len(), "feed parsed");
    Ok(entries)
}

fn to_raw_entry(entry: Entry) -> Option<RawEntry> {
    let link = entry.links.first()?.href.trim().to_string();
    if link.is_empty() {
        return None;
    }

    let title = entry
        .title
        .map(|t| teaser(&t.content))
        .unwrap_or_default();

    let body = entry
        .content
        .and_then(|c| c.body)
        .filter(|b| !b.trim().is_empty())
        .or_else(|| entry.summary.map(|s| s.content));

    Some(RawEntry {
        link,
        title,
        published_at: entry.published.or(entry.updated).unwrap_or_else(Utc::now),
        summary: body.as_deref().map(teaser).unwrap_or_default(),
        payload: EntryPayload::Feed,
    })
}
