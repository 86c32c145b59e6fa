//! Social news API adapter.
//!
//! The upstream shape drifts without notice, so the payload is validated
//! item by item instead of deserialized into a fixed struct.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use newsdesk_shared::{
    EntryPayload, HttpConfig, NewsdeskError, RawEntry, Result, SourceDescriptor, SourceType,
    normalize_timestamp, truncate_chars,
};

use crate::{FeedFetcher, newest_first, teaser};

/// Fallback post permalink when an item has no external link.
const POST_URL_PREFIX: &str = "https://stockbit.com/post/";

/// Characters of post content used when an item has no title.
const TITLE_FALLBACK_CHARS: usize = 100;

pub struct SocialFetcher {
    client: Client,
}

impl SocialFetcher {
    pub fn new(http: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&http.user_agent)
            .timeout(Duration::from_secs(http.feed_timeout_secs))
            .build()
            .map_err(|e| NewsdeskError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for SocialFetcher {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<RawEntry>> {
        let response = self
            .client
            .get(&source.endpoint)
            .send()
            .await
            .map_err(|e| NewsdeskError::fetch(&source.name, e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(NewsdeskError::fetch(&source.name, format!("HTTP {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| NewsdeskError::fetch(&source.name, format!("invalid JSON: {e}")))?;
        parse_social(&body).map_err(|e| NewsdeskError::fetch(&source.name, e.to_string()))
    }
}

/// Parse `{"data": [...]}` into entries, newest first.
pub fn parse_social(body: &Value) -> Result<Vec<RawEntry>> {
    let Some(items) = body.get("data").and_then(Value::as_array) else {
        warn!("social API: 'data' is not a list");
        return Err(NewsdeskError::validation(
            "social API response has an unexpected shape",
        ));
    };

    let mut entries: Vec<RawEntry> = items.iter().filter_map(to_raw_entry).collect();
    newest_first(&mut entries);
    debug!(entries = entries.len(), skipped = items.len() - entries.len(), "posts parsed");
    Ok(entries)
}

fn to_raw_entry(item: &Value) -> Option<RawEntry> {
    let obj = item.as_object()?;
    let post_id = match obj.get("postid")? {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let text = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let external_url = text("titleurl").map(str::to_string);
    let link = external_url
        .clone()
        .unwrap_or_else(|| format!("{POST_URL_PREFIX}{post_id}"));

    let content = text("content").unwrap_or("");
    let title = match text("title") {
        Some(t) => t.to_string(),
        None => truncate_chars(content, TITLE_FALLBACK_CHARS).to_string(),
    };

    Some(RawEntry {
        link,
        title,
        published_at: normalize_timestamp(text("created").unwrap_or(""), SourceType::SocialApi),
        summary: teaser(content),
        payload: EntryPayload::Social {
            post_id,
            external_url,
        },
    })
}
