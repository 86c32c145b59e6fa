//! Exchange disclosure (keterbukaan informasi) adapter.
//!
//! The API sits behind bot protection. A cookie-holding session request is
//! tried first; anything that is not a 200 JSON response escalates to the
//! shared browser, which intercepts the API call made by the page itself.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, ORIGIN, REFERER};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use newsdesk_browser::BrowserSession;
use newsdesk_shared::time::naive_offset;
use newsdesk_shared::{
    Attachment, DISCLOSURE_LANDING_URL, DISCLOSURE_ORIGIN, EntryPayload, HttpConfig,
    NewsdeskError, RawEntry, Result, SourceDescriptor, SourceType, normalize_timestamp,
};

use crate::{FeedFetcher, newest_first};

/// Substring of the API path the browser watches for.
pub const CAPTURE_MARKER: &str = "GetAnnouncement";

static DATE_TO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"dateTo=\d+").expect("dateTo regex"));

/// Session-first, browser-fallback disclosure fetcher.
pub struct DisclosureFetcher {
    client: Client,
    browser: Arc<dyn BrowserSession>,
    landing_url: String,
}

impl DisclosureFetcher {
    pub fn new(http: &HttpConfig, browser: Arc<dyn BrowserSession>) -> Result<Self> {
        Self::with_landing_url(http, browser, DISCLOSURE_LANDING_URL)
    }

    /// Use a different landing page for the session warm-up.
    pub fn with_landing_url(
        http: &HttpConfig,
        browser: Arc<dyn BrowserSession>,
        landing_url: &str,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ORIGIN, HeaderValue::from_static(DISCLOSURE_ORIGIN));
        headers.insert(
            HeaderName::from_static("x-requested-with"),
            HeaderValue::from_static("XMLHttpRequest"),
        );
        let referer = HeaderValue::from_str(landing_url)
            .map_err(|e| NewsdeskError::config(format!("invalid landing url: {e}")))?;
        headers.insert(REFERER, referer);

        let client = Client::builder()
            .user_agent(&http.user_agent)
            .default_headers(headers)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(http.api_timeout_secs))
            .build()
            .map_err(|e| NewsdeskError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            browser,
            landing_url: landing_url.to_string(),
        })
    }

    /// Direct request with a warmed-up cookie session.
    async fn fetch_via_session(&self, url: &str) -> Result<Value> {
        if let Err(e) = self.client.get(&self.landing_url).send().await {
            debug!(error = %e, "landing page warm-up failed");
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NewsdeskError::Blocked(format!("{url}: {e}")))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if status != reqwest::StatusCode::OK || !content_type.contains("json") {
            return Err(NewsdeskError::Blocked(format!(
                "{url}: HTTP {status}, content-type '{content_type}'"
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| NewsdeskError::Blocked(format!("{url}: invalid JSON: {e}")))
    }
}

#[async_trait]
impl FeedFetcher for DisclosureFetcher {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<RawEntry>> {
        let url = with_current_date(&source.endpoint);

        let data = match self.fetch_via_session(&url).await {
            Ok(data) => data,
            Err(e) => {
                info!(reason = %e, "disclosure API blocked, escalating to browser");
                self.browser
                    .capture_json(&url, CAPTURE_MARKER)
                    .await
                    .map_err(|e| {
                        NewsdeskError::fetch(&source.name, format!("both methods failed: {e}"))
                    })?
            }
        };

        parse_disclosures(&data).map_err(|e| NewsdeskError::fetch(&source.name, e.to_string()))
    }
}

/// Point the `dateTo` query parameter at today (exchange-local date).
pub fn with_current_date(endpoint: &str) -> String {
    let today = Utc::now()
        .with_timezone(&naive_offset(SourceType::DisclosureApi))
        .format("%Y%m%d");
    DATE_TO_RE
        .replace_all(endpoint, format!("dateTo={today}").as_str())
        .into_owned()
}

// ---------------------------------------------------------------------------
// Response shape
// ---------------------------------------------------------------------------

/// Top-level layouts the API has been seen to return.
#[derive(Debug)]
enum DisclosureReply<'a> {
    /// `{"Replies": [{"pengumuman": {...}, "attachments": [...]}]}`
    Replies(&'a [Value]),
    /// `{"Results": [...]}` / `{"results": [...]}` / bare array of flat items.
    Flat(&'a [Value]),
    UnexpectedShape,
}

impl<'a> DisclosureReply<'a> {
    fn classify(data: &'a Value) -> Self {
        if let Some(replies) = data.get("Replies").and_then(Value::as_array) {
            if !replies.is_empty() {
                return Self::Replies(replies);
            }
        }
        for key in ["Results", "results"] {
            if let Some(items) = data.get(key).and_then(Value::as_array) {
                return Self::Flat(items);
            }
        }
        match data {
            Value::Array(items) => Self::Flat(items),
            Value::Object(obj) if obj.contains_key("Replies") => Self::Flat(&[]),
            _ => Self::UnexpectedShape,
        }
    }
}

/// Parse an API payload into entries, newest first.
pub fn parse_disclosures(data: &Value) -> Result<Vec<RawEntry>> {
    let items: Vec<(&Map<String, Value>, &[Value])> = match DisclosureReply::classify(data) {
        DisclosureReply::Replies(replies) => replies
            .iter()
            .filter_map(Value::as_object)
            .map(|reply| {
                let announcement = reply.get("pengumuman").and_then(Value::as_object);
                let attachments = attachments_of(reply);
                (announcement, attachments)
            })
            .filter_map(|(a, att)| a.map(|a| (a, att)))
            .collect(),
        DisclosureReply::Flat(items) => items
            .iter()
            .filter_map(Value::as_object)
            .map(|item| (item, attachments_of(item)))
            .collect(),
        DisclosureReply::UnexpectedShape => {
            return Err(NewsdeskError::validation(
                "disclosure response has an unexpected shape",
            ));
        }
    };

    let mut entries: Vec<RawEntry> = items
        .into_iter()
        .filter_map(|(announcement, attachments)| to_raw_entry(announcement, attachments))
        .collect();
    newest_first(&mut entries);
    debug!(entries = entries.len(), "disclosures parsed");
    Ok(entries)
}

fn attachments_of(obj: &Map<String, Value>) -> &[Value] {
    obj.get("attachments")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn to_raw_entry(announcement: &Map<String, Value>, raw_attachments: &[Value]) -> Option<RawEntry> {
    let emiten = first_str(announcement, &["Kode_Emiten", "kode_emiten"]);
    let judul = first_str(
        announcement,
        &["JudulPengumuman", "judul", "PerihalPengumuman", "perihal"],
    );
    let date = first_str(announcement, &["TglPengumuman", "tanggal", "CreatedDate"]);

    let attachments: Vec<Attachment> = raw_attachments
        .iter()
        .filter_map(Value::as_object)
        .filter_map(parse_attachment)
        .collect();

    let link = match attachments
        .iter()
        .find(|a| !a.supplementary)
        .or_else(|| attachments.first())
    {
        Some(att) => att.url.clone(),
        None => {
            let id = first_str(announcement, &["Id2", "Id"]);
            if id.is_empty() {
                warn!(title = %judul, "announcement without link, skipping");
                return None;
            }
            format!("{DISCLOSURE_LANDING_URL}{id}")
        }
    };

    let title = if emiten.is_empty() {
        judul.clone()
    } else {
        format!("[{emiten}] {judul}")
    };

    Some(RawEntry {
        link,
        title,
        published_at: normalize_timestamp(&date, SourceType::DisclosureApi),
        summary: String::new(),
        payload: EntryPayload::Disclosure {
            emiten,
            announcement_no: first_str(announcement, &["NoPengumuman"]),
            announcement_type: first_str(announcement, &["JenisPengumuman"]),
            subject: first_str(announcement, &["PerihalPengumuman"]),
            attachments,
        },
    })
}

fn parse_attachment(att: &Map<String, Value>) -> Option<Attachment> {
    let mut url = first_str(att, &["FullSavePath"]);
    if url.is_empty() {
        url = first_str(att, &["file_path", "FilePath"]);
        if !url.is_empty() && !url.starts_with("http") {
            url = format!("{DISCLOSURE_ORIGIN}{url}");
        }
    }
    if url.is_empty() {
        return None;
    }

    Some(Attachment {
        url,
        filename: first_str(att, &["OriginalFilename", "PDFFilename"]),
        supplementary: att
            .get("IsAttachment")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

/// First non-empty string (or number) among `keys`, trimmed.
fn first_str(obj: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| match obj.get(*k)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}
