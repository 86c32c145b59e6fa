//! Test doubles shared by the core unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use newsdesk_browser::{BrowserSession, FetchedDocument};
use newsdesk_feeds::FeedFetcher;
use newsdesk_shared::{
    Attachment, Category, EntryPayload, NewsRecord, NewsdeskError, RawEntry, Result,
    SourceDescriptor, SourceType,
};
use newsdesk_storage::Storage;

use crate::classifier::Candidate;
use crate::llm::LlmClient;
use crate::notify::Notifier;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub async fn temp_storage() -> Storage {
    let tmp = std::env::temp_dir().join(format!("nd_test_{}.db", Uuid::now_v7()));
    Storage::open(&tmp).await.expect("open test db")
}

pub fn rss_source(id: &str) -> SourceDescriptor {
    SourceDescriptor {
        id: id.into(),
        name: format!("Source {id}"),
        endpoint: format!("https://feeds.example/{id}"),
        source_type: SourceType::Rss,
        category: Category::Market,
        active: true,
    }
}

pub fn entry(link: &str, title: &str, hours_ago: i64) -> RawEntry {
    RawEntry {
        link: link.into(),
        title: title.into(),
        published_at: base_time() - Duration::hours(hours_ago),
        summary: format!("Ringkasan {title}"),
        payload: EntryPayload::Feed,
    }
}

pub fn candidate(source_id: &str, link: &str, title: &str, hours_ago: i64) -> Candidate {
    Candidate {
        source: rss_source(source_id),
        entry: entry(link, title, hours_ago),
    }
}

pub fn disclosure_candidate(emiten: &str, link: &str, hours_ago: i64) -> Candidate {
    let mut entry = entry(link, &format!("[{emiten}] Laporan Keuangan Tahunan"), hours_ago);
    entry.payload = EntryPayload::Disclosure {
        emiten: emiten.into(),
        announcement_no: format!("{emiten}-001"),
        announcement_type: "Laporan Keuangan".into(),
        subject: "Laporan Keuangan Tahunan".into(),
        attachments: vec![Attachment {
            url: format!("https://idx.example/files/{emiten}.pdf"),
            filename: format!("{emiten}.pdf"),
            supplementary: false,
        }],
    };
    Candidate {
        source: SourceDescriptor {
            id: "idx".into(),
            name: "IDX".into(),
            endpoint: "https://idx.example/api".into(),
            source_type: SourceType::DisclosureApi,
            category: Category::Disclosure,
            active: true,
        },
        entry,
    }
}

/// Replies with queued answers in order, then errors.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedLlm {
    pub fn new<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(str::to_string).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::new([])
    }

    /// `(system, user)` pairs seen so far.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete_json(&self, system: &str, user: &str, _max_tokens: u32) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| NewsdeskError::Llm("no scripted reply".into()))
    }
}

/// Serves a fixed entry list per source id; unknown sources fail.
#[derive(Default)]
pub struct StaticFeeds {
    feeds: Mutex<HashMap<String, Vec<RawEntry>>>,
}

impl StaticFeeds {
    pub fn set(&self, source_id: &str, entries: Vec<RawEntry>) {
        self.feeds
            .lock()
            .unwrap()
            .insert(source_id.to_string(), entries);
    }
}

#[async_trait]
impl FeedFetcher for StaticFeeds {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<RawEntry>> {
        self.feeds
            .lock()
            .unwrap()
            .get(&source.id)
            .cloned()
            .ok_or_else(|| NewsdeskError::fetch(&source.name, "connection refused"))
    }
}

/// Keeps everything it is told.
#[derive(Default)]
pub struct RecordingNotifier {
    pub inserted: Mutex<Vec<Vec<NewsRecord>>>,
    pub analyzed: Mutex<Vec<NewsRecord>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_inserted(&self, records: &[NewsRecord]) -> Result<()> {
        self.inserted.lock().unwrap().push(records.to_vec());
        Ok(())
    }

    async fn notify_analyzed(&self, record: &NewsRecord) -> Result<()> {
        self.analyzed.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Browser that never succeeds and counts teardown calls.
#[derive(Default)]
pub struct OfflineBrowser {
    pub closes: AtomicUsize,
}

impl OfflineBrowser {
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserSession for OfflineBrowser {
    async fn render(&self, _url: &str) -> Result<String> {
        Err(NewsdeskError::Browser("offline".into()))
    }

    async fn capture_json(&self, _page_url: &str, _marker: &str) -> Result<serde_json::Value> {
        Err(NewsdeskError::Browser("offline".into()))
    }

    async fn fetch_document(&self, _url: &str, _warmup_url: Option<&str>) -> Result<FetchedDocument> {
        Err(NewsdeskError::Browser("offline".into()))
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
