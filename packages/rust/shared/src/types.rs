//! Core domain types for the news pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NewsdeskError, Result};

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Upstream feed flavor. Drives adapter dispatch and timestamp policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Syndication feed (RSS / Atom).
    Rss,
    /// Regulatory disclosure API (announcement + attachments).
    DisclosureApi,
    /// Social-post API.
    SocialApi,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rss => "rss",
            Self::DisclosureApi => "disclosure_api",
            Self::SocialApi => "social_api",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceType {
    type Err = NewsdeskError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rss" => Ok(Self::Rss),
            "disclosure_api" => Ok(Self::DisclosureApi),
            "social_api" => Ok(Self::SocialApi),
            other => Err(NewsdeskError::validation(format!(
                "unknown source type: {other}"
            ))),
        }
    }
}

/// A registered feed source. The `id` never changes once assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: String,
    pub name: String,
    /// Feed URL or API endpoint.
    pub endpoint: String,
    pub source_type: SourceType,
    /// Default category for entries that pass the classifier unlabelled.
    #[serde(default)]
    pub category: Category,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

// ---------------------------------------------------------------------------
// RawEntry (transient, lives for one fetch cycle)
// ---------------------------------------------------------------------------

/// A document attached to a disclosure announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Absolute URL of the file.
    pub url: String,
    pub filename: String,
    /// Supplementary file (lampiran) rather than the main document.
    pub supplementary: bool,
}

/// Source-type-specific payload carried alongside a [`RawEntry`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryPayload {
    #[default]
    Feed,
    Disclosure {
        emiten: String,
        announcement_no: String,
        announcement_type: String,
        subject: String,
        attachments: Vec<Attachment>,
    },
    Social {
        post_id: String,
        external_url: Option<String>,
    },
}

impl EntryPayload {
    /// The first non-supplementary attachment, if this is a disclosure.
    pub fn primary_attachment(&self) -> Option<&Attachment> {
        match self {
            Self::Disclosure { attachments, .. } => {
                attachments.iter().find(|a| !a.supplementary)
            }
            _ => None,
        }
    }

    pub fn attachment_count(&self) -> usize {
        match self {
            Self::Disclosure { attachments, .. } => attachments.len(),
            _ => 0,
        }
    }

    /// Emitter code for disclosures, empty otherwise.
    pub fn emiten(&self) -> &str {
        match self {
            Self::Disclosure { emiten, .. } => emiten,
            _ => "",
        }
    }
}

/// One normalized item from any feed adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub link: String,
    pub title: String,
    /// Normalized to UTC by the adapter.
    pub published_at: DateTime<Utc>,
    /// Plain-text teaser (at most 500 chars), may be empty.
    pub summary: String,
    pub payload: EntryPayload,
}

// ---------------------------------------------------------------------------
// Watermarks
// ---------------------------------------------------------------------------

/// Per-source "last seen" marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    pub last_top_link: String,
    pub last_fetched_at: DateTime<Utc>,
    /// Source display name, kept for operator readability.
    #[serde(default)]
    pub name: String,
}

/// Source id → watermark. Read and written wholesale once per cycle.
pub type WatermarkMap = BTreeMap<String, Watermark>;

// ---------------------------------------------------------------------------
// Classification vocabulary
// ---------------------------------------------------------------------------

/// News category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    #[default]
    Market,
    Macro,
    Commodity,
    Sectoral,
    #[serde(rename = "Corporate Action")]
    CorporateAction,
    Disclosure,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Self::Market,
        Self::Macro,
        Self::Commodity,
        Self::Sectoral,
        Self::CorporateAction,
        Self::Disclosure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "Market",
            Self::Macro => "Macro",
            Self::Commodity => "Commodity",
            Self::Sectoral => "Sectoral",
            Self::CorporateAction => "Corporate Action",
            Self::Disclosure => "Disclosure",
        }
    }

    /// Exact-label lookup. Unknown labels yield `None`.
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == label)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Neutral => "neutral",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "bullish" => Some(Self::Bullish),
            "bearish" => Some(Self::Bearish),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// NewsRecord
// ---------------------------------------------------------------------------

/// Lifecycle state of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsStatus {
    #[default]
    Raw,
    Analyzed,
}

impl NewsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Analyzed => "analyzed",
        }
    }
}

impl std::str::FromStr for NewsStatus {
    type Err = NewsdeskError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "raw" => Ok(Self::Raw),
            "analyzed" => Ok(Self::Analyzed),
            other => Err(NewsdeskError::validation(format!("unknown status: {other}"))),
        }
    }
}

/// Output of the deep-analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisAnnotation {
    pub summary: String,
    pub sentiment_direction: Sentiment,
    #[serde(default)]
    pub sentiment_reasoning: String,
    pub category: Category,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Four-letter exchange ticker, uppercased.
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub key_data: Vec<String>,
}

impl AnalysisAnnotation {
    /// Neutral placeholder used when the analysis service fails.
    pub fn neutral(category: Category) -> Self {
        Self {
            summary: String::new(),
            sentiment_direction: Sentiment::Neutral,
            sentiment_reasoning: String::new(),
            category,
            tags: Vec::new(),
            ticker: None,
            key_data: Vec::new(),
        }
    }
}

/// A persisted news item. `id` is derived from `url` (see [`crate::record_id`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub source_id: String,
    pub source_name: String,
    pub source_type: SourceType,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    pub sentiment: Sentiment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default)]
    pub filter_reason: String,
    #[serde(default)]
    pub rss_summary: String,
    pub status: NewsStatus,
    pub collected_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisAnnotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl NewsRecord {
    /// Fold an analysis result into this record and mark it analyzed.
    pub fn apply_analysis(&mut self, annotation: AnalysisAnnotation, at: DateTime<Utc>) {
        self.category = annotation.category;
        self.sentiment = annotation.sentiment_direction;
        if let Some(ticker) = &annotation.ticker {
            self.ticker = Some(ticker.clone());
        }
        self.status = NewsStatus::Analyzed;
        self.analysis = Some(annotation);
        self.analyzed_at = Some(at);
    }
}

/// Aggregate counts over the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewsStats {
    pub total: usize,
    pub raw: usize,
    pub analyzed: usize,
    /// `(label, count)` sorted by count descending.
    pub by_category: Vec<(String, usize)>,
    pub by_sub_category: Vec<(String, usize)>,
    pub by_sentiment: Vec<(String, usize)>,
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Which cascade step produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    NetworkReadable,
    NetworkSelectors,
    BrowserReadable,
    BrowserSelectors,
    DocumentDirect,
    DocumentInPage,
    DocumentDownload,
}

impl ExtractionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkReadable => "network+readable",
            Self::NetworkSelectors => "network+selectors",
            Self::BrowserReadable => "browser+readable",
            Self::BrowserSelectors => "browser+selectors",
            Self::DocumentDirect => "document:direct",
            Self::DocumentInPage => "document:in-page",
            Self::DocumentDownload => "document:download",
        }
    }
}

/// Successful extraction: text of at least the configured minimum length.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    pub text: String,
    pub strategy: ExtractionStrategy,
}
