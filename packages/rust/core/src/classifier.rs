//! Batch relevance and sentiment classification.
//!
//! The model's reply is validated before it is trusted. A reply that does
//! not have the expected shape fails open: the whole sub-batch passes
//! through unfiltered instead of being dropped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use newsdesk_shared::{
    Category, NewsRecord, NewsStatus, NewsdeskError, RawEntry, Result, Sentiment,
    SourceDescriptor, SourceType, record_id, truncate_chars,
};

use crate::llm::LlmClient;
use crate::prompts;

/// Sub-category assigned to disclosures the model leaves unlabelled.
pub const DEFAULT_SUB_CATEGORY: &str = "lainnya";

/// Financial-report sub-categories; these link straight to the report file.
const REPORT_SUB_CATEGORIES: [&str; 2] = ["lapkeu_tahunan", "lapkeu_kuartal"];

/// Teaser characters shown to the model per news item.
const PROMPT_SUMMARY_CHARS: usize = 200;

/// A new feed entry together with the source it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub source: SourceDescriptor,
    pub entry: RawEntry,
}

/// A candidate the classifier kept (or passed through).
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub candidate: Candidate,
    /// Record URL; differs from the entry link for financial reports.
    pub url: String,
    pub category: Category,
    pub sub_category: Option<String>,
    pub sentiment: Sentiment,
    pub reason: String,
}

impl Classified {
    pub fn published_at(&self) -> DateTime<Utc> {
        self.candidate.entry.published_at
    }

    /// Build the raw record that goes through the dedup gate.
    pub fn into_record(self, collected_at: DateTime<Utc>) -> NewsRecord {
        let Candidate { source, entry } = self.candidate;
        NewsRecord {
            id: record_id(&self.url),
            ticker: ticker_from_emiten(entry.payload.emiten()),
            title: entry.title,
            url: self.url,
            published_at: entry.published_at,
            source_id: source.id,
            source_name: source.name,
            source_type: source.source_type,
            category: self.category,
            sub_category: self.sub_category,
            sentiment: self.sentiment,
            filter_reason: self.reason,
            rss_summary: entry.summary,
            status: NewsStatus::Raw,
            collected_at,
            analysis: None,
            analyzed_at: None,
        }
    }
}

/// Emitter codes double as tickers when they look like one.
pub fn ticker_from_emiten(emiten: &str) -> Option<String> {
    let code = emiten.trim();
    (code.len() == 4 && code.chars().all(|c| c.is_ascii_alphabetic()))
        .then(|| code.to_ascii_uppercase())
}

// ---------------------------------------------------------------------------
// Reply shape
// ---------------------------------------------------------------------------

/// The classifier reply after shape validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierReply {
    /// `results` is a list; items are validated one by one.
    Results(Vec<Value>),
    /// `results` is missing or not a list.
    UnexpectedShape,
}

impl ClassifierReply {
    /// Parse raw model output. Invalid JSON is an error.
    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| NewsdeskError::ClassificationShape(format!("invalid JSON: {e}")))?;
        let reply = match value {
            Value::Object(mut map) => match map.remove("results") {
                Some(Value::Array(items)) => Self::Results(items),
                _ => Self::UnexpectedShape,
            },
            _ => Self::UnexpectedShape,
        };
        Ok(reply)
    }
}

/// One validated, relevant item of a reply.
#[derive(Debug, Clone, PartialEq)]
struct ItemVerdict {
    /// Zero-based position in the submitted sub-batch.
    position: usize,
    category: Option<Category>,
    sub_category: Option<String>,
    sentiment: Sentiment,
    reason: String,
}

/// Validate one reply item. Irrelevant or malformed items yield `None`.
fn parse_item(item: &Value, batch_len: usize) -> Option<ItemVerdict> {
    let Some(obj) = item.as_object() else {
        warn!("classifier item is not an object, ignored");
        return None;
    };

    if obj.get("relevant") != Some(&Value::Bool(true)) {
        return None;
    }

    let index = obj.get("index").and_then(Value::as_u64)? as usize;
    if index == 0 || index > batch_len {
        debug!(index, batch_len, "classifier index out of range");
        return None;
    }

    let text = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    Some(ItemVerdict {
        position: index - 1,
        category: text("category").and_then(Category::parse),
        sub_category: text("sub_category").map(str::to_string),
        sentiment: text("sentiment")
            .and_then(Sentiment::parse)
            .unwrap_or_default(),
        reason: text("reason").unwrap_or_default().to_string(),
    })
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchKind {
    News,
    Disclosure,
}

impl BatchKind {
    fn label(self) -> &'static str {
        match self {
            Self::News => "news",
            Self::Disclosure => "disclosure",
        }
    }

    fn system_prompt(self) -> &'static str {
        match self {
            Self::News => prompts::NEWS_FILTER_SYSTEM,
            Self::Disclosure => prompts::DISCLOSURE_FILTER_SYSTEM,
        }
    }

    fn user_prompt(self, candidates: &[Candidate]) -> String {
        let lines: Vec<String> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| match self {
                Self::News => {
                    let mut line = format!("{}. [{}] {}", i + 1, c.source.name, c.entry.title);
                    if !c.entry.summary.is_empty() {
                        line.push_str("\n   ");
                        line.push_str(truncate_chars(&c.entry.summary, PROMPT_SUMMARY_CHARS));
                    }
                    line
                }
                Self::Disclosure => match c.entry.payload.attachment_count() {
                    0 => format!("{}. {}", i + 1, c.entry.title),
                    n => format!("{}. {} ({n} file)", i + 1, c.entry.title),
                },
            })
            .collect();

        let (noun, format) = match self {
            Self::News => ("berita", prompts::NEWS_FILTER_FORMAT),
            Self::Disclosure => ("keterbukaan informasi IDX", prompts::DISCLOSURE_FILTER_FORMAT),
        };
        format!(
            "Berikut {} {noun}:\n\n{}\n\n{format}",
            candidates.len(),
            lines.join("\n")
        )
    }
}

/// Filters candidates through the model.
pub struct Classifier {
    llm: Arc<dyn LlmClient>,
    max_tokens: u32,
}

impl Classifier {
    pub fn new(llm: Arc<dyn LlmClient>, max_tokens: u32) -> Self {
        Self { llm, max_tokens }
    }

    /// Classify one batch. News and disclosures get separate prompts.
    ///
    /// Returns the relevant candidates; entries the model could not judge
    /// are returned unfiltered.
    pub async fn classify(&self, batch: Vec<Candidate>) -> Vec<Classified> {
        let (disclosures, news): (Vec<_>, Vec<_>) = batch
            .into_iter()
            .partition(|c| c.source.source_type == SourceType::DisclosureApi);

        let mut kept = Vec::new();
        if !news.is_empty() {
            kept.extend(self.classify_sub_batch(BatchKind::News, news).await);
        }
        if !disclosures.is_empty() {
            kept.extend(
                self.classify_sub_batch(BatchKind::Disclosure, disclosures)
                    .await,
            );
        }
        kept
    }

    async fn classify_sub_batch(&self, kind: BatchKind, candidates: Vec<Candidate>) -> Vec<Classified> {
        info!(kind = kind.label(), entries = candidates.len(), "classifying");

        let user = kind.user_prompt(&candidates);
        let reply = self
            .llm
            .complete_json(kind.system_prompt(), &user, self.max_tokens)
            .await
            .and_then(|raw| ClassifierReply::parse(&raw));

        let items = match reply {
            Ok(ClassifierReply::Results(items)) => items,
            Ok(ClassifierReply::UnexpectedShape) => {
                warn!(
                    kind = kind.label(),
                    entries = candidates.len(),
                    "classifier reply has no results list, passing batch through"
                );
                return pass_through(candidates);
            }
            Err(e) => {
                warn!(
                    kind = kind.label(),
                    entries = candidates.len(),
                    error = %e,
                    "classifier failed, passing batch through"
                );
                return pass_through(candidates);
            }
        };

        let batch_len = candidates.len();
        let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
        let mut kept = Vec::new();

        for verdict in items.iter().filter_map(|item| parse_item(item, batch_len)) {
            // A repeated index keeps the first verdict.
            let Some(candidate) = slots[verdict.position].take() else {
                continue;
            };
            kept.push(match kind {
                BatchKind::News => Classified {
                    url: candidate.entry.link.clone(),
                    category: verdict.category.unwrap_or_default(),
                    sub_category: None,
                    sentiment: verdict.sentiment,
                    reason: verdict.reason,
                    candidate,
                },
                BatchKind::Disclosure => disclosure_verdict(candidate, verdict),
            });
        }

        debug!(
            kind = kind.label(),
            kept = kept.len(),
            dropped = batch_len - kept.len(),
            "sub-batch classified"
        );
        kept
    }
}

fn disclosure_verdict(candidate: Candidate, verdict: ItemVerdict) -> Classified {
    let sub_category = verdict
        .sub_category
        .unwrap_or_else(|| DEFAULT_SUB_CATEGORY.to_string());

    let mut url = candidate.entry.link.clone();
    if REPORT_SUB_CATEGORIES.contains(&sub_category.as_str()) {
        if let Some(report) = candidate.entry.payload.primary_attachment() {
            url = report.url.clone();
        }
    }

    Classified {
        url,
        category: Category::Disclosure,
        sub_category: Some(sub_category),
        sentiment: verdict.sentiment,
        reason: verdict.reason,
        candidate,
    }
}

fn pass_through(candidates: Vec<Candidate>) -> Vec<Classified> {
    candidates
        .into_iter()
        .map(|candidate| Classified {
            url: candidate.entry.link.clone(),
            category: candidate.source.category,
            sub_category: None,
            sentiment: Sentiment::Neutral,
            reason: String::new(),
            candidate,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedLlm, candidate, disclosure_candidate};

    fn classifier(llm: &Arc<ScriptedLlm>) -> Classifier {
        Classifier::new(llm.clone(), 512)
    }

    #[test]
    fn reply_shapes() {
        assert!(matches!(
            ClassifierReply::parse(r#"{"results": []}"#).unwrap(),
            ClassifierReply::Results(v) if v.is_empty()
        ));
        assert_eq!(
            ClassifierReply::parse(r#"{"results": {"index": 1}}"#).unwrap(),
            ClassifierReply::UnexpectedShape
        );
        assert_eq!(
            ClassifierReply::parse(r#"[1, 2]"#).unwrap(),
            ClassifierReply::UnexpectedShape
        );
        assert!(ClassifierReply::parse("not json").is_err());
    }

    #[test]
    fn ticker_only_for_four_letter_codes() {
        assert_eq!(ticker_from_emiten("bbri").as_deref(), Some("BBRI"));
        assert_eq!(ticker_from_emiten("BRPT1"), None);
        assert_eq!(ticker_from_emiten(""), None);
    }

    #[tokio::test]
    async fn keeps_relevant_items_and_validates_labels() {
        let llm = Arc::new(ScriptedLlm::new([r#"{"results": [
            {"index": 2, "relevant": true, "category": "Macro", "sentiment": "bearish", "reason": "BI rate"},
            {"index": 1, "relevant": false, "reason": "hiburan"},
            {"index": 3, "relevant": true, "category": "Gossip", "sentiment": "ecstatic"},
            {"index": 9, "relevant": true},
            "garbage",
            {"index": 2, "relevant": true, "category": "Market"}
        ]}"#]));
        let batch = vec![
            candidate("rss-1", "https://n.example/a", "Artis menikah", 3),
            candidate("rss-1", "https://n.example/b", "BI tahan suku bunga", 2),
            candidate("rss-1", "https://n.example/c", "IHSG ditutup menguat", 1),
        ];

        let kept = classifier(&llm).classify(batch).await;
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].url, "https://n.example/b");
        assert_eq!(kept[0].category, Category::Macro);
        assert_eq!(kept[0].sentiment, Sentiment::Bearish);
        assert_eq!(kept[0].reason, "BI rate");
        assert_eq!(kept[1].category, Category::Market);
        assert_eq!(kept[1].sentiment, Sentiment::Neutral);

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].1.contains("2. [Source rss-1] BI tahan suku bunga"));
    }

    #[tokio::test]
    async fn non_list_results_pass_whole_batch() {
        let llm = Arc::new(ScriptedLlm::new([r#"{"results": "none relevant"}"#]));
        let batch = vec![
            candidate("rss-1", "https://n.example/a", "A", 2),
            candidate("rss-1", "https://n.example/b", "B", 1),
        ];

        let kept = classifier(&llm).classify(batch).await;
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|c| c.sentiment == Sentiment::Neutral));
        assert!(kept.iter().all(|c| c.category == Category::Market));
    }

    #[tokio::test]
    async fn model_failure_passes_batch() {
        let llm = Arc::new(ScriptedLlm::failing());
        let kept = classifier(&llm)
            .classify(vec![candidate("rss-1", "https://n.example/a", "A", 1)])
            .await;
        assert_eq!(kept.len(), 1);
    }

    #[tokio::test]
    async fn disclosures_get_their_own_prompt() {
        let llm = Arc::new(ScriptedLlm::new([
            r#"{"results": [{"index": 1, "relevant": true, "category": "Market", "sentiment": "bullish"}]}"#,
            r#"{"results": [
                {"index": 1, "relevant": true, "sub_category": "lapkeu_tahunan", "sentiment": "bullish"},
                {"index": 2, "relevant": true, "sentiment": "neutral"}
            ]}"#,
        ]));
        let batch = vec![
            disclosure_candidate("BBRI", "https://idx.example/detail/1", 3),
            candidate("rss-1", "https://n.example/a", "IHSG naik", 2),
            disclosure_candidate("TLKM", "https://idx.example/detail/2", 1),
        ];

        let kept = classifier(&llm).classify(batch).await;
        assert_eq!(kept.len(), 3);

        let report = kept
            .iter()
            .find(|c| c.candidate.entry.payload.emiten() == "BBRI")
            .unwrap();
        assert_eq!(report.category, Category::Disclosure);
        assert_eq!(report.sub_category.as_deref(), Some("lapkeu_tahunan"));
        assert_eq!(report.url, "https://idx.example/files/BBRI.pdf");

        let other = kept
            .iter()
            .find(|c| c.candidate.entry.payload.emiten() == "TLKM")
            .unwrap();
        assert_eq!(other.sub_category.as_deref(), Some(DEFAULT_SUB_CATEGORY));
        assert_eq!(other.url, "https://idx.example/detail/2");

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[1].0, prompts::DISCLOSURE_FILTER_SYSTEM);
        assert!(prompts[1].1.contains("(1 file)"));

        let record = report.clone().into_record(Utc::now());
        assert_eq!(record.ticker.as_deref(), Some("BBRI"));
        assert_eq!(record.id, record_id("https://idx.example/files/BBRI.pdf"));
    }
}
