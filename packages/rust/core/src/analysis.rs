//! On-demand deep analysis of stored records.
//!
//! Extraction runs on the blocking pool through the extractor's blocking
//! façade, so the async caller only awaits a join handle.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use newsdesk_extract::Extractor;
use newsdesk_shared::{
    AnalysisAnnotation, Category, NewsRecord, NewsStatus, NewsdeskError, PipelineSettings, Result,
    Sentiment, truncate_chars,
};
use newsdesk_storage::Storage;

use crate::collect::ProgressReporter;
use crate::llm::LlmClient;
use crate::notify::Notifier;
use crate::prompts;

/// Outcome of a bulk analysis run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyzeReport {
    pub analyzed: usize,
    pub failed: usize,
}

/// Extracts article text and asks the model for an annotation.
pub struct Analyzer {
    extractor: Arc<Extractor>,
    llm: Arc<dyn LlmClient>,
    max_tokens: u32,
    char_budget: usize,
    min_content_length: usize,
    pause: Duration,
}

impl Analyzer {
    pub fn new(
        extractor: Arc<Extractor>,
        llm: Arc<dyn LlmClient>,
        max_tokens: u32,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            extractor,
            llm,
            max_tokens,
            char_budget: settings.analysis_char_budget,
            min_content_length: settings.min_content_length,
            pause: Duration::from_millis(settings.batch_pause_ms),
        }
    }

    /// Text handed to the model: the extracted article, or title + teaser
    /// when extraction comes up short.
    pub async fn source_text(&self, record: &NewsRecord) -> String {
        let extractor = Arc::clone(&self.extractor);
        let url = record.url.clone();
        let extracted =
            tokio::task::spawn_blocking(move || extractor.extract_blocking(&url)).await;

        let reason = match extracted {
            Ok(Ok(result)) if result.text.chars().count() >= self.min_content_length => {
                info!(id = %record.id, strategy = result.strategy.as_str(), chars = result.text.chars().count(), "article extracted");
                return result.text;
            }
            Ok(Ok(_)) => "extracted text too short".to_string(),
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("extraction task failed: {e}"),
        };

        warn!(id = %record.id, reason = %reason, "using title and teaser");
        format!("{}\n\n{}", record.title, record.rss_summary)
    }

    /// Produce an annotation. Model failures yield a neutral placeholder.
    #[instrument(skip_all, fields(id = %record.id))]
    pub async fn annotate(&self, record: &NewsRecord) -> AnalysisAnnotation {
        let text = self.source_text(record).await;
        let user = format!(
            "Analisis artikel berita keuangan berikut.\n\nJUDUL: {}\n\nISI ARTIKEL:\n{}\n\n{}",
            record.title,
            truncate_chars(&text, self.char_budget),
            prompts::ANALYSIS_FORMAT
        );

        let reply = self
            .llm
            .complete_json(prompts::ANALYSIS_SYSTEM, &user, self.max_tokens)
            .await
            .and_then(|raw| parse_annotation(&raw, record.category));

        match reply {
            Ok(annotation) => annotation,
            Err(e) => {
                error!(error = %e, "analysis failed, using neutral annotation");
                AnalysisAnnotation::neutral(record.category)
            }
        }
    }

    /// Analyze one record, persist the result and notify.
    pub async fn analyze_and_store(
        &self,
        storage: &Storage,
        notifier: &dyn Notifier,
        mut record: NewsRecord,
    ) -> Result<NewsRecord> {
        let annotation = self.annotate(&record).await;
        record.apply_analysis(annotation, Utc::now());
        storage.update(&record).await?;

        if let Err(e) = notifier.notify_analyzed(&record).await {
            warn!(id = %record.id, error = %e, "notification failed");
        }
        info!(id = %record.id, sentiment = %record.sentiment, "record analyzed");
        Ok(record)
    }

    /// Analyze raw records newest first, then shut the browser down.
    pub async fn analyze_pending(
        &self,
        storage: &Storage,
        notifier: &dyn Notifier,
        limit: Option<usize>,
        progress: &dyn ProgressReporter,
    ) -> Result<AnalyzeReport> {
        let pending = storage.get_by_status(NewsStatus::Raw, limit).await?;
        let total = pending.len();
        let mut report = AnalyzeReport::default();

        for (i, record) in pending.into_iter().enumerate() {
            if i > 0 && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
            progress.phase(&format!("[{}/{}] {}", i + 1, total, record.title));

            match self.analyze_and_store(storage, notifier, record).await {
                Ok(_) => report.analyzed += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(error = %e, "could not store analysis");
                }
            }
        }

        self.close_browser().await;
        info!(analyzed = report.analyzed, failed = report.failed, "analysis run complete");
        Ok(report)
    }

    /// Tear the shared browser down after a batch.
    pub async fn close_browser(&self) {
        if let Err(e) = self.extractor.browser().close().await {
            warn!(error = %e, "browser shutdown failed");
        }
    }
}

/// Validate the model's annotation JSON.
pub fn parse_annotation(raw: &str, fallback: Category) -> Result<AnalysisAnnotation> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| NewsdeskError::Llm(format!("analysis reply is not JSON: {e}")))?;
    let Some(obj) = value.as_object() else {
        return Err(NewsdeskError::Llm("analysis reply is not an object".into()));
    };

    let text = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    };
    let list = |key: &str| -> Vec<String> {
        obj.get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(scalar_text).collect())
            .unwrap_or_default()
    };

    let tags = list("tags")
        .into_iter()
        .map(|t| t.to_lowercase())
        .collect();

    Ok(AnalysisAnnotation {
        summary: text("summary"),
        sentiment_direction: Sentiment::parse(&text("sentiment_direction")).unwrap_or_default(),
        sentiment_reasoning: text("sentiment_reasoning"),
        category: Category::parse(&text("category")).unwrap_or(fallback),
        tags,
        ticker: obj.get("ticker").and_then(Value::as_str).and_then(valid_ticker),
        key_data: list("key_data"),
    })
}

/// Trimmed, non-empty text of a string or number.
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn valid_ticker(raw: &str) -> Option<String> {
    let code = raw.trim();
    if code.len() != 4 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    if code.eq_ignore_ascii_case("null") || code.eq_ignore_ascii_case("none") {
        return None;
    }
    Some(code.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::SilentProgress;
    use crate::testing::{OfflineBrowser, RecordingNotifier, ScriptedLlm, temp_storage};
    use newsdesk_shared::{HttpConfig, SourceType, record_id};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ARTICLE: &str = r#"<html><head><title>Rupiah menguat</title></head><body>
        <article>
          <p>Nilai tukar rupiah menguat 0,5 persen terhadap dolar AS pada penutupan perdagangan sore ini.</p>
          <p>Penguatan didorong aliran modal asing yang kembali masuk ke pasar obligasi pemerintah.</p>
        </article>
    </body></html>"#;

    const REPLY: &str = r#"{
        "summary": "Rupiah menguat didorong arus modal asing.",
        "sentiment_direction": "bullish",
        "sentiment_reasoning": "Arus masuk asing menopang pasar.",
        "category": "Macro",
        "tags": [" Rupiah ", "", "Obligasi", 2024],
        "ticker": "bbri",
        "key_data": ["Rupiah +0,5%"]
    }"#;

    fn record(url: &str, title: &str) -> NewsRecord {
        NewsRecord {
            id: record_id(url),
            title: title.into(),
            url: url.into(),
            published_at: Utc::now(),
            source_id: "a".into(),
            source_name: "A".into(),
            source_type: SourceType::Rss,
            category: Category::Market,
            sub_category: None,
            sentiment: Sentiment::Neutral,
            ticker: None,
            filter_reason: String::new(),
            rss_summary: "Ringkasan dari feed".into(),
            status: NewsStatus::Raw,
            collected_at: Utc::now(),
            analysis: None,
            analyzed_at: None,
        }
    }

    fn analyzer(llm: Arc<ScriptedLlm>, browser: Arc<OfflineBrowser>) -> Analyzer {
        let settings = PipelineSettings {
            batch_pause_ms: 0,
            ..PipelineSettings::default()
        };
        let extractor = Extractor::new(&HttpConfig::default(), settings.min_content_length, browser)
            .expect("extractor");
        Analyzer::new(Arc::new(extractor), llm, 512, &settings)
    }

    #[test]
    fn annotation_is_validated() {
        let a = parse_annotation(REPLY, Category::Market).unwrap();
        assert_eq!(a.sentiment_direction, Sentiment::Bullish);
        assert_eq!(a.category, Category::Macro);
        assert_eq!(a.tags, ["rupiah", "obligasi", "2024"]);
        assert_eq!(a.ticker.as_deref(), Some("BBRI"));
        assert_eq!(a.key_data, ["Rupiah +0,5%"]);
    }

    #[test]
    fn bad_labels_fall_back() {
        let raw = r#"{"sentiment_direction": "moon", "category": "Gossip", "ticker": "BBRI.JK", "tags": "x"}"#;
        let a = parse_annotation(raw, Category::Commodity).unwrap();
        assert_eq!(a.sentiment_direction, Sentiment::Neutral);
        assert_eq!(a.category, Category::Commodity);
        assert_eq!(a.ticker, None);
        assert!(a.tags.is_empty());

        let null_word = parse_annotation(r#"{"ticker": "null"}"#, Category::Market).unwrap();
        assert_eq!(null_word.ticker, None);
        assert!(parse_annotation("[]", Category::Market).is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn extracted_text_reaches_model_and_record_is_stored() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rupiah"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ARTICLE))
            .mount(&server)
            .await;

        let storage = temp_storage().await;
        let item = record(&format!("{}/rupiah", server.uri()), "Rupiah menguat");
        storage.save(&item).await.unwrap();

        let llm = Arc::new(ScriptedLlm::new([REPLY]));
        let notifier = RecordingNotifier::default();
        let analyzer = analyzer(llm.clone(), Arc::new(OfflineBrowser::default()));

        let updated = analyzer
            .analyze_and_store(&storage, &notifier, item)
            .await
            .unwrap();
        assert_eq!(updated.status, NewsStatus::Analyzed);
        assert_eq!(updated.category, Category::Macro);
        assert_eq!(updated.ticker.as_deref(), Some("BBRI"));

        let prompt = &llm.prompts()[0].1;
        assert!(prompt.contains("aliran modal asing"));

        let reloaded = storage.get_by_id(&updated.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, NewsStatus::Analyzed);
        assert_eq!(notifier.analyzed.lock().unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_extraction_and_model_still_complete() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let llm = Arc::new(ScriptedLlm::failing());
        let analyzer = analyzer(llm.clone(), Arc::new(OfflineBrowser::default()));
        let item = record(&format!("{}/hilang", server.uri()), "Saham teknologi anjlok");

        let annotation = analyzer.annotate(&item).await;
        assert_eq!(annotation, AnalysisAnnotation::neutral(Category::Market));

        let prompt = &llm.prompts()[0].1;
        assert!(prompt.contains("Saham teknologi anjlok\n\nRingkasan dari feed"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pending_run_closes_browser_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let storage = temp_storage().await;
        storage
            .save(&record(&format!("{}/a", server.uri()), "Ekspor nikel meningkat"))
            .await
            .unwrap();
        storage
            .save(&record(&format!("{}/b", server.uri()), "Inflasi Mei lebih rendah"))
            .await
            .unwrap();

        let browser = Arc::new(OfflineBrowser::default());
        let analyzer = analyzer(Arc::new(ScriptedLlm::new([REPLY])), browser.clone());
        let notifier = RecordingNotifier::default();

        let report = analyzer
            .analyze_pending(&storage, &notifier, None, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(report, AnalyzeReport { analyzed: 2, failed: 0 });
        assert_eq!(browser.close_count(), 1);
        assert!(
            storage
                .get_by_status(NewsStatus::Raw, None)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
