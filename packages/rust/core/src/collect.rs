//! One collection cycle: fetch → watermark diff → classify → dedup → persist
//! → notify.
//!
//! Sources are scanned strictly one after another. Watermarks are written
//! once, after everything else succeeded, so an aborted cycle is simply
//! repeated next time and the dedup gate absorbs the overlap.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, instrument, warn};

use newsdesk_feeds::FeedFetcher;
use newsdesk_shared::{NewsRecord, PipelineSettings, Result, SourceDescriptor, Watermark};
use newsdesk_storage::Storage;

use crate::classifier::{Candidate, Classified, Classifier};
use crate::notify::Notifier;
use crate::watermark::diff_new_entries;

/// Progress callback for front-ends.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each source has been fetched and diffed.
    fn source_scanned(&self, source: &str, new_entries: usize);
    /// Called when the cycle completes.
    fn done(&self, report: &CycleReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn source_scanned(&self, _source: &str, _new_entries: usize) {}
    fn done(&self, _report: &CycleReport) {}
}

/// Outcome of one cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub sources_scanned: usize,
    pub sources_failed: usize,
    pub sources_up_to_date: usize,
    pub entries_new: usize,
    pub relevant: usize,
    pub filtered_out: usize,
    /// Relevant entries the dedup gate turned away.
    pub rejected: usize,
    /// Newly stored records, newest first.
    pub inserted: Vec<NewsRecord>,
    pub elapsed: Duration,
}

/// Runs collection cycles against a fixed set of collaborators.
pub struct Collector {
    fetcher: Arc<dyn FeedFetcher>,
    classifier: Classifier,
    storage: Arc<Storage>,
    notifier: Arc<dyn Notifier>,
    settings: PipelineSettings,
}

impl Collector {
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        classifier: Classifier,
        storage: Arc<Storage>,
        notifier: Arc<dyn Notifier>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            fetcher,
            classifier,
            storage,
            notifier,
            settings,
        }
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Run one full cycle over the active `sources`, in order.
    ///
    /// Per-source failures are logged and skipped. Only a storage failure
    /// aborts the cycle, leaving every watermark untouched.
    #[instrument(skip_all, fields(sources = sources.len()))]
    pub async fn run_cycle(
        &self,
        sources: &[SourceDescriptor],
        progress: &dyn ProgressReporter,
    ) -> Result<CycleReport> {
        let start = Instant::now();
        let mut report = CycleReport::default();

        progress.phase("Loading watermarks");
        let mut watermarks = self.storage.load_watermarks().await?;

        // --- Phase 1: Scan ---
        progress.phase("Scanning sources");
        let mut candidates: Vec<Candidate> = Vec::new();

        for source in sources.iter().filter(|s| s.active) {
            report.sources_scanned += 1;

            let entries = match self.fetcher.fetch(source).await {
                Ok(entries) => entries,
                Err(e) => {
                    report.sources_failed += 1;
                    warn!(source = %source.name, error = %e, "source skipped");
                    progress.source_scanned(&source.name, 0);
                    continue;
                }
            };

            let last_top = watermarks.get(&source.id).map(|w| w.last_top_link.as_str());
            let diff = diff_new_entries(entries, last_top);

            let fetched_at = Utc::now();
            match diff.top_link {
                Some(top) => {
                    watermarks.insert(
                        source.id.clone(),
                        Watermark {
                            last_top_link: top,
                            last_fetched_at: fetched_at,
                            name: source.name.clone(),
                        },
                    );
                }
                None => {
                    if let Some(mark) = watermarks.get_mut(&source.id) {
                        mark.last_fetched_at = fetched_at;
                    }
                }
            }

            progress.source_scanned(&source.name, diff.entries.len());
            if diff.entries.is_empty() {
                report.sources_up_to_date += 1;
                info!(source = %source.name, "up to date");
                continue;
            }

            info!(source = %source.name, new = diff.entries.len(), "new entries");
            report.entries_new += diff.entries.len();
            candidates.extend(diff.entries.into_iter().map(|entry| Candidate {
                source: source.clone(),
                entry,
            }));
        }

        // --- Phase 2: Classify ---
        let mut relevant = if candidates.is_empty() {
            Vec::new()
        } else {
            progress.phase(&format!("Classifying {} entries", candidates.len()));
            self.classify_all(candidates).await
        };
        report.relevant = relevant.len();
        report.filtered_out = report.entries_new - relevant.len();

        // --- Phase 3: Order + persist ---
        relevant.sort_by(|a, b| b.published_at().cmp(&a.published_at()));

        if !relevant.is_empty() {
            progress.phase(&format!("Storing {} records", relevant.len()));
        }
        let collected_at = Utc::now();
        for classified in relevant {
            let record = classified.into_record(collected_at);
            if self.storage.save(&record).await? {
                report.inserted.push(record);
            } else {
                report.rejected += 1;
            }
        }

        // --- Phase 4: Watermarks ---
        self.storage.save_watermarks(&watermarks).await?;

        // --- Phase 5: Notify ---
        if !report.inserted.is_empty() {
            progress.phase("Notifying");
            if let Err(e) = self.notifier.notify_inserted(&report.inserted).await {
                warn!(error = %e, records = report.inserted.len(), "notification failed");
            }
        }

        report.elapsed = start.elapsed();
        info!(
            scanned = report.sources_scanned,
            failed = report.sources_failed,
            new = report.entries_new,
            relevant = report.relevant,
            inserted = report.inserted.len(),
            rejected = report.rejected,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "collection cycle complete"
        );
        progress.done(&report);

        Ok(report)
    }

    /// Classify in fixed-size batches with a short pause in between.
    async fn classify_all(&self, candidates: Vec<Candidate>) -> Vec<Classified> {
        let total = candidates.len();
        let batch_size = self.settings.batch_size.max(1);
        let pause = Duration::from_millis(self.settings.batch_pause_ms);

        let mut remaining = candidates.into_iter();
        let mut relevant = Vec::new();
        let mut offset = 0;

        loop {
            let batch: Vec<Candidate> = remaining.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                break;
            }
            if offset > 0 && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            let len = batch.len();
            info!(from = offset + 1, to = offset + len, total, "classifier batch");
            relevant.extend(self.classifier.classify(batch).await);
            offset += len;
        }

        info!(
            relevant = relevant.len(),
            filtered_out = total - relevant.len(),
            "classification complete"
        );
        relevant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        RecordingNotifier, ScriptedLlm, StaticFeeds, base_time, entry, rss_source, temp_storage,
    };
    use newsdesk_shared::{Category, NewsStatus, Sentiment, SourceType, record_id};

    struct Harness {
        collector: Collector,
        storage: Arc<Storage>,
        feeds: Arc<StaticFeeds>,
        llm: Arc<ScriptedLlm>,
        notifier: Arc<RecordingNotifier>,
    }

    async fn harness<'a>(replies: impl IntoIterator<Item = &'a str>) -> Harness {
        let storage = Arc::new(temp_storage().await);
        let feeds = Arc::new(StaticFeeds::default());
        let llm = Arc::new(ScriptedLlm::new(replies));
        let notifier = Arc::new(RecordingNotifier::default());
        let settings = PipelineSettings {
            batch_pause_ms: 0,
            ..PipelineSettings::default()
        };
        let collector = Collector::new(
            feeds.clone(),
            Classifier::new(llm.clone(), 512),
            storage.clone(),
            notifier.clone(),
            settings,
        );
        Harness {
            collector,
            storage,
            feeds,
            llm,
            notifier,
        }
    }

    fn stored(url: &str, title: &str) -> NewsRecord {
        NewsRecord {
            id: record_id(url),
            title: title.into(),
            url: url.into(),
            published_at: base_time(),
            source_id: "old".into(),
            source_name: "Old".into(),
            source_type: SourceType::Rss,
            category: Category::Commodity,
            sub_category: None,
            sentiment: Sentiment::Neutral,
            ticker: None,
            filter_reason: String::new(),
            rss_summary: String::new(),
            status: NewsStatus::Raw,
            collected_at: base_time(),
            analysis: None,
            analyzed_at: None,
        }
    }

    #[tokio::test]
    async fn two_sources_end_to_end() {
        let h = harness([r#"{"results": [
            {"index": 1, "relevant": true, "category": "Market", "sentiment": "bullish", "reason": "IHSG"},
            {"index": 2, "relevant": false, "reason": "hiburan"},
            {"index": 3, "relevant": true, "category": "Commodity", "sentiment": "bullish"},
            {"index": 4, "relevant": true, "category": "Macro", "sentiment": "neutral"},
            {"index": 5, "relevant": false},
            {"index": 6, "relevant": true, "category": "Macro", "sentiment": "bearish"}
        ]}"#])
        .await;

        h.storage
            .save(&stored(
                "https://old.example/emas",
                "Harga emas Antam naik Rp5.000 per gram hari ini",
            ))
            .await
            .unwrap();

        h.feeds.set(
            "a",
            vec![
                entry("https://a.example/1", "IHSG ditutup menguat tajam sore ini", 1),
                entry("https://a.example/2", "Artis ibu kota merayakan ulang tahun", 3),
                entry("https://a.example/3", "Harga emas Antam naik Rp5.000 per gram", 5),
            ],
        );
        h.feeds.set(
            "b",
            vec![
                entry("https://b.example/1", "Bank Indonesia pertahankan suku bunga acuan", 2),
                entry("https://b.example/2", "Tim sepak bola nasional menang telak", 4),
                entry("https://b.example/3", "Rupiah melemah terhadap dolar AS", 6),
            ],
        );
        let sources = [rss_source("a"), rss_source("b")];

        let report = h
            .collector
            .run_cycle(&sources, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.sources_scanned, 2);
        assert_eq!(report.entries_new, 6);
        assert_eq!(report.relevant, 4);
        assert_eq!(report.filtered_out, 2);
        assert_eq!(report.rejected, 1);

        let urls: Vec<&str> = report.inserted.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            ["https://a.example/1", "https://b.example/1", "https://b.example/3"]
        );
        assert_eq!(h.storage.get_all().await.unwrap().len(), 4);

        let marks = h.storage.load_watermarks().await.unwrap();
        assert_eq!(marks["a"].last_top_link, "https://a.example/1");
        assert_eq!(marks["b"].last_top_link, "https://b.example/1");

        let notified = h.notifier.inserted.lock().unwrap().clone();
        assert_eq!(notified.len(), 1);
        let notified_urls: Vec<&str> = notified[0].iter().map(|r| r.url.as_str()).collect();
        assert_eq!(notified_urls, urls);
        assert!(
            notified[0]
                .windows(2)
                .all(|w| w[0].published_at >= w[1].published_at)
        );
    }

    #[tokio::test]
    async fn second_cycle_sees_only_new_top() {
        let h = harness([
            r#"{"results": [{"index": 1, "relevant": true}, {"index": 2, "relevant": true}]}"#,
            r#"{"results": [{"index": 1, "relevant": true}]}"#,
        ])
        .await;
        let sources = [rss_source("a")];

        h.feeds.set(
            "a",
            vec![
                entry("https://a.example/1", "Saham perbankan memimpin penguatan", 2),
                entry("https://a.example/2", "Ekspor batu bara turun tajam", 3),
            ],
        );
        let first = h.collector.run_cycle(&sources, &SilentProgress).await.unwrap();
        assert_eq!(first.inserted.len(), 2);

        h.feeds.set(
            "a",
            vec![
                entry("https://a.example/0", "Investor asing catat beli bersih", 1),
                entry("https://a.example/1", "Saham perbankan memimpin penguatan", 2),
                entry("https://a.example/2", "Ekspor batu bara turun tajam", 3),
            ],
        );
        let second = h.collector.run_cycle(&sources, &SilentProgress).await.unwrap();
        assert_eq!(second.entries_new, 1);
        assert_eq!(second.inserted[0].url, "https://a.example/0");

        let third = h.collector.run_cycle(&sources, &SilentProgress).await.unwrap();
        assert_eq!(third.sources_up_to_date, 1);
        assert!(third.inserted.is_empty());
        assert_eq!(h.llm.prompts().len(), 2);
    }

    #[tokio::test]
    async fn same_url_across_cycles_stored_once() {
        // No replies scripted: every batch passes through unfiltered.
        let h = harness([]).await;
        let sources = [rss_source("a")];
        h.feeds.set(
            "a",
            vec![entry("https://a.example/1", "Obligasi negara diburu investor", 1)],
        );
        h.collector.run_cycle(&sources, &SilentProgress).await.unwrap();

        // Watermark lost: the whole feed looks new again.
        h.storage
            .save_watermarks(&Default::default())
            .await
            .unwrap();
        let again = h.collector.run_cycle(&sources, &SilentProgress).await.unwrap();

        assert_eq!(again.entries_new, 1);
        assert_eq!(again.rejected, 1);
        assert_eq!(h.storage.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_source_does_not_advance_watermark() {
        let h = harness([]).await;
        h.feeds.set(
            "a",
            vec![entry("https://a.example/1", "Laba emiten tambang melonjak", 1)],
        );
        let sources = [rss_source("a"), rss_source("down")];

        let report = h
            .collector
            .run_cycle(&sources, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(report.sources_failed, 1);
        assert_eq!(report.inserted.len(), 1);

        let marks = h.storage.load_watermarks().await.unwrap();
        assert!(marks.contains_key("a"));
        assert!(!marks.contains_key("down"));
    }

    #[tokio::test]
    async fn inactive_sources_are_not_scanned() {
        let h = harness([]).await;
        let mut paused = rss_source("a");
        paused.active = false;

        let report = h
            .collector
            .run_cycle(&[paused], &SilentProgress)
            .await
            .unwrap();
        assert_eq!(report.sources_scanned, 0);
        assert!(h.notifier.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn batches_are_capped() {
        let h = harness([]).await;
        let entries: Vec<_> = (0..45)
            .map(|i| {
                entry(
                    &format!("https://a.example/{i}"),
                    &format!("Judul berita nomor {i} {}", "x".repeat(i)),
                    i as i64,
                )
            })
            .collect();
        h.feeds.set("a", entries);

        h.collector
            .run_cycle(&[rss_source("a")], &SilentProgress)
            .await
            .unwrap();
        // 20 + 20 + 5
        assert_eq!(h.llm.prompts().len(), 3);
    }
}
