//! libSQL storage layer for collected news and per-source watermarks.
//!
//! The [`Storage`] struct wraps a local libSQL database. Every insert goes
//! through the dedup gate in [`dedup`]; `save` returns `false` when the gate
//! rejects a record, which callers treat as an expected outcome.
//!
//! **Access rules:**
//! - Collection cycles and analysis: read-write via [`Storage::open`]
//! - Reporting commands: read-only via [`Storage::open_readonly`]

pub mod dedup;
mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use tracing::warn;

use newsdesk_shared::{
    AnalysisAnnotation, Category, NewsRecord, NewsStats, NewsStatus, NewsdeskError, Result,
    Sentiment, Watermark, WatermarkMap,
};

pub use dedup::{DedupVerdict, find_near_duplicate, title_similarity};

/// Default near-duplicate threshold.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.75;

const NEWS_COLUMNS: &str = "id, title, url, published_at, source_id, source_name, source_type, \
     category, sub_category, sentiment, ticker, filter_reason, rss_summary, status, \
     collected_at, analysis_json, analyzed_at";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
    similarity_threshold: f64,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| NewsdeskError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode. Never creates
    /// the file or runs migrations.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(NewsdeskError::Storage(format!(
                "no database at {}, run a collection first",
                path.display()
            )));
        }
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        })
    }

    /// Override the near-duplicate title threshold.
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    NewsdeskError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(NewsdeskError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Dedup gate
    // -----------------------------------------------------------------------

    /// Whether a record with exactly this URL exists.
    pub async fn url_exists(&self, url: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query("SELECT 1 FROM news WHERE url = ?1 LIMIT 1", params![url])
            .await
            .map_err(storage_err)?;
        Ok(matches!(rows.next().await, Ok(Some(_))))
    }

    /// All stored titles, for the similarity scan.
    pub async fn all_titles(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query("SELECT title FROM news", params![])
            .await
            .map_err(storage_err)?;

        let mut titles = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            titles.push(row.get::<String>(0).map_err(storage_err)?);
        }
        Ok(titles)
    }

    /// Run a candidate through the exact-URL and near-duplicate checks.
    pub async fn check_dedup(&self, url: &str, title: &str) -> Result<DedupVerdict> {
        if self.url_exists(url).await? {
            return Ok(DedupVerdict::DuplicateUrl);
        }
        let titles = self.all_titles().await?;
        let verdict = match find_near_duplicate(
            title,
            titles.iter().map(String::as_str),
            self.similarity_threshold,
        ) {
            Some((matched, score)) => DedupVerdict::NearDuplicate {
                matched: matched.to_string(),
                score,
            },
            None => DedupVerdict::Accept,
        };
        Ok(verdict)
    }

    // -----------------------------------------------------------------------
    // News operations
    // -----------------------------------------------------------------------

    /// Insert a record if it passes the dedup gate. Returns `false` on rejection.
    pub async fn save(&self, record: &NewsRecord) -> Result<bool> {
        self.check_writable()?;

        match self.check_dedup(&record.url, &record.title).await? {
            DedupVerdict::Accept => {}
            DedupVerdict::DuplicateUrl => {
                warn!(url = %record.url, "duplicate url, skipping");
                return Ok(false);
            }
            DedupVerdict::NearDuplicate { matched, score } => {
                warn!(
                    title = %record.title,
                    matched = %matched,
                    score = format!("{score:.2}"),
                    "near-duplicate title, skipping"
                );
                return Ok(false);
            }
        }

        let analysis_json = encode_analysis(record.analysis.as_ref())?;
        let inserted = self
            .conn
            .execute(
                &format!(
                    "INSERT INTO news ({NEWS_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                     ON CONFLICT(id) DO NOTHING"
                ),
                params![
                    record.id.as_str(),
                    record.title.as_str(),
                    record.url.as_str(),
                    record.published_at.to_rfc3339(),
                    record.source_id.as_str(),
                    record.source_name.as_str(),
                    record.source_type.as_str(),
                    record.category.as_str(),
                    record.sub_category.as_deref(),
                    record.sentiment.as_str(),
                    record.ticker.as_deref(),
                    record.filter_reason.as_str(),
                    record.rss_summary.as_str(),
                    record.status.as_str(),
                    record.collected_at.to_rfc3339(),
                    analysis_json,
                    record.analyzed_at.map(|t| t.to_rfc3339()),
                ],
            )
            .await
            .map_err(storage_err)?;

        if inserted == 0 {
            warn!(id = %record.id, url = %record.url, "id collision, skipping");
        }
        Ok(inserted > 0)
    }

    /// Rewrite the mutable fields of an existing record.
    pub async fn update(&self, record: &NewsRecord) -> Result<()> {
        self.check_writable()?;
        let analysis_json = encode_analysis(record.analysis.as_ref())?;
        let changed = self
            .conn
            .execute(
                "UPDATE news SET
                   title = ?2, category = ?3, sub_category = ?4, sentiment = ?5, ticker = ?6,
                   filter_reason = ?7, rss_summary = ?8, status = ?9, analysis_json = ?10,
                   analyzed_at = ?11
                 WHERE id = ?1",
                params![
                    record.id.as_str(),
                    record.title.as_str(),
                    record.category.as_str(),
                    record.sub_category.as_deref(),
                    record.sentiment.as_str(),
                    record.ticker.as_deref(),
                    record.filter_reason.as_str(),
                    record.rss_summary.as_str(),
                    record.status.as_str(),
                    analysis_json,
                    record.analyzed_at.map(|t| t.to_rfc3339()),
                ],
            )
            .await
            .map_err(storage_err)?;

        if changed == 0 {
            return Err(NewsdeskError::Storage(format!(
                "no record with id {}",
                record.id
            )));
        }
        Ok(())
    }

    /// Look up by full id, or by a unique id prefix.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<NewsRecord>> {
        let exact = self
            .query_news(
                &format!("SELECT {NEWS_COLUMNS} FROM news WHERE id = ?1"),
                params![id],
            )
            .await?;
        if let Some(record) = exact.into_iter().next() {
            return Ok(Some(record));
        }

        let pattern = format!("{}%", escape_like(id));
        let mut matches = self
            .query_news(
                &format!("SELECT {NEWS_COLUMNS} FROM news WHERE id LIKE ?1 ESCAPE '\\' LIMIT 2"),
                params![pattern],
            )
            .await?;

        match matches.len() {
            1 => Ok(matches.pop()),
            0 => Ok(None),
            _ => {
                tracing::error!(prefix = id, "ambiguous id prefix");
                Ok(None)
            }
        }
    }

    /// All records, most recently collected first.
    pub async fn get_all(&self) -> Result<Vec<NewsRecord>> {
        self.query_news(
            &format!(
                "SELECT {NEWS_COLUMNS} FROM news ORDER BY collected_at DESC, published_at DESC"
            ),
            params![],
        )
        .await
    }

    /// Records in the given status, most recently collected first.
    pub async fn get_by_status(
        &self,
        status: NewsStatus,
        limit: Option<usize>,
    ) -> Result<Vec<NewsRecord>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        self.query_news(
            &format!(
                "SELECT {NEWS_COLUMNS} FROM news WHERE status = ?1
                 ORDER BY collected_at DESC, published_at DESC LIMIT ?2"
            ),
            params![status.as_str(), limit],
        )
        .await
    }

    /// Case-insensitive keyword search over title and teaser.
    pub async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<NewsRecord>> {
        let pattern = format!("%{}%", escape_like(&keyword.to_lowercase()));
        self.query_news(
            &format!(
                "SELECT {NEWS_COLUMNS} FROM news
                 WHERE lower(title) LIKE ?1 ESCAPE '\\' OR lower(rss_summary) LIKE ?1 ESCAPE '\\'
                 ORDER BY published_at DESC LIMIT ?2"
            ),
            params![pattern, limit as i64],
        )
        .await
    }

    /// Delete records published more than `days` ago. Returns the count removed.
    pub async fn delete_older_than(&self, days: u32) -> Result<u64> {
        self.check_writable()?;
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        let removed = self
            .conn
            .execute(
                "DELETE FROM news WHERE published_at < ?1",
                params![cutoff.to_rfc3339()],
            )
            .await
            .map_err(storage_err)?;
        tracing::info!(removed, days, "pruned old records");
        Ok(removed)
    }

    /// Totals plus category / sub-category / sentiment breakdowns.
    pub async fn stats(&self) -> Result<NewsStats> {
        let by_status = self.group_count("status").await?;
        let lookup = |key: &str| {
            by_status
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, n)| *n)
                .unwrap_or(0)
        };

        Ok(NewsStats {
            total: by_status.iter().map(|(_, n)| n).sum(),
            raw: lookup(NewsStatus::Raw.as_str()),
            analyzed: lookup(NewsStatus::Analyzed.as_str()),
            by_category: self.group_count("category").await?,
            by_sub_category: self.group_count("sub_category").await?,
            by_sentiment: self.group_count("sentiment").await?,
        })
    }

    async fn group_count(&self, column: &'static str) -> Result<Vec<(String, usize)>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {column}, COUNT(*) FROM news WHERE {column} IS NOT NULL
                     GROUP BY {column} ORDER BY COUNT(*) DESC, {column}"
                ),
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut counts = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let key: String = row.get(0).map_err(storage_err)?;
            let count: i64 = row.get(1).map_err(storage_err)?;
            counts.push((key, count as usize));
        }
        Ok(counts)
    }

    async fn query_news(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<NewsRecord>> {
        let mut rows = self.conn.query(sql, params).await.map_err(storage_err)?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_news_record(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Watermark operations
    // -----------------------------------------------------------------------

    /// Load the full watermark map.
    pub async fn load_watermarks(&self) -> Result<WatermarkMap> {
        let mut rows = self
            .conn
            .query(
                "SELECT source_id, last_top_link, last_fetched_at, name FROM watermarks",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut map = WatermarkMap::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let source_id: String = row.get(0).map_err(storage_err)?;
            let fetched: String = row.get(2).map_err(storage_err)?;
            map.insert(
                source_id,
                Watermark {
                    last_top_link: row.get(1).map_err(storage_err)?,
                    last_fetched_at: parse_time(&fetched)?,
                    name: row.get::<String>(3).unwrap_or_default(),
                },
            );
        }
        Ok(map)
    }

    /// Replace the whole watermark map in one transaction.
    pub async fn save_watermarks(&self, map: &WatermarkMap) -> Result<()> {
        self.check_writable()?;
        let tx = self.conn.transaction().await.map_err(storage_err)?;

        tx.execute("DELETE FROM watermarks", params![])
            .await
            .map_err(storage_err)?;
        for (source_id, mark) in map {
            tx.execute(
                "INSERT INTO watermarks (source_id, last_top_link, last_fetched_at, name)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    source_id.as_str(),
                    mark.last_top_link.as_str(),
                    mark.last_fetched_at.to_rfc3339(),
                    mark.name.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn storage_err(e: impl std::fmt::Display) -> NewsdeskError {
    NewsdeskError::Storage(e.to_string())
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| NewsdeskError::Storage(format!("invalid date '{s}': {e}")))
}

fn encode_analysis(analysis: Option<&AnalysisAnnotation>) -> Result<Option<String>> {
    analysis
        .map(|a| serde_json::to_string(a).map_err(storage_err))
        .transpose()
}

/// Convert a database row to a [`NewsRecord`].
fn row_to_news_record(row: &libsql::Row) -> Result<NewsRecord> {
    let text = |idx: i32| row.get::<String>(idx).map_err(storage_err);
    let optional = |idx: i32| row.get::<String>(idx).ok().filter(|s| !s.is_empty());

    let analysis = match optional(15) {
        Some(json) => Some(
            serde_json::from_str::<AnalysisAnnotation>(&json)
                .map_err(|e| NewsdeskError::Storage(format!("invalid analysis json: {e}")))?,
        ),
        None => None,
    };

    Ok(NewsRecord {
        id: text(0)?,
        title: text(1)?,
        url: text(2)?,
        published_at: parse_time(&text(3)?)?,
        source_id: text(4)?,
        source_name: text(5)?,
        source_type: text(6)?.parse()?,
        category: Category::parse(&text(7)?).unwrap_or_default(),
        sub_category: optional(8),
        sentiment: Sentiment::parse(&text(9)?).unwrap_or_default(),
        ticker: optional(10),
        filter_reason: text(11).unwrap_or_default(),
        rss_summary: text(12).unwrap_or_default(),
        status: text(13)?.parse()?,
        collected_at: parse_time(&text(14)?)?,
        analysis,
        analyzed_at: optional(16).map(|s| parse_time(&s)).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsdesk_shared::{SourceType, record_id};
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("nd_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn record(url: &str, title: &str) -> NewsRecord {
        NewsRecord {
            id: record_id(url),
            title: title.into(),
            url: url.into(),
            published_at: Utc::now(),
            source_id: "1".into(),
            source_name: "Test Feed".into(),
            source_type: SourceType::Rss,
            category: Category::Market,
            sub_category: None,
            sentiment: Sentiment::Neutral,
            ticker: None,
            filter_reason: "relevant".into(),
            rss_summary: "summary text".into(),
            status: NewsStatus::Raw,
            collected_at: Utc::now(),
            analysis: None,
            analyzed_at: None,
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("nd_test_{}.db", Uuid::now_v7()));
        let first = Storage::open(&tmp).await.expect("first open");
        drop(first);
        let second = Storage::open(&tmp).await.expect("second open");
        assert_eq!(second.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn same_url_twice_stores_once() {
        let storage = test_storage().await;
        let rec = record("https://example.com/a", "Rupiah melemah terhadap dolar AS");

        assert!(storage.save(&rec).await.unwrap());
        assert!(!storage.save(&rec).await.unwrap());
        assert_eq!(storage.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn url_match_is_case_sensitive() {
        let storage = test_storage().await;
        storage
            .save(&record("https://example.com/Path", "Saham bank naik"))
            .await
            .unwrap();
        assert!(storage.url_exists("https://example.com/Path").await.unwrap());
        assert!(!storage.url_exists("https://example.com/path").await.unwrap());
    }

    #[tokio::test]
    async fn near_duplicate_title_rejected() {
        let storage = test_storage().await;
        let first = record(
            "https://a.example.com/1",
            "IHSG ditutup menguat 1% ke level 7.200",
        );
        let second = record(
            "https://b.example.com/2",
            "IHSG Ditutup Menguat 1% ke Level 7.250",
        );
        assert!(storage.save(&first).await.unwrap());
        assert!(!storage.save(&second).await.unwrap());

        let verdict = storage
            .check_dedup(&second.url, &second.title)
            .await
            .unwrap();
        assert!(matches!(verdict, DedupVerdict::NearDuplicate { .. }));
    }

    #[tokio::test]
    async fn get_by_id_exact_and_prefix() {
        let storage = test_storage().await;
        let rec = record("https://example.com/prefix", "Harga minyak dunia naik");
        storage.save(&rec).await.unwrap();

        let exact = storage.get_by_id(&rec.id).await.unwrap().expect("exact");
        assert_eq!(exact.url, rec.url);

        let prefix = storage.get_by_id(&rec.id[..5]).await.unwrap().expect("prefix");
        assert_eq!(prefix.id, rec.id);

        assert!(storage.get_by_id("zzzz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_persists_analysis() {
        let storage = test_storage().await;
        let mut rec = record("https://example.com/analyze", "BBRI bagikan dividen jumbo");
        storage.save(&rec).await.unwrap();

        let mut annotation = AnalysisAnnotation::neutral(Category::CorporateAction);
        annotation.summary = "Dividen final".into();
        annotation.ticker = Some("BBRI".into());
        annotation.sentiment_direction = Sentiment::Bullish;
        rec.apply_analysis(annotation, Utc::now());
        storage.update(&rec).await.expect("update");

        let loaded = storage.get_by_id(&rec.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, NewsStatus::Analyzed);
        assert_eq!(loaded.category, Category::CorporateAction);
        assert_eq!(loaded.ticker.as_deref(), Some("BBRI"));
        assert_eq!(
            loaded.analysis.as_ref().map(|a| a.summary.as_str()),
            Some("Dividen final")
        );

        let raw = storage.get_by_status(NewsStatus::Raw, None).await.unwrap();
        assert!(raw.is_empty());
        let analyzed = storage
            .get_by_status(NewsStatus::Analyzed, Some(5))
            .await
            .unwrap();
        assert_eq!(analyzed.len(), 1);
    }

    #[tokio::test]
    async fn update_missing_record_errors() {
        let storage = test_storage().await;
        let rec = record("https://example.com/ghost", "Tidak ada");
        assert!(storage.update(&rec).await.is_err());
    }

    #[tokio::test]
    async fn stats_and_search() {
        let storage = test_storage().await;
        let mut gold = record("https://example.com/gold", "Harga emas melonjak tajam");
        gold.category = Category::Commodity;
        gold.sentiment = Sentiment::Bullish;
        storage.save(&gold).await.unwrap();

        let mut div = record("https://example.com/div", "TLKM umumkan jadwal dividen");
        div.category = Category::Disclosure;
        div.sub_category = Some("dividen".into());
        storage.save(&div).await.unwrap();

        let stats = storage.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.raw, 2);
        assert_eq!(stats.analyzed, 0);
        assert!(stats.by_category.contains(&("Commodity".to_string(), 1)));
        assert_eq!(stats.by_sub_category, vec![("dividen".to_string(), 1)]);

        let hits = storage.search("EMAS", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, gold.url);
    }

    #[tokio::test]
    async fn prune_removes_old_records() {
        let storage = test_storage().await;
        let mut old = record("https://example.com/old", "Berita lama sekali");
        old.published_at = Utc::now() - chrono::Duration::days(10);
        storage.save(&old).await.unwrap();
        storage
            .save(&record("https://example.com/new", "Kabar pasar terbaru hari ini"))
            .await
            .unwrap();

        let removed = storage.delete_older_than(3).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(storage.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn watermarks_replace_wholesale() {
        let storage = test_storage().await;
        assert!(storage.load_watermarks().await.unwrap().is_empty());

        let mut map = WatermarkMap::new();
        map.insert(
            "1".into(),
            Watermark {
                last_top_link: "https://example.com/top".into(),
                last_fetched_at: Utc::now(),
                name: "Feed One".into(),
            },
        );
        map.insert(
            "2".into(),
            Watermark {
                last_top_link: "https://example.com/other".into(),
                last_fetched_at: Utc::now(),
                name: "Feed Two".into(),
            },
        );
        storage.save_watermarks(&map).await.unwrap();
        assert_eq!(storage.load_watermarks().await.unwrap().len(), 2);

        map.remove("2");
        storage.save_watermarks(&map).await.unwrap();
        let loaded = storage.load_watermarks().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["1"].last_top_link, "https://example.com/top");
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("nd_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.save(&record("https://example.com/ro", "Judul pertama"))
            .await
            .unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        let result = ro
            .save(&record("https://example.com/ro2", "Judul kedua berbeda"))
            .await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
        assert_eq!(ro.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn readonly_requires_existing_file() {
        let tmp = std::env::temp_dir().join(format!("nd_test_{}.db", Uuid::now_v7()));
        let err = Storage::open_readonly(&tmp).await.err().expect("missing db");
        assert!(err.to_string().contains("no database"));
        assert!(!tmp.exists());
    }
}
