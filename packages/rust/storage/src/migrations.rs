//! SQL migration definitions for the newsdesk database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed as one batch.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: news, watermarks",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Collected news records (id = truncated URL digest)
CREATE TABLE IF NOT EXISTS news (
    id            TEXT PRIMARY KEY,
    title         TEXT NOT NULL,
    url           TEXT NOT NULL UNIQUE,
    published_at  TEXT NOT NULL,
    source_id     TEXT NOT NULL,
    source_name   TEXT NOT NULL,
    source_type   TEXT NOT NULL,
    category      TEXT NOT NULL,
    sub_category  TEXT,
    sentiment     TEXT NOT NULL,
    ticker        TEXT,
    filter_reason TEXT NOT NULL DEFAULT '',
    rss_summary   TEXT NOT NULL DEFAULT '',
    status        TEXT NOT NULL,
    collected_at  TEXT NOT NULL,
    analysis_json TEXT,
    analyzed_at   TEXT
);

CREATE INDEX IF NOT EXISTS idx_news_status ON news(status);
CREATE INDEX IF NOT EXISTS idx_news_published ON news(published_at);
CREATE INDEX IF NOT EXISTS idx_news_collected ON news(collected_at);

-- Per-source incremental fetch markers, replaced wholesale each cycle
CREATE TABLE IF NOT EXISTS watermarks (
    source_id       TEXT PRIMARY KEY,
    last_top_link   TEXT NOT NULL,
    last_fetched_at TEXT NOT NULL,
    name            TEXT NOT NULL DEFAULT ''
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
    ]
}
