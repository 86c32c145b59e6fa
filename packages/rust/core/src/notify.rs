//! Notification boundary.

use async_trait::async_trait;
use tracing::info;

use newsdesk_shared::{NewsRecord, Result};

/// Receives newly inserted and freshly analyzed records.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Records inserted by one cycle, newest first.
    async fn notify_inserted(&self, records: &[NewsRecord]) -> Result<()>;

    async fn notify_analyzed(&self, record: &NewsRecord) -> Result<()>;
}

/// Writes one structured log line per record.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_inserted(&self, records: &[NewsRecord]) -> Result<()> {
        for record in records {
            info!(
                id = %record.id,
                source = %record.source_name,
                category = %record.category,
                sentiment = %record.sentiment,
                published_at = %record.published_at.to_rfc3339(),
                title = %record.title,
                "new record"
            );
        }
        Ok(())
    }

    async fn notify_analyzed(&self, record: &NewsRecord) -> Result<()> {
        let summary = record
            .analysis
            .as_ref()
            .map(|a| a.summary.as_str())
            .unwrap_or_default();
        info!(
            id = %record.id,
            sentiment = %record.sentiment,
            ticker = record.ticker.as_deref().unwrap_or("-"),
            summary_chars = summary.chars().count(),
            title = %record.title,
            "record analyzed"
        );
        Ok(())
    }
}
