//! Incremental fetch: which entries of a feed are new since the last cycle.

use newsdesk_shared::RawEntry;

/// Result of diffing one source's feed against its watermark.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntries {
    /// New entries, newest first.
    pub entries: Vec<RawEntry>,
    /// Link of the current top entry, to be stored as the next watermark.
    pub top_link: Option<String>,
}

/// Split the newest-first `entries` at the previously seen top link.
///
/// - No watermark: everything is new (bootstrap).
/// - Watermark equals the current top: nothing is new.
/// - Otherwise the prefix before the watermark link is new. If the link has
///   dropped out of the feed, every entry is treated as new and the store's
///   URL check absorbs the overlap.
pub fn diff_new_entries(entries: Vec<RawEntry>, last_top_link: Option<&str>) -> NewEntries {
    let top_link = entries.first().map(|e| e.link.clone());

    let Some(last) = last_top_link else {
        return NewEntries { entries, top_link };
    };

    match entries.iter().position(|e| e.link == last) {
        Some(cut) => {
            let mut entries = entries;
            entries.truncate(cut);
            NewEntries { entries, top_link }
        }
        None => NewEntries { entries, top_link },
    }
}
