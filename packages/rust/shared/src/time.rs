//! Source timestamp normalization.
//!
//! Every adapter funnels its native timestamp through [`normalize_timestamp`].
//! Offset-aware values convert straight to UTC. Naive values follow a per-source
//! policy: disclosure and social feeds publish in Jakarta local time (UTC+7),
//! syndication feeds are taken as UTC. That asymmetry is domain policy for the
//! upstreams we read, not a general parsing rule.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use regex::Regex;

use crate::types::SourceType;

/// Jakarta (WIB) offset in seconds.
pub const WIB_OFFSET_SECS: i32 = 7 * 3600;

/// Microsoft JSON date, e.g. `/Date(1714532400000)/`.
static MS_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/Date\((-?\d+)").expect("ms date regex"));

const AWARE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%d %b %Y %H:%M:%S",
];

/// Offset assumed for naive timestamps from this kind of source.
pub fn naive_offset(source_type: SourceType) -> FixedOffset {
    let secs = match source_type {
        SourceType::DisclosureApi | SourceType::SocialApi => WIB_OFFSET_SECS,
        SourceType::Rss => 0,
    };
    FixedOffset::east_opt(secs).unwrap_or_else(|| Utc.fix())
}

/// Parse a source-native timestamp. `None` when empty, zeroed, or unrecognized.
pub fn parse_timestamp(raw: &str, source_type: SourceType) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "0000-00-00 00:00:00" {
        return None;
    }

    if source_type == SourceType::DisclosureApi {
        if let Some(caps) = MS_DATE_RE.captures(raw) {
            let millis: i64 = caps[1].parse().ok()?;
            return Utc.timestamp_millis_opt(millis).single();
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in AWARE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let offset = naive_offset(source_type);
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Like [`parse_timestamp`], falling back to the current time.
pub fn normalize_timestamp(raw: &str, source_type: SourceType) -> DateTime<Utc> {
    parse_timestamp(raw, source_type).unwrap_or_else(|| {
        if !raw.trim().is_empty() {
            tracing::debug!(raw, %source_type, "unparseable timestamp, using now");
        }
        Utc::now()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn aware_timestamp_converts_directly() {
        let parsed = parse_timestamp("2024-05-01T10:00:00+07:00", SourceType::Rss).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-05-01T03:00:00+00:00");

        // Offset wins over the source's naive policy.
        let parsed =
            parse_timestamp("2024-05-01T10:00:00+07:00", SourceType::SocialApi).unwrap();
        assert_eq!(parsed, ts("2024-05-01T03:00:00Z"));
    }

    #[test]
    fn naive_disclosure_and_social_assume_wib() {
        for st in [SourceType::DisclosureApi, SourceType::SocialApi] {
            let parsed = parse_timestamp("2024-05-01 10:00:00", st).unwrap();
            assert_eq!(parsed, ts("2024-05-01T03:00:00Z"), "{st}");
        }
    }

    #[test]
    fn naive_rss_is_utc() {
        let parsed = parse_timestamp("2024-05-01 10:00:00", SourceType::Rss).unwrap();
        assert_eq!(parsed, ts("2024-05-01T10:00:00Z"));
    }

    #[test]
    fn microsoft_epoch_for_disclosures() {
        let parsed = parse_timestamp("/Date(1714532400000)/", SourceType::DisclosureApi).unwrap();
        assert_eq!(parsed, ts("2024-05-01T03:00:00Z"));
        assert!(parse_timestamp("/Date(1714532400000)/", SourceType::Rss).is_none());
    }

    #[test]
    fn rfc2822_and_zulu() {
        let parsed =
            parse_timestamp("Wed, 01 May 2024 10:00:00 +0700", SourceType::Rss).unwrap();
        assert_eq!(parsed, ts("2024-05-01T03:00:00Z"));

        let parsed = parse_timestamp("2024-05-01T03:00:00Z", SourceType::SocialApi).unwrap();
        assert_eq!(parsed, ts("2024-05-01T03:00:00Z"));
    }

    #[test]
    fn web_style_naive_format() {
        let parsed = parse_timestamp("01 May 2024 10:00:00", SourceType::DisclosureApi).unwrap();
        assert_eq!(parsed, ts("2024-05-01T03:00:00Z"));
    }

    #[test]
    fn empty_and_zeroed_fall_back_to_now() {
        assert!(parse_timestamp("", SourceType::Rss).is_none());
        assert!(parse_timestamp("0000-00-00 00:00:00", SourceType::SocialApi).is_none());

        let before = Utc::now();
        let normalized = normalize_timestamp("not a date", SourceType::Rss);
        assert!(normalized >= before);
    }
}
