//! Text helpers shared by the adapters, the extraction cascade, and storage.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

/// Hex characters kept from the URL digest.
pub const RECORD_ID_LEN: usize = 12;

/// How far into a page we look for challenge markers.
const CHALLENGE_SCAN_CHARS: usize = 3000;

/// "Please wait / verifying you are human" markers, multilingual.
pub const CHALLENGE_MARKERS: &[&str] = &[
    "just a moment",
    "tunggu sebentar",
    "un moment",
    "einen moment",
    "un momento",
    "aguarde",
    "challenge-platform",
    "cf-challenge",
    "cf_chl_opt",
];

static MANY_NEWLINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("newline regex"));
static MANY_SPACES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("space regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));

/// Content-addressed record id: truncated SHA-256 of the trimmed URL.
pub fn record_id(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.trim().as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    hex[..RECORD_ID_LEN].to_string()
}

/// Collapse runs of blank lines and horizontal whitespace.
pub fn clean_text(text: &str) -> String {
    let text = MANY_NEWLINES_RE.replace_all(text, "\n\n");
    let text = MANY_SPACES_RE.replace_all(&text, " ");
    text.trim().to_string()
}

/// Replace every tag with a space. Cheap, used for feed teasers only.
pub fn strip_html(html: &str) -> String {
    TAG_RE.replace_all(html, " ").trim().to_string()
}

/// Truncate to at most `max` chars without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Whether the text looks like an anti-automation interstitial.
pub fn is_challenge_page(text: &str) -> bool {
    let head = truncate_chars(text, CHALLENGE_SCAN_CHARS).to_lowercase();
    CHALLENGE_MARKERS.iter().any(|m| head.contains(m))
}
