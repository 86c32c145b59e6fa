//! Lightweight HTTP fetch with browser-like headers.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER};
use tracing::debug;

use newsdesk_shared::{HttpConfig, NewsdeskError, Result, is_challenge_page};

use crate::html::visible_text;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const SEARCH_REFERER: &str = "https://www.google.com/";

/// Build the client used for article pages and direct document downloads.
pub fn build_client(http: &HttpConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(REFERER, HeaderValue::from_static(SEARCH_REFERER));
    if let Ok(lang) = HeaderValue::from_str(&http.accept_language) {
        headers.insert(ACCEPT_LANGUAGE, lang);
    }

    Client::builder()
        .user_agent(&http.user_agent)
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(Duration::from_secs(http.feed_timeout_secs))
        .build()
        .map_err(|e| NewsdeskError::Extraction(format!("failed to build HTTP client: {e}")))
}

/// GET an article page. Non-200 responses are failures; interstitials are
/// reported as [`NewsdeskError::Blocked`] so the caller can escalate.
pub async fn fetch_html(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| NewsdeskError::Extraction(format!("{url}: {e}")))?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(NewsdeskError::Extraction(format!("{url}: HTTP {status}")));
    }

    let html = response
        .text()
        .await
        .map_err(|e| NewsdeskError::Extraction(format!("{url}: failed to read body: {e}")))?;

    if is_challenge_page(&visible_text(&html)) {
        debug!(url, "challenge page on plain fetch");
        return Err(NewsdeskError::Blocked(url.to_string()));
    }
    Ok(html)
}
