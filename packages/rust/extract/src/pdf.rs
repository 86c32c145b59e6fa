//! Document (PDF) download and text extraction.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use newsdesk_shared::{DISCLOSURE_LANDING_URL, NewsdeskError, Result, clean_text};

/// Whether the URL points at a PDF-like document.
pub fn is_pdf_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.ends_with(".pdf") || lower.contains("/pdf/")
}

/// Page to visit before fetching `url` through the browser, for hosts that
/// only serve documents to an established session.
pub fn warmup_for(url: &str) -> Option<&'static str> {
    let host = Url::parse(url).ok()?.host_str()?.to_lowercase();
    (host == "idx.co.id" || host.ends_with(".idx.co.id")).then_some(DISCLOSURE_LANDING_URL)
}

/// Plain GET; the response must declare a PDF content type.
pub async fn download_direct(client: &Client, url: &str, timeout: Duration) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| NewsdeskError::Extraction(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(NewsdeskError::Extraction(format!("{url}: HTTP {status}")));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();
    if !content_type.contains("pdf") {
        return Err(NewsdeskError::Extraction(format!(
            "{url}: expected a PDF, got '{content_type}'"
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| NewsdeskError::Extraction(format!("{url}: failed to read body: {e}")))?;
    Ok(bytes.to_vec())
}

/// Extract page text from PDF bytes on the blocking pool.
pub async fn pdf_text(bytes: Vec<u8>) -> Result<String> {
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| NewsdeskError::Extraction(format!("pdf task failed: {e}")))?
        .map_err(|e| NewsdeskError::Extraction(format!("unreadable pdf: {e}")))?;
    Ok(clean_text(&text))
}
