//! JavaScript snippets evaluated inside pages.

/// Click the first visible consent or close button. Returns `true` if one was clicked.
pub(crate) const DISMISS_CONSENT: &str = r#"
(() => {
  const labels = ['accept', 'setuju', 'agree'];
  for (const el of document.querySelectorAll('button, a[role="button"]')) {
    const text = (el.innerText || '').trim().toLowerCase();
    if (labels.some(l => text === l || text.startsWith(l + ' ')) && el.offsetParent !== null) {
      el.click();
      return true;
    }
  }
  const selectors = [
    "[data-testid='close-button']",
    '.modal-close',
    '#onetrust-accept-btn-handler',
  ];
  for (const sel of selectors) {
    const el = document.querySelector(sel);
    if (el && el.offsetParent !== null) {
      el.click();
      return true;
    }
  }
  return false;
})()
"#;

/// Scroll halfway down to trigger lazy-loaded content.
pub(crate) const SCROLL_HALF: &str =
    "window.scrollTo(0, Math.floor((document.body ? document.body.scrollHeight : 0) / 2))";

/// Visible text of the body, used for interstitial detection.
pub(crate) const BODY_TEXT: &str = "document.body ? document.body.innerText : ''";

/// Fetch `url` from inside the page with credentials and return the body as
/// base64, or `null` on a non-2xx response.
pub(crate) fn fetch_as_base64(url: &str) -> String {
    let quoted = serde_json::Value::String(url.to_string()).to_string();
    format!(
        r#"
(async () => {{
  const resp = await fetch({quoted}, {{ credentials: 'include' }});
  if (!resp.ok) return null;
  const bytes = new Uint8Array(await resp.arrayBuffer());
  let binary = '';
  for (let i = 0; i < bytes.length; i += 0x8000) {{
    binary += String.fromCharCode.apply(null, bytes.subarray(i, i + 0x8000));
  }}
  return btoa(binary);
}})()
"#
    )
}

/// Trigger a navigation download of `url`.
pub(crate) fn navigate_download(url: &str) -> String {
    let quoted = serde_json::Value::String(url.to_string()).to_string();
    format!("window.location.href = {quoted}; true")
}
