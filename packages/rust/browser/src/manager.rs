//! Lazily started, shared Chromium instance.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetLocaleOverrideParams, SetTimezoneOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, GetResponseBodyParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{CreateBrowserContextParams, CreateTargetParams};
use futures::StreamExt;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use newsdesk_shared::{BrowserConfig, NewsdeskError, Result, is_challenge_page};

use crate::{BrowserSession, FetchedDocument};
use crate::scripts;

const CHALLENGE_ATTEMPTS: u64 = 3;
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(60);
const CAPTURE_SETTLE: Duration = Duration::from_secs(5);
const WARMUP_SETTLE: Duration = Duration::from_secs(5);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_DOCUMENT_BYTES: usize = 100;

/// Chromium flags. The sandbox is off so the browser starts as root and in
/// containers.
const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--no-first-run",
];

/// A launched browser plus the task pumping its CDP handler.
struct Running {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// An isolated context with one page in it.
struct Tab {
    page: Page,
    context: Option<BrowserContextId>,
}

impl Tab {
    async fn close(self, browser: &Browser) {
        if let Err(e) = self.page.close().await {
            debug!(error = %e, "page close failed");
        }
        if let Some(id) = self.context {
            if let Err(e) = browser.dispose_browser_context(id).await {
                debug!(error = %e, "context dispose failed");
            }
        }
    }
}

/// Owner of the single headless browser.
///
/// Cheap to share behind an `Arc`. All page work is serialized through one
/// lock, so at most one page is open at a time.
pub struct BrowserManager {
    config: BrowserConfig,
    user_agent: String,
    state: Mutex<Option<Running>>,
    fetches: AtomicU64,
    runtime: Handle,
}

impl BrowserManager {
    /// Create a manager bound to the current Tokio runtime. The browser
    /// itself is not started until first use.
    pub fn new(config: BrowserConfig, user_agent: impl Into<String>) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| NewsdeskError::Browser(format!("no tokio runtime: {e}")))?;
        Ok(Self::with_runtime(config, user_agent, runtime))
    }

    /// Create a manager bound to an explicit runtime handle.
    pub fn with_runtime(
        config: BrowserConfig,
        user_agent: impl Into<String>,
        runtime: Handle,
    ) -> Self {
        Self {
            config,
            user_agent: user_agent.into(),
            state: Mutex::new(None),
            fetches: AtomicU64::new(0),
            runtime,
        }
    }

    /// Whether the browser process is currently running.
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_some()
    }

    // -----------------------------------------------------------------------
    // Blocking facade
    // -----------------------------------------------------------------------

    /// Blocking form of [`BrowserSession::render`].
    pub fn render_blocking(&self, url: &str) -> Result<String> {
        self.block_on(self.render(url))
    }

    /// Blocking form of [`BrowserSession::capture_json`].
    pub fn capture_json_blocking(&self, page_url: &str, marker: &str) -> Result<serde_json::Value> {
        self.block_on(self.capture_json(page_url, marker))
    }

    /// Blocking form of [`BrowserSession::fetch_document`].
    pub fn fetch_document_blocking(
        &self,
        url: &str,
        warmup_url: Option<&str>,
    ) -> Result<FetchedDocument> {
        self.block_on(self.fetch_document(url, warmup_url))
    }

    /// Blocking form of [`BrowserSession::close`].
    pub fn close_blocking(&self) -> Result<()> {
        self.block_on(self.close())
    }

    /// Drive `fut` on the captured runtime from a synchronous caller.
    ///
    /// Must run on a plain thread or inside `spawn_blocking`. Tokio panics if
    /// this is reached from an async task, so async callers use the trait.
    fn block_on<F: std::future::Future<Output = Result<T>>, T>(&self, fut: F) -> Result<T> {
        self.runtime.block_on(fut)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    async fn launch(&self) -> Result<Running> {
        let mut builder = LaunchConfig::builder()
            .window_size(self.config.viewport_width, self.config.viewport_height)
            .args(LAUNCH_ARGS.iter().copied());
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let launch_config = builder.build().map_err(NewsdeskError::Browser)?;

        let (browser, mut handler) = Browser::launch(launch_config).await.map_err(browser_err)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        info!("headless browser started");
        Ok(Running { browser, handler })
    }

    /// Pause between consecutive browser fetches.
    async fn throttle(&self) {
        if self.fetches.fetch_add(1, Ordering::SeqCst) > 0 && self.config.request_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.request_delay_ms)).await;
        }
    }

    async fn open_tab(&self, browser: &mut Browser) -> Result<Tab> {
        let context = match browser
            .create_browser_context(CreateBrowserContextParams::default())
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "isolated context unavailable, using default");
                None
            }
        };

        let mut target = CreateTargetParams::builder().url("about:blank");
        if let Some(id) = &context {
            target = target.browser_context_id(id.clone());
        }
        let target = target.build().map_err(NewsdeskError::Browser)?;
        let page = browser.new_page(target).await.map_err(browser_err)?;

        page.execute(SetUserAgentOverrideParams::new(self.user_agent.clone()))
            .await
            .map_err(browser_err)?;
        page.execute(SetTimezoneOverrideParams::new(self.config.timezone.clone()))
            .await
            .map_err(browser_err)?;
        page.execute(SetLocaleOverrideParams {
            locale: Some(self.config.locale.clone()),
        })
        .await
        .map_err(browser_err)?;
        page.execute(viewport_override(&self.config))
            .await
            .map_err(browser_err)?;

        Ok(Tab { page, context })
    }

    async fn goto(&self, page: &Page, url: &str, limit: Duration) -> Result<()> {
        match tokio::time::timeout(limit, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(NewsdeskError::Browser(format!("navigation to {url} failed: {e}"))),
            Err(_) => Err(NewsdeskError::Browser(format!(
                "navigation to {url} timed out after {}s",
                limit.as_secs()
            ))),
        }
    }

    fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.config.navigation_timeout_secs)
    }

    // -----------------------------------------------------------------------
    // Page work
    // -----------------------------------------------------------------------

    async fn render_in(&self, page: &Page, url: &str) -> Result<String> {
        self.goto(page, url, self.navigation_timeout()).await?;
        tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;

        for attempt in 0..CHALLENGE_ATTEMPTS {
            let text = evaluate_string(page, scripts::BODY_TEXT).await.unwrap_or_default();
            if !is_challenge_page(&text) {
                break;
            }
            let wait = 8 + 5 * attempt;
            debug!(url, attempt = attempt + 1, wait_secs = wait, "challenge page, waiting");
            tokio::time::sleep(Duration::from_secs(wait)).await;
        }

        let clicked = page
            .evaluate(scripts::DISMISS_CONSENT)
            .await
            .ok()
            .and_then(|r| r.into_value::<bool>().ok())
            .unwrap_or(false);
        if clicked {
            debug!(url, "dismissed consent overlay");
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        if page.evaluate(scripts::SCROLL_HALF).await.is_ok() {
            tokio::time::sleep(Duration::from_secs(2)).await;
        }

        page.content().await.map_err(browser_err)
    }

    async fn capture_in(&self, page: &Page, page_url: &str, marker: &str) -> Result<serde_json::Value> {
        page.execute(EnableParams::default()).await.map_err(browser_err)?;
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(browser_err)?;

        let (tx, rx) = tokio::sync::oneshot::channel();
        let wanted = marker.to_string();
        let watcher = tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                if event.response.url.contains(&wanted) {
                    let _ = tx.send(event.request_id.clone());
                    break;
                }
            }
        });

        let navigated = self.goto(page, page_url, CAPTURE_TIMEOUT).await;
        tokio::time::sleep(CAPTURE_SETTLE).await;

        let request_id = match tokio::time::timeout(CAPTURE_SETTLE, rx).await {
            Ok(Ok(id)) => id,
            _ => {
                watcher.abort();
                navigated?;
                debug!(marker, "no matching response, reading page body");
                let text = evaluate_string(page, scripts::BODY_TEXT).await?;
                return serde_json::from_str(text.trim()).map_err(|_| {
                    NewsdeskError::Browser(format!(
                        "no response matching '{marker}' while loading {page_url}"
                    ))
                });
            }
        };

        let body = page
            .execute(GetResponseBodyParams::new(request_id))
            .await
            .map_err(browser_err)?;
        let raw = if body.base64_encoded {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(body.body.as_bytes())
                .map_err(|e| NewsdeskError::Browser(format!("bad response encoding: {e}")))?;
            String::from_utf8_lossy(&bytes).into_owned()
        } else {
            body.body.clone()
        };

        serde_json::from_str(&raw)
            .map_err(|e| NewsdeskError::Browser(format!("captured response is not JSON: {e}")))
    }

    async fn document_in(
        &self,
        browser: &Browser,
        tab: &Tab,
        url: &str,
        warmup_url: Option<&str>,
    ) -> Result<FetchedDocument> {
        let page = &tab.page;
        if let Some(warmup) = warmup_url {
            self.goto(page, warmup, self.navigation_timeout()).await?;
            tokio::time::sleep(WARMUP_SETTLE).await;
        }

        match fetch_in_page(page, url).await {
            Ok(bytes) if bytes.len() > MIN_DOCUMENT_BYTES => {
                debug!(url, bytes = bytes.len(), "document fetched in page");
                return Ok(FetchedDocument {
                    bytes,
                    downloaded: false,
                });
            }
            Ok(bytes) => debug!(url, bytes = bytes.len(), "in-page fetch too small"),
            Err(e) => debug!(url, error = %e, "in-page fetch failed"),
        }

        self.download(browser, tab, url).await
    }

    async fn download(&self, browser: &Browser, tab: &Tab, url: &str) -> Result<FetchedDocument> {
        let dir = tempfile::tempdir().map_err(|e| NewsdeskError::io("download dir", e))?;

        let mut behavior = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(dir.path().to_string_lossy().into_owned());
        if let Some(id) = &tab.context {
            behavior = behavior.browser_context_id(id.clone());
        }
        let behavior = behavior.build().map_err(NewsdeskError::Browser)?;
        browser.execute(behavior).await.map_err(browser_err)?;

        // Navigation aborts when the response turns into a download.
        let _ = tab.page.evaluate(scripts::navigate_download(url)).await;

        let deadline = tokio::time::Instant::now() + DOWNLOAD_TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            if let Some(bytes) = finished_download(dir.path()).await? {
                debug!(url, bytes = bytes.len(), "document downloaded");
                return Ok(FetchedDocument {
                    bytes,
                    downloaded: true,
                });
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        Err(NewsdeskError::Browser(format!(
            "download of {url} did not finish within {}s",
            DOWNLOAD_TIMEOUT.as_secs()
        )))
    }
}

#[async_trait]
impl BrowserSession for BrowserManager {
    #[instrument(skip_all, fields(url = %url))]
    async fn render(&self, url: &str) -> Result<String> {
        self.throttle().await;
        let mut state = self.state.lock().await;
        if state.is_none() {
            *state = Some(self.launch().await?);
        }
        let running = state
            .as_mut()
            .ok_or_else(|| NewsdeskError::Browser("browser not running".into()))?;

        let tab = self.open_tab(&mut running.browser).await?;
        let result = self.render_in(&tab.page, url).await;
        tab.close(&running.browser).await;
        result
    }

    #[instrument(skip_all, fields(page_url = %page_url, marker = %marker))]
    async fn capture_json(&self, page_url: &str, marker: &str) -> Result<serde_json::Value> {
        self.throttle().await;
        let mut state = self.state.lock().await;
        if state.is_none() {
            *state = Some(self.launch().await?);
        }
        let running = state
            .as_mut()
            .ok_or_else(|| NewsdeskError::Browser("browser not running".into()))?;

        let tab = self.open_tab(&mut running.browser).await?;
        let result = self.capture_in(&tab.page, page_url, marker).await;
        tab.close(&running.browser).await;
        result
    }

    #[instrument(skip_all, fields(url = %url))]
    async fn fetch_document(
        &self,
        url: &str,
        warmup_url: Option<&str>,
    ) -> Result<FetchedDocument> {
        self.throttle().await;
        let mut state = self.state.lock().await;
        if state.is_none() {
            *state = Some(self.launch().await?);
        }
        let running = state
            .as_mut()
            .ok_or_else(|| NewsdeskError::Browser("browser not running".into()))?;

        let tab = self.open_tab(&mut running.browser).await?;
        let result = self.document_in(&running.browser, &tab, url, warmup_url).await;
        tab.close(&running.browser).await;
        result
    }

    async fn close(&self) -> Result<()> {
        let Some(mut running) = self.state.lock().await.take() else {
            return Ok(());
        };
        if let Err(e) = running.browser.close().await {
            warn!(error = %e, "browser close failed");
        }
        if let Err(e) = running.browser.wait().await {
            warn!(error = %e, "browser did not exit cleanly");
        }
        running.handler.abort();
        info!("headless browser stopped");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn browser_err(e: impl std::fmt::Display) -> NewsdeskError {
    NewsdeskError::Browser(e.to_string())
}

async fn evaluate_string(page: &Page, script: &str) -> Result<String> {
    page.evaluate(script)
        .await
        .map_err(browser_err)?
        .into_value::<String>()
        .map_err(browser_err)
}

async fn fetch_in_page(page: &Page, url: &str) -> Result<Vec<u8>> {
    let encoded = page
        .evaluate(scripts::fetch_as_base64(url))
        .await
        .map_err(browser_err)?
        .into_value::<Option<String>>()
        .map_err(browser_err)?
        .ok_or_else(|| NewsdeskError::Browser(format!("in-page fetch of {url} was rejected")))?;

    base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| NewsdeskError::Browser(format!("bad base64 from page: {e}")))
}

async fn finished_download(dir: &Path) -> Result<Option<Vec<u8>>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| NewsdeskError::io(dir, e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| NewsdeskError::io(dir, e))?
    {
        let path = entry.path();
        let partial = path
            .extension()
            .is_some_and(|ext| ext == "crdownload" || ext == "tmp");
        if partial {
            continue;
        }
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| NewsdeskError::io(&path, e))?;
        if !bytes.is_empty() {
            return Ok(Some(bytes));
        }
    }
    Ok(None)
}

/// Per-tab viewport, applied inside each isolated context.
fn viewport_override(config: &BrowserConfig) -> SetDeviceMetricsOverrideParams {
    SetDeviceMetricsOverrideParams::new(
        i64::from(config.viewport_width),
        i64::from(config.viewport_height),
        1.0,
        false,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_flags_allow_container_start() {
        for flag in ["--no-sandbox", "--disable-dev-shm-usage", "--disable-gpu"] {
            assert!(LAUNCH_ARGS.contains(&flag), "{flag}");
        }
        assert!(LAUNCH_ARGS.contains(&"--disable-blink-features=AutomationControlled"));
    }

    #[test]
    fn viewport_follows_config() {
        let config = BrowserConfig {
            viewport_width: 1366,
            viewport_height: 768,
            ..BrowserConfig::default()
        };
        let params = viewport_override(&config);
        assert_eq!(params.width, 1366);
        assert_eq!(params.height, 768);
        assert!(!params.mobile);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blocking_facade_from_worker_pool() {
        let manager =
            std::sync::Arc::new(BrowserManager::new(BrowserConfig::default(), "ua").unwrap());
        let worker = manager.clone();
        tokio::task::spawn_blocking(move || worker.close_blocking())
            .await
            .unwrap()
            .unwrap();
        assert!(!manager.is_running().await);
    }

    #[tokio::test]
    async fn close_without_start_is_noop() {
        let manager = BrowserManager::new(BrowserConfig::default(), "test-agent").unwrap();
        manager.close().await.unwrap();
        manager.close().await.unwrap();
        assert!(!manager.is_running().await);
    }

    #[test]
    fn new_requires_runtime() {
        assert!(BrowserManager::new(BrowserConfig::default(), "ua").is_err());
    }

    #[test]
    fn blocking_close_from_plain_thread() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let manager =
            BrowserManager::with_runtime(BrowserConfig::default(), "ua", rt.handle().clone());
        manager.close_blocking().unwrap();
        manager.close_blocking().unwrap();
    }

    #[tokio::test]
    async fn finished_download_skips_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("doc.pdf.crdownload"), b"partial")
            .await
            .unwrap();
        assert!(finished_download(dir.path()).await.unwrap().is_none());

        tokio::fs::write(dir.path().join("doc.pdf"), b"%PDF-1.4 body")
            .await
            .unwrap();
        let bytes = finished_download(dir.path()).await.unwrap().unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
