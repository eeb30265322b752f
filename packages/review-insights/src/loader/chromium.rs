//! Headless Chrome content source (chromiumoxide).
//!
//! Opens the place page, best-effort clicks the first search result and the
//! reviews tab, waits for the first review item, then scrolls the review
//! panel and clicks "load more" on request.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Actuation, ContentSession, ContentSource, DocumentSnapshot};
use crate::error::{LoadError, LoadResult};

/// Browser-like User-Agent to avoid bot detection
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Launch and page-interaction settings.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Run without a visible window
    pub headless: bool,

    /// Explicit Chrome binary (auto-detected when unset)
    pub chrome_executable: Option<PathBuf>,

    pub user_agent: String,

    /// How long to wait for the first review item
    pub initial_wait: Duration,

    /// Poll interval while waiting for the first review item
    pub poll_interval: Duration,

    /// Pause after clicking the first result or the reviews tab
    pub settle_pause: Duration,

    /// Timeout for short-link expansion
    pub expand_timeout: Duration,

    /// CSS selector matching one review item
    pub review_selector: String,

    /// How long to wait for Chrome to exit before killing it
    pub exit_wait: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_executable: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            initial_wait: Duration::from_secs(20),
            poll_interval: Duration::from_millis(500),
            settle_pause: Duration::from_secs(2),
            expand_timeout: Duration::from_secs(5),
            review_selector: "[data-review-id]".to_string(),
            exit_wait: Duration::from_secs(10),
        }
    }
}

/// Content source backed by a fresh Chrome process per session.
pub struct ChromiumSource {
    options: BrowserOptions,
    http: reqwest::Client,
}

impl ChromiumSource {
    pub fn new(options: BrowserOptions) -> LoadResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(options.expand_timeout)
            .user_agent(options.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| LoadError::Browser(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { options, http })
    }

    /// Follow redirects (short links) to the final locator.
    ///
    /// Falls back to the input when the request fails.
    pub async fn expand_locator(&self, locator: &str) -> String {
        match self.http.get(locator).send().await {
            Ok(response) => {
                let expanded = response.url().to_string();
                if expanded != locator {
                    debug!(from = %locator, to = %expanded, "Expanded locator");
                }
                expanded
            }
            Err(e) => {
                warn!(locator = %locator, error = %e, "Locator expansion failed, using it as given");
                locator.to_string()
            }
        }
    }

    async fn launch(&self) -> LoadResult<(Browser, JoinHandle<()>)> {
        let mut builder = BrowserConfig::builder()
            .window_size(1920, 1080)
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-extensions")
            .arg(format!("--user-agent={}", self.options.user_agent));

        if !self.options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.options.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        let config = builder
            .build()
            .map_err(|e| LoadError::Browser(format!("failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| LoadError::Browser(format!("failed to launch browser: {}", e)))?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = ?e, "Browser handler error");
                }
            }
        });

        Ok((browser, handle))
    }
}

#[async_trait]
impl ContentSource for ChromiumSource {
    type Session = ChromiumSession;

    async fn open(&self, locator: &str) -> LoadResult<ChromiumSession> {
        let target = self.expand_locator(locator).await;
        let (browser, handler) = self.launch().await?;

        let mut session = ChromiumSession {
            browser,
            handler,
            page: None,
            locator: target,
            review_selector: self.options.review_selector.clone(),
            exit_wait: self.options.exit_wait,
            closed: false,
        };

        match session.prepare(&self.options).await {
            Ok(()) => Ok(session),
            Err(e) => {
                if let Err(close_err) = session.close().await {
                    warn!(error = %close_err, "Failed to close browser after open failure");
                }
                Err(e)
            }
        }
    }
}

/// One Chrome process showing one place page.
pub struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Option<Page>,
    locator: String,
    review_selector: String,
    exit_wait: Duration,
    closed: bool,
}

impl ChromiumSession {
    async fn prepare(&mut self, options: &BrowserOptions) -> LoadResult<()> {
        info!(locator = %self.locator, "Opening place page");
        let page = self
            .browser
            .new_page(self.locator.as_str())
            .await
            .map_err(|e| LoadError::Browser(format!("navigation failed: {}", e)))?;
        self.page = Some(page);

        // Search pages list results first; place pages open on an overview tab.
        if self.eval::<bool>(CLICK_FIRST_RESULT_JS).await.unwrap_or(false) {
            debug!("Clicked first search result");
            tokio::time::sleep(options.settle_pause).await;
        }
        if self.eval::<bool>(OPEN_REVIEWS_TAB_JS).await.unwrap_or(false) {
            debug!("Opened reviews tab");
            tokio::time::sleep(options.settle_pause).await;
        }

        self.wait_for_reviews(options).await
    }

    async fn wait_for_reviews(&self, options: &BrowserOptions) -> LoadResult<()> {
        let deadline = tokio::time::Instant::now() + options.initial_wait;
        loop {
            match self.count_reviews().await {
                Ok(count) if count > 0 => return Ok(()),
                Ok(_) => {}
                Err(e) => debug!(error = %e, "Review count not readable yet"),
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(LoadError::InitialViewUnavailable {
                    locator: self.locator.clone(),
                    waited: options.initial_wait,
                });
            }
            tokio::time::sleep(options.poll_interval).await;
        }
    }

    fn page(&self) -> LoadResult<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| LoadError::Browser("no page open".into()))
    }

    async fn eval<T: DeserializeOwned>(&self, script: &str) -> LoadResult<T> {
        self.page()?
            .evaluate(script)
            .await
            .map_err(|e| LoadError::Browser(format!("script failed: {}", e)))?
            .into_value::<T>()
            .map_err(|e| LoadError::Browser(format!("unexpected script result: {}", e)))
    }

    async fn count_reviews(&self) -> LoadResult<usize> {
        let script = format!(
            "document.querySelectorAll({}).length",
            js_string(&self.review_selector)
        );
        let count: u64 = self.eval(&script).await?;
        Ok(count as usize)
    }
}

#[async_trait]
impl ContentSession for ChromiumSession {
    async fn actuate(&mut self, action: Actuation) -> LoadResult<bool> {
        let selector = js_string(&self.review_selector);
        let script = match action {
            Actuation::Scroll => SCROLL_REVIEWS_JS.replace("{selector}", &selector),
            Actuation::LoadMore => LOAD_MORE_JS.replace("{selector}", &selector),
        };
        self.eval(&script).await
    }

    async fn visible_items(&mut self) -> LoadResult<usize> {
        self.count_reviews().await
    }

    async fn snapshot(&mut self) -> LoadResult<DocumentSnapshot> {
        let html = self
            .page()?
            .content()
            .await
            .map_err(|e| LoadError::Snapshot(e.to_string()))?;
        Ok(DocumentSnapshot {
            locator: self.locator.clone(),
            html,
        })
    }

    async fn close(&mut self) -> LoadResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.page = None;

        let result = shut_down(&mut self.browser, self.exit_wait).await;
        self.handler.abort();
        debug!(locator = %self.locator, "Browser session closed");
        result
    }
}

/// The Chrome child process as seen by the shutdown sequence.
#[async_trait]
trait BrowserProcess: Send {
    /// Ask the browser to close over CDP.
    async fn request_close(&mut self) -> Result<(), String>;

    /// Kill the child process and reap it.
    async fn force_kill(&mut self);

    /// Wait for the child process to exit.
    async fn wait_exit(&mut self) -> Result<(), String>;
}

#[async_trait]
impl BrowserProcess for Browser {
    async fn request_close(&mut self) -> Result<(), String> {
        self.close().await.map(|_| ()).map_err(|e| e.to_string())
    }

    async fn force_kill(&mut self) {
        if let Some(Err(e)) = self.kill().await {
            warn!(error = %e, "Failed to kill browser process");
        }
    }

    async fn wait_exit(&mut self) -> Result<(), String> {
        self.wait().await.map(|_| ()).map_err(|e| e.to_string())
    }
}

/// Close the browser, killing the process when it refuses or fails to exit.
///
/// Returns the close-request error, if any, after the process is gone.
async fn shut_down<P: BrowserProcess>(process: &mut P, exit_wait: Duration) -> LoadResult<()> {
    let result = process
        .request_close()
        .await
        .map_err(|e| LoadError::Browser(format!("failed to close browser: {}", e)));

    if let Err(e) = &result {
        warn!(error = %e, "Close request failed, killing browser process");
        process.force_kill().await;
    }

    match tokio::time::timeout(exit_wait, process.wait_exit()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "Browser process wait failed"),
        Err(_) => {
            warn!(waited = ?exit_wait, "Browser did not exit, killing it");
            process.force_kill().await;
        }
    }

    result
}

/// Quote a value as a JavaScript string literal.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

const CLICK_FIRST_RESULT_JS: &str = r#"(() => {
    const el = document.querySelector('div.section-result, div[data-result-index]');
    if (el) { el.click(); return true; }
    return false;
})()"#;

const OPEN_REVIEWS_TAB_JS: &str = r#"(() => {
    const tabs = Array.from(document.querySelectorAll("button[role='tab']"));
    const tab = tabs.find(t => t.textContent.includes('評論') || t.textContent.includes('Reviews'));
    if (tab) { tab.click(); return true; }
    return false;
})()"#;

const SCROLL_REVIEWS_JS: &str = r#"(() => {
    const first = document.querySelector({selector});
    function scrollParent(n) {
        if (!n) return document.scrollingElement || document.documentElement;
        const overflow = getComputedStyle(n).overflowY;
        return ['auto', 'scroll'].includes(overflow) ? n : scrollParent(n.parentElement);
    }
    const container = scrollParent(first);
    container.scrollTop = container.scrollHeight;
    return true;
})()"#;

const LOAD_MORE_JS: &str = r#"(() => {
    const buttons = Array.from(document.querySelectorAll('button'));
    const more = buttons.find(b => b.textContent.includes('Load more') || b.textContent.includes('顯示更多評論'));
    if (more) { more.click(); return true; }
    return false;
})()"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string("[data-review-id]"), r#""[data-review-id]""#);
        assert_eq!(js_string(r#"a"b"#), r#""a\"b""#);
    }

    #[test]
    fn test_scroll_script_embeds_selector() {
        let script = SCROLL_REVIEWS_JS.replace("{selector}", &js_string("[data-review-id]"));
        assert!(script.contains(r#"document.querySelector("[data-review-id]")"#));
    }

    #[test]
    fn test_default_options() {
        let options = BrowserOptions::default();
        assert!(options.headless);
        assert_eq!(options.initial_wait, Duration::from_secs(20));
        assert_eq!(options.review_selector, "[data-review-id]");
    }

    #[tokio::test]
    async fn test_expand_locator_falls_back_on_error() {
        let source = ChromiumSource::new(BrowserOptions {
            expand_timeout: Duration::from_millis(200),
            ..Default::default()
        })
        .unwrap();

        let expanded = source.expand_locator("http://127.0.0.1:1/place/abc").await;
        assert_eq!(expanded, "http://127.0.0.1:1/place/abc");
    }

    /// Child process that exits on a successful close request or a kill.
    struct FakeProcess {
        close_fails: bool,
        ignores_close: bool,
        alive: bool,
        kills: usize,
    }

    impl FakeProcess {
        fn new() -> Self {
            Self {
                close_fails: false,
                ignores_close: false,
                alive: true,
                kills: 0,
            }
        }
    }

    #[async_trait]
    impl BrowserProcess for FakeProcess {
        async fn request_close(&mut self) -> Result<(), String> {
            if self.close_fails {
                return Err("handler gone".into());
            }
            if !self.ignores_close {
                self.alive = false;
            }
            Ok(())
        }

        async fn force_kill(&mut self) {
            self.kills += 1;
            self.alive = false;
        }

        async fn wait_exit(&mut self) -> Result<(), String> {
            if self.alive {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shut_down_clean_close_does_not_kill() {
        let mut process = FakeProcess::new();

        shut_down(&mut process, Duration::from_secs(10)).await.unwrap();

        assert!(!process.alive);
        assert_eq!(process.kills, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shut_down_kills_when_close_request_fails() {
        let mut process = FakeProcess {
            close_fails: true,
            ..FakeProcess::new()
        };

        let result = shut_down(&mut process, Duration::from_secs(10)).await;

        assert!(matches!(result, Err(LoadError::Browser(_))));
        assert!(!process.alive);
        assert_eq!(process.kills, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shut_down_kills_after_exit_wait_elapses() {
        let mut process = FakeProcess {
            ignores_close: true,
            ..FakeProcess::new()
        };
        let started = tokio::time::Instant::now();

        shut_down(&mut process, Duration::from_secs(10)).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(10));
        assert!(!process.alive);
        assert_eq!(process.kills, 1);
    }
}
