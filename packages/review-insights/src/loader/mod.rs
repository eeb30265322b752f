//! Progressive content loading.
//!
//! The review panel of a map-service page reveals more items only after the
//! client scrolls or clicks "load more", and gives no readiness signal. The
//! [`ProgressiveLoader`] drives a [`ContentSource`] session through
//! "advance, pause, inspect" cycles until the visible item count stops
//! growing or the iteration budget is spent, then reads the final document.
//!
//! The browser-backed source lives in [`chromium`]; tests use
//! [`crate::testing::MockContentSource`].

pub mod chromium;

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::LoadResult;

pub use chromium::{BrowserOptions, ChromiumSession, ChromiumSource};

/// Default number of scroll iterations.
pub const DEFAULT_SCROLL_TIMES: u32 = 15;

/// Default pause after each actuation.
pub const DEFAULT_SCROLL_PAUSE: Duration = Duration::from_millis(1500);

/// Raw document read from a content source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    /// Locator the document was loaded from (after redirect resolution)
    pub locator: String,

    /// Serialized DOM
    pub html: String,
}

/// Ways to ask the source for more content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actuation {
    /// Scroll the review container to its end
    Scroll,
    /// Click an explicit "load more" control
    LoadMore,
}

/// A remote, stateful content source.
#[async_trait]
pub trait ContentSource: Send + Sync {
    type Session: ContentSession;

    /// Open a session with the initial review view established.
    ///
    /// Fails with `LoadError::InitialViewUnavailable` when no review item
    /// appears. Implementations release their own resources on that path.
    async fn open(&self, locator: &str) -> LoadResult<Self::Session>;
}

/// One open view onto a content source.
#[async_trait]
pub trait ContentSession: Send {
    /// Trigger more content. `Ok(false)` means the affordance was absent.
    async fn actuate(&mut self, action: Actuation) -> LoadResult<bool>;

    /// Number of review items currently visible.
    async fn visible_items(&mut self) -> LoadResult<usize>;

    /// Read the current document.
    async fn snapshot(&mut self) -> LoadResult<DocumentSnapshot>;

    /// Release the session. Safe to call more than once.
    async fn close(&mut self) -> LoadResult<()>;
}

/// Loading parameters for one extraction run.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Upper bound on scroll iterations
    pub scroll_times: u32,

    /// Pause after each scroll and each successful "load more" click
    pub scroll_pause: Duration,

    /// Write the final document here (debugging aid)
    pub snapshot_path: Option<PathBuf>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            scroll_times: DEFAULT_SCROLL_TIMES,
            scroll_pause: DEFAULT_SCROLL_PAUSE,
            snapshot_path: None,
        }
    }
}

impl LoadConfig {
    pub fn new(scroll_times: u32, scroll_pause: Duration) -> Self {
        Self {
            scroll_times,
            scroll_pause,
            ..Default::default()
        }
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }
}

/// Result of a load run.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub snapshot: DocumentSnapshot,

    /// Iterations actually run
    pub iterations: u32,

    /// Items visible at the last inspection
    pub visible_items: usize,

    /// True when an iteration produced no new items
    pub exhausted: bool,

    /// Set when an actuation failed mid-run and the partial document was kept
    pub interrupted: Option<String>,
}

/// Drives a content source until its item count stops growing.
pub struct ProgressiveLoader<S> {
    source: S,
}

impl<S: ContentSource> ProgressiveLoader<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Load the document behind `locator`.
    ///
    /// The session is closed on every path once it has been opened.
    pub async fn load(&self, locator: &str, config: &LoadConfig) -> LoadResult<LoadOutcome> {
        info!(locator = %locator, scroll_times = config.scroll_times, "Loading review content");

        let mut session = self.source.open(locator).await?;
        let result = drive(&mut session, config).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "Failed to close content session");
        }

        if let Ok(outcome) = &result {
            info!(
                iterations = outcome.iterations,
                visible_items = outcome.visible_items,
                exhausted = outcome.exhausted,
                "Review content loaded"
            );
        }
        result
    }
}

async fn drive<T: ContentSession>(session: &mut T, config: &LoadConfig) -> LoadResult<LoadOutcome> {
    let mut previous = 0;
    let mut iterations = 0;
    let mut exhausted = false;
    let mut interrupted = None;

    for _ in 0..config.scroll_times {
        iterations += 1;
        match advance(session, config.scroll_pause).await {
            Ok(count) => {
                debug!(iteration = iterations, visible_items = count, "Scroll iteration");
                if count == previous {
                    exhausted = true;
                    break;
                }
                previous = count;
            }
            Err(e) => {
                warn!(iteration = iterations, error = %e, "Loading interrupted, keeping partial content");
                interrupted = Some(e.to_string());
                break;
            }
        }
    }

    let snapshot = session.snapshot().await?;

    if let Some(path) = &config.snapshot_path {
        match tokio::fs::write(path, &snapshot.html).await {
            Ok(()) => debug!(path = %path.display(), "Wrote document snapshot"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to write document snapshot"),
        }
    }

    Ok(LoadOutcome {
        snapshot,
        iterations,
        visible_items: previous,
        exhausted,
        interrupted,
    })
}

/// One "advance, pause, inspect" cycle.
async fn advance<T: ContentSession>(session: &mut T, pause: Duration) -> LoadResult<usize> {
    session.actuate(Actuation::Scroll).await?;
    tokio::time::sleep(pause).await;

    // A missing or broken "load more" control just means nothing to click.
    match session.actuate(Actuation::LoadMore).await {
        Ok(true) => tokio::time::sleep(pause).await,
        Ok(false) => {}
        Err(e) => debug!(error = %e, "Load-more affordance unavailable"),
    }

    session.visible_items().await
}
