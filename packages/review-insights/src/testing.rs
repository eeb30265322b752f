//! Testing utilities including mock implementations.
//!
//! These let the loader, collector and analyst be exercised without a
//! browser or a model service.

use async_trait::async_trait;
use openai_client::{ChatRequest, ChatResponse, FinishReason, OpenAIError};
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{LoadError, LoadResult};
use crate::invoker::ChatModel;
use crate::loader::{Actuation, ContentSession, ContentSource, DocumentSnapshot};

// =============================================================================
// Mock Content Source
// =============================================================================

/// Shared record of what sessions did, for assertions.
#[derive(Debug, Default)]
struct SessionLogInner {
    opened: Vec<String>,
    actuations: Vec<Actuation>,
    closed: usize,
}

/// Handle onto a [`MockContentSource`]'s call log.
#[derive(Debug, Clone, Default)]
pub struct SessionLog {
    inner: Arc<RwLock<SessionLogInner>>,
}

impl SessionLog {
    /// Locators passed to `open`.
    pub fn opened(&self) -> Vec<String> {
        self.inner.read().unwrap().opened.clone()
    }

    /// Every actuation in order, failed ones included.
    pub fn actuations(&self) -> Vec<Actuation> {
        self.inner.read().unwrap().actuations.clone()
    }

    /// Number of `close` calls.
    pub fn closed(&self) -> usize {
        self.inner.read().unwrap().closed
    }
}

/// A scripted content source.
///
/// Each `visible_items` call returns the next configured count; the last
/// count repeats once the script runs out.
#[derive(Debug, Clone)]
pub struct MockContentSource {
    html: String,
    counts: Vec<usize>,
    load_more: bool,
    fail_open: bool,
    fail_scroll_after: Option<usize>,
    fail_snapshot: bool,
    log: SessionLog,
}

impl MockContentSource {
    /// Create a source whose snapshot is `html`.
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            counts: Vec::new(),
            load_more: false,
            fail_open: false,
            fail_scroll_after: None,
            fail_snapshot: false,
            log: SessionLog::default(),
        }
    }

    /// Item counts reported by successive inspections.
    pub fn with_counts(mut self, counts: impl IntoIterator<Item = usize>) -> Self {
        self.counts = counts.into_iter().collect();
        self
    }

    /// Whether a "load more" control is present.
    pub fn with_load_more(mut self, present: bool) -> Self {
        self.load_more = present;
        self
    }

    /// Never establish the initial view.
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Let `n` scrolls succeed, then fail every further scroll.
    pub fn failing_scroll_after(mut self, n: usize) -> Self {
        self.fail_scroll_after = Some(n);
        self
    }

    /// Fail when the final document is read.
    pub fn failing_snapshot(mut self) -> Self {
        self.fail_snapshot = true;
        self
    }

    /// Call log shared with every session this source opens.
    pub fn log(&self) -> SessionLog {
        self.log.clone()
    }
}

#[async_trait]
impl ContentSource for MockContentSource {
    type Session = MockSession;

    async fn open(&self, locator: &str) -> LoadResult<MockSession> {
        self.log
            .inner
            .write()
            .unwrap()
            .opened
            .push(locator.to_string());

        if self.fail_open {
            return Err(LoadError::InitialViewUnavailable {
                locator: locator.to_string(),
                waited: Duration::from_secs(20),
            });
        }

        Ok(MockSession {
            source: self.clone(),
            locator: locator.to_string(),
            inspections: 0,
            scrolls: 0,
        })
    }
}

/// Session opened by [`MockContentSource`].
#[derive(Debug)]
pub struct MockSession {
    source: MockContentSource,
    locator: String,
    inspections: usize,
    scrolls: usize,
}

#[async_trait]
impl ContentSession for MockSession {
    async fn actuate(&mut self, action: Actuation) -> LoadResult<bool> {
        self.source
            .log
            .inner
            .write()
            .unwrap()
            .actuations
            .push(action);

        match action {
            Actuation::Scroll => {
                self.scrolls += 1;
                match self.source.fail_scroll_after {
                    Some(n) if self.scrolls > n => {
                        Err(LoadError::Browser("mock scroll failure".into()))
                    }
                    _ => Ok(true),
                }
            }
            Actuation::LoadMore => Ok(self.source.load_more),
        }
    }

    async fn visible_items(&mut self) -> LoadResult<usize> {
        let counts = &self.source.counts;
        let count = match counts.len() {
            0 => 0,
            len => counts[self.inspections.min(len - 1)],
        };
        self.inspections += 1;
        Ok(count)
    }

    async fn snapshot(&mut self) -> LoadResult<DocumentSnapshot> {
        if self.source.fail_snapshot {
            return Err(LoadError::Snapshot("mock snapshot failure".into()));
        }
        Ok(DocumentSnapshot {
            locator: self.locator.clone(),
            html: self.source.html.clone(),
        })
    }

    async fn close(&mut self) -> LoadResult<()> {
        self.source.log.inner.write().unwrap().closed += 1;
        Ok(())
    }
}

// =============================================================================
// Mock Chat Model
// =============================================================================

/// One scripted model reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Complete answer
    Text(String),
    /// Answer cut at the output cap
    Truncated(String),
    /// Throttling signal with an optional retry hint
    Throttled(Option<Duration>),
    /// Non-throttling service fault
    Fail(String),
}

/// A chat model that plays back scripted replies and records requests.
#[derive(Debug, Clone)]
pub struct MockChatModel {
    replies: Arc<RwLock<VecDeque<MockReply>>>,
    default_reply: MockReply,
    requests: Arc<RwLock<Vec<ChatRequest>>>,
}

impl Default for MockChatModel {
    fn default() -> Self {
        Self {
            replies: Arc::default(),
            default_reply: MockReply::Text("mock answer".into()),
            requests: Arc::default(),
        }
    }
}

impl MockChatModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply; queued replies are used before the default.
    pub fn reply(self, reply: MockReply) -> Self {
        self.replies.write().unwrap().push_back(reply);
        self
    }

    /// Reply used once the queue is empty.
    pub fn default_reply(mut self, reply: MockReply) -> Self {
        self.default_reply = reply;
        self
    }

    /// Requests received, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.read().unwrap().clone()
    }

    /// Number of requests received.
    pub fn calls(&self) -> usize {
        self.requests.read().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(&self, request: ChatRequest) -> openai_client::Result<ChatResponse> {
        self.requests.write().unwrap().push(request);

        let reply = self
            .replies
            .write()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone());

        match reply {
            MockReply::Text(content) => Ok(ChatResponse {
                content,
                finish_reason: Some(FinishReason::Stop),
                usage: None,
            }),
            MockReply::Truncated(content) => Ok(ChatResponse {
                content,
                finish_reason: Some(FinishReason::Length),
                usage: None,
            }),
            MockReply::Throttled(retry_after) => Err(OpenAIError::RateLimited { retry_after }),
            MockReply::Fail(message) => Err(OpenAIError::Api {
                status: 500,
                message,
            }),
        }
    }
}
