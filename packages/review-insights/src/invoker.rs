//! Resilient access to the language-model service.
//!
//! Every call goes through a process-wide [`RateLimiter`] that enforces a
//! minimum spacing between requests, and a [`RetryPolicy`] that backs off
//! exponentially while the service reports throttling. Any other service
//! fault is returned immediately.

use async_trait::async_trait;
use openai_client::{ChatRequest, ChatResponse, OpenAIClient, OpenAIError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Result, ReviewError};

/// Appended to answers the model cut short at its output cap.
pub const TRUNCATION_MARKER: &str = "\n\n[回答因長度限制被截斷 / answer truncated at the length limit]";

// =============================================================================
// Chat Model Seam
// =============================================================================

/// Anything that can serve a chat completion.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> openai_client::Result<ChatResponse>;
}

#[async_trait]
impl ChatModel for OpenAIClient {
    async fn complete(&self, request: ChatRequest) -> openai_client::Result<ChatResponse> {
        self.chat_completion(request).await
    }
}

#[async_trait]
impl<M: ChatModel + ?Sized> ChatModel for Arc<M> {
    async fn complete(&self, request: ChatRequest) -> openai_client::Result<ChatResponse> {
        (**self).complete(request).await
    }
}

// =============================================================================
// Rate Limiter
// =============================================================================

/// Minimum spacing between consecutive model calls.
///
/// Shared by every invoker in the process; concurrent callers are
/// serialized so no two calls start closer together than `min_interval`.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Spacing that keeps calls under `requests_per_minute`.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let rpm = requests_per_minute.max(1);
        Self::new(Duration::from_secs(60) / rpm)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a call may start, and claim that slot.
    pub async fn until_ready(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let ready_at = last + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                debug!(wait_ms = (ready_at - now).as_millis() as u64, "Waiting for rate limit slot");
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Exponential backoff for throttled calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Delay before the first retry; doubled on each further retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay after the zero-based `attempt` failed.
    ///
    /// A server-provided hint wins over the computed backoff.
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        hint.unwrap_or_else(|| {
            self.base_delay
                .saturating_mul(2u32.saturating_pow(attempt))
        })
    }
}

// =============================================================================
// Invoker
// =============================================================================

/// Model output plus whether it hit the length cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub truncated: bool,
}

impl Completion {
    /// Text with the truncation marker appended when the output was cut.
    pub fn into_marked_text(self) -> String {
        if self.truncated {
            format!("{}{}", self.text, TRUNCATION_MARKER)
        } else {
            self.text
        }
    }
}

/// Rate-limited, throttling-aware model caller.
pub struct ModelInvoker<M> {
    model: M,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl<M: ChatModel> ModelInvoker<M> {
    pub fn new(model: M, limiter: Arc<RateLimiter>, retry: RetryPolicy) -> Self {
        Self {
            model,
            limiter,
            retry,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Send one request, retrying only while the service throttles.
    pub async fn invoke(&self, request: ChatRequest) -> Result<Completion> {
        let attempts = self.retry.max_attempts.max(1);

        for attempt in 0..attempts {
            self.limiter.until_ready().await;

            match self.model.complete(request.clone()).await {
                Ok(response) => {
                    let truncated = response.is_length_limited();
                    if truncated {
                        info!(model = %request.model, "Model output hit the length limit");
                    }
                    return Ok(Completion {
                        text: response.content,
                        truncated,
                    });
                }
                Err(OpenAIError::RateLimited { retry_after }) => {
                    if attempt + 1 == attempts {
                        break;
                    }
                    let delay = self.retry.delay_for(attempt, retry_after);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Model service throttled, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(error = %e, "Model call failed");
                    return Err(ReviewError::Model(e.to_string()));
                }
            }
        }

        warn!(attempts, "Model service still throttling, giving up");
        Err(ReviewError::Throttled { attempts })
    }
}
