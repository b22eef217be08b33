use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use innerally_core::assistant::{AssistantService, RunStatus, ThreadMessage};
use innerally_core::errors::RemoteError;
use innerally_core::ids::{AssistantId, MessageId, RunId, ThreadId};
use innerally_core::messages::Role;

/// Configuration for the ReliableAssistant retry behavior.
#[derive(Clone, Debug)]
pub struct ReliableConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
}

impl Default for ReliableConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter_factor: 0.2,
        }
    }
}

/// Which errors a call may be retried on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RetryScope {
    /// Safe to repeat: reads, and thread creation (an orphan thread is harmless).
    AnyRetryable,
    /// Has a side effect on the thread: only retried when the server refused
    /// it before acting.
    RejectedOnly,
}

impl RetryScope {
    fn allows(self, err: &RemoteError) -> bool {
        match self {
            Self::AnyRetryable => err.is_retryable(),
            Self::RejectedOnly => err.is_rejected_before_processing(),
        }
    }
}

/// Wraps an AssistantService with retry and exponential backoff.
///
/// - Retries with exponential backoff + jitter, honoring `retry_after` hints
/// - Message appends and run starts are never repeated after an ambiguous
///   failure (network error, 5xx), so a user turn is never duplicated
pub struct ReliableAssistant<S: AssistantService> {
    inner: S,
    config: ReliableConfig,
    total_retries: AtomicU64,
}

impl<S: AssistantService> ReliableAssistant<S> {
    pub fn new(inner: S, config: ReliableConfig) -> Self {
        Self {
            inner,
            config,
            total_retries: AtomicU64::new(0),
        }
    }

    pub fn with_defaults(inner: S) -> Self {
        Self::new(inner, ReliableConfig::default())
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn total_retries(&self) -> u64 {
        self.total_retries.load(Ordering::Relaxed)
    }

    /// Delay before retry `attempt` (0-based): base * 2^attempt, capped, ± jitter.
    /// A server hint replaces the backoff but is held to the same cap.
    fn retry_delay(&self, attempt: u32, suggested: Option<Duration>) -> Duration {
        if let Some(delay) = suggested {
            return delay.min(self.config.max_delay);
        }

        let exp = self.config.base_delay.as_millis() as f64 * 2.0_f64.powi(attempt as i32);
        let capped = exp.min(self.config.max_delay.as_millis() as f64);

        let spread = capped * self.config.jitter_factor;
        let jitter = if spread > 0.0 {
            rand::thread_rng().gen_range(-spread..=spread)
        } else {
            0.0
        };
        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }

    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        scope: RetryScope,
        mut call: F,
    ) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt >= self.config.max_retries || !scope.allows(&e) {
                        return Err(e);
                    }

                    let delay = self.retry_delay(attempt, e.suggested_delay());
                    self.total_retries.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error_kind = e.error_kind(),
                        error = %e,
                        "retrying after error"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl<S: AssistantService> AssistantService for ReliableAssistant<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn create_thread(&self) -> Result<ThreadId, RemoteError> {
        self.with_retry("create_thread", RetryScope::AnyRetryable, || {
            self.inner.create_thread()
        })
        .await
    }

    async fn append_message(
        &self,
        thread: &ThreadId,
        role: Role,
        content: &str,
    ) -> Result<MessageId, RemoteError> {
        self.with_retry("append_message", RetryScope::RejectedOnly, || {
            self.inner.append_message(thread, role, content)
        })
        .await
    }

    async fn start_run(
        &self,
        thread: &ThreadId,
        assistant: &AssistantId,
    ) -> Result<RunId, RemoteError> {
        self.with_retry("start_run", RetryScope::RejectedOnly, || {
            self.inner.start_run(thread, assistant)
        })
        .await
    }

    async fn run_status(&self, thread: &ThreadId, run: &RunId) -> Result<RunStatus, RemoteError> {
        self.with_retry("run_status", RetryScope::AnyRetryable, || {
            self.inner.run_status(thread, run)
        })
        .await
    }

    async fn list_messages(
        &self,
        thread: &ThreadId,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, RemoteError> {
        self.with_retry("list_messages", RetryScope::AnyRetryable, || {
            self.inner.list_messages(thread, limit)
        })
        .await
    }
}
