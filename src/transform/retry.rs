use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::{GenerationParams, TextTransform, TransformError};

/// Exponential backoff settings for retryable transform failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first call
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles on every further attempt
    pub base_delay: Duration,

    /// Ceiling for a single backoff delay
    pub max_delay: Duration,

    /// Add a random offset in `[0, base_delay]` to every delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(120),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Deterministic part of the delay after the given failed attempt (1-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn delay_for(&self, attempt: u32, error: &TransformError) -> Duration {
        let mut delay = self.backoff_delay(attempt);

        if let TransformError::RateLimited { retry_after: Some(hint), .. } = error {
            delay = delay.max((*hint).min(self.max_delay));
        }

        if self.jitter {
            let spread = self.base_delay.as_millis() as u64;
            if spread > 0 {
                delay += Duration::from_millis(rand::thread_rng().gen_range(0..=spread));
            }
        }

        delay
    }
}

/// Wraps a raw backend with a per-call timeout and retry-with-backoff.
///
/// Attempt counters live on the stack of each `complete` call, so concurrent
/// calls through the same wrapper never share backoff state.
pub struct RetryingTransform {
    inner: Arc<dyn TextTransform>,
    policy: RetryPolicy,
    timeout: Option<Duration>,
    label: String,
}

impl RetryingTransform {
    pub fn new(inner: Arc<dyn TextTransform>, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            timeout: None,
            label: "backend".to_string(),
        }
    }

    /// Bound every individual attempt; an elapsed timeout counts as transient
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    async fn attempt(&self, prompt: &str, params: &GenerationParams) -> Result<String, TransformError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.inner.complete(prompt, params))
                .await
                .unwrap_or(Err(TransformError::Timeout(limit))),
            None => self.inner.complete(prompt, params).await,
        }
    }
}

#[async_trait]
impl TextTransform for RetryingTransform {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, TransformError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(prompt, params).await {
                Ok(text) => {
                    if attempt > 1 {
                        tracing::debug!(label = %self.label, attempt, "Call succeeded after retry");
                    }
                    return Ok(text);
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.policy.delay_for(attempt, &err);
                    tracing::warn!(
                        label = %self.label,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "{}; retrying",
                        err
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_retryable() {
                        tracing::warn!(label = %self.label, attempts = attempt, "Giving up: {}", err);
                    }
                    return Err(err);
                }
            }
        }
    }
}
