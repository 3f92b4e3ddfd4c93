use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod chat;
pub mod retry;

pub use chat::{ChatCompletionsBackend, Provider};
pub use retry::{RetryPolicy, RetryingTransform};

/// Sampling parameters sent along with every prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Sampling temperature
    pub temperature: f32,

    /// Upper bound on generated tokens
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.25,
            max_output_tokens: 1024,
        }
    }
}

/// Failure modes of a single text-generation call
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Rate limited by backend: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Transient backend failure: {0}")]
    Transient(String),

    #[error("Backend call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Backend call failed: {0}")]
    Fatal(String),
}

impl TransformError {
    /// Whether a retry has a chance of succeeding
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransformError::Fatal(_))
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        TransformError::RateLimited {
            message: message.into(),
            retry_after: None,
        }
    }
}

/// Opaque text-generation capability: maps a prompt to text.
///
/// Implementations may be slow, fail transiently, or be rate limited. Callers
/// that need resilience wrap them in [`RetryingTransform`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextTransform: Send + Sync {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, TransformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_fatal_is_final() {
        assert!(TransformError::rate_limited("slow down").is_retryable());
        assert!(TransformError::Transient("connection reset".into()).is_retryable());
        assert!(TransformError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(!TransformError::Fatal("bad request".into()).is_retryable());
    }
}
