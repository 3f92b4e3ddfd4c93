use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{GenerationParams, TextTransform, TransformError};

/// Hosted LLM providers exposing an OpenAI-compatible chat completions API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    Groq,
    Openai,
}

impl Provider {
    pub fn default_api_url(&self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions",
            Provider::Groq => "https://api.groq.com/openai/v1/chat/completions",
            Provider::Openai => "https://api.openai.com/v1/chat/completions",
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::Groq => "GROQ_API_KEY",
            Provider::Openai => "OPENAI_API_KEY",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini => "Gemini",
            Provider::Groq => "Groq",
            Provider::Openai => "OpenAI",
        }
    }

    /// Read the API key from the provider's environment variable
    pub fn api_key(&self) -> crate::Result<String> {
        std::env::var(self.api_key_env()).map_err(|_| {
            anyhow::anyhow!(
                "Missing API key for {}: set the {} environment variable",
                self.name(),
                self.api_key_env()
            )
        })
    }
}

/// One model behind a chat completions endpoint
#[derive(Clone)]
pub struct ChatCompletionsBackend {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsBackend {
    pub fn new(client: Client, api_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, prompt: &str, params: &GenerationParams) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": prompt,
                },
            ],
            "temperature": params.temperature,
            "max_tokens": params.max_output_tokens,
        })
    }
}

#[async_trait]
impl TextTransform for ChatCompletionsBackend {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, TransformError> {
        tracing::debug!(model = %self.model, prompt_chars = prompt.chars().count(), "Sending completion request");

        let response = self
            .client
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request_body(prompt, params))
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, &body));
        }

        let payload = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| TransformError::Transient(format!("Failed to read response body: {}", e)))?;

        extract_content(&payload)
    }
}

fn classify_request_error(err: reqwest::Error) -> TransformError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        TransformError::Transient(err.to_string())
    } else {
        TransformError::Fatal(err.to_string())
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> TransformError {
    let message = format!("HTTP {}: {}", status, truncate(body, 300));

    if status == StatusCode::TOO_MANY_REQUESTS {
        TransformError::RateLimited { message, retry_after }
    } else if status == StatusCode::REQUEST_TIMEOUT || status.is_server_error() {
        TransformError::Transient(message)
    } else {
        TransformError::Fatal(message)
    }
}

fn extract_content(payload: &serde_json::Value) -> Result<String, TransformError> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(|content| content.trim().to_string())
        .ok_or_else(|| TransformError::Fatal(format!("Invalid API response: {}", truncate(&payload.to_string(), 300))))
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
