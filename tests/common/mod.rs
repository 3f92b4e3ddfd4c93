#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lecture_scribe::transform::{GenerationParams, TextTransform, TransformError};

/// Backend whose reply is computed from the prompt by a closure
pub struct ScriptedTransform<F> {
    reply: F,
    calls: Arc<AtomicUsize>,
}

impl<F> ScriptedTransform<F>
where
    F: Fn(&str) -> Result<String, TransformError> + Send + Sync + 'static,
{
    pub fn new(reply: F) -> Self {
        Self {
            reply,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared call counter, readable after the backend moves into an agent
    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl<F> TextTransform for ScriptedTransform<F>
where
    F: Fn(&str) -> Result<String, TransformError> + Send + Sync + 'static,
{
    async fn complete(&self, prompt: &str, _params: &GenerationParams) -> Result<String, TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.reply)(prompt)
    }
}

/// Every `topic-N` / `batch-N` style marker in a prompt, in order
pub fn markers<'a>(prompt: &'a str, prefix: &str) -> Vec<&'a str> {
    prompt
        .match_indices(prefix)
        .filter_map(|(start, _)| prompt[start..].split(|c: char| c.is_whitespace()).next())
        .map(|token| token.trim_end_matches(|c: char| !c.is_ascii_alphanumeric()))
        .collect()
}

/// One 60-char sentence per topic, joined by single spaces
pub fn lecture(topics: usize) -> String {
    (0..topics)
        .map(|k| format!("{:x<59}.", format!("topic-{} ", k)))
        .collect::<Vec<_>>()
        .join(" ")
}
