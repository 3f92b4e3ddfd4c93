use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

pub mod local;
pub mod speech;
pub mod subtitles;

pub use local::LocalFileSource;
pub use speech::SpeechToTextSource;
pub use subtitles::{captions_to_text, SubtitleSource};

use crate::ScribeError;

/// Why a source produced no text
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("No transcript available: {0}")]
    NotAvailable(String),

    #[error("{tool} is not installed or not on PATH")]
    ToolMissing { tool: String },

    #[error("Transcript acquisition failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that can turn a video identifier into raw transcript text
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch(&self, video_id: &str, language: Option<&str>) -> Result<String, SourceError>;
}

/// Where the transcript text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptOrigin {
    Subtitles,
    SpeechToText,
    LocalFile,
}

impl std::fmt::Display for TranscriptOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptOrigin::Subtitles => write!(f, "subtitles"),
            TranscriptOrigin::SpeechToText => write!(f, "speech-to-text"),
            TranscriptOrigin::LocalFile => write!(f, "local file"),
        }
    }
}

/// Raw transcript text plus provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub origin: TranscriptOrigin,
}

/// Routes an input to a source and falls back to speech-to-text when a video
/// has no subtitles
pub struct TranscriptAcquirer {
    primary: Box<dyn TranscriptSource>,
    fallback: Option<Box<dyn TranscriptSource>>,
    local: LocalFileSource,
}

impl TranscriptAcquirer {
    pub fn new(primary: Box<dyn TranscriptSource>) -> Self {
        Self {
            primary,
            fallback: None,
            local: LocalFileSource::new(),
        }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn TranscriptSource>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// yt-dlp subtitles, with whisper as fallback when `speech_fallback` is set
    pub fn youtube(speech_fallback: Option<SpeechToTextSource>) -> Self {
        let acquirer = Self::new(Box::new(SubtitleSource::new()));
        match speech_fallback {
            Some(speech) => acquirer.with_fallback(Box::new(speech)),
            None => acquirer,
        }
    }

    /// Check if input is a local file path
    pub fn is_local_file(&self, input: &str) -> bool {
        if input.starts_with("http://") || input.starts_with("https://") {
            return false;
        }

        let path = Path::new(input);
        if path.exists() {
            return true;
        }

        let has_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| LocalFileSource::supports_extension(ext))
            .unwrap_or(false);
        has_extension || input.contains('/') || input.contains('\\')
    }

    /// Produce the transcript for a URL, bare video id, or local file
    pub async fn acquire(&self, input: &str, language: Option<&str>) -> Result<Transcript, ScribeError> {
        let text_or_fail = |text: String, origin: TranscriptOrigin| {
            if text.trim().is_empty() {
                Err(ScribeError::AcquisitionFailed(format!("{} produced no text", origin)))
            } else {
                Ok(Transcript { text, origin })
            }
        };

        if self.is_local_file(input) {
            let text = self
                .local
                .read(Path::new(input))
                .await
                .map_err(|e| ScribeError::AcquisitionFailed(e.to_string()))?;
            return text_or_fail(text, TranscriptOrigin::LocalFile);
        }

        let video_id = extract_video_id(input)
            .ok_or_else(|| ScribeError::AcquisitionFailed(format!("Could not find a video id in: {}", input)))?;

        tracing::info!("Fetching subtitles for video {}", video_id);
        match self.primary.fetch(&video_id, language).await {
            Ok(text) if !text.trim().is_empty() => {
                return Ok(Transcript {
                    text,
                    origin: TranscriptOrigin::Subtitles,
                });
            }
            Ok(_) => tracing::info!("Subtitles were empty"),
            Err(SourceError::NotAvailable(reason)) => tracing::info!("Subtitles unavailable: {}", reason),
            Err(err) => return Err(ScribeError::AcquisitionFailed(err.to_string())),
        }

        let fallback = self.fallback.as_ref().ok_or_else(|| {
            ScribeError::AcquisitionFailed(format!(
                "Video {} has no subtitles and speech-to-text fallback is disabled",
                video_id
            ))
        })?;

        tracing::info!("Transcript not found, using speech-to-text fallback");
        let text = fallback
            .fetch(&video_id, language)
            .await
            .map_err(|e| ScribeError::AcquisitionFailed(e.to_string()))?;
        text_or_fail(text, TranscriptOrigin::SpeechToText)
    }
}

/// Pull the YouTube video id out of a URL, or accept a bare 11-char id
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if is_video_id(input) {
        return Some(input.to_string());
    }

    let parsed = Url::parse(input).ok()?;
    let host = parsed.host_str()?.trim_start_matches("www.").trim_start_matches("m.");

    let candidate = match host {
        "youtu.be" => parsed.path_segments()?.next().map(str::to_string),
        "youtube.com" | "music.youtube.com" => {
            let mut segments = parsed.path_segments()?;
            match segments.next() {
                Some("watch") => parsed
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned()),
                Some("embed") | Some("shorts") | Some("live") | Some("v") => segments.next().map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    };

    candidate.filter(|id| is_video_id(id))
}

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Canonical watch URL for a video id
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}
