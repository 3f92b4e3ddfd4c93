use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{watch_url, SourceError, TranscriptSource};

/// Subtitle and auto-caption download through yt-dlp
pub struct SubtitleSource {
    yt_dlp_path: String,
}

impl SubtitleSource {
    pub fn new() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
        }
    }

    async fn download_captions(&self, video_id: &str, language: Option<&str>, dir: &Path) -> Result<(), SourceError> {
        let template = dir.join("sub");
        let mut command = Command::new(&self.yt_dlp_path);
        command.args([
            "--skip-download",
            "--write-auto-sub",
            "--write-sub",
            "--sub-format",
            "vtt",
            "--no-playlist",
            "--output",
            &template.to_string_lossy(),
        ]);
        if let Some(language) = language {
            command.args(["--sub-lang", language]);
        }
        command.arg(watch_url(video_id));

        tracing::debug!("Downloading captions for {}", video_id);
        let output = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => SourceError::ToolMissing {
                    tool: self.yt_dlp_path.clone(),
                },
                _ => SourceError::Io(e),
            })?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::Failed(format!("yt-dlp failed: {}", error.trim())));
        }

        Ok(())
    }
}

impl Default for SubtitleSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptSource for SubtitleSource {
    async fn fetch(&self, video_id: &str, language: Option<&str>) -> Result<String, SourceError> {
        let dir = tempfile::tempdir()?;
        self.download_captions(video_id, language, dir.path()).await?;

        let caption_file = find_caption_file(dir.path())?
            .ok_or_else(|| SourceError::NotAvailable(format!("video {} has no subtitles", video_id)))?;

        let content = tokio::fs::read_to_string(&caption_file).await?;
        Ok(captions_to_text(&content))
    }
}

fn find_caption_file(dir: &Path) -> Result<Option<PathBuf>, SourceError> {
    let mut found = Vec::new();
    for entry in fs_err::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("vtt") {
            found.push(path);
        }
    }
    // Manual subs and auto-captions may both land; take a stable pick
    found.sort();
    Ok(found.into_iter().next())
}

/// Flatten WebVTT or SRT captions into plain running text.
///
/// Headers, cue timings, cue numbers and inline tags are dropped. Auto-captions
/// repeat each line across rolling cues, so consecutive duplicates collapse.
pub fn captions_to_text(content: &str) -> String {
    let raw_lines: Vec<&str> = content.lines().map(str::trim).collect();
    let mut lines: Vec<String> = Vec::new();

    for (index, &line) in raw_lines.iter().enumerate() {
        if line.is_empty()
            || line == "WEBVTT"
            || line.starts_with("WEBVTT ")
            || line.starts_with("Kind:")
            || line.starts_with("Language:")
            || line.starts_with("NOTE")
            || line.contains("-->")
            || is_cue_number(line, raw_lines.get(index + 1).copied())
        {
            continue;
        }

        let text = decode_entities(&strip_tags(line));
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() || lines.last() == Some(&text) {
            continue;
        }
        lines.push(text);
    }

    lines.join(" ")
}

/// SRT cue numbers sit directly above a timing line; other numeric lines are speech
fn is_cue_number(line: &str, next: Option<&str>) -> bool {
    line.chars().all(|c| c.is_ascii_digit()) && next.map(|next| next.contains("-->")).unwrap_or(false)
}

fn strip_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_tag = false;
    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn decode_entities(line: &str) -> String {
    line.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
