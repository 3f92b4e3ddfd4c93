use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{watch_url, SourceError, TranscriptSource};

/// Downloads the audio track with yt-dlp and runs the whisper CLI over it
pub struct SpeechToTextSource {
    yt_dlp_path: String,
    whisper_path: String,
    model: String,
    translate_to_english: bool,
}

impl SpeechToTextSource {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            whisper_path: "whisper".to_string(),
            model: model.into(),
            translate_to_english: false,
        }
    }

    /// Use whisper's translate task so the transcript comes out in English
    pub fn translating_to_english(mut self, enabled: bool) -> Self {
        self.translate_to_english = enabled;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn download_audio(&self, video_id: &str, dir: &Path) -> Result<PathBuf, SourceError> {
        let target = dir.join("audio.%(ext)s");
        let args = vec![
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            "mp3".to_string(),
            "--format".to_string(),
            "bestaudio/best".to_string(),
            "--no-playlist".to_string(),
            "--output".to_string(),
            target.to_string_lossy().into_owned(),
            watch_url(video_id),
        ];

        tracing::debug!("Downloading audio for {}", video_id);
        run_tool(&self.yt_dlp_path, &args).await?;

        let audio = dir.join("audio.mp3");
        if !audio.exists() {
            return Err(SourceError::Failed("audio download produced no file".to_string()));
        }
        Ok(audio)
    }

    fn whisper_args(&self, audio: &Path, out_dir: &Path, language: Option<&str>) -> Vec<String> {
        let mut args = vec![
            audio.to_string_lossy().into_owned(),
            "--model".to_string(),
            self.model.clone(),
            "--output_format".to_string(),
            "txt".to_string(),
            "--output_dir".to_string(),
            out_dir.to_string_lossy().into_owned(),
        ];
        if self.translate_to_english {
            args.extend(["--task".to_string(), "translate".to_string()]);
        } else if let Some(language) = language {
            args.extend(["--language".to_string(), language.to_string()]);
        }
        args
    }
}

#[async_trait]
impl TranscriptSource for SpeechToTextSource {
    async fn fetch(&self, video_id: &str, language: Option<&str>) -> Result<String, SourceError> {
        let dir = tempfile::tempdir()?;
        let audio = self.download_audio(video_id, dir.path()).await?;

        tracing::info!("Transcribing audio with whisper model '{}'", self.model);
        run_tool(&self.whisper_path, &self.whisper_args(&audio, dir.path(), language)).await?;

        let text_file = audio.with_extension("txt");
        let text = tokio::fs::read_to_string(&text_file)
            .await
            .map_err(|e| SourceError::Failed(format!("whisper output missing ({}): {}", text_file.display(), e)))?;

        Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

async fn run_tool(program: &str, args: &[String]) -> Result<(), SourceError> {
    let output = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SourceError::ToolMissing {
                tool: program.to_string(),
            },
            _ => SourceError::Io(e),
        })?;

    if !output.status.success() {
        let error = String::from_utf8_lossy(&output.stderr);
        return Err(SourceError::Failed(format!("{} failed: {}", program, error.trim())));
    }
    Ok(())
}
