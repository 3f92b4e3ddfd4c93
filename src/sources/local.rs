use std::path::Path;
use tokio::fs;

use super::{captions_to_text, SourceError};

const PLAIN_EXTENSIONS: &[&str] = &["txt", "md"];
const CAPTION_EXTENSIONS: &[&str] = &["vtt", "srt"];

/// Reads transcripts that are already on disk
#[derive(Debug, Clone, Default)]
pub struct LocalFileSource;

impl LocalFileSource {
    pub fn new() -> Self {
        Self
    }

    pub fn supports_extension(ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        PLAIN_EXTENSIONS.contains(&ext.as_str()) || CAPTION_EXTENSIONS.contains(&ext.as_str())
    }

    /// Check if the file exists and is accessible
    async fn validate_file(&self, path: &Path) -> Result<(), SourceError> {
        if !path.exists() {
            return Err(SourceError::Failed(format!("File does not exist: {}", path.display())));
        }

        if !path.is_file() {
            return Err(SourceError::Failed(format!("Path is not a file: {}", path.display())));
        }

        let metadata = fs::metadata(path).await?;
        if metadata.len() == 0 {
            return Err(SourceError::Failed(format!("File is empty: {}", path.display())));
        }

        Ok(())
    }

    /// Read a transcript file, flattening caption formats to plain text
    pub async fn read(&self, path: &Path) -> Result<String, SourceError> {
        self.validate_file(path).await?;

        let content = fs::read_to_string(path).await?;
        let is_captions = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| CAPTION_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);

        tracing::debug!(path = %path.display(), is_captions, "Reading local transcript");

        if is_captions {
            Ok(captions_to_text(&content))
        } else {
            Ok(content)
        }
    }
}
