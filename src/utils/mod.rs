use tokio::process::Command;

/// Whether a language name or code means English (`en`, `en-US`, `English`)
pub fn is_english(language: &str) -> bool {
    let language = language.trim().to_lowercase();
    language == "english" || language == "en" || language.starts_with("en-") || language.starts_with("en_")
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else if seconds < 10.0 {
        format!("{:.1}s", seconds.max(0.0))
    } else {
        format!("{}s", secs)
    }
}

/// Check which external tools the transcript sources need are missing
pub async fn check_dependencies(speech_fallback: bool) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available("yt-dlp", "--version").await {
        missing.push("yt-dlp - required for YouTube subtitles and audio".to_string());
    }

    if speech_fallback {
        if !check_command_available("whisper", "--help").await {
            missing.push("whisper - required for the speech-to-text fallback".to_string());
        }
        if !check_command_available("ffmpeg", "-version").await {
            missing.push("ffmpeg - required by yt-dlp audio extraction".to_string());
        }
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str, version_arg: &str) -> bool {
    Command::new(command)
        .arg(version_arg)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
