use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::pipeline::{FailurePolicy, PipelineSettings};

#[derive(Parser)]
#[command(
    name = "lecture-scribe",
    about = "Lecture Scribe - Turn lecture transcripts into structured study notes",
    version,
    long_about = "Fetches a transcript from YouTube subtitles, a whisper transcription, or a local file, then cleans, \
                  summarizes and merges it into Markdown lecture notes with an LLM. The notes can answer follow-up questions."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Summarize a video or transcript file into lecture notes
    Summarize {
        /// YouTube URL, video id, or transcript file (.txt, .md, .vtt, .srt)
        #[arg(value_name = "URL_OR_FILE")]
        input: String,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format (defaults to the configured format)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Subtitle language to request
        #[arg(short, long, value_name = "LANG")]
        language: Option<String>,

        /// Translate the final notes into this language
        #[arg(short, long, value_name = "LANG")]
        translate_to: Option<String>,

        #[command(flatten)]
        chunking: ChunkingArgs,

        /// Maximum concurrent backend calls per stage
        #[arg(long, value_name = "COUNT")]
        concurrency: Option<usize>,

        /// What to do when a batch still fails after retries
        #[arg(long, value_enum, value_name = "POLICY")]
        on_failure: Option<FailurePolicy>,

        /// Skip the validation review of the final notes
        #[arg(long)]
        no_validate: bool,

        /// Do not fall back to whisper when a video has no subtitles
        #[arg(long)]
        no_speech_fallback: bool,
    },

    /// Ask a follow-up question about generated notes
    Ask {
        /// Notes produced by `summarize` (Markdown or JSON)
        #[arg(value_name = "NOTES_FILE")]
        notes: PathBuf,

        /// The question to answer
        #[arg(value_name = "QUESTION")]
        question: String,
    },

    /// Preview how a transcript file would be segmented and batched
    Chunks {
        /// Transcript file (.txt, .md, .vtt, .srt)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[command(flatten)]
        chunking: ChunkingArgs,

        /// Print every segment
        #[arg(long)]
        show_segments: bool,
    },

    /// Show configuration location and settings
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List supported transcript sources
    Sources,
}

/// Segmenter and batcher overrides shared by several commands
#[derive(Args, Debug, Clone, Default)]
pub struct ChunkingArgs {
    /// Maximum characters per segment
    #[arg(long, value_name = "CHARS")]
    pub max_chars: Option<usize>,

    /// Segments shorter than this are merged into the previous one
    #[arg(long, value_name = "CHARS")]
    pub min_tail_chars: Option<usize>,

    /// Segments per summarization batch
    #[arg(long, value_name = "COUNT")]
    pub batch_size: Option<usize>,
}

impl ChunkingArgs {
    /// Overlay the flags that were given onto `settings`
    pub fn apply(&self, settings: &mut PipelineSettings) {
        if let Some(max_chars) = self.max_chars {
            settings.max_chars = max_chars;
        }
        if let Some(min_tail_chars) = self.min_tail_chars {
            settings.min_tail_chars = min_tail_chars;
        }
        if let Some(batch_size) = self.batch_size {
            settings.batch_size = batch_size;
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown notes
    Markdown,
    /// JSON with notes, verdict, failures and run stats
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
