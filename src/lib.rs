//! Lecture Scribe - turn long lecture transcripts into structured study notes
//!
//! A transcript (YouTube subtitles, a whisper transcription, or a local file) is
//! split into sentence-respecting segments, grouped into batches, cleaned and
//! summarized in parallel by a text-generation backend, merged into one set of
//! Markdown notes, and optionally translated and validated. The notes can then
//! answer follow-up questions.

pub mod agents;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod output;
pub mod pipeline;
pub mod qa;
pub mod sources;
pub mod transform;
pub mod utils;

pub use agents::{Persona, StageAgent, StageAgents};
pub use chunking::{group, segment, Batch, Segment};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use pipeline::{
    FailurePolicy, FinalArtifact, PipelineError, PipelineOutput, PipelineSettings, SummaryPipeline, ValidationVerdict,
};
pub use sources::{Transcript, TranscriptAcquirer, TranscriptSource};
pub use transform::{GenerationParams, TextTransform, TransformError};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the scribe
#[derive(thiserror::Error, Debug)]
pub enum ScribeError {
    #[error("Transcript acquisition failed: {0}")]
    AcquisitionFailed(String),

    #[error("Answer unavailable: {0}")]
    AnswerUnavailable(String),
}
