use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

use crate::agents::{prompts, StageAgents};
use crate::chunking::{self, ChunkingError};
use crate::transform::TransformError;
use crate::utils::is_english;

pub mod runner;

pub use runner::{ItemFailure, StageResult, StageRunner};

/// Steps that call the text-transform backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Cleaning,
    Summarizing,
    Merging,
    Translating,
    Validating,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Cleaning => "cleaning",
            Stage::Summarizing => "summarizing",
            Stage::Merging => "merging",
            Stage::Translating => "translating",
            Stage::Validating => "validating",
        };
        f.write_str(name)
    }
}

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    Segmenting,
    Batching,
    Running(Stage),
    Completed,
    Failed,
}

impl PipelineState {
    fn message(&self) -> String {
        match self {
            PipelineState::Start => "Starting...".to_string(),
            PipelineState::Segmenting => "Splitting transcript into segments...".to_string(),
            PipelineState::Batching => "Grouping segments into batches...".to_string(),
            PipelineState::Running(Stage::Cleaning) => "Cleaning transcript batches...".to_string(),
            PipelineState::Running(Stage::Summarizing) => "Summarizing batches...".to_string(),
            PipelineState::Running(Stage::Merging) => "Creating final lecture-style summary...".to_string(),
            PipelineState::Running(Stage::Translating) => "Translating summary...".to_string(),
            PipelineState::Running(Stage::Validating) => "Validating summary...".to_string(),
            PipelineState::Completed => "Summary generated".to_string(),
            PipelineState::Failed => "Summary failed".to_string(),
        }
    }
}

/// What to do with items that fail after retries in a parallel stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Substitute the stage's input text for the failed item and continue
    #[default]
    Degrade,
    /// Stop the run and report the failed indices
    Abort,
}

/// Knobs for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub max_chars: usize,
    pub min_tail_chars: usize,
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub failure_policy: FailurePolicy,
    /// Ask the validator to review the final notes
    pub validate: bool,
    /// Translate the merged notes into this language (English is a no-op)
    pub translate_to: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_chars: 3000,
            min_tail_chars: 400,
            batch_size: 10,
            max_concurrency: 6,
            failure_policy: FailurePolicy::Degrade,
            validate: true,
            translate_to: None,
        }
    }
}

impl PipelineSettings {
    pub fn check(&self) -> Result<(), PipelineError> {
        if self.max_chars == 0 {
            return Err(ChunkingError::ZeroMaxChars.into());
        }
        if self.min_tail_chars >= self.max_chars {
            return Err(ChunkingError::TailTooLarge {
                min_tail_chars: self.min_tail_chars,
                max_chars: self.max_chars,
            }
            .into());
        }
        if self.batch_size == 0 {
            return Err(ChunkingError::ZeroBatchSize.into());
        }
        if self.max_concurrency == 0 {
            return Err(PipelineError::InvalidSettings(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn translation_target(&self) -> Option<&str> {
        self.translate_to
            .as_deref()
            .map(str::trim)
            .filter(|lang| !lang.is_empty() && !is_english(lang))
    }
}

/// Pipeline-level failure, surfaced to the caller as one structured value
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Invalid pipeline settings: {0}")]
    InvalidSettings(String),

    #[error("Transcript is empty after whitespace normalization")]
    EmptyTranscript,

    #[error("Stage {stage} failed for items {indices:?}: {last_error}")]
    StageFailed {
        stage: Stage,
        indices: Vec<usize>,
        last_error: String,
    },

    #[error("Stage {stage} failed: {source}")]
    SingleCallFailed {
        stage: Stage,
        #[source]
        source: TransformError,
    },
}

impl From<ChunkingError> for PipelineError {
    fn from(err: ChunkingError) -> Self {
        PipelineError::InvalidSettings(err.to_string())
    }
}

impl PipelineError {
    /// The stage that failed, if the failure came from a backend call
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::StageFailed { stage, .. } | PipelineError::SingleCallFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Merged (and possibly translated) notes of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinalArtifact(String);

impl FinalArtifact {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FinalArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of the optional review step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ValidationVerdict {
    Approved,
    Suggestions(String),
    Unavailable(String),
    Skipped,
}

impl ValidationVerdict {
    /// Interpret a validator reply
    pub fn from_reply(reply: &str) -> Self {
        let token = reply.trim().trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
        if token.eq_ignore_ascii_case(prompts::APPROVAL_TOKEN) {
            ValidationVerdict::Approved
        } else {
            ValidationVerdict::Suggestions(reply.trim().to_string())
        }
    }
}

/// A parallel-stage item that was replaced by its input text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub segments: usize,
    pub batches: usize,
    pub elapsed_secs: f64,
    pub completed_at: DateTime<Utc>,
}

/// Everything a completed run hands back
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub run_id: Uuid,
    pub artifact: FinalArtifact,
    pub verdict: ValidationVerdict,
    pub failures: Vec<StageFailure>,
    pub stats: RunStats,
}

/// Apply the failure policy to one parallel stage's results.
///
/// Under `Degrade` a failed entry is replaced by `inputs[index]` and recorded in
/// `failures`; under `Abort` any failure ends the run. The output always has
/// the same length and order as `inputs`.
pub fn resolve_stage(
    stage: Stage,
    inputs: &[String],
    results: Vec<StageResult>,
    policy: FailurePolicy,
    failures: &mut Vec<StageFailure>,
) -> Result<Vec<String>, PipelineError> {
    debug_assert_eq!(inputs.len(), results.len());

    let failed: Vec<&ItemFailure> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    if policy == FailurePolicy::Abort && !failed.is_empty() {
        return Err(PipelineError::StageFailed {
            stage,
            indices: failed.iter().map(|f| f.index).collect(),
            last_error: failed.last().map(|f| f.reason.clone()).unwrap_or_default(),
        });
    }

    Ok(results
        .into_iter()
        .zip(inputs)
        .map(|(result, input)| match result {
            Ok(text) => text,
            Err(failure) => {
                tracing::warn!(%stage, index = failure.index, "Using input text in place of failed item");
                failures.push(StageFailure {
                    stage,
                    index: failure.index,
                    reason: failure.reason,
                });
                input.clone()
            }
        })
        .collect())
}

/// Clean → summarize → merge → validate over one transcript
pub struct SummaryPipeline {
    settings: PipelineSettings,
    agents: StageAgents,
    show_progress: bool,
}

impl SummaryPipeline {
    pub fn new(settings: PipelineSettings, agents: StageAgents) -> Self {
        Self {
            settings,
            agents,
            show_progress: false,
        }
    }

    /// Draw spinners and bars on stderr while running
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn agents(&self) -> &StageAgents {
        &self.agents
    }

    pub async fn run(&self, transcript: &str) -> Result<PipelineOutput, PipelineError> {
        let spinner = self.spinner();
        let result = self.run_stages(transcript, &spinner).await;

        match &result {
            Ok(_) => spinner.finish_with_message(PipelineState::Completed.message()),
            Err(err) => {
                tracing::error!("Pipeline failed: {}", err);
                spinner.abandon_with_message(PipelineState::Failed.message());
            }
        }
        result
    }

    async fn run_stages(&self, transcript: &str, spinner: &ProgressBar) -> Result<PipelineOutput, PipelineError> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        self.settings.check()?;
        enter(spinner, PipelineState::Start);

        enter(spinner, PipelineState::Segmenting);
        let segments = chunking::segment(transcript, self.settings.max_chars, self.settings.min_tail_chars)?;
        if segments.is_empty() {
            return Err(PipelineError::EmptyTranscript);
        }

        enter(spinner, PipelineState::Batching);
        let batches: Vec<String> = chunking::group(&segments, self.settings.batch_size)?
            .into_iter()
            .map(|batch| batch.into_string())
            .collect();
        tracing::info!(%run_id, segments = segments.len(), batches = batches.len(), "Transcript split");

        let mut failures = Vec::new();

        let cleaned = self
            .parallel_stage(spinner, Stage::Cleaning, &batches, prompts::clean, &mut failures)
            .await?;
        let summaries = self
            .parallel_stage(spinner, Stage::Summarizing, &cleaned, prompts::summarize_batch, &mut failures)
            .await?;

        enter(spinner, PipelineState::Running(Stage::Merging));
        let combined = summaries.join("\n\n");
        let mut notes = self
            .agents
            .merge
            .run(&prompts::merge(&combined))
            .await
            .map_err(|source| PipelineError::SingleCallFailed {
                stage: Stage::Merging,
                source,
            })?;

        if let Some(language) = self.settings.translation_target() {
            enter(spinner, PipelineState::Running(Stage::Translating));
            notes = self
                .agents
                .translate
                .run(&prompts::translate(&notes, language))
                .await
                .map_err(|source| PipelineError::SingleCallFailed {
                    stage: Stage::Translating,
                    source,
                })?;
        }

        let verdict = if self.settings.validate {
            enter(spinner, PipelineState::Running(Stage::Validating));
            self.review(&notes).await
        } else {
            ValidationVerdict::Skipped
        };

        enter(spinner, PipelineState::Completed);
        Ok(PipelineOutput {
            run_id,
            artifact: FinalArtifact::new(notes),
            verdict,
            failures,
            stats: RunStats {
                segments: segments.len(),
                batches: batches.len(),
                elapsed_secs: started.elapsed().as_secs_f64(),
                completed_at: Utc::now(),
            },
        })
    }

    async fn parallel_stage(
        &self,
        spinner: &ProgressBar,
        stage: Stage,
        inputs: &[String],
        render: fn(&str) -> String,
        failures: &mut Vec<StageFailure>,
    ) -> Result<Vec<String>, PipelineError> {
        enter(spinner, PipelineState::Running(stage));

        let agent = match stage {
            Stage::Cleaning => &self.agents.clean,
            _ => &self.agents.summarize,
        };

        let bar = self.item_bar(inputs.len(), stage);
        let results = StageRunner::new(self.settings.max_concurrency)
            .with_progress(bar.clone())
            .run_agent(stage, inputs, agent, render)
            .await;
        bar.finish_and_clear();

        resolve_stage(stage, inputs, results, self.settings.failure_policy, failures)
    }

    async fn review(&self, notes: &str) -> ValidationVerdict {
        match self.agents.validate.run(&prompts::validate(notes)).await {
            Ok(reply) => ValidationVerdict::from_reply(&reply),
            Err(err) => {
                tracing::warn!("Validation unavailable: {}", err);
                ValidationVerdict::Unavailable(err.to_string())
            }
        }
    }

    fn spinner(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(120));
        spinner
    }

    fn item_bar(&self, len: usize, stage: Stage) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message(stage.to_string());
        bar
    }
}

fn enter(spinner: &ProgressBar, state: PipelineState) {
    tracing::debug!(?state, "Pipeline state");
    spinner.set_message(state.message());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn failure(index: usize) -> ItemFailure {
        ItemFailure {
            index,
            reason: "Rate limited by backend: 429".to_string(),
        }
    }

    #[test]
    fn test_degrade_substitutes_inputs() {
        let inputs = texts(&["a", "b", "c"]);
        let results = vec![Ok("A".to_string()), Err(failure(1)), Ok("C".to_string())];
        let mut failures = Vec::new();

        let resolved = resolve_stage(Stage::Cleaning, &inputs, results, FailurePolicy::Degrade, &mut failures).unwrap();

        assert_eq!(resolved, texts(&["A", "b", "C"]));
        assert_eq!(
            failures,
            vec![StageFailure {
                stage: Stage::Cleaning,
                index: 1,
                reason: "Rate limited by backend: 429".to_string(),
            }]
        );
    }

    #[test]
    fn test_abort_names_failed_indices() {
        let inputs = texts(&["a", "b", "c", "d"]);
        let results = vec![Err(failure(0)), Ok("B".to_string()), Err(failure(2)), Ok("D".to_string())];
        let mut failures = Vec::new();

        let err = resolve_stage(Stage::Summarizing, &inputs, results, FailurePolicy::Abort, &mut failures).unwrap_err();

        match err {
            PipelineError::StageFailed {
                stage,
                indices,
                last_error,
            } => {
                assert_eq!(stage, Stage::Summarizing);
                assert_eq!(indices, vec![0, 2]);
                assert_eq!(last_error, "Rate limited by backend: 429");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(failures.is_empty());
    }

    #[test]
    fn test_verdict_parsing() {
        assert_eq!(ValidationVerdict::from_reply("APPROVED"), ValidationVerdict::Approved);
        assert_eq!(ValidationVerdict::from_reply("  approved.\n"), ValidationVerdict::Approved);
        assert_eq!(ValidationVerdict::from_reply("**APPROVED**"), ValidationVerdict::Approved);
        assert_eq!(
            ValidationVerdict::from_reply("- Add a key takeaways section\n"),
            ValidationVerdict::Suggestions("- Add a key takeaways section".to_string())
        );
    }

    #[test]
    fn test_settings_check() {
        assert!(PipelineSettings::default().check().is_ok());

        let settings = PipelineSettings {
            min_tail_chars: 3000,
            ..PipelineSettings::default()
        };
        assert!(matches!(settings.check(), Err(PipelineError::InvalidSettings(_))));

        let settings = PipelineSettings {
            max_concurrency: 0,
            ..PipelineSettings::default()
        };
        assert!(matches!(settings.check(), Err(PipelineError::InvalidSettings(_))));
    }

    #[test]
    fn test_english_target_skips_translation() {
        let mut settings = PipelineSettings {
            translate_to: Some("English".to_string()),
            ..PipelineSettings::default()
        };
        assert_eq!(settings.translation_target(), None);

        settings.translate_to = Some(" Hindi ".to_string());
        assert_eq!(settings.translation_target(), Some("Hindi"));
    }

    #[test]
    fn test_verdict_serializes_with_status_tag() {
        let json = serde_json::to_value(ValidationVerdict::Suggestions("fix headings".into())).unwrap();
        assert_eq!(json, serde_json::json!({"status": "suggestions", "detail": "fix headings"}));

        let json = serde_json::to_value(ValidationVerdict::Approved).unwrap();
        assert_eq!(json, serde_json::json!({"status": "approved"}));
    }
}
