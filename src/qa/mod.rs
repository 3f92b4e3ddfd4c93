use crate::agents::{prompts, StageAgent};
use crate::pipeline::FinalArtifact;
use crate::ScribeError;

/// Answer a follow-up question from the final notes with a single call
pub async fn answer(agent: &StageAgent, artifact: &FinalArtifact, question: &str) -> Result<String, ScribeError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(ScribeError::AnswerUnavailable("question is empty".to_string()));
    }
    if artifact.as_str().trim().is_empty() {
        return Err(ScribeError::AnswerUnavailable("notes are empty".to_string()));
    }

    tracing::info!(question_chars = question.chars().count(), "Answering follow-up question");

    agent
        .run(&prompts::answer(artifact.as_str(), question))
        .await
        .map_err(|err| ScribeError::AnswerUnavailable(err.to_string()))
}
