use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, StageModel};
use crate::transform::{ChatCompletionsBackend, GenerationParams, RetryingTransform, TextTransform, TransformError};

pub mod prompts;

/// Who a stage's model is asked to be
#[derive(Debug, Clone, PartialEq)]
pub struct Persona {
    pub role: String,
    pub goal: String,
    pub backstory: String,
}

impl Persona {
    pub fn new(role: impl Into<String>, goal: impl Into<String>, backstory: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
        }
    }

    pub fn cleaner() -> Self {
        Self::new(
            "Transcript Formatter",
            "Clean and rewrite transcript text to be readable and grammatically correct.",
            "A linguistic expert specializing in simplifying and polishing language.",
        )
    }

    pub fn batch_summarizer() -> Self {
        Self::new(
            "Chunk Summarizer",
            "Summarize transcript batches into short structured notes.",
            "Writes efficient, concise summaries that capture the key ideas.",
        )
    }

    pub fn final_summarizer() -> Self {
        Self::new(
            "Final Summarizer",
            "Combine all batch summaries into lecture-style notes in Markdown.",
            "Professor-level writer of high-quality study notes.",
        )
    }

    pub fn validator() -> Self {
        Self::new(
            "Summary Validator",
            "Check whether lecture notes are clear, complete and structured.",
            "Careful academic reviewer.",
        )
    }

    pub fn tutor() -> Self {
        Self::new(
            "Q&A Tutor",
            "Answer follow-up questions based on the final notes.",
            "Friendly study assistant who explains clearly.",
        )
    }

    pub fn translator() -> Self {
        Self::new(
            "Translator",
            "Translate study notes while preserving their structure.",
            "Professional translator of technical and academic material.",
        )
    }

    fn preamble(&self) -> String {
        format!(
            "Role: {}\nGoal: {}\nBackstory: {}\n\n",
            self.role, self.goal, self.backstory
        )
    }
}

/// A persona and generation parameters bound to one backend
#[derive(Clone)]
pub struct StageAgent {
    persona: Persona,
    params: GenerationParams,
    backend: Arc<dyn TextTransform>,
}

impl StageAgent {
    pub fn new(persona: Persona, params: GenerationParams, backend: Arc<dyn TextTransform>) -> Self {
        Self {
            persona,
            params,
            backend,
        }
    }

    /// Prefix the persona to `prompt` and issue one backend call
    pub async fn run(&self, prompt: &str) -> Result<String, TransformError> {
        let full_prompt = format!("{}{}", self.persona.preamble(), prompt);
        self.backend.complete(&full_prompt, &self.params).await
    }
}

/// Every agent a pipeline run and its follow-up questions need
#[derive(Clone)]
pub struct StageAgents {
    pub clean: StageAgent,
    pub summarize: StageAgent,
    pub merge: StageAgent,
    pub validate: StageAgent,
    pub answer: StageAgent,
    pub translate: StageAgent,
}

impl StageAgents {
    /// Same backend for every stage, default parameters per persona
    pub fn uniform(backend: Arc<dyn TextTransform>) -> Self {
        let agent = |persona: Persona| StageAgent::new(persona, GenerationParams::default(), backend.clone());
        Self {
            clean: agent(Persona::cleaner()),
            summarize: agent(Persona::batch_summarizer()),
            merge: agent(Persona::final_summarizer()),
            validate: agent(Persona::validator()),
            answer: agent(Persona::tutor()),
            translate: agent(Persona::translator()),
        }
    }

    /// Build one retrying HTTP backend per stage from the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = config.llm.provider;
        let api_key = provider.api_key()?;
        let api_url = config
            .llm
            .api_url
            .clone()
            .unwrap_or_else(|| provider.default_api_url().to_string());
        let client = reqwest::Client::builder()
            .user_agent(concat!("lecture-scribe/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let timeout = Duration::from_secs(config.llm.timeout_secs);
        let policy = config.llm.retry.to_policy();

        let build = |persona: Persona, stage: &StageModel| {
            tracing::debug!(role = %persona.role, model = %stage.model, "Binding stage agent");
            let raw = ChatCompletionsBackend::new(client.clone(), api_url.clone(), api_key.clone(), stage.model.clone());
            let backend = RetryingTransform::new(Arc::new(raw), policy.clone())
                .with_timeout(timeout)
                .with_label(persona.role.clone());
            StageAgent::new(persona, stage.params(), Arc::new(backend))
        };

        Ok(Self {
            clean: build(Persona::cleaner(), &config.stages.clean),
            summarize: build(Persona::batch_summarizer(), &config.stages.summarize),
            merge: build(Persona::final_summarizer(), &config.stages.merge),
            validate: build(Persona::validator(), &config.stages.validate),
            answer: build(Persona::tutor(), &config.stages.answer),
            translate: build(Persona::translator(), &config.stages.translate),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::MockTextTransform;

    #[tokio::test]
    async fn test_run_prefixes_persona_and_passes_params() {
        let params = GenerationParams {
            temperature: 0.35,
            max_output_tokens: 4096,
        };
        let expected = params.clone();

        let mut mock = MockTextTransform::new();
        mock.expect_complete().times(1).returning(move |prompt, params| {
            assert!(prompt.starts_with("Role: Final Summarizer\n"));
            assert!(prompt.ends_with("merge me"));
            assert_eq!(params, &expected);
            Ok("# Notes".to_string())
        });

        let agent = StageAgent::new(Persona::final_summarizer(), params, Arc::new(mock));
        assert_eq!(agent.run("merge me").await.unwrap(), "# Notes");
    }
}
