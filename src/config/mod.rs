use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::OutputFormat;
use crate::pipeline::PipelineSettings;
use crate::transform::{GenerationParams, Provider, RetryPolicy};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Text-generation backend
    #[serde(default)]
    pub llm: LlmConfig,

    /// Model and sampling settings per stage
    #[serde(default)]
    pub stages: StageModels,

    /// Chunking, concurrency and failure handling
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Application settings
    #[serde(default)]
    pub app: AppConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: Provider,

    /// Override the provider's chat completions URL
    pub api_url: Option<String>,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,

    pub retry: RetrySettings,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            api_url: None,
            timeout_secs: 120,
            retry: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            jitter: policy.jitter,
        }
    }
}

impl RetrySettings {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: self.jitter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageModel {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl StageModel {
    fn new(model: &str, temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            model: model.to_string(),
            temperature,
            max_output_tokens,
        }
    }

    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageModels {
    pub clean: StageModel,
    pub summarize: StageModel,
    pub merge: StageModel,
    pub validate: StageModel,
    pub answer: StageModel,
    pub translate: StageModel,
}

impl Default for StageModels {
    fn default() -> Self {
        Self {
            clean: StageModel::new("gemini-2.0-flash", 0.25, 2048),
            summarize: StageModel::new("gemini-2.0-flash-lite", 0.3, 1024),
            merge: StageModel::new("gemini-2.5-flash-lite", 0.35, 4096),
            validate: StageModel::new("gemini-2.5-flash", 0.25, 2048),
            answer: StageModel::new("gemini-2.5-flash", 0.3, 1024),
            translate: StageModel::new("gemini-2.0-flash", 0.0, 4096),
        }
    }
}

impl StageModels {
    fn iter(&self) -> [(&'static str, &StageModel); 6] {
        [
            ("clean", &self.clean),
            ("summarize", &self.summarize),
            ("merge", &self.merge),
            ("validate", &self.validate),
            ("answer", &self.answer),
            ("translate", &self.translate),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default output format
    pub default_output_format: OutputFormat,

    /// Transcribe the audio with whisper when a video has no subtitles
    pub speech_fallback: bool,

    /// Whisper model used by the speech-to-text fallback
    pub whisper_model: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_output_format: OutputFormat::Markdown,
            speech_fallback: true,
            whisper_model: "base".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path).context("Failed to read config file")?;
            let config = Self::from_yaml(&content)?;
            tracing::debug!("Loaded configuration from {}", config_path.display());
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            tracing::info!("Wrote default configuration to {}", config_path.display());
            Ok(config)
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("lecture-scribe").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.pipeline.check().context("Invalid pipeline settings")?;

        if self.llm.timeout_secs == 0 {
            anyhow::bail!("llm.timeout_secs must be at least 1");
        }
        if self.llm.retry.max_attempts == 0 {
            anyhow::bail!("llm.retry.max_attempts must be at least 1");
        }
        if let Some(url) = &self.llm.api_url {
            url::Url::parse(url).with_context(|| format!("llm.api_url is not a valid URL: {}", url))?;
        }

        for (name, stage) in self.stages.iter() {
            if stage.model.trim().is_empty() {
                anyhow::bail!("stages.{}.model must not be empty", name);
            }
            if !(0.0..=2.0).contains(&stage.temperature) {
                anyhow::bail!("stages.{}.temperature must be between 0 and 2", name);
            }
            if stage.max_output_tokens == 0 {
                anyhow::bail!("stages.{}.max_output_tokens must be at least 1", name);
            }
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Provider: {}", self.llm.provider.name());
        println!(
            "  Endpoint: {}",
            self.llm.api_url.as_deref().unwrap_or(self.llm.provider.default_api_url())
        );
        println!("  API Key Env: {}", self.llm.provider.api_key_env());
        println!("  Timeout: {}s", self.llm.timeout_secs);
        println!(
            "  Retries: {} attempts, {}ms base delay",
            self.llm.retry.max_attempts, self.llm.retry.base_delay_ms
        );
        for (name, stage) in self.stages.iter() {
            println!(
                "  Stage {:<10} {} (temperature {}, {} tokens)",
                format!("{}:", name),
                stage.model,
                stage.temperature,
                stage.max_output_tokens
            );
        }
        println!("  Max Chars: {}", self.pipeline.max_chars);
        println!("  Min Tail Chars: {}", self.pipeline.min_tail_chars);
        println!("  Batch Size: {}", self.pipeline.batch_size);
        println!("  Concurrency: {}", self.pipeline.max_concurrency);
        println!("  On Failure: {:?}", self.pipeline.failure_policy);
        println!("  Validate: {}", self.pipeline.validate);
        println!("  Speech Fallback: {}", self.app.speech_fallback);
        println!("  Whisper Model: {}", self.app.whisper_model);
        println!("  Default Format: {}", self.app.default_output_format);
    }

    /// Point the user at the file to edit
    pub fn interactive_setup(&self) -> Result<()> {
        println!("Edit the config file to change settings:");
        println!("  {}", Self::config_path()?.display());
        println!("API keys are read from the {} environment variable.", self.llm.provider.api_key_env());
        Ok(())
    }
}
