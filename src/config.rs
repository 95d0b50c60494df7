//! Configuration management for the task agent.
//!
//! Configuration is read from environment variables:
//! - `OPENROUTER_API_KEY` - Required. API key for the model-inference service.
//! - `LLM_BASE_URL` - Optional. OpenAI-compatible base URL. Defaults to OpenRouter.
//! - `DEFAULT_MODEL` - Optional. Model identifier. Defaults to `openai/gpt-4o-mini`.
//! - `MODEL_TEMPERATURE` - Optional. Sampling temperature. Defaults to `0`.
//! - `MAX_ROUND_TRIPS` - Optional. Ceiling on model/tool round-trips. Defaults to `25`.
//! - `TASK_DATA_PATH` - Optional. Directory holding task attachments. Defaults to `./task_data`.
//! - `SYSTEM_PROMPT_PATH` - Optional. File with a custom system prompt.
//! - `TRANSCRIPTION_API_KEY` / `OPENAI_API_KEY` - Optional. Enables audio transcription.
//! - `TRANSCRIPTION_BASE_URL` - Optional. Defaults to `https://api.openai.com/v1`.
//! - `TRANSCRIPTION_MODEL` - Optional. Defaults to `whisper-1`.
//! - `GEMINI_API_KEY` - Optional. Enables image understanding.
//! - `VISION_MODEL` - Optional. Defaults to `gemini-2.5-flash`.
//! - `CODE_TIMEOUT_SECS` - Optional. Default timeout for code execution. Defaults to `60`.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

pub const DEFAULT_LLM_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_TRANSCRIPTION_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Audio transcription backend settings.
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_TRANSCRIPTION_BASE_URL.to_string(),
            model: "whisper-1".to_string(),
        }
    }
}

/// Image-understanding backend settings.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
        }
    }
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Model-inference API key
    pub api_key: String,

    /// OpenAI-compatible base URL for chat completions
    pub llm_base_url: String,

    /// Model identifier
    pub default_model: String,

    pub temperature: f32,

    /// Maximum number of model -> tools -> model round-trips per run
    pub max_round_trips: usize,

    /// Root directory that attachment names are resolved against
    pub task_data_path: PathBuf,

    /// Optional file overriding the built-in system prompt
    pub system_prompt_path: Option<PathBuf>,

    /// Default timeout for code execution
    pub code_timeout_secs: u64,

    pub transcription: TranscriptionConfig,

    pub vision: VisionConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENROUTER_API_KEY` is not set,
    /// and `ConfigError::InvalidValue` for unparseable numeric settings.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let llm_base_url =
            std::env::var("LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_LLM_BASE_URL.to_string());

        let default_model =
            std::env::var("DEFAULT_MODEL").unwrap_or_else(|_| "openai/gpt-4o-mini".to_string());

        let temperature = parse_env("MODEL_TEMPERATURE", 0.0)?;
        let max_round_trips = parse_env("MAX_ROUND_TRIPS", 25)?;
        let code_timeout_secs = parse_env("CODE_TIMEOUT_SECS", 60)?;

        let task_data_path = std::env::var("TASK_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./task_data"));

        let system_prompt_path = std::env::var("SYSTEM_PROMPT_PATH").ok().map(PathBuf::from);

        let defaults = TranscriptionConfig::default();
        let transcription = TranscriptionConfig {
            api_key: std::env::var("TRANSCRIPTION_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .ok(),
            base_url: std::env::var("TRANSCRIPTION_BASE_URL").unwrap_or(defaults.base_url),
            model: std::env::var("TRANSCRIPTION_MODEL").unwrap_or(defaults.model),
        };

        let defaults = VisionConfig::default();
        let vision = VisionConfig {
            api_key: std::env::var("GEMINI_API_KEY").ok(),
            model: std::env::var("VISION_MODEL").unwrap_or(defaults.model),
        };

        Ok(Self {
            api_key,
            llm_base_url,
            default_model,
            temperature,
            max_round_trips,
            task_data_path,
            system_prompt_path,
            code_timeout_secs,
            transcription,
            vision,
        })
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), format!("{}", e)))
}
