//! Runtime configuration.
//!
//! Values come from the process environment after `.env` has been loaded by
//! `dotenv` in `main`. Every field has a default except the API key.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;
use validator::Validate;

use crate::error::AppError;
use crate::fs_manager::PortablePathManager;
use crate::logging::LogFormat;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a warm, patient mental health companion. \
You are not a therapist and never diagnose. Keep replies short and supportive.";
const DEFAULT_INSTRUCTION_PROMPT: &str = "Respond to {user} as {char}. Acknowledge their feelings \
before offering any suggestion, and gently encourage professional support when stress is high.";

/// Wire format of the hosted completion API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// `/v1/chat/completions` with a messages array.
    OpenAi,
    /// `/v1/completions` with a raw prompt (ooba, tabby).
    Completions,
}

impl FromStr for LlmBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmBackend::OpenAi),
            "completions" | "ooba" | "tabby" => Ok(LlmBackend::Completions),
            other => Err(AppError::Config(format!("Unsupported LLM backend: {}", other))),
        }
    }
}

impl fmt::Display for LlmBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmBackend::OpenAi => write!(f, "openai"),
            LlmBackend::Completions => write!(f, "completions"),
        }
    }
}

/// Settings for the hosted LLM.
#[derive(Debug, Clone, Validate)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    #[validate(url)]
    pub base_url: String,
    pub api_key: String,
    #[validate(length(min = 1))]
    pub model: String,
    #[validate(length(min = 1))]
    pub system_prompt: String,
    pub instruction_prompt: String,
    #[validate(range(min = 1, max = 8192))]
    pub max_tokens: u32,
    /// Controls the creativity of the model's responses. Value between 0.0 and 2.0.
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub top_p: f32,
    /// Upper bound on one completion round-trip before the fallback reply is used.
    #[validate(range(min = 1, max = 600))]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::OpenAi,
            base_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            instruction_prompt: DEFAULT_INSTRUCTION_PROMPT.to_string(),
            max_tokens: 300,
            temperature: 0.7,
            top_p: 0.9,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    pub fn base_url(&self) -> Result<Url, AppError> {
        Ok(Url::parse(&self.base_url)?)
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub llm: LlmConfig,
    #[validate(length(min = 1, max = 64))]
    pub user_name: String,
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
    pub character_card: PathBuf,
    pub resources_dir: PathBuf,
    pub memory_dir: PathBuf,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            user_name: "User".to_string(),
            session_id: "default-session".to_string(),
            character_card: PortablePathManager::character_dir().join("beedu.json"),
            resources_dir: PortablePathManager::resources_dir(),
            memory_dir: PortablePathManager::memory_dir(),
            log_format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    /// Builds the configuration from `TALKMATE_*` variables and validates it.
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = AppConfig::default();
        let llm_defaults = defaults.llm;

        let api_key = env::var("OPENAI_API_KEY")
            .or_else(|_| env::var("TALKMATE_LLM_API_KEY"))
            .unwrap_or_default();

        let llm = LlmConfig {
            backend: env_or("TALKMATE_LLM_BACKEND", llm_defaults.backend)?,
            base_url: env_string("TALKMATE_LLM_BASE_URL", llm_defaults.base_url),
            api_key,
            model: env_string("TALKMATE_LLM_MODEL", llm_defaults.model),
            system_prompt: env_string("TALKMATE_SYSTEM_PROMPT", llm_defaults.system_prompt),
            instruction_prompt: env_string(
                "TALKMATE_INSTRUCTION_PROMPT",
                llm_defaults.instruction_prompt,
            ),
            max_tokens: env_or("TALKMATE_MAX_TOKENS", llm_defaults.max_tokens)?,
            temperature: env_or("TALKMATE_TEMPERATURE", llm_defaults.temperature)?,
            top_p: env_or("TALKMATE_TOP_P", llm_defaults.top_p)?,
            timeout_secs: env_or("TALKMATE_LLM_TIMEOUT_SECS", llm_defaults.timeout_secs)?,
        };

        let config = AppConfig {
            llm,
            user_name: env_string("TALKMATE_USER_NAME", defaults.user_name),
            session_id: env_string("TALKMATE_SESSION_ID", defaults.session_id),
            character_card: env_path("TALKMATE_CHARACTER_CARD", defaults.character_card),
            resources_dir: env_path("TALKMATE_RESOURCES_DIR", defaults.resources_dir),
            memory_dir: env_path("TALKMATE_MEMORY_DIR", defaults.memory_dir),
            log_format: env_or("TALKMATE_LOG_FORMAT", defaults.log_format)?,
        };

        config.validate()?;
        config.llm.base_url()?;
        Ok(config)
    }
}

fn env_string(key: &str, default: String) -> String {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => default,
    }
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default,
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|e| AppError::Config(format!("{} has an invalid value '{}': {}", key, value, e))),
        _ => Ok(default),
    }
}
