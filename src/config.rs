//! Configuration management for the agent service.
//!
//! Configuration is read once at startup from environment variables:
//! - `MODEL_NAME` - Optional. Model identifier. Defaults to `qwen-plus`.
//! - `MODEL_TYPE` - Optional. Provider type (`qwen_dashscope` or `oai`). Defaults to `qwen_dashscope`.
//! - `MAX_INPUT_TOKENS` - Optional. Input token budget per run. Defaults to `320000`.
//! - `MAX_RETRIES` - Optional. Retry ceiling for model calls. Defaults to `10`.
//! - `TEMPERATURE` - Optional. Sampling temperature. Defaults to `0.6`.
//! - `TOP_P` - Optional. Nucleus sampling threshold. Defaults to `0.95`.
//! - `PRESENCE_PENALTY` - Optional. Presence penalty. Defaults to `1.1`.
//! - `MAX_LLM_CALLS` - Optional. Reasoning loop call ceiling per run. Defaults to `100`.
//! - `PLANNING_HOST` - Optional. Host serving the planning model. Defaults to `127.0.0.1`.
//! - `LLM_API_KEY` - Optional. Bearer token for the planning model. Defaults to `EMPTY`.
//! - `TOOL_SERVER_URL` - Optional. Base URL tool calls are forwarded to.
//! - `AGENT_MAX_CONCURRENCY` - Optional. Concurrent invocations allowed (`0` = unlimited).
//! - `AGENT_TIMEOUT_SECS` - Optional. Per-invocation time bound (`0` = unbounded).
//! - `HOST` - Optional. Server host. Defaults to `0.0.0.0`.
//! - `PORT` - Optional. Server port. Defaults to `8000`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::util::non_empty;

pub const DEFAULT_MODEL: &str = "qwen-plus";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Model provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Qwen models served through a DashScope-compatible endpoint
    QwenDashscope,
    /// Any OpenAI-compatible chat completion server
    Oai,
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "qwen_dashscope" => Ok(Self::QwenDashscope),
            "oai" | "openai" => Ok(Self::Oai),
            other => Err(format!(
                "unknown model type '{}' (expected qwen_dashscope or oai)",
                other
            )),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QwenDashscope => write!(f, "qwen_dashscope"),
            Self::Oai => write!(f, "oai"),
        }
    }
}

/// Sampling and budget parameters passed to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateConfig {
    pub max_input_tokens: usize,
    pub max_retries: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub presence_penalty: f32,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            max_input_tokens: 320_000,
            max_retries: 10,
            temperature: 0.6,
            top_p: 0.95,
            presence_penalty: 1.1,
        }
    }
}

/// Model configuration the agent is constructed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmConfig {
    pub model: String,
    #[serde(rename = "generate_cfg")]
    pub generate: GenerateConfig,
    pub model_type: ModelType,
    /// Host of the planning model server; the port comes with each request
    pub planning_host: String,
    /// Maximum model calls in one run
    pub max_llm_calls: usize,
    #[serde(skip_serializing)]
    pub api_key: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            generate: GenerateConfig::default(),
            model_type: ModelType::QwenDashscope,
            planning_host: "127.0.0.1".to_string(),
            max_llm_calls: 100,
            api_key: "EMPTY".to_string(),
        }
    }
}

/// Where tool calls are forwarded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolConfig {
    pub server_url: Option<String>,
}

/// How the service admits calls into the agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvocationConfig {
    /// Maximum concurrent invocations; `None` means unlimited
    pub max_concurrency: Option<usize>,
    /// Upper bound on a single invocation; `None` means unbounded
    pub timeout: Option<Duration>,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Model configuration for the agent
    pub llm: LlmConfig,

    /// Tool forwarding configuration
    pub tools: ToolConfig,

    /// Admission and timeout policy around agent calls
    pub invocation: InvocationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            llm: LlmConfig::default(),
            tools: ToolConfig::default(),
            invocation: InvocationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a set variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_empty(lookup(key));
        let defaults = LlmConfig::default();

        let generate = GenerateConfig {
            max_input_tokens: parse_or(&get, "MAX_INPUT_TOKENS", defaults.generate.max_input_tokens)?,
            max_retries: parse_or(&get, "MAX_RETRIES", defaults.generate.max_retries)?,
            temperature: parse_or(&get, "TEMPERATURE", defaults.generate.temperature)?,
            top_p: parse_or(&get, "TOP_P", defaults.generate.top_p)?,
            presence_penalty: parse_or(&get, "PRESENCE_PENALTY", defaults.generate.presence_penalty)?,
        };

        let llm = LlmConfig {
            model: get("MODEL_NAME").unwrap_or(defaults.model),
            generate,
            model_type: parse_or(&get, "MODEL_TYPE", defaults.model_type)?,
            planning_host: get("PLANNING_HOST").unwrap_or(defaults.planning_host),
            max_llm_calls: parse_or(&get, "MAX_LLM_CALLS", defaults.max_llm_calls)?,
            api_key: get("LLM_API_KEY").unwrap_or(defaults.api_key),
        };

        let max_concurrency: usize = parse_or(&get, "AGENT_MAX_CONCURRENCY", 0)?;
        let timeout_secs: u64 = parse_or(&get, "AGENT_TIMEOUT_SECS", 0)?;
        let invocation = InvocationConfig {
            max_concurrency: (max_concurrency > 0).then_some(max_concurrency),
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&get, "PORT", DEFAULT_PORT)?,
            llm,
            tools: ToolConfig {
                server_url: get("TOOL_SERVER_URL").map(|u| u.trim_end_matches('/').to_string()),
            },
            invocation,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), format!("{}", e))),
        None => Ok(default),
    }
}
