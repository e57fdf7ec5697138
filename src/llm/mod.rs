//! LLM client module for the planning model.
//!
//! The agent talks to any OpenAI-compatible chat completion server through the
//! [`ChatModel`] trait, with [`OpenAiCompatClient`] as the HTTP implementation.

mod error;
mod openai;

pub use error::{classify_http_status, LlmError, LlmErrorKind, RetryConfig};
pub use openai::OpenAiCompatClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GenerateConfig;

/// Role in a chat conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single conversational turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Sampling options sent with every completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub presence_penalty: f32,
    /// Generation stops before any of these strings
    pub stop: Vec<String>,
}

impl From<&GenerateConfig> for ChatOptions {
    fn from(cfg: &GenerateConfig) -> Self {
        Self {
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            presence_penalty: cfg.presence_penalty,
            stop: Vec::new(),
        }
    }
}

/// Trait for chat completion backends.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Request one assistant turn from the model served at `base_url`.
    ///
    /// Implementations retry transient failures themselves; an `Err` is final.
    async fn chat_completion(
        &self,
        base_url: &str,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<String, LlmError>;
}
