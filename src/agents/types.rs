//! Core types for the agent system.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::llm::{ChatMessage, LlmError};

/// Caller-supplied description of the work.
///
/// The schema belongs to the agent; the service only reads `question` for logging.
pub type TaskItem = serde_json::Map<String, serde_json::Value>;

/// A run request as received over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentRequest {
    pub item: TaskItem,
    /// Port of the planning model server; values outside `u16` fail validation
    pub planning_port: u16,
    pub model: String,
}

impl AgentRequest {
    /// The item's `question` field, if it is a string.
    pub fn question(&self) -> Option<&str> {
        self.item.get("question").and_then(|q| q.as_str())
    }
}

/// Why a run stopped.
pub mod termination {
    /// The model produced a final `<answer>`.
    pub const ANSWER: &str = "answer";
    /// The per-run model call ceiling was hit.
    pub const CALLS_EXHAUSTED: &str = "exceed available llm calls";
    /// The conversation outgrew the input token budget.
    pub const TOKEN_LIMIT: &str = "token limit reached";
}

/// Complete output of one agent run.
///
/// # Invariants
/// - Every field is populated; a run that cannot fill them returns `AgentError`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentResult {
    pub question: String,
    pub answer: String,
    pub messages: Vec<ChatMessage>,
    pub prediction: String,
    pub termination: String,
}

/// Errors that can occur in agent operations.
///
/// Each variant maps to a stable classification tag returned to callers as
/// `error_type`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model call failed: {0}")]
    Model(#[from] LlmError),

    #[error("Agent run exceeded {0:?}")]
    Timeout(Duration),

    #[error("Agent run panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Internal(String),
}

impl AgentError {
    /// Classification tag for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::Model(_) => "ModelError",
            Self::Timeout(_) => "AgentTimeout",
            Self::Panicked(_) => "AgentPanicked",
            Self::Internal(_) => "AgentError",
        }
    }
}

/// Errors from constructing an agent at startup.
#[derive(Debug, thiserror::Error)]
pub enum AgentInitError {
    #[error("Invalid agent configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Failed to bind tools: {0}")]
    Tools(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_deserializes_open_item() {
        let request: AgentRequest = serde_json::from_value(json!({
            "item": {"question": "What is the capital of France?", "answer": "Paris", "extra": [1, 2]},
            "planning_port": 6001,
            "model": "qwen-plus"
        }))
        .unwrap();
        assert_eq!(request.question(), Some("What is the capital of France?"));
        assert_eq!(request.planning_port, 6001);
        assert_eq!(request.item["extra"], json!([1, 2]));
    }

    #[test]
    fn question_must_be_string() {
        let request: AgentRequest = serde_json::from_value(json!({
            "item": {"question": 42},
            "planning_port": 1,
            "model": "m"
        }))
        .unwrap();
        assert_eq!(request.question(), None);
    }

    #[test]
    fn request_requires_planning_port() {
        let result: Result<AgentRequest, _> = serde_json::from_value(json!({
            "item": {},
            "model": "m"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_planning_port_is_rejected() {
        let result: Result<AgentRequest, _> = serde_json::from_value(json!({
            "item": {},
            "planning_port": 70000,
            "model": "m"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn error_kinds_are_stable() {
        assert_eq!(AgentError::InvalidRequest("x".into()).kind(), "InvalidRequest");
        assert_eq!(
            AgentError::from(LlmError::network_error("down".into())).kind(),
            "ModelError"
        );
        assert_eq!(AgentError::Timeout(Duration::from_secs(1)).kind(), "AgentTimeout");
        assert_eq!(AgentError::Panicked("boom".into()).kind(), "AgentPanicked");
        assert_eq!(AgentError::Internal("x".into()).kind(), "AgentError");
    }

    #[test]
    fn model_error_message_carries_cause() {
        let err = AgentError::from(LlmError::from_status(503, "overloaded".into(), None));
        assert_eq!(err.to_string(), "Model call failed: Server error (HTTP 503): overloaded");
    }
}
