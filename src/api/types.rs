//! API request and response types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use crate::agents::{AgentRequest, AgentResult};

/// Service metadata returned by `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceInfo {
    pub message: String,
    pub version: String,
    /// Route to short description
    pub endpoints: BTreeMap<String, String>,
}

impl ServiceInfo {
    pub fn current() -> Self {
        let endpoints = [
            ("/agent/run", "POST - run the agent on a task"),
            ("/health", "GET - health check"),
            ("/", "GET - API information"),
        ]
        .into_iter()
        .map(|(route, summary)| (route.to_string(), summary.to_string()))
        .collect();

        Self {
            message: "React Agent API Server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            endpoints,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    /// Always `healthy` while the process serves requests
    pub status: String,

    /// Whether an agent was constructed at startup
    pub agent_initialized: bool,
}

/// Body of every failed response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    /// Human-readable message
    pub detail: String,

    /// Classification tag, also sent as the `X-Error-Type` header
    pub error_type: String,
}
