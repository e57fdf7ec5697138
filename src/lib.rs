//! # React Agent API
//!
//! HTTP service exposing one ReAct research agent.
//!
//! ## Request Flow
//! 1. The agent is constructed once at startup from environment configuration
//! 2. `POST /agent/run` validates the task and hands it to the shared `AgentHandle`
//! 3. The agent alternates model turns and tool calls until it answers or runs out of budget
//! 4. The result, or a `{detail, error_type}` envelope, is returned to the caller
//!
//! ## Modules
//! - `api`: axum router, handlers and the error envelope
//! - `agents`: `Agent` trait, `AgentHandle` and `ReactAgent`
//! - `llm`: OpenAI-compatible chat client with retry
//! - `tools`: the four named tools the agent is bound to
//! - `config`: environment-derived configuration

pub mod agents;
pub mod api;
pub mod config;
pub mod llm;
pub mod tools;
pub mod util;

pub use agents::{Agent, AgentHandle, ReactAgent};
pub use config::Config;
