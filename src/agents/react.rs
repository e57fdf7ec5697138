//! ReAct agent - alternates model turns with tool calls until it commits to an answer.
//!
//! The model is prompted to emit either `<tool_call>{"name": ..., "arguments": ...}</tool_call>`
//! or a final `<answer>...</answer>`. Tool observations are fed back wrapped in
//! `<tool_response>` tags.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use super::types::{termination, AgentError, AgentInitError, AgentRequest, AgentResult};
use super::Agent;
use crate::config::{LlmConfig, ToolConfig};
use crate::llm::{ChatMessage, ChatModel, ChatOptions, OpenAiCompatClient, RetryConfig};
use crate::tools::{ToolRegistry, DEFAULT_TOOLS};
use crate::util::preview;

const NO_ANSWER: &str = "No answer found.";
const CHARS_PER_TOKEN: usize = 4;

static ANSWER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<answer>(.*?)</answer>").expect("valid regex"));
static TOOL_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<tool_call>(.*?)</tool_call>").expect("valid regex"));
static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<code>(.*?)</code>").expect("valid regex"));

pub struct ReactAgent {
    config: LlmConfig,
    llm: Arc<dyn ChatModel>,
    tools: ToolRegistry,
}

impl ReactAgent {
    /// Build the agent from configuration, binding the default tool set.
    ///
    /// # Errors
    /// Fails on unusable configuration or if the HTTP clients cannot be built.
    pub fn new(config: LlmConfig, tool_config: &ToolConfig) -> Result<Self, AgentInitError> {
        let llm = OpenAiCompatClient::new(
            config.api_key.clone(),
            RetryConfig::with_max_retries(config.generate.max_retries),
        )?;
        let tools = ToolRegistry::from_names(&DEFAULT_TOOLS, tool_config)
            .map_err(|e| AgentInitError::Tools(format!("{:#}", e)))?;
        Self::with_parts(config, Arc::new(llm), tools)
    }

    /// Build the agent around an explicit model backend and tool registry.
    pub fn with_parts(
        config: LlmConfig,
        llm: Arc<dyn ChatModel>,
        tools: ToolRegistry,
    ) -> Result<Self, AgentInitError> {
        if config.model.trim().is_empty() {
            return Err(AgentInitError::InvalidConfig("model name is empty".to_string()));
        }
        if config.max_llm_calls == 0 {
            return Err(AgentInitError::InvalidConfig(
                "max_llm_calls must be positive".to_string(),
            ));
        }
        if config.generate.max_input_tokens == 0 {
            return Err(AgentInitError::InvalidConfig(
                "max_input_tokens must be positive".to_string(),
            ));
        }
        Ok(Self { config, llm, tools })
    }

    fn base_url(&self, planning_port: u16) -> String {
        format!("http://{}:{}/v1", self.config.planning_host, planning_port)
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are a deep research assistant. Answer the user's question by reasoning step by step \
             and calling tools when you need information.\n\n\
             # Tools\n\n\
             You may call one or more functions to assist with the user query.\n\n\
             <tools>\n{}\n</tools>\n\n\
             For each function call, return a json object with function name and arguments within \
             <tool_call></tool_call> XML tags:\n\
             <tool_call>\n{{\"name\": <function-name>, \"arguments\": <args-json-object>}}\n</tool_call>\n\n\
             For PythonInterpreter, put the code inside <code></code> tags within the tool call.\n\n\
             When you are confident, give the final answer inside <answer></answer> tags.\n\n\
             Current date: {}",
            self.tools.describe(),
            chrono::Local::now().format("%Y-%m-%d")
        )
    }

    /// Run one tool call and render the observation. Failures become observations.
    async fn call_tool(&self, raw: &str) -> String {
        match parse_tool_call(raw) {
            Ok((name, args)) => {
                tracing::debug!("Calling tool {} with {}", name, preview(&args.to_string(), 200));
                match self.tools.execute(&name, args).await {
                    Ok(output) => output,
                    Err(e) => {
                        tracing::warn!("Tool {} failed: {:#}", name, e);
                        format!("Error: {:#}", e)
                    }
                }
            }
            Err(e) => format!("Error: {}", e),
        }
    }
}

#[async_trait]
impl Agent for ReactAgent {
    fn description(&self) -> &str {
        "ReAct agent: plans with a chat model and calls search, visit, google_scholar and PythonInterpreter"
    }

    async fn run(&self, request: &AgentRequest, model: &str) -> Result<AgentResult, AgentError> {
        let question = request
            .question()
            .ok_or_else(|| AgentError::InvalidRequest("item.question must be a string".to_string()))?
            .to_string();
        let answer = render_reference_answer(request.item.get("answer"));

        let base_url = self.base_url(request.planning_port);
        let mut options = ChatOptions::from(&self.config.generate);
        options.stop = vec!["\n<tool_response>".to_string(), "<tool_response>".to_string()];

        let mut messages = vec![
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(question.clone()),
        ];

        let finish = |messages: Vec<ChatMessage>, prediction: String, reason: &str| AgentResult {
            question: question.clone(),
            answer: answer.clone(),
            messages,
            prediction,
            termination: reason.to_string(),
        };

        for round in 1..=self.config.max_llm_calls {
            let tokens = estimate_tokens(&messages);
            if tokens > self.config.generate.max_input_tokens {
                tracing::warn!(
                    "Token budget exhausted at round {} (~{} tokens > {})",
                    round,
                    tokens,
                    self.config.generate.max_input_tokens
                );
                return Ok(finish(messages, NO_ANSWER.to_string(), termination::TOKEN_LIMIT));
            }

            let content = self
                .llm
                .chat_completion(&base_url, model, &messages, &options)
                .await?;
            let content = match content.find("<tool_response>") {
                Some(idx) => content[..idx].to_string(),
                None => content,
            };
            tracing::debug!("Round {}: {}", round, preview(&content, 300));
            messages.push(ChatMessage::assistant(content.clone()));

            if let Some(prediction) = extract(&ANSWER_RE, &content) {
                tracing::info!("Answer produced after {} rounds", round);
                return Ok(finish(messages, prediction, termination::ANSWER));
            }

            if let Some(raw_call) = extract(&TOOL_CALL_RE, &content) {
                let observation = self.call_tool(&raw_call).await;
                messages.push(ChatMessage::user(format!(
                    "<tool_response>\n{}\n</tool_response>",
                    observation
                )));
            }
        }

        tracing::warn!("Model call budget of {} exhausted", self.config.max_llm_calls);
        Ok(finish(messages, NO_ANSWER.to_string(), termination::CALLS_EXHAUSTED))
    }
}

/// Trimmed contents of the last match of `re` in `text`.
fn extract(re: &Regex, text: &str) -> Option<String> {
    re.captures_iter(text)
        .last()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Parse a `<tool_call>` body into a tool name and arguments.
fn parse_tool_call(raw: &str) -> Result<(String, Value), String> {
    // Python calls carry the code outside the JSON to avoid escaping it.
    if raw.contains("PythonInterpreter") {
        if let Some(code) = extract(&CODE_RE, raw) {
            return Ok(("PythonInterpreter".to_string(), json!({ "code": code })));
        }
    }

    let parsed: Value =
        serde_json::from_str(raw).map_err(|e| format!("tool call is not valid JSON: {}", e))?;
    let name = parsed
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| "tool call is missing a name".to_string())?
        .to_string();
    let args = parsed.get("arguments").cloned().unwrap_or_else(|| json!({}));
    Ok((name, args))
}

fn render_reference_answer(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn estimate_tokens(messages: &[ChatMessage]) -> usize {
    messages.iter().map(|m| m.content.chars().count()).sum::<usize>() / CHARS_PER_TOKEN
}
