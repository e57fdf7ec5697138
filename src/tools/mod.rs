//! Tool system for the agent.
//!
//! The agent is bound to a fixed capability set at construction time:
//! `search`, `visit`, `google_scholar` and `PythonInterpreter`. Each is a
//! [`RemoteTool`] that forwards the call to a tool server.

mod remote;

pub use remote::RemoteTool;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::ToolConfig;

/// Names of the capabilities every agent is constructed with.
pub const DEFAULT_TOOLS: [&str; 4] = ["search", "visit", "google_scholar", "PythonInterpreter"];

/// Trait for implementing tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> anyhow::Result<String>;
}

/// Registry of available tools.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Create a registry holding the named capabilities, forwarded per `config`.
    ///
    /// # Errors
    /// Fails on a name outside [`DEFAULT_TOOLS`] or if the HTTP client cannot be built.
    pub fn from_names(names: &[&str], config: &ToolConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()?;

        let mut registry = Self::empty();
        for name in names {
            let (description, schema) = builtin_signature(name)
                .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;
            registry.register(Arc::new(RemoteTool::new(
                name,
                description,
                schema,
                client.clone(),
                config.server_url.clone(),
            )));
        }

        tracing::info!(
            "Tool registry ready with {} tools: {:?}",
            registry.tools.len(),
            registry.names()
        );
        Ok(registry)
    }

    /// Add or replace a tool.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Tool names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Render tool signatures for the system prompt, one JSON object per line.
    pub fn describe(&self) -> String {
        self.tools
            .values()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.parameters_schema(),
                    }
                })
                .to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Execute a tool by name.
    pub async fn execute(&self, name: &str, args: Value) -> anyhow::Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Tool {} not found", name))?;
        tool.execute(args).await
    }
}

fn builtin_signature(name: &str) -> Option<(&'static str, Value)> {
    let signature = match name {
        "search" => (
            "Perform web searches and return the top results for each query.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Search queries to run together"
                    }
                },
                "required": ["query"]
            }),
        ),
        "visit" => (
            "Visit webpages and return a summary of the content relevant to the goal.",
            json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "URLs to visit"
                    },
                    "goal": {
                        "type": "string",
                        "description": "What information to extract from the pages"
                    }
                },
                "required": ["url", "goal"]
            }),
        ),
        "google_scholar" => (
            "Search Google Scholar for academic publications.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Scholarly search queries"
                    }
                },
                "required": ["query"]
            }),
        ),
        "PythonInterpreter" => (
            "Execute Python code in a sandbox and return stdout.",
            json!({
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "Python source to run"
                    }
                },
                "required": ["code"]
            }),
        ),
        _ => return None,
    };
    Some(signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo arguments back"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, args: Value) -> anyhow::Result<String> {
            Ok(args.to_string())
        }
    }

    #[test]
    fn default_registry_binds_four_named_tools() {
        let registry = ToolRegistry::from_names(&DEFAULT_TOOLS, &ToolConfig::default()).unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(
            registry.names(),
            vec!["PythonInterpreter", "google_scholar", "search", "visit"]
        );
    }

    #[test]
    fn unknown_tool_name_fails_construction() {
        let result = ToolRegistry::from_names(&["search", "teleport"], &ToolConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn describe_lists_every_tool() {
        let registry = ToolRegistry::from_names(&DEFAULT_TOOLS, &ToolConfig::default()).unwrap();
        let described = registry.describe();
        assert_eq!(described.lines().count(), 4);
        for name in DEFAULT_TOOLS {
            assert!(described.contains(&format!("\"name\":\"{}\"", name)));
        }
    }

    #[tokio::test]
    async fn execute_dispatches_by_name() {
        let mut registry = ToolRegistry::empty();
        registry.register(Arc::new(Echo));
        let out = registry.execute("echo", json!({"a": 1})).await.unwrap();
        assert_eq!(out, r#"{"a":1}"#);
        assert!(registry.execute("missing", json!({})).await.is_err());
    }
}
