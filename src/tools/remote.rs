//! Tools backed by an external tool server.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::Tool;

/// A named capability whose execution happens on a tool server.
///
/// Calls are sent as `POST {server_url}/tools/{name}` with body
/// `{"name": ..., "arguments": ...}`; the response body is the observation.
pub struct RemoteTool {
    name: String,
    description: String,
    schema: Value,
    client: reqwest::Client,
    server_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct ToolCallBody<'a> {
    name: &'a str,
    arguments: &'a Value,
}

impl RemoteTool {
    pub fn new(
        name: &str,
        description: &str,
        schema: Value,
        client: reqwest::Client,
        server_url: Option<String>,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            schema,
            client,
            server_url,
        }
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let base = self.server_url.as_deref().ok_or_else(|| {
            anyhow::anyhow!("Tool {} is unavailable: TOOL_SERVER_URL is not set", self.name)
        })?;
        let url = format!("{}/tools/{}", base, self.name);

        tracing::debug!("Forwarding {} call to {}", self.name, url);
        let response = self
            .client
            .post(&url)
            .json(&ToolCallBody {
                name: &self.name,
                arguments: &args,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            anyhow::bail!("Tool {} failed (HTTP {}): {}", self.name, status.as_u16(), body);
        }
        Ok(body)
    }
}
