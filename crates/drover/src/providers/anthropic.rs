use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{ModelResponse, Provider};
use super::configs::{AnthropicAuth, AnthropicConfig};
use super::utils::{anthropic_response_to_blocks, messages_to_anthropic_spec};
use crate::models::message::Message;
use crate::models::tool::Tool;

pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";
pub const PROMPT_CACHING_BETA_FLAG: &str = "prompt-caching-2024-07-31";
pub const TOKEN_EFFICIENT_TOOLS_BETA_FLAG: &str = "token-efficient-tools-2025-02-19";

/// Adapter for any endpoint speaking the Anthropic messages wire format:
/// the native API, or Bedrock/Vertex gateways configured with a different
/// host and bearer auth.
pub struct AnthropicProvider {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn betas(&self) -> String {
        let mut betas = vec![self.config.tool_version.beta_flag()];
        if self.config.prompt_caching {
            betas.push(PROMPT_CACHING_BETA_FLAG);
        }
        if self.config.token_efficient_tools {
            betas.push(TOKEN_EFFICIENT_TOOLS_BETA_FLAG);
        }
        betas.join(",")
    }

    async fn post(&self, payload: &Value) -> Result<Value> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let mut request = self
            .client
            .post(&url)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .header("anthropic-beta", self.betas())
            .json(payload);

        request = match &self.config.auth {
            AnthropicAuth::ApiKey(key) => request.header("x-api-key", key),
            AnthropicAuth::Bearer(token) => {
                request.header("Authorization", format!("Bearer {}", token))
            }
        };

        let response = request.send().await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
                let error_text = response.text().await?;
                Err(anyhow!("Request failed: {} - {}", status, error_text))
            }
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn to_request(&self, system: &str, messages: &[Message], tools: &[Tool]) -> Result<Value> {
        let mut system_block = json!({ "type": "text", "text": system });
        if self.config.prompt_caching {
            system_block["cache_control"] = json!({ "type": "ephemeral" });
        }

        let tools_spec: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.input_schema,
                })
            })
            .collect();

        let mut payload = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": [system_block],
            "messages": messages_to_anthropic_spec(messages),
            "tools": tools_spec,
        });

        if let Some(budget) = self.config.thinking_budget {
            payload["thinking"] = json!({ "type": "enabled", "budget_tokens": budget });
        }

        Ok(payload)
    }

    async fn send(&self, payload: &Value) -> Result<Value> {
        self.post(payload).await
    }

    fn parse_response(&self, response: &Value) -> Result<ModelResponse> {
        let (content, stop_reason, usage) = anthropic_response_to_blocks(response)?;
        Ok(ModelResponse {
            content,
            stop_reason,
            usage,
        })
    }

    fn supports_prompt_caching(&self) -> bool {
        self.config.prompt_caching
    }
}
