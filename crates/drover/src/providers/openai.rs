use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

use super::actions::expand_tool_schemas;
use super::base::{ModelResponse, Provider};
use super::configs::OpenAiConfig;
use super::utils::{
    check_openai_context_length_error, messages_to_openai_spec, openai_response_to_blocks,
};
use crate::models::message::Message;
use crate::models::tool::Tool;

/// Adapter for OpenAI-compatible chat-completions endpoints (OpenAI,
/// OpenRouter, and the various proxies that copy the shape).
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, payload: &Value) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body: Value = response.json().await?;
                // Some compatible endpoints report errors inside a 200 body.
                if let Some(error) = body.get("error") {
                    if let Some(err) = check_openai_context_length_error(error) {
                        return Err(err.into());
                    }
                    return Err(anyhow!("API error: {}", error));
                }
                Ok(body)
            }
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
impl Provider for OpenAiProvider {
    fn to_request(&self, system: &str, messages: &[Message], tools: &[Tool]) -> Result<Value> {
        let system_message = json!({
            "role": "system",
            "content": system
        });

        let mut messages_array = vec![system_message];
        messages_array.extend(messages_to_openai_spec(messages));

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array,
            "max_tokens": self.config.max_tokens,
        });

        let tools_spec = expand_tool_schemas(tools, self.config.tool_version)?;
        if !tools_spec.is_empty() {
            payload["tools"] = json!(tools_spec);
        }

        Ok(payload)
    }

    async fn send(&self, payload: &Value) -> Result<Value> {
        self.post(payload).await
    }

    fn parse_response(&self, response: &Value) -> Result<ModelResponse> {
        let (content, stop_reason, usage) =
            openai_response_to_blocks(response, self.config.tool_version)?;
        Ok(ModelResponse {
            content,
            stop_reason,
            usage,
        })
    }
}
