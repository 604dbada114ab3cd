use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use super::base::{ModelResponse, Provider, StopReason, Usage};
use crate::models::message::{Message, MessageContent};
use crate::models::tool::Tool;

/// A scripted provider for tests: returns pre-configured responses in order,
/// optionally failing a number of sends first, and records every request
/// payload it sees. Clones share the script and the request log.
#[derive(Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<ModelResponse>>>,
    failures_remaining: Arc<Mutex<u32>>,
    requests: Arc<Mutex<Vec<Value>>>,
    prompt_caching: bool,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            failures_remaining: Arc::new(Mutex::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            prompt_caching: false,
        }
    }

    /// Fail the first `failures` sends before the script starts replying
    pub fn with_failures(self, failures: u32) -> Self {
        *self.failures_remaining.lock().unwrap() = failures;
        self
    }

    /// Report prompt-caching support, like the native Anthropic adapter
    pub fn with_prompt_caching(mut self) -> Self {
        self.prompt_caching = true;
        self
    }

    /// Shorthand for a response containing the given blocks
    pub fn reply(content: Vec<MessageContent>) -> ModelResponse {
        let stop_reason = if content.iter().any(|c| c.as_tool_use().is_some()) {
            StopReason::ToolUse
        } else {
            StopReason::EndTurn
        };
        ModelResponse {
            content,
            stop_reason,
            usage: Usage::default(),
        }
    }

    /// How many sends reached this provider
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn to_request(&self, system: &str, messages: &[Message], tools: &[Tool]) -> Result<Value> {
        Ok(json!({
            "mock": true,
            "system": system,
            "message_count": messages.len(),
            "tool_count": tools.len(),
        }))
    }

    async fn send(&self, payload: &Value) -> Result<Value> {
        self.requests.lock().unwrap().push(payload.clone());

        {
            let mut failures = self.failures_remaining.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(anyhow!("mock provider failure"));
            }
        }

        let mut responses = self.responses.lock().unwrap();
        let response = if responses.is_empty() {
            // Script exhausted: reply with an empty turn so loops terminate
            ModelResponse {
                content: Vec::new(),
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
            }
        } else {
            responses.remove(0)
        };
        Ok(serde_json::to_value(response)?)
    }

    fn parse_response(&self, response: &Value) -> Result<ModelResponse> {
        Ok(serde_json::from_value(response.clone())?)
    }

    fn supports_prompt_caching(&self) -> bool {
        self.prompt_caching
    }
}
