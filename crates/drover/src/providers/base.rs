use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::message::{Message, MessageContent};
use crate::models::tool::Tool;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
}

impl Usage {
    pub fn new(input_tokens: Option<i32>, output_tokens: Option<i32>) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }
}

/// Why the model stopped producing output, normalized across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

impl StopReason {
    /// Map an OpenAI-style `finish_reason`. Unknown values fold into EndTurn.
    pub fn from_finish_reason(reason: &str) -> Self {
        match reason {
            "stop" => StopReason::EndTurn,
            "tool_calls" => StopReason::ToolUse,
            "length" => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        }
    }

    /// Map an Anthropic-style `stop_reason`. Unknown values fold into EndTurn.
    pub fn from_stop_reason(reason: &str) -> Self {
        match reason {
            "end_turn" => StopReason::EndTurn,
            "tool_use" => StopReason::ToolUse,
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        }
    }
}

/// One model turn in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub content: Vec<MessageContent>,
    pub stop_reason: StopReason,
    #[serde(default)]
    pub usage: Usage,
}

/// Base trait for model providers (Anthropic-native, Bedrock, Vertex,
/// OpenAI-compatible). The request/parse halves are split from the transport
/// so the loop can hand the exact request payload to its observability
/// callback and retry the send alone.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Build the provider-specific request payload for one completion call.
    fn to_request(&self, system: &str, messages: &[Message], tools: &[Tool]) -> Result<Value>;

    /// Perform the HTTP exchange. Every error returned here is considered a
    /// provider-call failure and is eligible for retry.
    async fn send(&self, payload: &Value) -> Result<Value>;

    /// Translate a raw response body back into canonical content blocks.
    fn parse_response(&self, response: &Value) -> Result<ModelResponse>;

    /// Whether conversations sent to this provider should carry prompt-cache
    /// breakpoints.
    fn supports_prompt_caching(&self) -> bool {
        false
    }

    /// Build, send, and parse in one step.
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<ModelResponse> {
        let payload = self.to_request(system, messages, tools)?;
        let response = self.send(&payload).await?;
        self.parse_response(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(StopReason::from_finish_reason("stop"), StopReason::EndTurn);
        assert_eq!(
            StopReason::from_finish_reason("tool_calls"),
            StopReason::ToolUse
        );
        assert_eq!(
            StopReason::from_finish_reason("length"),
            StopReason::MaxTokens
        );
        assert_eq!(
            StopReason::from_finish_reason("content_filter"),
            StopReason::EndTurn
        );
    }

    #[test]
    fn test_usage_serialization() {
        let usage = Usage::new(Some(10), Some(20));
        let value = serde_json::to_value(&usage).unwrap();
        assert_eq!(value["input_tokens"], 10);
        assert_eq!(value["output_tokens"], 20);
    }
}
