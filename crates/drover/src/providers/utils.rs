use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use super::actions::{collapse_function_call, ToolVersion};
use super::base::{StopReason, Usage};
use crate::models::content::{CacheControl, Content, ImageSource};
use crate::models::message::{Message, MessageContent};

/// Convert canonical messages to the OpenAI chat-completions message list.
///
/// Chat-completions has no block structure, so each canonical message
/// collapses into at most one text segment plus its images: text blocks are
/// space-joined, every tool-result text is rendered as a `Tool result:` line,
/// and images (direct or embedded in tool results) become data-URI
/// `image_url` items. Tool-call-only assistant turns still emit a message,
/// with empty string content.
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        let mut texts: Vec<&str> = Vec::new();
        let mut tool_results: Vec<String> = Vec::new();
        let mut images: Vec<Value> = Vec::new();

        for block in &message.content {
            match block {
                MessageContent::Text(text) => {
                    let trimmed = text.text.trim();
                    if !trimmed.is_empty() {
                        texts.push(trimmed);
                    }
                }
                MessageContent::ToolResult(result) => {
                    for item in &result.content {
                        match item {
                            Content::Text(text) => {
                                tool_results.push(format!("Tool result: {}", text.text));
                            }
                            Content::Image(image) => images.push(convert_image(&image.source)),
                        }
                    }
                }
                MessageContent::Image(image) => images.push(convert_image(&image.source)),
                // A tool call has no chat-completions rendering of its own;
                // the model sees it through the following tool result.
                MessageContent::ToolUse(_) | MessageContent::Thinking(_) => {}
            }
        }

        let mut segments: Vec<String> = Vec::new();
        if !texts.is_empty() {
            segments.push(texts.join(" "));
        }
        if !tool_results.is_empty() {
            segments.push(tool_results.join("\n"));
        }
        let text = segments.join("\n");

        let mut items: Vec<Value> = Vec::new();
        if !text.is_empty() {
            items.push(json!({ "type": "text", "text": text }));
        }
        items.extend(images);

        let content = if items.is_empty() {
            json!("")
        } else if items.len() == 1 && !text.is_empty() {
            json!(text)
        } else {
            json!(items)
        };

        messages_spec.push(json!({ "role": message.role, "content": content }));
    }

    messages_spec
}

/// Render an image as an OpenAI `image_url` item with a data URI.
pub fn convert_image(source: &ImageSource) -> Value {
    json!({
        "type": "image_url",
        "image_url": {
            "url": format!("data:{};base64,{}", source.media_type, source.data)
        }
    })
}

/// Convert an OpenAI chat-completions response to canonical content blocks.
///
/// Function calls collapse back through the action catalog; argument payloads
/// that fail to parse degrade to an empty parameter set rather than aborting
/// the turn.
pub fn openai_response_to_blocks(
    response: &Value,
    version: ToolVersion,
) -> Result<(Vec<MessageContent>, StopReason, Usage)> {
    let choice = response
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| anyhow!("Response has no choices: {response}"))?;
    let message = &choice["message"];

    let mut blocks = Vec::new();

    if let Some(text) = message.get("content").and_then(|c| c.as_str()) {
        if !text.is_empty() {
            blocks.push(MessageContent::text(text));
        }
    }

    if let Some(tool_calls) = message.get("tool_calls").and_then(|t| t.as_array()) {
        for call in tool_calls {
            let id = call["id"]
                .as_str()
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("toolu_{}", Uuid::new_v4().simple()));
            let function_name = call["function"]["name"].as_str().unwrap_or_default();
            let raw_arguments = call["function"]["arguments"].as_str().unwrap_or_default();

            let arguments: Value = if raw_arguments.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(raw_arguments).unwrap_or_else(|err| {
                    warn!(
                        function = function_name,
                        %err,
                        "could not parse tool call arguments, substituting empty set"
                    );
                    json!({})
                })
            };

            let (name, input) = collapse_function_call(function_name, arguments, version);
            blocks.push(MessageContent::tool_use(id, name, input));
        }
    }

    let stop_reason = choice
        .get("finish_reason")
        .and_then(|f| f.as_str())
        .map(StopReason::from_finish_reason)
        .unwrap_or(StopReason::EndTurn);

    Ok((blocks, stop_reason, openai_usage(response)))
}

fn openai_usage(response: &Value) -> Usage {
    let usage = &response["usage"];
    Usage::new(
        usage
            .get("prompt_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32),
        usage
            .get("completion_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32),
    )
}

/// Convert canonical messages to the Anthropic messages wire shape. Blocks
/// map one to one; cache-control markers placed by the retention policy ride
/// along on their blocks.
pub fn messages_to_anthropic_spec(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| {
            let content: Vec<Value> = message.content.iter().map(block_to_anthropic).collect();
            json!({ "role": message.role, "content": content })
        })
        .collect()
}

fn with_cache_control(mut value: Value, marker: Option<CacheControl>) -> Value {
    if marker.is_some() {
        value["cache_control"] = json!({ "type": "ephemeral" });
    }
    value
}

fn block_to_anthropic(block: &MessageContent) -> Value {
    match block {
        MessageContent::Text(text) => with_cache_control(
            json!({ "type": "text", "text": text.text }),
            text.cache_control,
        ),
        MessageContent::Image(image) => with_cache_control(
            json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": image.source.media_type,
                    "data": image.source.data,
                }
            }),
            image.cache_control,
        ),
        MessageContent::ToolUse(tool_use) => with_cache_control(
            json!({
                "type": "tool_use",
                "id": tool_use.id,
                "name": tool_use.name,
                "input": tool_use.input,
            }),
            tool_use.cache_control,
        ),
        MessageContent::ToolResult(result) => {
            let content: Vec<Value> = result
                .content
                .iter()
                .map(|item| match item {
                    Content::Text(text) => json!({ "type": "text", "text": text.text }),
                    Content::Image(image) => json!({
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": image.source.media_type,
                            "data": image.source.data,
                        }
                    }),
                })
                .collect();
            let mut value = json!({
                "type": "tool_result",
                "tool_use_id": result.tool_use_id,
                "content": content,
            });
            if result.is_error {
                value["is_error"] = json!(true);
            }
            with_cache_control(value, result.cache_control)
        }
        MessageContent::Thinking(thinking) => {
            let mut value = json!({ "type": "thinking", "thinking": thinking.thinking });
            if let Some(signature) = &thinking.signature {
                value["signature"] = json!(signature);
            }
            value
        }
    }
}

/// Convert an Anthropic messages response to canonical content blocks.
pub fn anthropic_response_to_blocks(
    response: &Value,
) -> Result<(Vec<MessageContent>, StopReason, Usage)> {
    let content = response
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow!("Response has no content array: {response}"))?;

    let mut blocks = Vec::new();
    for block in content {
        match block["type"].as_str() {
            Some("text") => {
                blocks.push(MessageContent::text(block["text"].as_str().unwrap_or_default()));
            }
            Some("tool_use") => {
                blocks.push(MessageContent::tool_use(
                    block["id"].as_str().unwrap_or_default(),
                    block["name"].as_str().unwrap_or_default(),
                    block.get("input").cloned().unwrap_or_else(|| json!({})),
                ));
            }
            Some("thinking") => {
                blocks.push(MessageContent::thinking(
                    block["thinking"].as_str().unwrap_or_default(),
                    block["signature"].as_str().map(str::to_string),
                ));
            }
            other => {
                warn!(block_type = ?other, "skipping unrecognized response block");
            }
        }
    }

    let stop_reason = response
        .get("stop_reason")
        .and_then(|s| s.as_str())
        .map(StopReason::from_stop_reason)
        .unwrap_or(StopReason::EndTurn);

    let usage = &response["usage"];
    let usage = Usage::new(
        usage
            .get("input_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32),
        usage
            .get("output_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32),
    );

    Ok((blocks, stop_reason, usage))
}

#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}
