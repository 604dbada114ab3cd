use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::content::{CacheControl, Content, ImageContent, ImageSource, TextContent};
use super::role::Role;

/// A request by the model to invoke one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

/// The rendered outcome of one tool invocation, keyed back to its request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    pub content: Vec<Content>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

/// Extended-reasoning block emitted by providers with a thinking budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingContent {
    pub thinking: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

/// Content passed inside a message, covering both plain content and tool traffic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text(TextContent),
    Image(ImageContent),
    ToolUse(ToolUse),
    ToolResult(ToolResultBlock),
    Thinking(ThinkingContent),
}

impl MessageContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessageContent::Text(TextContent {
            text: text.into(),
            cache_control: None,
        })
    }

    pub fn image<S: Into<String>, T: Into<String>>(data: S, media_type: T) -> Self {
        MessageContent::Image(ImageContent {
            source: ImageSource {
                media_type: media_type.into(),
                data: data.into(),
            },
            cache_control: None,
        })
    }

    pub fn tool_use<I: Into<String>, N: Into<String>>(id: I, name: N, input: Value) -> Self {
        MessageContent::ToolUse(ToolUse {
            id: id.into(),
            name: name.into(),
            input,
            cache_control: None,
        })
    }

    pub fn tool_result<S: Into<String>>(
        tool_use_id: S,
        content: Vec<Content>,
        is_error: bool,
    ) -> Self {
        MessageContent::ToolResult(ToolResultBlock {
            tool_use_id: tool_use_id.into(),
            content,
            is_error,
            cache_control: None,
        })
    }

    pub fn thinking<S: Into<String>>(thinking: S, signature: Option<String>) -> Self {
        MessageContent::Thinking(ThinkingContent {
            thinking: thinking.into(),
            signature,
            cache_control: None,
        })
    }

    /// Get the text if this is a Text variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    pub fn as_tool_use(&self) -> Option<&ToolUse> {
        match self {
            MessageContent::ToolUse(tool_use) => Some(tool_use),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResultBlock> {
        match self {
            MessageContent::ToolResult(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_tool_result_mut(&mut self) -> Option<&mut ToolResultBlock> {
        match self {
            MessageContent::ToolResult(result) => Some(result),
            _ => None,
        }
    }

    pub fn set_cache_control(&mut self, marker: Option<CacheControl>) {
        match self {
            MessageContent::Text(text) => text.cache_control = marker,
            MessageContent::Image(image) => image.cache_control = marker,
            MessageContent::ToolUse(tool_use) => tool_use.cache_control = marker,
            MessageContent::ToolResult(result) => result.cache_control = marker,
            MessageContent::Thinking(thinking) => thinking.cache_control = marker,
        }
    }

    pub fn cache_control(&self) -> Option<CacheControl> {
        match self {
            MessageContent::Text(text) => text.cache_control,
            MessageContent::Image(image) => image.cache_control,
            MessageContent::ToolUse(tool_use) => tool_use.cache_control,
            MessageContent::ToolResult(result) => result.cache_control,
            MessageContent::Thinking(thinking) => thinking.cache_control,
        }
    }
}

/// A message to or from the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub created: i64,
    pub content: Vec<MessageContent>,
}

impl Message {
    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Message {
            role: Role::User,
            created: Utc::now().timestamp(),
            content: Vec::new(),
        }
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Message {
            role: Role::Assistant,
            created: Utc::now().timestamp(),
            content: Vec::new(),
        }
    }

    /// Add any MessageContent to the message
    pub fn with_content(mut self, content: MessageContent) -> Self {
        self.content.push(content);
        self
    }

    /// Add several content blocks at once
    pub fn with_blocks<I: IntoIterator<Item = MessageContent>>(mut self, blocks: I) -> Self {
        self.content.extend(blocks);
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(MessageContent::text(text))
    }

    /// Add image content to the message
    pub fn with_image<S: Into<String>, T: Into<String>>(self, data: S, media_type: T) -> Self {
        self.with_content(MessageContent::image(data, media_type))
    }

    /// Add a tool use request to the message
    pub fn with_tool_use<I: Into<String>, N: Into<String>>(
        self,
        id: I,
        name: N,
        input: Value,
    ) -> Self {
        self.with_content(MessageContent::tool_use(id, name, input))
    }

    /// Add a tool result to the message
    pub fn with_tool_result<S: Into<String>>(
        self,
        tool_use_id: S,
        content: Vec<Content>,
        is_error: bool,
    ) -> Self {
        self.with_content(MessageContent::tool_result(tool_use_id, content, is_error))
    }

    /// Iterate the tool use requests contained in this message
    pub fn tool_uses(&self) -> impl Iterator<Item = &ToolUse> {
        self.content.iter().filter_map(|c| c.as_tool_use())
    }
}
