use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::content::Content;
use super::message::MessageContent;

/// A tool the model can invoke.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// JSON schema for the tool's input
    pub input_schema: Value,
}

impl Tool {
    /// Create a new tool with the given name and description
    pub fn new<N, D>(name: N, description: D, input_schema: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// The uniform return value of a tool invocation.
///
/// A populated `error` wins over everything else when rendering; otherwise
/// `output` and `base64_image` each become their own content item, in that
/// order. `system` is an operator-facing note prepended to whichever text is
/// emitted, wrapped in a `<system>` marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

impl ToolOutput {
    pub fn text<S: Into<String>>(output: S) -> Self {
        ToolOutput {
            output: Some(output.into()),
            ..Default::default()
        }
    }

    pub fn error<S: Into<String>>(error: S) -> Self {
        ToolOutput {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn screenshot<S: Into<String>>(base64_image: S) -> Self {
        ToolOutput {
            base64_image: Some(base64_image.into()),
            ..Default::default()
        }
    }

    pub fn with_system<S: Into<String>>(mut self, system: S) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    fn prepend_system(&self, text: &str) -> String {
        match &self.system {
            Some(system) => format!("<system>{}</system>\n{}", system, text),
            None => text.to_string(),
        }
    }

    /// Render this output as the tool_result block for the given request id.
    pub fn into_tool_result(self, tool_use_id: &str) -> MessageContent {
        if let Some(error) = &self.error {
            let text = self.prepend_system(error);
            return MessageContent::tool_result(tool_use_id, vec![Content::text(text)], true);
        }

        let mut content = Vec::new();
        if let Some(output) = &self.output {
            content.push(Content::text(self.prepend_system(output)));
        }
        if let Some(image) = &self.base64_image {
            content.push(Content::image(image.clone(), "image/png"));
        }
        MessageContent::tool_result(tool_use_id, content, false)
    }
}
