use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::errors::ToolError;
use crate::models::tool::{Tool, ToolOutput};

/// An executable capability the model can invoke.
#[async_trait]
pub trait AgentTool: Send + Sync {
    /// The name the model addresses this tool by
    fn name(&self) -> &'static str;

    /// The tool definition advertised to the provider
    fn to_params(&self) -> Tool;

    /// Execute one invocation
    async fn run(&self, input: Value) -> Result<ToolOutput, ToolError>;
}

/// The set of tools owned by one sampling-loop run.
///
/// `run` is total: unknown tool names and every `ToolError` come back as an
/// error-flagged `ToolOutput`, so a tool failure is always an ordinary
/// conversation turn and never unwinds the loop.
pub struct ToolCollection {
    tools: Vec<Box<dyn AgentTool>>,
}

impl ToolCollection {
    pub fn new(tools: Vec<Box<dyn AgentTool>>) -> Self {
        Self { tools }
    }

    pub fn to_params(&self) -> Vec<Tool> {
        self.tools.iter().map(|tool| tool.to_params()).collect()
    }

    pub async fn run(&self, name: &str, input: Value) -> ToolOutput {
        let Some(tool) = self.tools.iter().find(|tool| tool.name() == name) else {
            return ToolOutput::error(ToolError::ToolNotFound(name.to_string()).to_string());
        };

        match tool.run(input).await {
            Ok(output) => output,
            Err(err) => {
                warn!(tool = name, %err, "tool invocation failed");
                ToolOutput::error(err.to_string())
            }
        }
    }
}
