use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;

use super::collection::AgentTool;
use crate::errors::ToolError;
use crate::models::tool::{Tool, ToolOutput};

/// Run shell commands in the sandbox.
pub struct BashTool;

#[async_trait]
impl AgentTool for BashTool {
    fn name(&self) -> &'static str {
        "bash"
    }

    fn to_params(&self) -> Tool {
        Tool::new(
            "bash",
            "Run a command in a bash shell. stderr is interleaved with stdout \
             in the result.",
            json!({
                "type": "object",
                "required": ["command"],
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The bash shell command to run."
                    }
                }
            }),
        )
    }

    async fn run(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let command = input
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters("Missing 'command' parameter".into()))?;

        // Redirect stderr to stdout to interleave outputs
        let output = Command::new("bash")
            .arg("-c")
            .arg(format!("{command} 2>&1"))
            .output()
            .await
            .map_err(|e| ToolError::ExecutionError(e.to_string()))?;

        let output_str = String::from_utf8_lossy(&output.stdout).to_string();

        if !output.status.success() {
            return Err(ToolError::ExecutionError(output_str));
        }
        Ok(ToolOutput::text(output_str))
    }
}
