use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures a tool can report. All of these are recovered at the tool
/// collection boundary and surfaced to the model as error-flagged tool
/// results; none of them aborts the sampling loop.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Screen backend error: {0}")]
    BackendError(String),
}
