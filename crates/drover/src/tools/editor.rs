use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::collection::AgentTool;
use crate::errors::ToolError;
use crate::models::tool::{Tool, ToolOutput};

/// Text editing operations on files in the sandbox, with per-file undo
/// history.
pub struct EditorTool {
    file_history: Mutex<HashMap<PathBuf, Vec<String>>>,
}

impl EditorTool {
    pub fn new() -> Self {
        Self {
            file_history: Mutex::new(HashMap::new()),
        }
    }

    fn resolve_path(path_str: &str) -> Result<PathBuf, ToolError> {
        let path = Path::new(path_str);
        if !path.is_absolute() {
            return Err(ToolError::InvalidParameters(format!(
                "The path '{path_str}' must be absolute"
            )));
        }
        Ok(path.to_path_buf())
    }

    fn read_file(path: &Path) -> Result<String, ToolError> {
        std::fs::read_to_string(path)
            .map_err(|e| ToolError::ExecutionError(format!("Failed to read file: {e}")))
    }

    fn write_file(path: &Path, content: &str) -> Result<(), ToolError> {
        std::fs::write(path, content)
            .map_err(|e| ToolError::ExecutionError(format!("Failed to write file: {e}")))
    }

    fn save_history(&self, path: &Path) -> Result<(), ToolError> {
        let content = if path.exists() {
            Self::read_file(path)?
        } else {
            String::new()
        };
        self.file_history
            .lock()
            .unwrap()
            .entry(path.to_path_buf())
            .or_default()
            .push(content);
        Ok(())
    }

    fn view(&self, path: &Path) -> Result<ToolOutput, ToolError> {
        if path.is_file() {
            return Ok(ToolOutput::text(Self::read_file(path)?));
        }
        if path.is_dir() {
            let entries = std::fs::read_dir(path)
                .map_err(|e| ToolError::ExecutionError(format!("Failed to read directory: {e}")))?;
            let mut names = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|e| {
                    ToolError::ExecutionError(format!("Failed to read directory entry: {e}"))
                })?;
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
            names.sort();
            return Ok(ToolOutput::text(names.join("\n")));
        }
        Err(ToolError::InvalidParameters(format!(
            "The path '{}' does not exist",
            path.display()
        )))
    }

    fn create(&self, path: &Path, file_text: &str) -> Result<ToolOutput, ToolError> {
        self.save_history(path)?;
        Self::write_file(path, file_text)?;
        Ok(ToolOutput::text(format!(
            "Successfully wrote to {}",
            path.display()
        )))
    }

    fn str_replace(
        &self,
        path: &Path,
        old_str: &str,
        new_str: &str,
    ) -> Result<ToolOutput, ToolError> {
        if !path.exists() {
            return Err(ToolError::InvalidParameters(format!(
                "File '{}' does not exist",
                path.display()
            )));
        }

        let content = Self::read_file(path)?;
        if content.matches(old_str).count() != 1 {
            return Err(ToolError::InvalidParameters(
                "'old_str' must appear exactly once in the file".into(),
            ));
        }

        self.save_history(path)?;
        Self::write_file(path, &content.replace(old_str, new_str))?;
        Ok(ToolOutput::text("Successfully replaced text"))
    }

    fn insert(
        &self,
        path: &Path,
        insert_line: usize,
        new_str: &str,
    ) -> Result<ToolOutput, ToolError> {
        if !path.exists() {
            return Err(ToolError::InvalidParameters(format!(
                "File '{}' does not exist",
                path.display()
            )));
        }

        let content = Self::read_file(path)?;
        let mut lines: Vec<String> = content.lines().map(String::from).collect();
        if insert_line > lines.len() {
            return Err(ToolError::InvalidParameters(
                "Insert line number is out of range".into(),
            ));
        }

        self.save_history(path)?;
        lines.insert(insert_line, new_str.to_string());
        Self::write_file(path, &lines.join("\n"))?;
        Ok(ToolOutput::text("Successfully inserted text"))
    }

    fn undo_edit(&self, path: &Path) -> Result<ToolOutput, ToolError> {
        let mut history = self.file_history.lock().unwrap();
        let previous = history
            .get_mut(path)
            .and_then(|contents| contents.pop())
            .ok_or_else(|| {
                ToolError::InvalidParameters("No edit history available to undo".into())
            })?;
        Self::write_file(path, &previous)?;
        Ok(ToolOutput::text("Successfully undid the last edit"))
    }
}

impl Default for EditorTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentTool for EditorTool {
    fn name(&self) -> &'static str {
        "str_replace_editor"
    }

    fn to_params(&self) -> Tool {
        Tool::new(
            "str_replace_editor",
            "Perform text editing operations on files. The `command` parameter \
             specifies the operation to perform.",
            json!({
                "type": "object",
                "required": ["command", "path"],
                "properties": {
                    "command": {
                        "enum": ["view", "create", "str_replace", "insert", "undo_edit"],
                        "description": "The operation to run."
                    },
                    "path": {
                        "type": "string",
                        "description": "Absolute path to a file or directory."
                    },
                    "file_text": {
                        "type": "string",
                        "description": "Required for the `create` command."
                    },
                    "old_str": {
                        "type": "string",
                        "description": "Required for the `str_replace` command."
                    },
                    "new_str": {
                        "type": "string",
                        "description": "Required for `str_replace` and `insert` commands."
                    },
                    "insert_line": {
                        "type": "integer",
                        "description": "Required for the `insert` command."
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
        let path_str = input
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters("Missing 'path' parameter".into()))?;
        let path = Self::resolve_path(path_str)?;

        match command {
            "view" => self.view(&path),
            "create" => {
                let file_text = input.get("file_text").and_then(|v| v.as_str()).ok_or_else(
                    || ToolError::InvalidParameters("Missing 'file_text' parameter".into()),
                )?;
                self.create(&path, file_text)
            }
            "str_replace" => {
                let old_str = input.get("old_str").and_then(|v| v.as_str()).ok_or_else(
                    || ToolError::InvalidParameters("Missing 'old_str' parameter".into()),
                )?;
                let new_str = input
                    .get("new_str")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                self.str_replace(&path, old_str, new_str)
            }
            "insert" => {
                let insert_line = input
                    .get("insert_line")
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| {
                        ToolError::InvalidParameters("Missing 'insert_line' parameter".into())
                    })?;
                let new_str = input.get("new_str").and_then(|v| v.as_str()).ok_or_else(
                    || ToolError::InvalidParameters("Missing 'new_str' parameter".into()),
                )?;
                self.insert(&path, insert_line as usize, new_str)
            }
            "undo_edit" => self.undo_edit(&path),
            _ => Err(ToolError::InvalidParameters(format!(
                "Unknown command '{command}'"
            ))),
        }
    }
}
