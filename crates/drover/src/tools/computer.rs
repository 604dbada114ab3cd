use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use strum_macros::{Display, EnumString};

use super::collection::AgentTool;
use crate::errors::ToolError;
use crate::models::tool::{Tool, ToolOutput};
use crate::providers::actions::ToolVersion;

const MAX_DURATION_SECS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// The screen-control primitives the composite tool delegates to. The
/// harness wires in a browser-backed implementation; the tool itself never
/// knows what sits behind these calls.
#[async_trait]
pub trait ScreenBackend: Send + Sync {
    /// Capture the screen as base64-encoded PNG bytes.
    async fn screenshot(&self) -> Result<String, ToolError>;

    async fn cursor_position(&self) -> Result<(u32, u32), ToolError>;

    async fn click(
        &self,
        x: u32,
        y: u32,
        button: MouseButton,
        count: u32,
    ) -> Result<(), ToolError>;

    async fn mouse_move(&self, x: u32, y: u32) -> Result<(), ToolError>;

    /// Press (or release) the left mouse button at a coordinate.
    async fn set_mouse_pressed(&self, x: u32, y: u32, pressed: bool) -> Result<(), ToolError>;

    async fn drag(&self, start: (u32, u32), end: (u32, u32)) -> Result<(), ToolError>;

    async fn type_text(&self, text: &str) -> Result<(), ToolError>;

    /// Press a key or chord, e.g. "Return" or "ctrl+s".
    async fn press_key(&self, key: &str) -> Result<(), ToolError>;

    async fn hold_key(&self, key: &str, duration: Duration) -> Result<(), ToolError>;

    async fn scroll(
        &self,
        x: u32,
        y: u32,
        direction: ScrollDirection,
        amount: u32,
    ) -> Result<(), ToolError>;
}

/// The composite `computer` tool: one tool whose behavior is selected by an
/// `action` input field, validated against the active catalog version.
/// Mutating actions return a fresh screenshot so the model sees the result.
pub struct ComputerTool {
    backend: Box<dyn ScreenBackend>,
    version: ToolVersion,
}

impl ComputerTool {
    pub fn new(backend: Box<dyn ScreenBackend>) -> Self {
        Self {
            backend,
            version: ToolVersion::default(),
        }
    }

    pub fn with_version(mut self, version: ToolVersion) -> Self {
        self.version = version;
        self
    }

    fn coordinate(input: &Value, key: &str) -> Result<(u32, u32), ToolError> {
        let pair = input
            .get(key)
            .and_then(|v| v.as_array())
            .ok_or_else(|| ToolError::InvalidParameters(format!("Missing '{key}' parameter")))?;
        if pair.len() != 2 {
            return Err(ToolError::InvalidParameters(format!(
                "'{key}' must be a 2-element array"
            )));
        }
        let x = pair[0].as_u64();
        let y = pair[1].as_u64();
        match (x, y) {
            (Some(x), Some(y)) => Ok((x as u32, y as u32)),
            _ => Err(ToolError::InvalidParameters(format!(
                "'{key}' must contain two non-negative integers"
            ))),
        }
    }

    fn text(input: &Value) -> Result<&str, ToolError> {
        input
            .get("text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters("Missing 'text' parameter".into()))
    }

    fn duration(input: &Value) -> Result<Duration, ToolError> {
        let seconds = input
            .get("duration")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| ToolError::InvalidParameters("Missing 'duration' parameter".into()))?;
        if seconds < 0.0 {
            return Err(ToolError::InvalidParameters(
                "'duration' must be non-negative".into(),
            ));
        }
        if seconds > MAX_DURATION_SECS {
            return Err(ToolError::InvalidParameters(
                "'duration' is too long".into(),
            ));
        }
        Ok(Duration::from_secs_f64(seconds))
    }

    async fn screenshot_output(&self) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::screenshot(self.backend.screenshot().await?))
    }
}

#[async_trait]
impl AgentTool for ComputerTool {
    fn name(&self) -> &'static str {
        "computer"
    }

    fn to_params(&self) -> Tool {
        Tool::new(
            "computer",
            "Control a computer screen: take screenshots, move and click the \
             mouse, type and press keys, and scroll. The `action` parameter \
             selects the operation.",
            json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": self.version.actions(),
                        "description": "The operation to perform."
                    },
                    "coordinate": {
                        "type": "array",
                        "items": { "type": "number" },
                        "minItems": 2,
                        "maxItems": 2,
                        "description": "(x, y) pixel coordinate on the screen."
                    },
                    "start_coordinate": {
                        "type": "array",
                        "items": { "type": "number" },
                        "minItems": 2,
                        "maxItems": 2,
                        "description": "Drag origin for left_click_drag."
                    },
                    "text": { "type": "string", "description": "Text or key sequence." },
                    "duration": { "type": "number", "description": "Seconds, for hold_key and wait." },
                    "scroll_direction": { "type": "string", "enum": ["up", "down", "left", "right"] },
                    "scroll_amount": { "type": "integer", "minimum": 0 }
                },
                "required": ["action"]
            }),
        )
    }

    async fn run(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let action = input
            .get("action")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters("Missing 'action' parameter".into()))?;

        if !self.version.supports_action(action) {
            return Err(ToolError::InvalidParameters(format!(
                "Unsupported action '{action}'"
            )));
        }

        match action {
            "screenshot" => self.screenshot_output().await,
            "cursor_position" => {
                let (x, y) = self.backend.cursor_position().await?;
                Ok(ToolOutput::text(format!("X={x},Y={y}")))
            }
            "left_click" | "right_click" | "middle_click" | "double_click" | "triple_click" => {
                let (x, y) = Self::coordinate(&input, "coordinate")?;
                let (button, count) = match action {
                    "right_click" => (MouseButton::Right, 1),
                    "middle_click" => (MouseButton::Middle, 1),
                    "double_click" => (MouseButton::Left, 2),
                    "triple_click" => (MouseButton::Left, 3),
                    _ => (MouseButton::Left, 1),
                };
                self.backend.click(x, y, button, count).await?;
                self.screenshot_output().await
            }
            "mouse_move" => {
                let (x, y) = Self::coordinate(&input, "coordinate")?;
                self.backend.mouse_move(x, y).await?;
                self.screenshot_output().await
            }
            "left_mouse_down" | "left_mouse_up" => {
                let (x, y) = Self::coordinate(&input, "coordinate")?;
                self.backend
                    .set_mouse_pressed(x, y, action == "left_mouse_down")
                    .await?;
                self.screenshot_output().await
            }
            "left_click_drag" => {
                let start = Self::coordinate(&input, "start_coordinate")?;
                let end = Self::coordinate(&input, "coordinate")?;
                self.backend.drag(start, end).await?;
                self.screenshot_output().await
            }
            "type" => {
                self.backend.type_text(Self::text(&input)?).await?;
                self.screenshot_output().await
            }
            "key" => {
                self.backend.press_key(Self::text(&input)?).await?;
                self.screenshot_output().await
            }
            "hold_key" => {
                let key = Self::text(&input)?;
                let duration = Self::duration(&input)?;
                self.backend.hold_key(key, duration).await?;
                self.screenshot_output().await
            }
            "wait" => {
                let duration = Self::duration(&input)?;
                tokio::time::sleep(duration).await;
                self.screenshot_output().await
            }
            "scroll" => {
                let (x, y) = Self::coordinate(&input, "coordinate")?;
                let direction = input
                    .get("scroll_direction")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        ToolError::InvalidParameters("Missing 'scroll_direction' parameter".into())
                    })?;
                let direction = ScrollDirection::from_str(direction).map_err(|_| {
                    ToolError::InvalidParameters(format!(
                        "'scroll_direction' must be one of up, down, left, right (got '{direction}')"
                    ))
                })?;
                let amount = input
                    .get("scroll_amount")
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| {
                        ToolError::InvalidParameters(
                            "'scroll_amount' must be a non-negative integer".into(),
                        )
                    })?;
                self.backend.scroll(x, y, direction, amount as u32).await?;
                self.screenshot_output().await
            }
            other => Err(ToolError::InvalidParameters(format!(
                "Unsupported action '{other}'"
            ))),
        }
    }
}
