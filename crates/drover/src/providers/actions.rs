//! The fixed catalog of discrete actions behind the composite `computer`
//! tool, and the translation between the composite form (one tool, an
//! `action` field) and the flat form (one function schema per action) that
//! OpenAI-compatible providers require.

use anyhow::{anyhow, Result};
use serde_json::{json, Map, Value};
use strum_macros::{Display, EnumIter, EnumString};

use crate::models::tool::Tool;

/// Which action catalog (and provider beta flag) is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumString, Display)]
pub enum ToolVersion {
    #[strum(serialize = "computer_use_20241022")]
    ComputerUse20241022,
    #[strum(serialize = "computer_use_20250124")]
    ComputerUse20250124,
}

impl ToolVersion {
    pub fn beta_flag(&self) -> &'static str {
        match self {
            ToolVersion::ComputerUse20241022 => "computer-use-2024-10-22",
            ToolVersion::ComputerUse20250124 => "computer-use-2025-01-24",
        }
    }

    /// The action names this catalog version exposes, in a fixed order.
    pub fn actions(&self) -> &'static [&'static str] {
        match self {
            ToolVersion::ComputerUse20241022 => ACTIONS_20241022,
            ToolVersion::ComputerUse20250124 => ACTIONS_20250124,
        }
    }

    pub fn supports_action(&self, action: &str) -> bool {
        self.actions().contains(&action)
    }
}

impl Default for ToolVersion {
    fn default() -> Self {
        ToolVersion::ComputerUse20250124
    }
}

static ACTIONS_20241022: &[&str] = &[
    "key",
    "type",
    "mouse_move",
    "left_click",
    "left_click_drag",
    "right_click",
    "middle_click",
    "double_click",
    "screenshot",
    "cursor_position",
];

static ACTIONS_20250124: &[&str] = &[
    "screenshot",
    "cursor_position",
    "left_click",
    "right_click",
    "double_click",
    "middle_click",
    "mouse_move",
    "left_click_drag",
    "type",
    "key",
    "left_mouse_down",
    "left_mouse_up",
    "scroll",
    "hold_key",
    "wait",
    "triple_click",
];

fn action_description(action: &str) -> &'static str {
    match action {
        "screenshot" => "Take a screenshot of the current screen.",
        "cursor_position" => "Report the current (x, y) position of the mouse cursor.",
        "left_click" => "Click the left mouse button at the given coordinate.",
        "right_click" => "Click the right mouse button at the given coordinate.",
        "double_click" => "Double-click the left mouse button at the given coordinate.",
        "middle_click" => "Click the middle mouse button at the given coordinate.",
        "triple_click" => "Triple-click the left mouse button at the given coordinate.",
        "mouse_move" => "Move the mouse cursor to the given coordinate.",
        "left_click_drag" => {
            "Press the left mouse button at start_coordinate and drag to coordinate."
        }
        "type" => "Type the given text on the keyboard.",
        "key" => "Press a key or key combination, e.g. 'Return' or 'ctrl+s'.",
        "left_mouse_down" => "Press and hold the left mouse button at the given coordinate.",
        "left_mouse_up" => "Release the left mouse button at the given coordinate.",
        "scroll" => "Scroll the screen at the given coordinate in the given direction.",
        "hold_key" => "Hold a key down for the given duration in seconds.",
        "wait" => "Wait for the given duration in seconds.",
        _ => "",
    }
}

fn coordinate_property() -> Value {
    json!({
        "type": "array",
        "items": { "type": "number" },
        "minItems": 2,
        "maxItems": 2,
        "description": "(x, y) pixel coordinate on the screen."
    })
}

/// The input schema for one catalog action.
fn action_parameters(action: &str) -> Value {
    let (properties, required): (Value, Vec<&str>) = match action {
        "screenshot" | "cursor_position" => (json!({}), vec![]),
        "left_click" | "right_click" | "double_click" | "middle_click" | "triple_click"
        | "mouse_move" | "left_mouse_down" | "left_mouse_up" => (
            json!({ "coordinate": coordinate_property() }),
            vec!["coordinate"],
        ),
        "left_click_drag" => (
            json!({
                "start_coordinate": coordinate_property(),
                "coordinate": coordinate_property(),
            }),
            vec!["start_coordinate", "coordinate"],
        ),
        "type" | "key" => (
            json!({
                "text": { "type": "string", "description": "The text or key sequence." }
            }),
            vec!["text"],
        ),
        "hold_key" => (
            json!({
                "text": { "type": "string", "description": "The key to hold." },
                "duration": { "type": "number", "minimum": 0, "description": "Seconds to hold." }
            }),
            vec!["text", "duration"],
        ),
        "wait" => (
            json!({
                "duration": { "type": "number", "minimum": 0, "description": "Seconds to wait." }
            }),
            vec!["duration"],
        ),
        "scroll" => (
            json!({
                "coordinate": coordinate_property(),
                "scroll_direction": {
                    "type": "string",
                    "enum": ["up", "down", "left", "right"],
                    "description": "The direction to scroll."
                },
                "scroll_amount": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "The number of scroll wheel clicks."
                }
            }),
            vec!["coordinate", "scroll_direction", "scroll_amount"],
        ),
        _ => (json!({}), vec![]),
    };

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Expand the tool list into the flat function schemas an OpenAI-compatible
/// provider expects. The composite `computer` tool becomes one function per
/// catalog action; `bash` keeps its single required `command` string; other
/// tools pass through as named functions with a permissive object schema.
pub fn expand_tool_schemas(tools: &[Tool], version: ToolVersion) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        match tool.name.as_str() {
            "computer" => {
                for action in version.actions() {
                    result.push(json!({
                        "type": "function",
                        "function": {
                            "name": action,
                            "description": action_description(action),
                            "parameters": action_parameters(action),
                        }
                    }));
                }
            }
            "bash" => {
                result.push(json!({
                    "type": "function",
                    "function": {
                        "name": "bash",
                        "description": tool.description,
                        "parameters": {
                            "type": "object",
                            "properties": {
                                "command": { "type": "string", "description": "The shell command to run." }
                            },
                            "required": ["command"],
                        }
                    }
                }));
            }
            _ => {
                result.push(json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": { "type": "object" },
                    }
                }));
            }
        }
    }

    Ok(result)
}

/// Inverse of the expansion: map a provider function call back to a canonical
/// (tool name, input) pair. Catalog actions re-wrap as the composite
/// `computer` tool with the action folded into the input; anything else
/// passes through unchanged. Null-valued argument fields are dropped.
pub fn collapse_function_call(
    function_name: &str,
    arguments: Value,
    version: ToolVersion,
) -> (String, Value) {
    if !version.supports_action(function_name) {
        return (function_name.to_string(), arguments);
    }

    let mut input = Map::new();
    input.insert("action".to_string(), json!(function_name));
    if let Value::Object(args) = arguments {
        for (key, value) in args {
            if !value.is_null() {
                input.insert(key, value);
            }
        }
    }
    ("computer".to_string(), Value::Object(input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    fn sample_arguments(action: &str) -> Value {
        match action {
            "screenshot" | "cursor_position" => json!({}),
            "left_click" | "right_click" | "double_click" | "middle_click" | "triple_click"
            | "mouse_move" | "left_mouse_down" | "left_mouse_up" => {
                json!({"coordinate": [640, 360]})
            }
            "left_click_drag" => {
                json!({"start_coordinate": [10, 10], "coordinate": [200, 120]})
            }
            "type" => json!({"text": "search for cats"}),
            "key" => json!({"text": "Return"}),
            "hold_key" => json!({"text": "shift", "duration": 1.5}),
            "wait" => json!({"duration": 2.0}),
            "scroll" => {
                json!({"coordinate": [640, 360], "scroll_direction": "down", "scroll_amount": 3})
            }
            other => panic!("no sample arguments for {other}"),
        }
    }

    #[test]
    fn test_tool_version_round_trips_config_strings() {
        assert_eq!(
            ToolVersion::from_str("computer_use_20250124").unwrap(),
            ToolVersion::ComputerUse20250124
        );
        assert_eq!(
            ToolVersion::ComputerUse20241022.to_string(),
            "computer_use_20241022"
        );
    }

    #[test]
    fn test_expand_emits_one_function_per_action() {
        let computer = Tool::new("computer", "Control the screen", json!({"type": "object"}));
        let schemas =
            expand_tool_schemas(&[computer], ToolVersion::ComputerUse20250124).unwrap();
        assert_eq!(schemas.len(), 16);
        let names: Vec<&str> = schemas
            .iter()
            .map(|s| s["function"]["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"screenshot"));
        assert!(names.contains(&"triple_click"));

        let scroll = schemas
            .iter()
            .find(|s| s["function"]["name"] == "scroll")
            .unwrap();
        let required = scroll["function"]["parameters"]["required"]
            .as_array()
            .unwrap();
        assert!(required.iter().any(|r| r == "scroll_direction"));
        assert!(required.iter().any(|r| r == "scroll_amount"));
    }

    #[test]
    fn test_older_catalog_is_a_subset() {
        let old = ToolVersion::ComputerUse20241022;
        let new = ToolVersion::ComputerUse20250124;
        assert_eq!(old.actions().len(), 10);
        for action in old.actions() {
            assert!(new.supports_action(action), "{action} missing from newer catalog");
        }
        assert!(!old.supports_action("triple_click"));
        assert!(!old.supports_action("scroll"));
    }

    #[test]
    fn test_bash_and_generic_tools_stay_single_schemas() {
        let tools = vec![
            Tool::new("bash", "Run shell commands", json!({"type": "object"})),
            Tool::new("str_replace_editor", "Edit files", json!({"type": "object"})),
        ];
        let schemas = expand_tool_schemas(&tools, ToolVersion::ComputerUse20250124).unwrap();
        assert_eq!(schemas.len(), 2);
        assert_eq!(
            schemas[0]["function"]["parameters"]["required"],
            json!(["command"])
        );
        assert_eq!(schemas[1]["function"]["name"], "str_replace_editor");
    }

    #[test]
    fn test_duplicate_tool_names_rejected() {
        let tools = vec![
            Tool::new("bash", "a", json!({})),
            Tool::new("bash", "b", json!({})),
        ];
        let result = expand_tool_schemas(&tools, ToolVersion::ComputerUse20250124);
        assert!(result.unwrap_err().to_string().contains("Duplicate tool name"));
    }

    #[test]
    fn test_collapse_round_trip_whole_catalog() {
        for version in ToolVersion::iter() {
            for action in version.actions() {
                let args = sample_arguments(action);
                let (name, input) = collapse_function_call(action, args.clone(), version);
                assert_eq!(name, "computer");
                assert_eq!(input["action"], *action);
                // every original argument survives the round trip
                for (key, value) in args.as_object().unwrap() {
                    assert_eq!(&input[key], value, "{action}.{key} lost in translation");
                }
            }
        }
    }

    #[test]
    fn test_collapse_drops_null_fields() {
        let (_, input) = collapse_function_call(
            "left_click",
            json!({"coordinate": [1, 2], "modifier": null}),
            ToolVersion::ComputerUse20250124,
        );
        assert_eq!(input, json!({"action": "left_click", "coordinate": [1, 2]}));
    }

    #[test]
    fn test_collapse_passes_unknown_functions_through() {
        let (name, input) = collapse_function_call(
            "bash",
            json!({"command": "ls"}),
            ToolVersion::ComputerUse20250124,
        );
        assert_eq!(name, "bash");
        assert_eq!(input, json!({"command": "ls"}));
    }

    #[test]
    fn test_collapse_tolerates_non_object_arguments() {
        let (name, input) =
            collapse_function_call("screenshot", json!(null), ToolVersion::ComputerUse20250124);
        assert_eq!(name, "computer");
        assert_eq!(input, json!({"action": "screenshot"}));
    }
}
