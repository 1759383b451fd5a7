//! Response parser — turns raw model text into a [`Step`].
//!
//! Markdown code fences are stripped before decoding. A reply that does not
//! decode into a JSON object yields a [`StepOutcome::Malformed`] step whose
//! thought embeds the raw text and the failure; parsing itself never fails.
//!
//! [`StepOutcome::Malformed`]: codecouncil_core::session::StepOutcome::Malformed

use codecouncil_core::session::{Step, StepAction};
use codecouncil_core::tool::ToolRegistry;
use serde_json::Value;

/// Thought recorded when the model omits one.
pub const MISSING_THOUGHT: &str = "No thought provided";

/// Parse one model reply. Action names are resolved against `tools`.
pub fn parse_response(raw: &str, tools: &ToolRegistry) -> Step {
    let cleaned = strip_fences(raw);

    let object = match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(object)) => object,
        Ok(other) => {
            return Step::malformed(format!(
                "Failed to parse JSON response: {raw} (expected a JSON object, got {})",
                kind_of(&other)
            ));
        }
        Err(e) => {
            return Step::malformed(format!("Failed to parse JSON response: {raw} ({e})"));
        }
    };

    let thought = match object.get("thought") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Null) | Some(Value::String(_)) | Some(Value::Bool(false)) | None => {
            MISSING_THOUGHT.to_string()
        }
        Some(other) => other.to_string(),
    };

    let action = match object.get("action") {
        Some(Value::String(name)) if !name.is_empty() => {
            Some(StepAction::resolve(name, |n| tools.contains(n)))
        }
        Some(Value::Null) | Some(Value::String(_)) | Some(Value::Bool(false)) | None => None,
        Some(other) => Some(StepAction::Unrecognized(other.to_string())),
    };

    let action_input = object.get("actionInput").filter(|v| !v.is_null()).cloned();

    Step::structured(thought, action, action_input)
}

fn strip_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
