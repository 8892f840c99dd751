use super::interface::ServerToolInfo;
use crate::domain::types::ToolSpec;
use serde::Serialize;
use serde_json::{Value, json};

/// A discovered tool bound to the server that hosts it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub server: String,
}

impl ToolDescriptor {
    pub fn from_info(server: &str, info: ServerToolInfo) -> Self {
        let description = info
            .description
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| format!("Tool: {}", info.name));
        let input_schema = match info.input_schema {
            Some(Value::Object(map)) => Value::Object(map),
            _ => json!({"type": "object", "properties": {}}),
        };
        Self {
            name: info.name,
            description,
            input_schema,
            server: server.to_string(),
        }
    }

    pub fn to_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.input_schema.clone(),
        }
    }
}

/// Text shown to the model for a `tools/call` result.
pub fn render_result(result: &Value) -> String {
    extract_tool_message(result).unwrap_or_else(|| match result.get("structuredContent") {
        Some(structured) => structured.to_string(),
        None => result.to_string(),
    })
}

/// Error text when the result is flagged with `isError`.
pub(crate) fn reported_error(result: &Value) -> Option<String> {
    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    is_error.then(|| extract_tool_message(result).unwrap_or_else(|| "unknown error".to_string()))
}

fn extract_tool_message(result: &Value) -> Option<String> {
    if let Some(array) = result.get("content").and_then(Value::as_array) {
        for block in array {
            let is_text = block
                .get("type")
                .and_then(Value::as_str)
                .map(|value| value.eq_ignore_ascii_case("text"))
                .unwrap_or(false);
            if !is_text {
                continue;
            }
            if let Some(text) = block.get("text").and_then(Value::as_str) {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }

    result
        .get("structuredContent")
        .and_then(|structured| structured.get("error"))
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}
