//! Message adapters - convert between the crate's types and the
//! OpenAI-compatible chat completions format

use crate::domain::types::{ChatMessage, MessageRole, ToolSpec};
use serde_json::{Value, json};

/// Adapter for converting messages to and from the wire format
pub struct MessageAdapter;

impl MessageAdapter {
    /// Convert messages to OpenAI-style format, including assistant tool
    /// calls and tool results.
    pub fn to_openai_format(messages: &[ChatMessage]) -> Vec<Value> {
        messages.iter().map(Self::message_to_openai).collect()
    }

    fn message_to_openai(message: &ChatMessage) -> Value {
        match message.role {
            MessageRole::Assistant if message.has_tool_calls() => {
                let calls: Vec<Value> = message
                    .tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": match &call.arguments {
                                    Value::String(raw) => raw.clone(),
                                    other => other.to_string(),
                                },
                            }
                        })
                    })
                    .collect();
                let content = if message.content.is_empty() {
                    Value::Null
                } else {
                    Value::String(message.content.clone())
                };
                json!({
                    "role": "assistant",
                    "content": content,
                    "tool_calls": calls,
                })
            }
            MessageRole::Tool => json!({
                "role": "tool",
                "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
                "content": message.content,
            }),
            role => json!({
                "role": role.as_str(),
                "content": message.content,
            }),
        }
    }

    /// Convert tool specs to the `tools` request field
    pub fn tools_to_openai(tools: &[ToolSpec]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect()
    }

    /// Text of a response `content` field, which is either a plain string or
    /// a list of typed blocks.
    pub fn content_text(content: Option<&Value>) -> String {
        match content {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Array(blocks)) => blocks
                .iter()
                .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect(),
            _ => String::new(),
        }
    }

    /// Decode the JSON-encoded `arguments` of a function call.
    pub fn parse_arguments(raw: &str) -> Result<Value, serde_json::Error> {
        if raw.trim().is_empty() {
            return Ok(json!({}));
        }
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ToolCall;

    #[test]
    fn formats_tool_round_trip_messages() {
        let messages = vec![
            ChatMessage::system("be helpful"),
            ChatMessage::user("how many tables?"),
            ChatMessage::assistant(
                "",
                vec![ToolCall::new("call_1", "list_tables", json!({"schema": "ai"}))],
            ),
            ChatMessage::tool("call_1", "3 tables"),
        ];

        let formatted = MessageAdapter::to_openai_format(&messages);
        assert_eq!(formatted[0], json!({"role": "system", "content": "be helpful"}));
        assert_eq!(formatted[2]["content"], Value::Null);
        assert_eq!(formatted[2]["tool_calls"][0]["function"]["name"], "list_tables");
        assert_eq!(
            formatted[2]["tool_calls"][0]["function"]["arguments"],
            r#"{"schema":"ai"}"#
        );
        assert_eq!(
            formatted[3],
            json!({"role": "tool", "tool_call_id": "call_1", "content": "3 tables"})
        );
    }

    #[test]
    fn formats_tool_specs_as_functions() {
        let tools = vec![ToolSpec {
            name: "search".into(),
            description: "Search docs".into(),
            parameters: json!({"type": "object", "properties": {}}),
        }];
        let formatted = MessageAdapter::tools_to_openai(&tools);
        assert_eq!(formatted[0]["type"], "function");
        assert_eq!(formatted[0]["function"]["description"], "Search docs");
    }

    #[test]
    fn reads_string_and_block_content() {
        assert_eq!(MessageAdapter::content_text(Some(&json!("hi"))), "hi");
        assert_eq!(
            MessageAdapter::content_text(Some(&json!([
                {"type": "reasoning", "summary": []},
                {"type": "text", "text": "4"}
            ]))),
            "4"
        );
        assert_eq!(MessageAdapter::content_text(None), "");
    }

    #[test]
    fn empty_arguments_decode_to_empty_object() {
        assert_eq!(MessageAdapter::parse_arguments("").expect("empty"), json!({}));
        assert!(MessageAdapter::parse_arguments("{oops").is_err());
    }
}
