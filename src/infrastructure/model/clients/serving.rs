//! Databricks model serving client (OpenAI-compatible chat completions)

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Error as EventSourceError, Event};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::base::HttpClientBase;
use crate::config::{ConfigError, Settings};
use crate::domain::types::ToolCall;
use crate::infrastructure::model::adapter::MessageAdapter;
use crate::infrastructure::model::traits::ModelProvider;
use crate::infrastructure::model::types::{
    ModelDelta, ModelError, ModelRequest, ModelResponse, ModelStream,
};

/// Client for a serving endpoint's `invocations` URL. Works with any
/// OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct ServingEndpointClient {
    base: HttpClientBase,
}

impl ServingEndpointClient {
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base: HttpClientBase::new(id.into(), endpoint.into(), api_key),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let url = settings
            .model
            .chat_url(settings.workspace_url.as_deref())
            .ok_or(ConfigError::MissingWorkspaceUrl)?;
        Ok(Self::new(
            settings.model.name.clone(),
            url,
            settings.credentials.bearer().map(str::to_string),
        ))
    }

    fn payload(request: &ModelRequest, stream: bool) -> ChatRequest {
        let tools = MessageAdapter::tools_to_openai(&request.tools);
        let tool_choice = (!tools.is_empty()).then(|| "auto".to_string());
        ChatRequest {
            model: request.model.clone(),
            messages: MessageAdapter::to_openai_format(&request.messages),
            tools,
            tool_choice,
            stream,
        }
    }

    /// Arguments that are not valid JSON are kept as the raw string so the
    /// agent can report them back to the model.
    fn convert_calls(&self, calls: Vec<WireToolCall>) -> Vec<ToolCall> {
        calls
            .into_iter()
            .map(|call| {
                let arguments = match call.function.arguments {
                    Value::String(raw) => match MessageAdapter::parse_arguments(&raw) {
                        Ok(parsed) => parsed,
                        Err(err) => {
                            warn!(
                                provider = self.base.id.as_str(),
                                tool = %call.function.name,
                                %err,
                                "Tool call arguments are not JSON"
                            );
                            Value::String(raw)
                        }
                    },
                    Value::Null => Value::Object(Default::default()),
                    other => other,
                };
                ToolCall::new(
                    call.id.unwrap_or_else(generated_call_id),
                    call.function.name,
                    arguments,
                )
            })
            .collect()
    }
}

#[async_trait]
impl ModelProvider for ServingEndpointClient {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let payload = Self::payload(&request, false);

        info!(
            provider = self.base.id.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending request to serving endpoint"
        );

        let response: ChatResponse = self.base.post_json(&payload).await?;
        debug!("Received response from serving endpoint");

        let message = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .ok_or_else(|| ModelError::invalid_response(&self.base.id, "missing message"))?;

        let content = MessageAdapter::content_text(message.content.as_ref());
        let tool_calls = self.convert_calls(message.tool_calls.unwrap_or_default());
        Ok(ModelResponse::new(content, tool_calls))
    }

    async fn chat_stream(&self, request: ModelRequest) -> Result<ModelStream, ModelError> {
        let payload = Self::payload(&request, true);
        info!(
            provider = self.base.id.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Streaming request to serving endpoint"
        );
        let mut source = self.base.open_event_stream(&payload)?;
        let client = self.clone();

        let output = stream! {
            let mut content = String::new();
            let mut pending: Vec<PartialCall> = Vec::new();

            while let Some(event) = source.next().await {
                match event {
                    Ok(Event::Open) => continue,
                    Ok(Event::Message(message)) => {
                        let data = message.data.trim();
                        if data == "[DONE]" {
                            break;
                        }
                        if data.is_empty() {
                            continue;
                        }
                        let chunk: StreamChunk = match serde_json::from_str(data) {
                            Ok(chunk) => chunk,
                            Err(err) => {
                                source.close();
                                yield Err(ModelError::invalid_response(&client.base.id, err.to_string()));
                                return;
                            }
                        };
                        for choice in chunk.choices {
                            let text = MessageAdapter::content_text(choice.delta.content.as_ref());
                            if !text.is_empty() {
                                content.push_str(&text);
                                yield Ok(ModelDelta::Text(text));
                            }
                            for call in choice.delta.tool_calls.unwrap_or_default() {
                                merge_call(&mut pending, call);
                            }
                        }
                    }
                    Err(EventSourceError::StreamEnded) => break,
                    Err(err) => {
                        source.close();
                        yield Err(client.stream_error(err).await);
                        return;
                    }
                }
            }
            source.close();

            let calls = pending
                .into_iter()
                .map(|call| WireToolCall {
                    id: call.id,
                    function: WireFunction {
                        name: call.name,
                        arguments: Value::String(call.arguments),
                    },
                })
                .collect();
            let tool_calls = client.convert_calls(calls);
            yield Ok(ModelDelta::Completed(ModelResponse::new(content, tool_calls)));
        };

        Ok(Box::pin(output))
    }
}

impl ServingEndpointClient {
    async fn stream_error(&self, err: EventSourceError) -> ModelError {
        match err {
            EventSourceError::InvalidStatusCode(status, response) => {
                let body = response.text().await.unwrap_or_default();
                ModelError::status(&self.base.id, status, body)
            }
            EventSourceError::Transport(source) => ModelError::network(&self.base.id, source),
            other => ModelError::stream(&self.base.id, other.to_string()),
        }
    }
}

fn generated_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

fn merge_call(pending: &mut Vec<PartialCall>, delta: StreamToolCall) {
    let index = delta.index.unwrap_or(pending.len().saturating_sub(1));
    if pending.len() <= index {
        pending.resize_with(index + 1, PartialCall::default);
    }
    let entry = &mut pending[index];
    if let Some(id) = delta.id {
        entry.id = Some(id);
    }
    if let Some(function) = delta.function {
        if let Some(name) = function.name {
            entry.name.push_str(&name);
        }
        if let Some(arguments) = function.arguments {
            entry.arguments.push_str(&arguments);
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<WireMessage>,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Deserialize)]
struct StreamToolCall {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunction>,
}

#[derive(Deserialize)]
struct StreamFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Default)]
struct PartialCall {
    id: Option<String>,
    name: String,
    arguments: String,
}
