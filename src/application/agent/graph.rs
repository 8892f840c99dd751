use super::errors::AgentError;
use super::models::{AgentRun, AgentStep};
use super::state::{GraphNode, GraphState};
use crate::application::tooling::{ToolServerInterface, render_result};
use crate::domain::types::{ChatMessage, MessageRole, ToolCall, ToolSpec};
use crate::infrastructure::model::{ModelDelta, ModelError, ModelProvider, ModelRequest};
use crate::infrastructure::telemetry::{SpanKind, TraceRecorder};
use async_stream::stream;
use chrono::Utc;
use futures::{Stream, StreamExt};
use serde_json::{Value, json};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Progress of a graph run.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// Answer text as the model emits it (streaming runs only).
    Text(String),
    ToolStarted(ToolCall),
    ToolFinished(AgentStep),
    Finished(AgentRun),
}

pub type AgentEventStream<'a> =
    Pin<Box<dyn Stream<Item = Result<AgentEvent, AgentError>> + Send + 'a>>;

/// Tool-calling agent: REASON until the model stops asking for tools.
pub struct AgentGraph {
    pub(super) model: Arc<dyn ModelProvider>,
    pub(super) tools: Arc<dyn ToolServerInterface>,
    pub(super) model_name: String,
    pub(super) system_prompt: String,
    pub(super) specs: Vec<ToolSpec>,
    pub(super) max_iterations: usize,
}

impl AgentGraph {
    pub fn tool_specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Run to completion and return the buffered result.
    pub async fn invoke(&self, query: &str, recorder: &TraceRecorder) -> Result<AgentRun, AgentError> {
        let mut events = self.run(query, recorder.clone(), false);
        while let Some(event) = events.next().await {
            if let AgentEvent::Finished(run) = event? {
                return Ok(run);
            }
        }
        Err(AgentError::Interrupted)
    }

    /// Run lazily, yielding answer text and tool markers as they happen.
    pub fn stream(&self, query: &str, recorder: TraceRecorder) -> AgentEventStream<'_> {
        self.run(query, recorder, true)
    }

    fn initial_messages(&self, query: String) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if !self.system_prompt.trim().is_empty() {
            messages.push(ChatMessage::system(self.system_prompt.clone()));
        }
        messages.push(ChatMessage::user(query));
        messages
    }

    fn run(&self, query: &str, recorder: TraceRecorder, streaming: bool) -> AgentEventStream<'_> {
        let mut messages = self.initial_messages(query.to_string());

        Box::pin(stream! {
            info!(streaming, tools = self.specs.len(), "Agent run started");
            let mut steps: Vec<AgentStep> = Vec::new();
            let mut path: Vec<GraphNode> = Vec::new();
            let mut reason_steps = 0usize;
            let mut state = GraphState::Reason;

            loop {
                path.push(state.node());
                match state {
                    GraphState::Reason => {
                        if reason_steps >= self.max_iterations {
                            warn!(limit = self.max_iterations, "Agent exceeded reasoning step limit");
                            yield Err(AgentError::IterationLimit { limit: self.max_iterations });
                            return;
                        }
                        reason_steps += 1;

                        let request = ModelRequest {
                            model: self.model_name.clone(),
                            messages: messages.clone(),
                            tools: self.specs.clone(),
                        };
                        let input = json!({ "messages": &messages });
                        let started = Utc::now();
                        debug!(step = reason_steps, messages = messages.len(), "Submitting agent turn to model");

                        let outcome = if streaming {
                            match self.model.chat_stream(request).await {
                                Err(err) => Err(err),
                                Ok(mut deltas) => {
                                    let mut completed = None;
                                    let mut failure = None;
                                    while let Some(delta) = deltas.next().await {
                                        match delta {
                                            Ok(ModelDelta::Text(text)) => yield Ok(AgentEvent::Text(text)),
                                            Ok(ModelDelta::Completed(response)) => {
                                                completed = Some(response);
                                                break;
                                            }
                                            Err(err) => {
                                                failure = Some(err);
                                                break;
                                            }
                                        }
                                    }
                                    match (completed, failure) {
                                        (_, Some(err)) => Err(err),
                                        (Some(response), None) => Ok(response),
                                        (None, None) => Err(ModelError::stream(
                                            &self.model_name,
                                            "stream ended without a completed turn",
                                        )),
                                    }
                                }
                            }
                        } else {
                            self.model.chat(request).await
                        };

                        let response = match outcome {
                            Ok(response) => response,
                            Err(err) => {
                                warn!(%err, "Model call failed");
                                recorder.record(SpanKind::Reason, "reason", started, input, Value::Null, Some(err.to_string()));
                                yield Err(AgentError::Model(err));
                                return;
                            }
                        };
                        let output = serde_json::to_value(&response.message).unwrap_or(Value::Null);
                        recorder.record(SpanKind::Reason, "reason", started, input, output, None);

                        state = GraphState::after_reason(&response.message);
                        messages.push(response.message);
                    }
                    GraphState::Act(calls) => {
                        let dispatched: Vec<_> = calls
                            .into_iter()
                            .map(|call| {
                                let started = Utc::now();
                                let handle = match argument_error(&call) {
                                    Some(message) => Err(message),
                                    None => {
                                        let tools = Arc::clone(&self.tools);
                                        let name = call.name.clone();
                                        let arguments = call.arguments.clone();
                                        info!(tool = %name, "Agent requested tool execution");
                                        Ok(tokio::spawn(async move { tools.invoke_tool(&name, arguments).await }))
                                    }
                                };
                                (call, started, handle)
                            })
                            .collect();

                        for (call, _, _) in &dispatched {
                            yield Ok(AgentEvent::ToolStarted(call.clone()));
                        }

                        for (call, started, handle) in dispatched {
                            let (success, output, message) = match handle {
                                Err(message) => {
                                    warn!(tool = %call.name, "Tool call has invalid arguments");
                                    (false, Value::Null, message)
                                }
                                Ok(handle) => match handle.await {
                                    Ok(Ok(result)) => {
                                        let message = render_result(&result);
                                        (true, result, message)
                                    }
                                    Ok(Err(err)) => {
                                        warn!(tool = %call.name, %err, "Tool execution failed");
                                        (false, Value::Null, format!("Error: {err}"))
                                    }
                                    Err(err) => {
                                        warn!(tool = %call.name, %err, "Tool task did not complete");
                                        (false, Value::Null, format!("Error: tool task failed: {err}"))
                                    }
                                },
                            };
                            info!(tool = %call.name, success, "Tool executed");

                            recorder.record(
                                SpanKind::Act,
                                call.name.clone(),
                                started,
                                call.arguments.clone(),
                                json!(message),
                                (!success).then(|| message.clone()),
                            );
                            messages.push(ChatMessage::tool(call.id.clone(), message.clone()));

                            let step = AgentStep {
                                tool: call.name,
                                call_id: call.id,
                                input: call.arguments,
                                success,
                                output,
                                message,
                            };
                            steps.push(step.clone());
                            yield Ok(AgentEvent::ToolFinished(step));
                        }

                        state = GraphState::after_act();
                    }
                    GraphState::Done => {
                        // Same text the streaming run emitted, turn by turn.
                        let answer: String = messages
                            .iter()
                            .filter(|message| message.role == MessageRole::Assistant)
                            .map(|message| message.content.as_str())
                            .collect();
                        info!(reason_steps, tool_calls = steps.len(), "Agent returned final response");
                        yield Ok(AgentEvent::Finished(AgentRun {
                            answer,
                            messages: messages.clone(),
                            steps: std::mem::take(&mut steps),
                            path: std::mem::take(&mut path),
                        }));
                        return;
                    }
                }
            }
        })
    }
}

/// Tool servers take a JSON object; anything else is answered without dispatch.
fn argument_error(call: &ToolCall) -> Option<String> {
    match &call.arguments {
        Value::Object(_) | Value::Null => None,
        Value::String(raw) => Some(format!(
            "Error: invalid arguments for tool '{}': not valid JSON: {raw}",
            call.name
        )),
        other => Some(format!(
            "Error: invalid arguments for tool '{}': expected a JSON object, got {other}",
            call.name
        )),
    }
}
