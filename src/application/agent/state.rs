use crate::domain::types::{ChatMessage, ToolCall};
use serde::Serialize;

/// Position of the agent in its REASON/ACT loop.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphState {
    /// Ask the model for the next action.
    Reason,
    /// Dispatch the tool calls of the last assistant message.
    Act(Vec<ToolCall>),
    Done,
}

/// Node label used when reporting the path a run took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GraphNode {
    Reason,
    Act,
    Done,
}

impl GraphState {
    pub fn after_reason(message: &ChatMessage) -> Self {
        if message.has_tool_calls() {
            GraphState::Act(message.tool_calls.clone())
        } else {
            GraphState::Done
        }
    }

    pub fn after_act() -> Self {
        GraphState::Reason
    }

    pub fn node(&self) -> GraphNode {
        match self {
            GraphState::Reason => GraphNode::Reason,
            GraphState::Act(_) => GraphNode::Act,
            GraphState::Done => GraphNode::Done,
        }
    }
}
