use super::state::GraphNode;
use crate::domain::types::ChatMessage;
use serde::Serialize;
use serde_json::Value;

/// One executed tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStep {
    pub tool: String,
    pub call_id: String,
    pub input: Value,
    pub success: bool,
    pub output: Value,
    /// Text handed back to the model.
    pub message: String,
}

/// Result of running the graph to `Done`.
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub answer: String,
    pub messages: Vec<ChatMessage>,
    pub steps: Vec<AgentStep>,
    pub path: Vec<GraphNode>,
}

impl AgentRun {
    pub fn reason_steps(&self) -> usize {
        self.path
            .iter()
            .filter(|node| **node == GraphNode::Reason)
            .count()
    }
}
