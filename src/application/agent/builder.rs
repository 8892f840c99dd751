use super::graph::AgentGraph;
use crate::application::tooling::ToolServerInterface;
use crate::config::DEFAULT_MAX_ITERATIONS;
use crate::infrastructure::model::ModelProvider;
use std::sync::Arc;
use tracing::debug;

/// Assembles an [`AgentGraph`]. Construction only; nothing here touches
/// the network.
#[derive(Debug, Clone)]
pub struct AgentBuilder {
    model_name: String,
    max_iterations: usize,
}

impl AgentBuilder {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn build(
        &self,
        model: Arc<dyn ModelProvider>,
        tools: Arc<dyn ToolServerInterface>,
        system_prompt: impl Into<String>,
    ) -> AgentGraph {
        let specs = tools.tools().iter().map(|tool| tool.to_spec()).collect::<Vec<_>>();
        debug!(
            model = self.model_name.as_str(),
            tools = specs.len(),
            max_iterations = self.max_iterations,
            "Agent graph built"
        );
        AgentGraph {
            model,
            tools,
            model_name: self.model_name.clone(),
            system_prompt: system_prompt.into(),
            specs,
            max_iterations: self.max_iterations,
        }
    }
}
