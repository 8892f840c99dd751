use crate::infrastructure::model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("agent exceeded the maximum of {limit} reasoning steps")]
    IterationLimit { limit: usize },
    #[error("agent graph ended without an answer")]
    Interrupted,
}

impl AgentError {
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Model(err) => err.user_message(),
            AgentError::IterationLimit { limit } => format!(
                "The agent gave up after {limit} reasoning steps. Try a narrower question."
            ),
            AgentError::Interrupted => "The agent stopped before producing an answer.".to_string(),
        }
    }
}
