mod builder;
mod errors;
mod graph;
mod models;
mod state;


pub use builder::AgentBuilder;
pub use errors::AgentError;
pub use graph::{AgentEvent, AgentEventStream, AgentGraph};
pub use models::{AgentRun, AgentStep};
pub use state::{GraphNode, GraphState};
