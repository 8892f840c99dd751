use crate::application::agent::{AgentBuilder, AgentError, AgentEvent, AgentGraph, AgentStep};
use crate::application::tooling::{
    DiscoveryError, ServerManager, SessionConnector, ToolDescriptor, ToolInvokeError,
    ToolServerInterface,
};
use crate::config::{ConfigError, Settings};
use crate::domain::types::ChatMessage;
use crate::infrastructure::model::ModelProvider;
use crate::infrastructure::telemetry::{TraceRecorder, TraceSink};
use async_stream::stream;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Connect(#[from] ToolInvokeError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("initialization failed: {0}")]
    Initialization(#[from] InitializationError),
    #[error("the application has not been initialized")]
    NotInitialized,
}

impl AppError {
    pub fn user_message(&self) -> String {
        match self {
            AppError::Initialization(InitializationError::Config(err)) => {
                format!("Configuration error: {err}")
            }
            AppError::Initialization(InitializationError::Connect(err)) => {
                format!("Could not connect to a tool server: {err}")
            }
            AppError::Initialization(InitializationError::Discovery(err)) => {
                format!("Could not load tools: {err}")
            }
            AppError::NotInitialized => "Call initialize() before sending queries.".to_string(),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Initialization(err.into())
    }
}

impl From<ToolInvokeError> for AppError {
    fn from(err: ToolInvokeError) -> Self {
        AppError::Initialization(err.into())
    }
}

impl From<DiscoveryError> for AppError {
    fn from(err: DiscoveryError) -> Self {
        AppError::Initialization(err.into())
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("the application has not been initialized")]
    NotInitialized,
    #[error("{source}")]
    Agent {
        #[source]
        source: AgentError,
        /// Set when the failed run's trace was accepted by the sink.
        trace_id: Option<String>,
    },
}

impl QueryError {
    pub fn trace_id(&self) -> Option<&str> {
        match self {
            QueryError::Agent { trace_id, .. } => trace_id.as_deref(),
            QueryError::NotInitialized => None,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            QueryError::NotInitialized => AppError::NotInitialized.user_message(),
            QueryError::Agent { source, .. } => source.user_message(),
        }
    }
}

/// Buffered outcome of one query.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub answer: String,
    pub messages: Vec<ChatMessage>,
    pub steps: Vec<AgentStep>,
    pub trace_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(String),
    ToolStarted { name: String },
    ToolFinished { name: String, success: bool },
    Completed { trace_id: Option<String> },
}

/// Events of one streamed query. Holds the façade borrowed until dropped.
pub type QueryStream<'a> = Pin<Box<dyn Stream<Item = Result<StreamEvent, QueryError>> + Send + 'a>>;

/// Lifecycle owner: connects tool servers, builds the agent graph, answers
/// queries and releases sessions.
pub struct McpAgentApp {
    settings: Settings,
    model: Arc<dyn ModelProvider>,
    connector: Arc<dyn SessionConnector>,
    sink: Arc<dyn TraceSink>,
    manager: Option<Arc<ServerManager>>,
    graph: Option<AgentGraph>,
}

impl McpAgentApp {
    pub fn new(
        settings: Settings,
        model: Arc<dyn ModelProvider>,
        connector: Arc<dyn SessionConnector>,
        sink: Arc<dyn TraceSink>,
    ) -> Self {
        Self {
            settings,
            model,
            connector,
            sink,
            manager: None,
            graph: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_initialized(&self) -> bool {
        self.graph.is_some()
    }

    /// Tools available to the agent; empty before `initialize`.
    pub fn tools(&self) -> &[ToolDescriptor] {
        match &self.manager {
            Some(manager) => manager.tools(),
            None => &[],
        }
    }

    /// Validate settings, connect every server, discover tools and build the
    /// agent graph. Sessions opened along the way are released on failure.
    pub async fn initialize(&mut self) -> Result<(), AppError> {
        if self.graph.is_some() {
            debug!("Application already initialized");
            return Ok(());
        }
        self.settings.validate()?;

        info!(servers = self.settings.servers.len(), "Connecting to MCP servers");
        let mut manager = ServerManager::connect(
            &self.settings.servers,
            self.connector.as_ref(),
            self.settings.tools.timeout,
        )
        .await?;

        match manager.discover_tools().await {
            Ok(_) => {}
            Err(DiscoveryError::Partial {
                succeeded, failed, ..
            }) if !self.settings.tools.require_all_servers => {
                for (server, err) in &failed {
                    warn!(server = %server, %err, "Continuing without MCP server");
                }
                info!(
                    available = succeeded.len(),
                    unavailable = failed.len(),
                    "Proceeding with partial tool set"
                );
            }
            Err(err) => {
                manager.close().await;
                return Err(err.into());
            }
        }

        let manager = Arc::new(manager);
        let tools: Arc<dyn ToolServerInterface> = manager.clone();
        let graph = AgentBuilder::new(self.settings.model.name.clone())
            .max_iterations(self.settings.agent.max_iterations)
            .build(
                Arc::clone(&self.model),
                tools,
                self.settings.agent.system_prompt.clone(),
            );
        info!(
            model = %self.settings.model.name,
            tools = graph.tool_specs().len(),
            max_iterations = graph.max_iterations(),
            "Agent ready"
        );
        self.manager = Some(manager);
        self.graph = Some(graph);
        Ok(())
    }

    /// Answer one query and return the buffered result.
    pub async fn run_query(&mut self, text: &str) -> Result<QueryResult, QueryError> {
        let graph = self.graph.as_ref().ok_or(QueryError::NotInitialized)?;
        info!(chars = text.len(), "Running query");
        let recorder = TraceRecorder::start(text);

        match graph.invoke(text, &recorder).await {
            Ok(run) => {
                let trace_id = self.submit_trace(&recorder, Ok(&run.answer)).await;
                Ok(QueryResult {
                    answer: run.answer,
                    messages: run.messages,
                    steps: run.steps,
                    trace_id,
                })
            }
            Err(source) => {
                warn!(%source, "Query failed");
                let trace_id = self.submit_trace(&recorder, Err(source.to_string())).await;
                Err(QueryError::Agent { source, trace_id })
            }
        }
    }

    /// Answer one query as a stream of events. Dropping the stream early
    /// abandons the query and submits no trace.
    pub fn run_query_stream(&mut self, text: &str) -> QueryStream<'_> {
        let this: &Self = self;
        let text = text.to_string();

        Box::pin(stream! {
            let Some(graph) = this.graph.as_ref() else {
                yield Err(QueryError::NotInitialized);
                return;
            };
            info!(chars = text.len(), "Running streamed query");
            let recorder = TraceRecorder::start(text.as_str());
            let mut events = graph.stream(&text, recorder.clone());

            while let Some(event) = events.next().await {
                match event {
                    Ok(AgentEvent::Text(chunk)) => yield Ok(StreamEvent::Chunk(chunk)),
                    Ok(AgentEvent::ToolStarted(call)) => {
                        yield Ok(StreamEvent::ToolStarted { name: call.name });
                    }
                    Ok(AgentEvent::ToolFinished(step)) => {
                        yield Ok(StreamEvent::ToolFinished {
                            name: step.tool,
                            success: step.success,
                        });
                    }
                    Ok(AgentEvent::Finished(run)) => {
                        let trace_id = this.submit_trace(&recorder, Ok(&run.answer)).await;
                        yield Ok(StreamEvent::Completed { trace_id });
                        return;
                    }
                    Err(source) => {
                        warn!(%source, "Streamed query failed");
                        let trace_id = this.submit_trace(&recorder, Err(source.to_string())).await;
                        yield Err(QueryError::Agent { source, trace_id });
                        return;
                    }
                }
            }
        })
    }

    /// Release every server session. Safe to call more than once.
    pub async fn cleanup(&mut self) {
        self.graph = None;
        if let Some(manager) = self.manager.take() {
            manager.close().await;
            info!("MCP sessions released");
        }
    }

    async fn submit_trace(&self, recorder: &TraceRecorder, outcome: Result<&str, String>) -> Option<String> {
        if !self.settings.tracing.enabled {
            return None;
        }
        let record = recorder.finish(outcome, self.settings.tracing.experiment_name.as_deref());
        match self.sink.submit(&record).await {
            Ok(trace_id) => {
                debug!(local_id = %record.trace_id, %trace_id, "Trace recorded");
                Some(trace_id)
            }
            Err(err) => {
                warn!(trace_id = %record.trace_id, %err, "Failed to submit trace");
                None
            }
        }
    }
}
