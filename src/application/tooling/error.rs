use super::descriptor::ToolDescriptor;
use std::time::Duration;
use thiserror::Error;

/// Failure talking to a single MCP server.
#[derive(Debug, Error)]
pub enum ToolInvokeError {
    #[error("MCP server '{server}' is not connected")]
    NotConnected { server: String },
    #[error("failed to reach MCP server '{server}': {source}")]
    Connect {
        server: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("MCP server '{server}' answered HTTP {status}: {body}")]
    Http {
        server: String,
        status: u16,
        body: String,
    },
    #[error("MCP server '{server}' transport error: {message}")]
    Transport { server: String, message: String },
    #[error("MCP server '{server}' returned invalid JSON: {source}")]
    InvalidJson {
        server: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("MCP server '{server}' returned JSON-RPC error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },
    #[error("tool '{tool}' on MCP server '{server}' reported an error: {message}")]
    ToolFailed {
        server: String,
        tool: String,
        message: String,
    },
    #[error("tool '{tool}' on MCP server '{server}' timed out after {timeout:?}")]
    Timeout {
        server: String,
        tool: String,
        timeout: Duration,
    },
    #[error("MCP server '{server}' did not answer {operation} within {timeout:?}")]
    Unresponsive {
        server: String,
        operation: &'static str,
        timeout: Duration,
    },
    #[error("MCP server '{server}' session is closed")]
    Closed { server: String },
}

/// Failure dispatching a tool call by name.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool '{name}' is not provided by any connected server")]
    NotFound { name: String },
    #[error("tool '{name}' failed: {source}")]
    Invocation {
        name: String,
        #[source]
        source: ToolInvokeError,
    },
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("tool discovery failed on every server: {}", summarize(.failures))]
    AllFailed {
        failures: Vec<(String, ToolInvokeError)>,
    },
    #[error("tool discovery failed on some servers: {}", partial_summary(.succeeded, .failed))]
    Partial {
        succeeded: Vec<String>,
        failed: Vec<(String, ToolInvokeError)>,
        tools: Vec<ToolDescriptor>,
    },
    #[error("tool '{name}' is provided by both '{first}' and '{second}'")]
    DuplicateTool {
        name: String,
        first: String,
        second: String,
    },
}

fn summarize(failures: &[(String, ToolInvokeError)]) -> String {
    failures
        .iter()
        .map(|(server, err)| format!("{server}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn partial_summary(succeeded: &[String], failed: &[(String, ToolInvokeError)]) -> String {
    format!(
        "{} of {} failed ({})",
        failed.len(),
        failed.len() + succeeded.len(),
        summarize(failed)
    )
}
