use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::descriptor::ToolDescriptor;
use super::error::{ToolError, ToolInvokeError};
use crate::config::ServerConfig;

/// Tool metadata as reported by `tools/list`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerToolInfo {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Option<Value>,
}

/// An open MCP session with one server.
#[async_trait]
pub trait ToolSession: Send + Sync {
    fn server(&self) -> &ServerConfig;

    async fn list_tools(&self) -> Result<Vec<ServerToolInfo>, ToolInvokeError>;

    /// Returns the raw `tools/call` result object.
    async fn call_tool(&self, tool: &str, arguments: Value) -> Result<Value, ToolInvokeError>;

    async fn close(&self) -> Result<(), ToolInvokeError>;
}

/// Opens sessions; the seam tests replace with in-memory servers.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn open(&self, server: &ServerConfig) -> Result<Arc<dyn ToolSession>, ToolInvokeError>;
}

/// What the agent graph needs from the tool layer.
#[async_trait]
pub trait ToolServerInterface: Send + Sync {
    async fn invoke_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolError>;

    fn tools(&self) -> &[ToolDescriptor];
}
