use super::descriptor::{ToolDescriptor, reported_error};
use super::error::{DiscoveryError, ToolError, ToolInvokeError};
use super::interface::{SessionConnector, ToolServerInterface, ToolSession};
use crate::config::ServerConfig;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Owns one session per configured server and routes tool calls by name.
pub struct ServerManager {
    sessions: Vec<Arc<dyn ToolSession>>,
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
    timeout: Duration,
    closed: AtomicBool,
}

impl ServerManager {
    /// Open a session per config, in order. If any open fails the sessions
    /// opened so far are closed before the error is returned.
    ///
    /// `timeout` bounds every request made to a server: the handshake,
    /// each tool listing and each tool call.
    pub async fn connect(
        configs: &[ServerConfig],
        connector: &dyn SessionConnector,
        timeout: Duration,
    ) -> Result<Self, ToolInvokeError> {
        let mut sessions: Vec<Arc<dyn ToolSession>> = Vec::with_capacity(configs.len());
        for config in configs {
            let opened = tokio::time::timeout(timeout, connector.open(config))
                .await
                .unwrap_or_else(|_| {
                    Err(ToolInvokeError::Unresponsive {
                        server: config.name.clone(),
                        operation: "initialize",
                        timeout,
                    })
                });
            match opened {
                Ok(session) => sessions.push(session),
                Err(err) => {
                    warn!(server = %config.name, %err, "Failed to open MCP session; rolling back");
                    close_all(&sessions).await;
                    return Err(err);
                }
            }
        }
        Ok(Self {
            sessions,
            tools: Vec::new(),
            index: HashMap::new(),
            timeout,
            closed: AtomicBool::new(false),
        })
    }

    /// List the tools of every server and retain them for dispatch.
    ///
    /// On `Partial` the tools of the servers that answered are retained too,
    /// so the caller may decide to proceed.
    pub async fn discover_tools(&mut self) -> Result<Vec<ToolDescriptor>, DiscoveryError> {
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        let mut tools: Vec<ToolDescriptor> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for session in &self.sessions {
            let server = &session.server().name;
            let listed = tokio::time::timeout(self.timeout, session.list_tools())
                .await
                .unwrap_or_else(|_| {
                    Err(ToolInvokeError::Unresponsive {
                        server: server.clone(),
                        operation: "tools/list",
                        timeout: self.timeout,
                    })
                });
            match listed {
                Ok(infos) => {
                    for info in infos {
                        let descriptor = ToolDescriptor::from_info(server, info);
                        if let Some(existing) = index.get(&descriptor.name) {
                            return Err(DiscoveryError::DuplicateTool {
                                name: descriptor.name,
                                first: tools[*existing].server.clone(),
                                second: server.clone(),
                            });
                        }
                        index.insert(descriptor.name.clone(), tools.len());
                        tools.push(descriptor);
                    }
                    succeeded.push(server.clone());
                }
                Err(err) => {
                    warn!(server = %server, %err, "Tool discovery failed");
                    failed.push((server.clone(), err));
                }
            }
        }

        if succeeded.is_empty() && !failed.is_empty() {
            return Err(DiscoveryError::AllFailed { failures: failed });
        }

        self.tools = tools.clone();
        self.index = index;
        info!(
            tools = self.tools.len(),
            servers = succeeded.len(),
            "Discovered MCP tools"
        );

        if failed.is_empty() {
            Ok(tools)
        } else {
            Err(DiscoveryError::Partial {
                succeeded,
                failed,
                tools,
            })
        }
    }

    fn session_for(&self, server: &str) -> Option<&Arc<dyn ToolSession>> {
        self.sessions
            .iter()
            .find(|session| session.server().name == server)
    }

    /// Release every session once; later calls do nothing.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("MCP sessions already released");
            return;
        }
        close_all(&self.sessions).await;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

async fn close_all(sessions: &[Arc<dyn ToolSession>]) {
    for session in sessions {
        if let Err(err) = session.close().await {
            warn!(server = %session.server().name, %err, "Failed to release MCP session");
        }
    }
}

#[async_trait]
impl ToolServerInterface for ServerManager {
    async fn invoke_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let Some(descriptor) = self.index.get(name).map(|position| &self.tools[*position]) else {
            warn!(requested_tool = %name, "Unknown tool requested");
            return Err(ToolError::NotFound {
                name: name.to_string(),
            });
        };
        let invocation = |source| ToolError::Invocation {
            name: name.to_string(),
            source,
        };

        if self.is_closed() {
            return Err(invocation(ToolInvokeError::Closed {
                server: descriptor.server.clone(),
            }));
        }
        let session = self.session_for(&descriptor.server).ok_or_else(|| {
            invocation(ToolInvokeError::NotConnected {
                server: descriptor.server.clone(),
            })
        })?;

        debug!(tool = %name, server = %descriptor.server, "Dispatching tool via MCP");
        let result = tokio::time::timeout(self.timeout, session.call_tool(name, arguments))
            .await
            .map_err(|_| {
                invocation(ToolInvokeError::Timeout {
                    server: descriptor.server.clone(),
                    tool: name.to_string(),
                    timeout: self.timeout,
                })
            })?
            .map_err(invocation)?;

        if let Some(message) = reported_error(&result) {
            return Err(invocation(ToolInvokeError::ToolFailed {
                server: descriptor.server.clone(),
                tool: name.to_string(),
                message,
            }));
        }
        Ok(result)
    }

    fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }
}

impl Drop for ServerManager {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) || self.sessions.is_empty() {
            return;
        }
        let sessions = std::mem::take(&mut self.sessions);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Releasing MCP sessions on drop");
                handle.spawn(async move { close_all(&sessions).await });
            }
            Err(_) => warn!("MCP sessions dropped outside a runtime; not released"),
        }
    }
}
