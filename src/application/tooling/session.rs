use super::error::ToolInvokeError;
use super::interface::{ServerToolInfo, ToolSession};
use crate::config::ServerConfig;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

const PROTOCOL_VERSION: &str = "2025-06-18";
const SESSION_HEADER: &str = "mcp-session-id";
const PROTOCOL_HEADER: &str = "mcp-protocol-version";
const MAX_ERROR_BODY: usize = 512;

/// MCP session over streamable HTTP.
///
/// Every JSON-RPC request is a `POST` to the server URL. The server answers
/// either with a JSON body or with an event stream that eventually carries
/// the response; both are accepted. The `Mcp-Session-Id` issued during
/// `initialize` is echoed on every later request and released with `DELETE`.
pub struct HttpMcpSession {
    server: ServerConfig,
    http: Client,
    bearer: Option<String>,
    session_id: Option<String>,
    protocol_version: Option<String>,
    id_counter: AtomicU64,
    closed: AtomicBool,
}

impl HttpMcpSession {
    /// Perform the `initialize` handshake and return a ready session.
    pub async fn open(
        server: ServerConfig,
        http: Client,
        bearer: Option<String>,
    ) -> Result<Self, ToolInvokeError> {
        let mut session = Self {
            server,
            http,
            bearer,
            session_id: None,
            protocol_version: None,
            id_counter: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        };

        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {}
        });
        let id = session.next_id();
        let response = session
            .post(&rpc_request(&id, "initialize", params))
            .await?;
        session.session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        if let Err(err) = session.finish_handshake(response, &id).await {
            // The server may already hold a session for us.
            if let Err(close_err) = session.close().await {
                debug!(server = %session.server.name, %close_err, "Failed to release half-open MCP session");
            }
            return Err(err);
        }
        debug!(
            server = %session.server.name,
            session_id = session.session_id.as_deref().unwrap_or("-"),
            "MCP session initialised"
        );
        Ok(session)
    }

    async fn finish_handshake(&mut self, response: Response, id: &str) -> Result<(), ToolInvokeError> {
        let result = self.read_response(response, id).await?;
        self.protocol_version = Some(
            result
                .get("protocolVersion")
                .and_then(Value::as_str)
                .unwrap_or(PROTOCOL_VERSION)
                .to_string(),
        );
        self.send_notification("notifications/initialized", json!({}))
            .await
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, ToolInvokeError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ToolInvokeError::Closed {
                server: self.server.name.clone(),
            });
        }
        let id = self.next_id();
        let response = self.post(&rpc_request(&id, method, params)).await?;
        self.read_response(response, &id).await
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        });
        self.post(&payload).await?;
        Ok(())
    }

    fn decorate(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }
        if let Some(id) = &self.session_id {
            request = request.header(SESSION_HEADER, id);
        }
        if let Some(version) = &self.protocol_version {
            request = request.header(PROTOCOL_HEADER, version);
        }
        request
    }

    async fn post(&self, payload: &Value) -> Result<Response, ToolInvokeError> {
        let request = self
            .http
            .post(&self.server.url)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(payload);
        let response = self
            .decorate(request)
            .send()
            .await
            .map_err(|source| self.connect_error(source))?;
        self.check_status(response).await
    }

    async fn check_status(&self, response: Response) -> Result<Response, ToolInvokeError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|index| body.is_char_boundary(*index))
                .unwrap_or(0);
            body.truncate(cut);
        }
        Err(ToolInvokeError::Http {
            server: self.server.name.clone(),
            status: status.as_u16(),
            body,
        })
    }

    async fn read_response(&self, response: Response, id: &str) -> Result<Value, ToolInvokeError> {
        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("text/event-stream"))
            .unwrap_or(false);

        let message = if is_event_stream {
            self.read_event_stream(response, id).await?
        } else {
            let bytes = response
                .bytes()
                .await
                .map_err(|source| self.connect_error(source))?;
            serde_json::from_slice::<Value>(&bytes).map_err(|source| {
                ToolInvokeError::InvalidJson {
                    server: self.server.name.clone(),
                    source,
                }
            })?
        };
        self.unwrap_rpc(message)
    }

    async fn read_event_stream(&self, response: Response, id: &str) -> Result<Value, ToolInvokeError> {
        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = event.map_err(|err| self.transport_error(err.to_string()))?;
            if event.data.trim().is_empty() {
                continue;
            }
            let value: Value =
                serde_json::from_str(&event.data).map_err(|source| ToolInvokeError::InvalidJson {
                    server: self.server.name.clone(),
                    source,
                })?;
            if value.get("id").and_then(Value::as_str) == Some(id) && value.get("method").is_none()
            {
                return Ok(value);
            }
            let method = value.get("method").and_then(Value::as_str).unwrap_or("-");
            debug!(
                server = %self.server.name,
                method,
                "skipping unrelated message on MCP event stream"
            );
        }
        Err(self.transport_error("event stream ended before the response arrived"))
    }

    fn unwrap_rpc(&self, message: Value) -> Result<Value, ToolInvokeError> {
        if let Some(error) = message.get("error") {
            return Err(ToolInvokeError::Rpc {
                server: self.server.name.clone(),
                code: error.get("code").and_then(Value::as_i64).unwrap_or(-32000),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }
        Ok(message.get("result").cloned().unwrap_or(Value::Null))
    }

    fn next_id(&self) -> String {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        format!("req-{id}")
    }

    fn connect_error(&self, source: reqwest::Error) -> ToolInvokeError {
        ToolInvokeError::Connect {
            server: self.server.name.clone(),
            source,
        }
    }

    fn transport_error(&self, message: impl Into<String>) -> ToolInvokeError {
        ToolInvokeError::Transport {
            server: self.server.name.clone(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl ToolSession for HttpMcpSession {
    fn server(&self) -> &ServerConfig {
        &self.server
    }

    async fn list_tools(&self) -> Result<Vec<ServerToolInfo>, ToolInvokeError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let result = self.send_request("tools/list", params).await?;
            if let Some(array) = result.get("tools").and_then(Value::as_array) {
                tools.extend(array.iter().filter_map(parse_tool_info));
            }
            let next = result
                .get("nextCursor")
                .and_then(Value::as_str)
                .filter(|next| !next.is_empty())
                .map(str::to_string);
            if next.is_none() || next == cursor {
                break;
            }
            cursor = next;
        }
        debug!(server = %self.server.name, count = tools.len(), "Listed MCP tools");
        Ok(tools)
    }

    async fn call_tool(&self, tool: &str, arguments: Value) -> Result<Value, ToolInvokeError> {
        let params = json!({
            "name": tool,
            "arguments": match arguments {
                Value::Null => Value::Object(Default::default()),
                other => other,
            }
        });
        self.send_request("tools/call", params).await
    }

    async fn close(&self) -> Result<(), ToolInvokeError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if self.session_id.is_none() {
            return Ok(());
        }
        let response = self
            .decorate(self.http.delete(&self.server.url))
            .send()
            .await
            .map_err(|source| self.connect_error(source))?;
        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            debug!(server = %self.server.name, "Server does not support session termination");
            return Ok(());
        }
        self.check_status(response).await?;
        debug!(server = %self.server.name, "MCP session released");
        Ok(())
    }
}

fn rpc_request(id: &str, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    })
}

fn parse_tool_info(tool: &Value) -> Option<ServerToolInfo> {
    let name = tool.get("name").and_then(Value::as_str)?;
    Some(ServerToolInfo {
        name: name.to_string(),
        description: tool
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        input_schema: tool.get("inputSchema").cloned(),
    })
}
