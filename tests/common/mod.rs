// Fake MCP server, model endpoint and trace server used by the integration tests.
//
// Every fake listens on an ephemeral local port and records what it received.

#![allow(dead_code)]

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use databricks_mcp_agent::config::Settings;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub const SESSION_ID: &str = "session-1";
pub const MANAGED_PATH: &str = "/api/2.0/mcp/functions/main/default";

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    addr
}

/// Accepts connections and never answers.
pub async fn silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    listener.local_addr().expect("local addr")
}

fn sse_body(messages: &[Value]) -> String {
    messages
        .iter()
        .map(|message| format!("event: message\ndata: {message}\n\n"))
        .collect()
}

fn event_stream(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

// ============================================================================
// MCP server
// ============================================================================

#[derive(Default)]
pub struct McpState {
    tools: Vec<Value>,
    sse: bool,
    pub fail_calls: AtomicBool,
    pub reject_initialized: AtomicBool,
    pub requests: AtomicUsize,
    pub deletes: AtomicUsize,
    pub methods: Mutex<Vec<String>>,
    pub session_headers: Mutex<Vec<Option<String>>>,
    pub authorization: Mutex<Vec<Option<String>>>,
    pub calls: Mutex<Vec<Value>>,
}

pub struct FakeMcp {
    pub addr: SocketAddr,
    pub state: Arc<McpState>,
}

impl FakeMcp {
    /// Serves `tools` (`add` and `echo` are executable) on any path. The tool
    /// list is paged one tool per page.
    pub async fn start(tools: &[&str], sse: bool) -> Self {
        let state = Arc::new(McpState {
            tools: tools.iter().map(|name| tool_definition(name)).collect(),
            sse,
            ..McpState::default()
        });
        let router = Router::new().fallback(mcp_handler).with_state(state.clone());
        let addr = serve(router).await;
        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}/mcp", self.addr)
    }

    pub fn base(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn methods(&self) -> Vec<String> {
        self.state.methods.lock().expect("lock").clone()
    }

    pub fn calls(&self) -> Vec<Value> {
        self.state.calls.lock().expect("lock").clone()
    }

    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.state.deletes.load(Ordering::SeqCst)
    }
}

fn tool_definition(name: &str) -> Value {
    match name {
        "add" => json!({
            "name": "add",
            "description": "Add two numbers",
            "inputSchema": {
                "type": "object",
                "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
                "required": ["a", "b"]
            }
        }),
        other => json!({
            "name": other,
            "inputSchema": {
                "type": "object",
                "properties": {"message": {"type": "string"}}
            }
        }),
    }
}

async fn mcp_handler(
    State(state): State<Arc<McpState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    if method == Method::DELETE {
        state.deletes.fetch_add(1, Ordering::SeqCst);
        return StatusCode::OK.into_response();
    }

    let Ok(request) = serde_json::from_slice::<Value>(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let rpc_method = request["method"].as_str().unwrap_or_default().to_string();
    state.methods.lock().expect("lock").push(rpc_method.clone());
    state
        .authorization
        .lock()
        .expect("lock")
        .push(header_value("authorization"));
    if rpc_method != "initialize" {
        state
            .session_headers
            .lock()
            .expect("lock")
            .push(header_value("mcp-session-id"));
    }

    let Some(id) = request.get("id").cloned() else {
        if rpc_method == "notifications/initialized"
            && state.reject_initialized.load(Ordering::SeqCst)
        {
            return (StatusCode::INTERNAL_SERVER_ERROR, "initialization rejected").into_response();
        }
        return StatusCode::ACCEPTED.into_response();
    };

    let result = match rpc_method.as_str() {
        "initialize" => Ok(json!({
            "protocolVersion": "2025-06-18",
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "fake-mcp", "version": "1.0.0"}
        })),
        "tools/list" => Ok(list_page(&state.tools, request["params"]["cursor"].as_str())),
        "tools/call" => {
            if state.fail_calls.load(Ordering::SeqCst) {
                return (StatusCode::SERVICE_UNAVAILABLE, "tool backend down").into_response();
            }
            state
                .calls
                .lock()
                .expect("lock")
                .push(request["params"].clone());
            call_tool(&request["params"])
        }
        _ => Err(json!({"code": -32601, "message": "Method not found"})),
    };

    let message = match result {
        Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
        Err(error) => json!({"jsonrpc": "2.0", "id": id, "error": error}),
    };

    let mut response = if state.sse {
        let progress = json!({
            "jsonrpc": "2.0",
            "method": "notifications/progress",
            "params": {"progress": 1}
        });
        event_stream(sse_body(&[progress, message]))
    } else {
        axum::Json(message).into_response()
    };
    if rpc_method == "initialize" {
        response.headers_mut().insert(
            "mcp-session-id",
            header::HeaderValue::from_static(SESSION_ID),
        );
    }
    response
}

fn list_page(tools: &[Value], cursor: Option<&str>) -> Value {
    let index = cursor
        .and_then(|cursor| cursor.strip_prefix("page-"))
        .and_then(|page| page.parse::<usize>().ok())
        .unwrap_or(0);
    let page: Vec<Value> = tools.get(index).cloned().into_iter().collect();
    if index + 1 < tools.len() {
        json!({"tools": page, "nextCursor": format!("page-{}", index + 1)})
    } else {
        json!({"tools": page})
    }
}

fn call_tool(params: &Value) -> Result<Value, Value> {
    let arguments = &params["arguments"];
    match params["name"].as_str() {
        Some("add") => {
            let sum = arguments["a"].as_f64().unwrap_or(0.0) + arguments["b"].as_f64().unwrap_or(0.0);
            Ok(json!({
                "content": [{"type": "text", "text": sum.to_string()}],
                "isError": false
            }))
        }
        Some("echo") => Ok(json!({
            "content": [{"type": "text", "text": arguments["message"].as_str().unwrap_or_default()}]
        })),
        Some("broken") => Ok(json!({
            "content": [{"type": "text", "text": "database offline"}],
            "isError": true
        })),
        Some(other) => Err(json!({"code": -32602, "message": format!("Unknown tool: {other}")})),
        None => Err(json!({"code": -32602, "message": "missing tool name"})),
    }
}

// ============================================================================
// Model endpoint
// ============================================================================

#[derive(Default)]
pub struct ModelState {
    turns: Mutex<VecDeque<Value>>,
    pub requests: Mutex<Vec<Value>>,
    pub authorization: Mutex<Vec<Option<String>>>,
}

pub struct FakeModel {
    pub addr: SocketAddr,
    pub state: Arc<ModelState>,
}

impl FakeModel {
    /// Answers with the scripted assistant turns in order, as JSON or as SSE
    /// chunks depending on the request's `stream` flag.
    pub async fn start(turns: Vec<Value>) -> Self {
        let state = Arc::new(ModelState {
            turns: Mutex::new(turns.into()),
            ..ModelState::default()
        });
        let router = Router::new()
            .route("/invocations", post(model_handler))
            .with_state(state.clone());
        let addr = serve(router).await;
        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}/invocations", self.addr)
    }

    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().expect("lock").clone()
    }

    pub fn push_turns(&self, turns: Vec<Value>) {
        self.state.turns.lock().expect("lock").extend(turns);
    }
}

pub fn text_turn(text: &str) -> Value {
    json!({"role": "assistant", "content": text})
}

pub fn tool_turn(id: &str, name: &str, arguments: Value) -> Value {
    raw_tool_turn(id, name, &arguments.to_string())
}

/// Tool call whose `arguments` string is sent exactly as given.
pub fn raw_tool_turn(id: &str, name: &str, arguments: &str) -> Value {
    json!({
        "role": "assistant",
        "content": null,
        "tool_calls": [{
            "id": id,
            "type": "function",
            "function": {"name": name, "arguments": arguments}
        }]
    })
}

/// Tool call preceded by assistant prose in the same turn.
pub fn narrated_tool_turn(text: &str, id: &str, name: &str, arguments: Value) -> Value {
    let mut turn = tool_turn(id, name, arguments);
    turn["content"] = json!(text);
    turn
}

async fn model_handler(
    State(state): State<Arc<ModelState>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<Value>,
) -> Response {
    state.authorization.lock().expect("lock").push(
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    );
    let streaming = request["stream"].as_bool().unwrap_or(false);
    state.requests.lock().expect("lock").push(request);

    let Some(turn) = state.turns.lock().expect("lock").pop_front() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "no scripted turn").into_response();
    };

    if !streaming {
        return axum::Json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{"index": 0, "message": turn, "finish_reason": "stop"}]
        }))
        .into_response();
    }

    let mut chunks = Vec::new();
    if let Some(text) = turn["content"].as_str() {
        let middle = text.char_indices().nth(text.chars().count() / 2).map_or(0, |(index, _)| index);
        for part in [&text[..middle], &text[middle..]] {
            if !part.is_empty() {
                chunks.push(json!({"choices": [{"index": 0, "delta": {"content": part}}]}));
            }
        }
    }
    if let Some(calls) = turn["tool_calls"].as_array() {
        for (index, call) in calls.iter().enumerate() {
            let arguments = call["function"]["arguments"].as_str().unwrap_or("{}");
            let split = arguments.len() / 2;
            chunks.push(json!({"choices": [{"index": 0, "delta": {"tool_calls": [{
                "index": index,
                "id": call["id"],
                "type": "function",
                "function": {"name": call["function"]["name"], "arguments": &arguments[..split]}
            }]}}]}));
            chunks.push(json!({"choices": [{"index": 0, "delta": {"tool_calls": [{
                "index": index,
                "function": {"arguments": &arguments[split..]}
            }]}}]}));
        }
    }
    let mut body: String = chunks
        .iter()
        .map(|chunk| format!("data: {chunk}\n\n"))
        .collect();
    body.push_str("data: [DONE]\n\n");
    event_stream(body)
}

// ============================================================================
// Trace server
// ============================================================================

pub const EXPERIMENT_NAME: &str = "/Shared/agent-tests";
pub const EXPERIMENT_ID: &str = "4242";

#[derive(Default)]
pub struct TraceState {
    pub fail: AtomicBool,
    pub lookups: AtomicUsize,
    pub started: Mutex<Vec<Value>>,
    pub ended: Mutex<HashMap<String, Value>>,
}

/// MLflow tracking server: experiment lookup by name, `StartTrace` and
/// `EndTrace`. Only `EXPERIMENT_NAME` exists.
pub struct FakeTraceServer {
    pub addr: SocketAddr,
    pub state: Arc<TraceState>,
}

impl FakeTraceServer {
    pub async fn start(fail: bool) -> Self {
        let state = Arc::new(TraceState {
            fail: AtomicBool::new(fail),
            ..TraceState::default()
        });
        let router = Router::new()
            .route("/api/2.0/mlflow/experiments/get-by-name", get(experiment_handler))
            .route("/api/2.0/mlflow/traces", post(start_trace_handler))
            .route("/api/2.0/mlflow/traces/{request_id}", patch(end_trace_handler))
            .with_state(state.clone());
        let addr = serve(router).await;
        Self { addr, state }
    }

    pub fn base(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn lookups(&self) -> usize {
        self.state.lookups.load(Ordering::SeqCst)
    }

    /// Completed traces in start order, with inputs, outputs and spans decoded.
    pub fn traces(&self) -> Vec<Value> {
        let started = self.state.started.lock().expect("lock").clone();
        let ended = self.state.ended.lock().expect("lock").clone();
        started
            .iter()
            .filter_map(|start| {
                let request_id = start["request_id"].as_str()?;
                let end = ended.get(request_id)?;
                let decoded = |entries: &Value, key: &str| {
                    entries
                        .as_array()
                        .and_then(|entries| entries.iter().find(|entry| entry["key"] == key))
                        .and_then(|entry| entry["value"].as_str())
                        .and_then(|value| serde_json::from_str::<Value>(value).ok())
                        .unwrap_or(Value::Null)
                };
                Some(json!({
                    "request_id": request_id,
                    "experiment_id": start["experiment_id"],
                    "status": end["status"],
                    "inputs": decoded(&end["request_metadata"], "mlflow.traceInputs"),
                    "outputs": decoded(&end["request_metadata"], "mlflow.traceOutputs"),
                    "spans": decoded(&end["tags"], "mlflow.traceSpans"),
                }))
            })
            .collect()
    }
}

fn mlflow_error(status: StatusCode, code: &str, message: &str) -> Response {
    (status, axum::Json(json!({"error_code": code, "message": message}))).into_response()
}

fn is_key_value_list(value: &Value) -> bool {
    value.as_array().is_some_and(|entries| {
        entries
            .iter()
            .all(|entry| entry["key"].is_string() && entry["value"].is_string())
    })
}

async fn experiment_handler(
    State(state): State<Arc<TraceState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.lookups.fetch_add(1, Ordering::SeqCst);
    match params.get("experiment_name").map(String::as_str) {
        Some(EXPERIMENT_NAME) => axum::Json(json!({
            "experiment": {"experiment_id": EXPERIMENT_ID, "name": EXPERIMENT_NAME}
        }))
        .into_response(),
        _ => mlflow_error(
            StatusCode::NOT_FOUND,
            "RESOURCE_DOES_NOT_EXIST",
            "Could not find experiment",
        ),
    }
}

async fn start_trace_handler(
    State(state): State<Arc<TraceState>>,
    axum::Json(body): axum::Json<Value>,
) -> Response {
    if state.fail.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if !body["experiment_id"].is_string()
        || !body["timestamp_ms"].is_i64()
        || !is_key_value_list(&body["request_metadata"])
        || !is_key_value_list(&body["tags"])
    {
        return mlflow_error(StatusCode::BAD_REQUEST, "INVALID_PARAMETER_VALUE", "malformed StartTrace");
    }
    let mut started = state.started.lock().expect("lock");
    let request_id = format!("tr-{}", started.len() + 1);
    let mut stored = body.clone();
    stored["request_id"] = json!(request_id);
    started.push(stored);
    axum::Json(json!({
        "trace_info": {
            "request_id": request_id,
            "experiment_id": body["experiment_id"],
            "timestamp_ms": body["timestamp_ms"],
            "status": "IN_PROGRESS"
        }
    }))
    .into_response()
}

async fn end_trace_handler(
    State(state): State<Arc<TraceState>>,
    Path(request_id): Path<String>,
    axum::Json(body): axum::Json<Value>,
) -> Response {
    let known = state
        .started
        .lock()
        .expect("lock")
        .iter()
        .any(|start| start["request_id"] == request_id.as_str());
    if !known {
        return mlflow_error(StatusCode::NOT_FOUND, "RESOURCE_DOES_NOT_EXIST", "unknown trace");
    }
    let status_ok = matches!(body["status"].as_str(), Some("OK" | "ERROR"));
    if !status_ok || !body["timestamp_ms"].is_i64() || !is_key_value_list(&body["request_metadata"]) {
        return mlflow_error(StatusCode::BAD_REQUEST, "INVALID_PARAMETER_VALUE", "malformed EndTrace");
    }
    state.ended.lock().expect("lock").insert(request_id.clone(), body);
    axum::Json(json!({"trace_info": {"request_id": request_id}})).into_response()
}

// ============================================================================
// Settings
// ============================================================================

pub fn settings(pairs: &[(&str, String)]) -> Settings {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect();
    Settings::from_map(&vars).expect("valid settings")
}

/// Model endpoint plus external MCP servers; tracing off.
pub fn external_settings(model: &FakeModel, servers: &[&FakeMcp]) -> Settings {
    let urls = servers
        .iter()
        .map(|server| server.url())
        .collect::<Vec<_>>()
        .join(",");
    settings(&[
        ("DATABRICKS_MODEL_NAME", "test-model".to_string()),
        ("DATABRICKS_MODEL_ENDPOINT_URL", model.url()),
        ("EXTERNAL_MCP_SERVERS", urls),
    ])
}
