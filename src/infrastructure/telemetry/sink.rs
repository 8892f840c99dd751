use super::record::{TraceRecord, TraceStatus};
use crate::config::Settings;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::debug;

const TRACES_PATH: &str = "api/2.0/mlflow/traces";
const EXPERIMENT_BY_NAME_PATH: &str = "api/2.0/mlflow/experiments/get-by-name";
/// MLflow's built-in experiment, used when no experiment name is configured.
const DEFAULT_EXPERIMENT_ID: &str = "0";
const TRACE_NAME: &str = "agent_query";

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("no tracking server is configured")]
    NotConfigured,
    #[error("failed to reach tracking server: {source}")]
    Network {
        #[source]
        source: reqwest::Error,
    },
    #[error("tracking server answered HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("trace submission timed out after {0:?}")]
    Timeout(Duration),
    #[error("MLflow experiment '{name}' does not exist")]
    ExperimentNotFound { name: String },
    #[error("unexpected tracking server response: {0}")]
    InvalidResponse(String),
    #[error("failed to encode trace: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Destination for finished traces.
#[async_trait]
pub trait TraceSink: Send + Sync {
    /// Store the record and return the id the backend knows it by.
    async fn submit(&self, record: &TraceRecord) -> Result<String, TraceError>;
}

/// Discards every trace.
pub struct NoopTraceSink;

#[async_trait]
impl TraceSink for NoopTraceSink {
    async fn submit(&self, record: &TraceRecord) -> Result<String, TraceError> {
        Ok(record.trace_id.clone())
    }
}

/// Writes traces to an MLflow tracking server through its REST API.
///
/// A trace is opened with `StartTrace` and closed with `EndTrace`. The
/// experiment is looked up by name once and cached for the sink's lifetime.
pub struct MlflowTraceSink {
    http: Client,
    base: String,
    token: Option<String>,
    timeout: Duration,
    experiment_name: Option<String>,
    experiment_id: OnceCell<String>,
}

impl MlflowTraceSink {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
        experiment_name: Option<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            base: base_url.trim_end_matches('/').to_string(),
            token,
            timeout,
            experiment_name,
            experiment_id: OnceCell::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, TraceError> {
        let base = settings
            .tracing
            .tracking_base(settings.workspace_url.as_deref())
            .ok_or(TraceError::NotConfigured)?;
        Ok(Self::new(
            &base,
            settings.credentials.bearer().map(str::to_string),
            settings.tracing.export_timeout,
            settings.tracing.experiment_name.clone(),
        ))
    }

    pub fn url(&self) -> String {
        format!("{}/{TRACES_PATH}", self.base)
    }

    async fn experiment_id(&self) -> Result<&str, TraceError> {
        let id = self
            .experiment_id
            .get_or_try_init(|| self.lookup_experiment())
            .await?;
        Ok(id.as_str())
    }

    async fn lookup_experiment(&self) -> Result<String, TraceError> {
        let Some(name) = &self.experiment_name else {
            return Ok(DEFAULT_EXPERIMENT_ID.to_string());
        };
        let request = self
            .http
            .get(format!("{}/{EXPERIMENT_BY_NAME_PATH}", self.base))
            .query(&[("experiment_name", name)]);
        let body = match self.send(request).await {
            Err(TraceError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                return Err(TraceError::ExperimentNotFound { name: name.clone() });
            }
            other => other?,
        };
        let id = body["experiment"]["experiment_id"]
            .as_str()
            .ok_or_else(|| TraceError::InvalidResponse("experiment without an id".into()))?;
        debug!(experiment = %name, experiment_id = id, "Resolved MLflow experiment");
        Ok(id.to_string())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, TraceError> {
        let mut request = request.timeout(self.timeout);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|source| self.network_error(source))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TraceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|source| self.network_error(source))?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn network_error(&self, source: reqwest::Error) -> TraceError {
        if source.is_timeout() {
            TraceError::Timeout(self.timeout)
        } else {
            TraceError::Network { source }
        }
    }
}

#[async_trait]
impl TraceSink for MlflowTraceSink {
    async fn submit(&self, record: &TraceRecord) -> Result<String, TraceError> {
        let experiment_id = self.experiment_id().await?;
        let inputs = json!({ "query": record.request }).to_string();

        let started = self
            .send(self.http.post(self.url()).json(&json!({
                "experiment_id": experiment_id,
                "timestamp_ms": record.started_at.timestamp_millis(),
                "request_metadata": [metadata("mlflow.traceInputs", inputs.clone())],
                "tags": [
                    metadata("mlflow.traceName", TRACE_NAME),
                    metadata("agent.trace_id", record.trace_id.as_str()),
                ],
            })))
            .await?;
        let request_id = started["trace_info"]["request_id"]
            .as_str()
            .ok_or_else(|| TraceError::InvalidResponse("StartTrace returned no request_id".into()))?
            .to_string();

        let outputs = match (&record.response, &record.error) {
            (Some(answer), _) => json!({ "answer": answer }),
            (None, Some(error)) => json!({ "error": error }),
            (None, None) => Value::Null,
        };
        let status = match record.status {
            TraceStatus::Ok => "OK",
            TraceStatus::Error => "ERROR",
        };
        let spans = serde_json::to_string(&record.spans)?;
        self.send(
            self.http
                .patch(format!("{}/{request_id}", self.url()))
                .json(&json!({
                    "request_id": request_id,
                    "timestamp_ms": record.ended_at.timestamp_millis(),
                    "status": status,
                    "request_metadata": [
                        metadata("mlflow.traceInputs", inputs),
                        metadata("mlflow.traceOutputs", outputs.to_string()),
                    ],
                    "tags": [metadata("mlflow.traceSpans", spans)],
                })),
        )
        .await?;

        debug!(
            trace_id = %record.trace_id,
            request_id = %request_id,
            spans = record.spans.len(),
            "Trace submitted"
        );
        Ok(request_id)
    }
}

fn metadata(key: &str, value: impl Into<String>) -> Value {
    json!({ "key": key, "value": value.into() })
}
