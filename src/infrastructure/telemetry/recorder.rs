use super::record::{Span, SpanKind, TraceRecord, TraceStatus};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Collects spans for one query. Cloning yields another handle to the same
/// trace, so the agent graph and the façade can both hold one.
#[derive(Clone)]
pub struct TraceRecorder {
    inner: Arc<Mutex<TraceState>>,
}

struct TraceState {
    trace_id: String,
    request: String,
    started_at: DateTime<Utc>,
    spans: Vec<Span>,
}

impl TraceRecorder {
    pub fn start(request: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TraceState {
                trace_id: format!("tr-{}", Uuid::new_v4().simple()),
                request: request.into(),
                started_at: Utc::now(),
                spans: Vec::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, TraceState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn trace_id(&self) -> String {
        self.state().trace_id.clone()
    }

    pub fn record(
        &self,
        kind: SpanKind,
        name: impl Into<String>,
        started_at: DateTime<Utc>,
        input: Value,
        output: Value,
        error: Option<String>,
    ) {
        let span = Span {
            span_id: Uuid::new_v4().simple().to_string(),
            kind,
            name: name.into(),
            started_at,
            ended_at: Utc::now(),
            input,
            output,
            error,
        };
        self.state().spans.push(span);
    }

    pub fn span_count(&self, kind: SpanKind) -> usize {
        self.state()
            .spans
            .iter()
            .filter(|span| span.kind == kind)
            .count()
    }

    /// Close the trace. `outcome` is the answer or the error text.
    pub fn finish(
        &self,
        outcome: Result<&str, String>,
        experiment_name: Option<&str>,
    ) -> TraceRecord {
        let state = self.state();
        let (status, response, error) = match outcome {
            Ok(answer) => (TraceStatus::Ok, Some(answer.to_string()), None),
            Err(message) => (TraceStatus::Error, None, Some(message)),
        };
        TraceRecord {
            trace_id: state.trace_id.clone(),
            experiment_name: experiment_name.map(str::to_string),
            request: state.request.clone(),
            response,
            status,
            error,
            started_at: state.started_at,
            ended_at: Utc::now(),
            spans: state.spans.clone(),
        }
    }
}
