//! Base HTTP client with shared logic

use crate::infrastructure::model::types::ModelError;
use reqwest::{Client, RequestBuilder};
use reqwest_eventsource::retry::Never;
use reqwest_eventsource::{EventSource, RequestBuilderExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Base HTTP client with shared functionality
#[derive(Clone)]
pub struct HttpClientBase {
    pub id: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub http: Client,
}

impl HttpClientBase {
    pub fn new(id: String, endpoint: String, api_key: Option<String>) -> Self {
        Self {
            id,
            endpoint,
            api_key,
            http: Client::new(),
        }
    }

    fn request<Req: Serialize>(&self, body: &Req) -> RequestBuilder {
        let request = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(body);
        match self.bearer() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Post JSON, with bearer auth when a token is configured
    pub async fn post_json<Req, Res>(&self, body: &Req) -> Result<Res, ModelError>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let response = self
            .request(body)
            .send()
            .await
            .map_err(|e| ModelError::network(&self.id, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::status(&self.id, status, body));
        }

        response
            .json()
            .await
            .map_err(|e| ModelError::invalid_response(&self.id, e.to_string()))
    }

    /// Open a server-sent event stream for a JSON request. Reconnects are
    /// disabled: a chat turn cannot be resumed.
    pub fn open_event_stream<Req: Serialize>(&self, body: &Req) -> Result<EventSource, ModelError> {
        let mut source = self
            .request(body)
            .header("Accept", "text/event-stream")
            .eventsource()
            .map_err(|e| ModelError::stream(&self.id, e.to_string()))?;
        source.set_retry_policy(Box::new(Never));
        Ok(source)
    }

    fn bearer(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}
