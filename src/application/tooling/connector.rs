use super::error::ToolInvokeError;
use super::interface::{SessionConnector, ToolSession};
use super::session::HttpMcpSession;
use crate::config::{Credentials, ServerConfig};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens streamable HTTP sessions. Managed servers get the workspace token;
/// external servers are called without credentials.
pub struct HttpConnector {
    http: Client,
    credentials: Credentials,
}

impl HttpConnector {
    pub fn new(credentials: Credentials) -> Self {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(http, credentials)
    }

    pub fn with_client(http: Client, credentials: Credentials) -> Self {
        Self { http, credentials }
    }
}

#[async_trait]
impl SessionConnector for HttpConnector {
    async fn open(&self, server: &ServerConfig) -> Result<Arc<dyn ToolSession>, ToolInvokeError> {
        let bearer = if server.is_managed() {
            self.credentials.bearer().map(str::to_string)
        } else {
            None
        };
        let session = HttpMcpSession::open(server.clone(), self.http.clone(), bearer).await?;
        info!(
            server = %server.name,
            kind = %server.kind,
            url = %server.url,
            "Connected to MCP server"
        );
        Ok(Arc::new(session))
    }
}
