//! Model traits

use super::types::{ModelDelta, ModelError, ModelRequest, ModelResponse, ModelStream};
use async_trait::async_trait;
use futures::stream;

/// Trait for model provider implementations
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Send a chat request and wait for the whole assistant turn
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError>;

    /// Stream the assistant turn. Providers without native streaming emit
    /// the buffered answer as a single fragment.
    async fn chat_stream(&self, request: ModelRequest) -> Result<ModelStream, ModelError> {
        let response = self.chat(request).await?;
        let mut deltas = Vec::with_capacity(2);
        if !response.message.content.is_empty() {
            deltas.push(Ok(ModelDelta::Text(response.message.content.clone())));
        }
        deltas.push(Ok(ModelDelta::Completed(response)));
        Ok(Box::pin(stream::iter(deltas)))
    }
}
