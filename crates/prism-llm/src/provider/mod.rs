//! Provider trait and implementations for upstream AI backends

pub mod anthropic;
pub mod google;
pub mod openai;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use prism_core::RequestContext;

use crate::error::GatewayError;
use crate::types::{ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, ModelDescriptor, StreamEvent};

/// Boxed stream of canonical events from a streaming completion
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, GatewayError>> + Send>>;

/// Capabilities advertised by a provider
#[derive(Debug, Clone, Copy)]
pub struct ProviderCapabilities {
    /// Whether the provider supports streaming responses
    pub streaming: bool,
    /// Whether the provider supports tool/function calling
    pub tool_calling: bool,
    /// Whether the provider supports embeddings
    pub embeddings: bool,
}

/// Trait implemented by each upstream provider backend
///
/// Implementations translate canonical requests into their wire format, call
/// the upstream API, and translate responses back. Dropping the returned
/// stream cancels the upstream request.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Configured provider name
    fn name(&self) -> &str;

    /// Advertised capabilities
    fn capabilities(&self) -> ProviderCapabilities;

    /// Send a non-streaming completion request
    async fn complete(&self, request: &ChatRequest, context: &RequestContext) -> Result<ChatResponse, GatewayError>;

    /// Send a streaming completion request
    async fn complete_stream(&self, request: &ChatRequest, context: &RequestContext)
    -> Result<EventStream, GatewayError>;

    /// Create embeddings for the given input
    ///
    /// Providers without embedding support return
    /// [`GatewayError::Unsupported`].
    async fn embed(
        &self,
        request: &EmbeddingRequest,
        context: &RequestContext,
    ) -> Result<EmbeddingResponse, GatewayError>;

    /// List models available from this provider
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, GatewayError>;
}

/// Read an upstream error response and produce a `GatewayError`
///
/// Tries to extract the human-readable message from the provider's error
/// body, falling back to the raw body.
pub(crate) async fn upstream_error(provider: &str, response: reqwest::Response) -> GatewayError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(&body).unwrap_or(body);

    tracing::warn!(provider, status, "upstream returned error");
    GatewayError::upstream(provider, Some(status), message)
}

/// Pull a message out of a provider error body, whatever its dialect
fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error.get("message")?.as_str().map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_extracted_from_nested_body() {
        let body = r#"{"error": {"message": "model does not exist", "type": "invalid_request_error"}}"#;
        assert_eq!(extract_error_message(body).as_deref(), Some("model does not exist"));
    }

    #[test]
    fn non_json_body_yields_none() {
        assert_eq!(extract_error_message("<html>bad gateway</html>"), None);
    }
}
