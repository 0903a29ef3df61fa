//! Anthropic Messages API provider implementation

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use prism_config::ProviderConfig;
use prism_core::RequestContext;

use super::{EventStream, Provider, ProviderCapabilities};
use crate::convert::anthropic::AnthropicStreamState;
use crate::error::GatewayError;
use crate::protocol::anthropic::{AnthropicRequest, AnthropicResponse, AnthropicStreamEvent};
use crate::types::{ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, ModelDescriptor, StreamEvent};

/// Default Anthropic API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Models served when no explicit list is configured
///
/// Anthropic has no public model listing endpoint, so the catalog is static.
const KNOWN_MODELS: &[&str] = &[
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
];

/// Anthropic Messages API provider
pub struct AnthropicProvider {
    name: String,
    client: Client,
    base_url: Url,
    api_key: SecretString,
    models: Vec<String>,
}

impl AnthropicProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] when the API key is missing.
    pub fn new(name: String, config: &ProviderConfig) -> Result<Self, GatewayError> {
        let api_key = config.api_key.clone().ok_or_else(|| GatewayError::Configuration {
            provider: name.clone(),
            setting: "api_key".to_owned(),
        })?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| Url::parse(DEFAULT_BASE_URL).expect("valid default URL"));

        Ok(Self {
            name,
            client: super::openai::build_client(config)?,
            base_url,
            api_key,
            models: config.models.clone(),
        })
    }

    fn messages_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/messages")
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            streaming: true,
            tool_calling: true,
            embeddings: false,
        }
    }

    async fn complete(&self, request: &ChatRequest, _context: &RequestContext) -> Result<ChatResponse, GatewayError> {
        let mut wire_request: AnthropicRequest = request.into();
        wire_request.stream = None;

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(provider = %self.name, error = %e, "upstream request failed");
                GatewayError::upstream(&self.name, None, e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(super::upstream_error(&self.name, response).await);
        }

        let wire_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::upstream(&self.name, None, format!("failed to parse response: {e}")))?;

        Ok(wire_response.into())
    }

    async fn complete_stream(
        &self,
        request: &ChatRequest,
        _context: &RequestContext,
    ) -> Result<EventStream, GatewayError> {
        let mut wire_request: AnthropicRequest = request.into();
        wire_request.stream = Some(true);

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(provider = %self.name, error = %e, "upstream stream request failed");
                GatewayError::upstream(&self.name, None, e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(super::upstream_error(&self.name, response).await);
        }

        let event_stream = response.bytes_stream().eventsource();
        let mut state = AnthropicStreamState::new();

        let mapped = event_stream
            .map(move |result| match result {
                Ok(event) => {
                    let data = event.data.trim();
                    if data.is_empty() {
                        return vec![];
                    }

                    match serde_json::from_str::<AnthropicStreamEvent>(data) {
                        Ok(stream_event) => state
                            .convert_event(&stream_event)
                            .into_iter()
                            .map(Ok)
                            .collect::<Vec<Result<StreamEvent, GatewayError>>>(),
                        Err(e) => {
                            tracing::debug!(error = %e, "skipping unparseable Anthropic SSE event");
                            vec![]
                        }
                    }
                }
                Err(e) => vec![Err(GatewayError::Streaming(e.to_string()))],
            })
            .flat_map(futures_util::stream::iter);

        Ok(Box::pin(mapped))
    }

    async fn embed(
        &self,
        _request: &EmbeddingRequest,
        _context: &RequestContext,
    ) -> Result<EmbeddingResponse, GatewayError> {
        Err(GatewayError::Unsupported {
            provider: self.name.clone(),
            capability: "embeddings",
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, GatewayError> {
        let ids: Vec<String> = if self.models.is_empty() {
            KNOWN_MODELS.iter().map(|&s| s.to_owned()).collect()
        } else {
            self.models.clone()
        };

        Ok(ids.into_iter().map(|id| ModelDescriptor::new(id, &self.name)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProviderConfig {
        ProviderConfig {
            provider_type: prism_config::ProviderType::Anthropic,
            api_key: Some(SecretString::from("sk-ant-test")),
            base_url: None,
            timeout_secs: None,
            models: vec![],
        }
    }

    #[tokio::test]
    async fn embeddings_are_unsupported() {
        let provider = AnthropicProvider::new("anthropic".to_owned(), &config()).unwrap();
        let request = EmbeddingRequest {
            model: "claude-3-opus-20240229".to_owned(),
            input: crate::types::EmbedInput::Single("hi".to_owned()),
            encoding_format: "float".to_owned(),
            user: None,
        };

        let err = provider.embed(&request, &RequestContext::empty()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unsupported { capability, .. } if capability == "embeddings"));
    }

    #[tokio::test]
    async fn model_list_is_static_without_override() {
        let provider = AnthropicProvider::new("anthropic".to_owned(), &config()).unwrap();
        let models = provider.list_models().await.unwrap();
        assert!(models.iter().any(|m| m.id == "claude-3-opus-20240229"));
        assert!(models.iter().all(|m| m.owned_by == "anthropic"));
    }
}
