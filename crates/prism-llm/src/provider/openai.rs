//! OpenAI-compatible provider implementation
//!
//! Also serves providers that clone the `OpenAI` API surface (xAI and other
//! compatibles), which differ only in base URL and model catalog.

use anyhow::Context;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use prism_config::ProviderConfig;
use prism_core::RequestContext;

use super::{EventStream, Provider, ProviderCapabilities};
use crate::convert::openai::openai_chunk_to_events;
use crate::error::GatewayError;
use crate::protocol::openai::{
    OpenAiEmbeddingRequest, OpenAiEmbeddingResponse, OpenAiModelList, OpenAiRequest, OpenAiResponse, OpenAiStreamChunk,
    OpenAiStreamOptions,
};
use crate::types::{ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, ModelDescriptor, StreamEvent};

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible provider
pub struct OpenAiProvider {
    name: String,
    client: Client,
    base_url: Url,
    api_key: SecretString,
    models: Vec<String>,
}

impl OpenAiProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] when the API key is missing,
    /// so a broken provider is rejected at startup rather than at first use.
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
            client: build_client(config)?,
            base_url,
            api_key,
            models: config.models.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/{path}")
    }
}

/// Build a reqwest client honoring the configured request timeout
pub(crate) fn build_client(config: &ProviderConfig) -> Result<Client, GatewayError> {
    let mut builder = Client::builder();
    if let Some(secs) = config.timeout_secs {
        builder = builder.timeout(std::time::Duration::from_secs(secs));
    }
    let client = builder.build().context("building http client")?;
    Ok(client)
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            streaming: true,
            tool_calling: true,
            embeddings: true,
        }
    }

    async fn complete(&self, request: &ChatRequest, _context: &RequestContext) -> Result<ChatResponse, GatewayError> {
        let mut wire_request: OpenAiRequest = request.into();
        wire_request.stream = None;

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(self.api_key.expose_secret())
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

        let wire_response: OpenAiResponse = response
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
        let mut wire_request: OpenAiRequest = request.into();
        wire_request.stream = Some(true);
        // Compatible providers reject unknown request fields, so only ask the
        // canonical API for the usage chunk
        if self.base_url.as_str().trim_end_matches('/') == DEFAULT_BASE_URL {
            wire_request.stream_options = Some(OpenAiStreamOptions { include_usage: true });
        }

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(self.api_key.expose_secret())
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

        let mapped = event_stream
            .map(|result| match result {
                Ok(event) => {
                    let data = event.data.trim().to_owned();
                    if data == "[DONE]" {
                        return vec![Ok(StreamEvent::Done)];
                    }

                    match serde_json::from_str::<OpenAiStreamChunk>(&data) {
                        Ok(chunk) => openai_chunk_to_events(&chunk).into_iter().map(Ok).collect(),
                        Err(e) => {
                            tracing::debug!(error = %e, data = %data, "skipping unparseable SSE chunk");
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
        request: &EmbeddingRequest,
        _context: &RequestContext,
    ) -> Result<EmbeddingResponse, GatewayError> {
        let wire_request = OpenAiEmbeddingRequest {
            model: request.model.clone(),
            input: serde_json::to_value(&request.input).context("serializing embedding input")?,
            encoding_format: Some(request.encoding_format.clone()),
            user: request.user.clone(),
        };

        let response = self
            .client
            .post(self.endpoint("embeddings"))
            .bearer_auth(self.api_key.expose_secret())
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(provider = %self.name, error = %e, "upstream embedding request failed");
                GatewayError::upstream(&self.name, None, e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(super::upstream_error(&self.name, response).await);
        }

        let wire_response: OpenAiEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::upstream(&self.name, None, format!("failed to parse response: {e}")))?;

        Ok(wire_response.into())
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, GatewayError> {
        // A configured model list overrides upstream discovery
        if !self.models.is_empty() {
            return Ok(self
                .models
                .iter()
                .map(|id| ModelDescriptor::new(id, &self.name))
                .collect());
        }

        let response = self
            .client
            .get(self.endpoint("models"))
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| GatewayError::upstream(&self.name, None, e.to_string()))?;

        if !response.status().is_success() {
            return Err(super::upstream_error(&self.name, response).await);
        }

        let list: OpenAiModelList = response
            .json()
            .await
            .map_err(|e| GatewayError::upstream(&self.name, None, format!("failed to parse model list: {e}")))?;

        Ok(list
            .data
            .into_iter()
            .map(|m| ModelDescriptor {
                id: m.id,
                owned_by: self.name.clone(),
                created: (m.created > 0).then_some(m.created),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            provider_type: prism_config::ProviderType::Openai,
            api_key: api_key.map(|k| SecretString::from(k.to_owned())),
            base_url: None,
            timeout_secs: None,
            models: vec![],
        }
    }

    #[test]
    fn missing_api_key_fails_construction() {
        let err = OpenAiProvider::new("openai".to_owned(), &config(None))
            .err()
            .expect("construction without a key must fail");
        assert!(matches!(
            err,
            GatewayError::Configuration { provider, setting } if provider == "openai" && setting == "api_key"
        ));
    }

    #[test]
    fn base_url_override_changes_endpoints() {
        let mut cfg = config(Some("sk-test"));
        cfg.base_url = Some(Url::parse("https://api.x.ai/v1").unwrap());

        let provider = OpenAiProvider::new("xai".to_owned(), &cfg).unwrap();
        assert_eq!(provider.endpoint("chat/completions"), "https://api.x.ai/v1/chat/completions");
    }

    #[tokio::test]
    async fn configured_models_skip_discovery() {
        let mut cfg = config(Some("sk-test"));
        cfg.models = vec!["grok-beta".to_owned(), "grok-2".to_owned()];

        let provider = OpenAiProvider::new("xai".to_owned(), &cfg).unwrap();
        let models = provider.list_models().await.unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].id, "grok-beta");
        assert_eq!(models[0].owned_by, "xai");
    }
}
