//! Google Generative Language API provider implementation

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use prism_config::ProviderConfig;
use prism_core::RequestContext;

use super::{EventStream, Provider, ProviderCapabilities};
use crate::convert::google::google_chunk_to_events;
use crate::error::GatewayError;
use crate::protocol::google::{GoogleModelList, GoogleRequest, GoogleResponse, GoogleStreamChunk};
use crate::types::{ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, ModelDescriptor};

/// Default Google Generative Language API base URL
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Generative Language API provider
pub struct GoogleProvider {
    name: String,
    client: Client,
    base_url: Url,
    api_key: SecretString,
    models: Vec<String>,
}

impl GoogleProvider {
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

    fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/{path}")
    }
}

#[async_trait]
impl Provider for GoogleProvider {
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
        let wire_request: GoogleRequest = request.into();
        let url = self.endpoint(&format!("models/{}:generateContent", request.model));

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
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

        let wire_response: GoogleResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::upstream(&self.name, None, format!("failed to parse response: {e}")))?;

        let mut canonical: ChatResponse = wire_response.into();
        // Google omits the model name from responses
        canonical.model.clone_from(&request.model);

        Ok(canonical)
    }

    async fn complete_stream(
        &self,
        request: &ChatRequest,
        _context: &RequestContext,
    ) -> Result<EventStream, GatewayError> {
        let wire_request: GoogleRequest = request.into();
        let url = self.endpoint(&format!("models/{}:streamGenerateContent?alt=sse", request.model));

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
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
                    if data.is_empty() {
                        return vec![];
                    }

                    match serde_json::from_str::<GoogleStreamChunk>(&data) {
                        Ok(chunk) => google_chunk_to_events(&chunk).into_iter().map(Ok).collect(),
                        Err(e) => {
                            tracing::debug!(error = %e, data = %data, "skipping unparseable Google SSE chunk");
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
        // Gemini embeddings use a different request shape than the unified
        // surface; translation is not wired up yet.
        Err(GatewayError::NotImplemented {
            provider: self.name.clone(),
            operation: "embeddings",
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, GatewayError> {
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
            .header("x-goog-api-key", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| GatewayError::upstream(&self.name, None, e.to_string()))?;

        if !response.status().is_success() {
            return Err(super::upstream_error(&self.name, response).await);
        }

        let list: GoogleModelList = response
            .json()
            .await
            .map_err(|e| GatewayError::upstream(&self.name, None, format!("failed to parse model list: {e}")))?;

        Ok(list
            .models
            .into_iter()
            .filter(|m| {
                m.supported_generation_methods
                    .iter()
                    .any(|method| method == "generateContent")
            })
            .map(|m| {
                let id = m.name.strip_prefix("models/").unwrap_or(&m.name).to_owned();
                ModelDescriptor::new(id, &self.name)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProviderConfig {
        ProviderConfig {
            provider_type: prism_config::ProviderType::Google,
            api_key: Some(SecretString::from("test-key")),
            base_url: None,
            timeout_secs: None,
            models: vec![],
        }
    }

    #[test]
    fn model_endpoint_includes_model_and_action() {
        let provider = GoogleProvider::new("google".to_owned(), &config()).unwrap();
        assert_eq!(
            provider.endpoint("models/gemini-pro:generateContent"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent"
        );
    }

    #[tokio::test]
    async fn embeddings_are_not_implemented() {
        let provider = GoogleProvider::new("google".to_owned(), &config()).unwrap();
        let request = EmbeddingRequest {
            model: "gemini-pro".to_owned(),
            input: crate::types::EmbedInput::Single("hi".to_owned()),
            encoding_format: "float".to_owned(),
            user: None,
        };

        let err = provider.embed(&request, &RequestContext::empty()).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotImplemented { operation, .. } if operation == "embeddings"));
    }
}
