//! Axum route handlers for the OpenAI-compatible gateway surface

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::{Stream, StreamExt, future, stream};

use prism_core::{Dispatch, HttpError, RequestContext, TokenUsage};

use crate::catalog;
use crate::convert;
use crate::error::GatewayError;
use crate::protocol::openai::{OpenAiModel, OpenAiModelList, OpenAiRequest, OpenAiResponse};
use crate::provider::EventStream;
use crate::registry::ProviderRegistry;
use crate::types::{ChatRequest, EmbeddingRequest, StreamEvent};

/// Shared state for gateway route handlers
#[derive(Clone)]
pub struct GatewayState {
    registry: Arc<ProviderRegistry>,
}

impl GatewayState {
    /// Wrap a constructed registry for sharing across handlers
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Access the provider registry
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }
}

/// Build the gateway router with all endpoints
pub fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route("/v1/chat/completions", routing::post(chat_completions))
        .route("/v1/embeddings", routing::post(embeddings))
        .route("/v1/models", routing::get(list_models))
        .with_state(state)
}

// -- Handlers --

/// Handle `POST /v1/chat/completions`
async fn chat_completions(
    State(state): State<GatewayState>,
    axum::Extension(context): axum::Extension<RequestContext>,
    Json(wire_request): Json<OpenAiRequest>,
) -> Response {
    let request: ChatRequest = wire_request.into();

    if let Err(reason) = request.validate() {
        return error_response(&GatewayError::InvalidRequest(reason));
    }

    let provider = match state.registry.by_model(&request.model) {
        Ok(provider) => provider,
        Err(e) => return error_response(&e),
    };

    let mut dispatch = Dispatch {
        provider: provider.name().to_owned(),
        model: request.model.clone(),
        is_streaming: request.stream,
        usage: None,
    };

    if request.stream {
        match provider.complete_stream(&request, &context).await {
            Ok(upstream) => {
                tracing::info!(
                    provider = %dispatch.provider,
                    model = %dispatch.model,
                    "dispatching streaming completion"
                );
                let mut response = sse_response(upstream, request.model).into_response();
                response.extensions_mut().insert(dispatch);
                response
            }
            Err(e) => error_response(&e),
        }
    } else {
        match provider.complete(&request, &context).await {
            Ok(response) => {
                dispatch.usage = Some(TokenUsage {
                    prompt_tokens: response.usage.prompt_tokens,
                    completion_tokens: response.usage.completion_tokens,
                    total_tokens: response.usage.total_tokens,
                });
                tracing::info!(
                    provider = %dispatch.provider,
                    model = %dispatch.model,
                    total_tokens = dispatch.usage.map(|u| u.total_tokens),
                    "completion served"
                );
                let wire_response: OpenAiResponse = response.into();
                let mut response = Json(wire_response).into_response();
                response.extensions_mut().insert(dispatch);
                response
            }
            Err(e) => error_response(&e),
        }
    }
}

/// Handle `POST /v1/embeddings`
async fn embeddings(
    State(state): State<GatewayState>,
    axum::Extension(context): axum::Extension<RequestContext>,
    Json(request): Json<EmbeddingRequest>,
) -> Response {
    if request.model.is_empty() {
        return error_response(&GatewayError::InvalidRequest("model must not be empty".to_owned()));
    }
    if request.input.is_empty() {
        return error_response(&GatewayError::InvalidRequest("input must not be empty".to_owned()));
    }

    let provider = match state.registry.by_model(&request.model) {
        Ok(provider) => provider,
        Err(e) => return error_response(&e),
    };

    match provider.embed(&request, &context).await {
        Ok(response) => {
            let dispatch = Dispatch {
                provider: provider.name().to_owned(),
                model: request.model.clone(),
                is_streaming: false,
                usage: Some(TokenUsage {
                    prompt_tokens: response.usage.prompt_tokens,
                    completion_tokens: None,
                    total_tokens: response.usage.total_tokens,
                }),
            };
            tracing::info!(
                provider = %dispatch.provider,
                model = %dispatch.model,
                inputs = request.input.len(),
                "embeddings served"
            );
            let mut response = Json(response).into_response();
            response.extensions_mut().insert(dispatch);
            response
        }
        Err(e) => error_response(&e),
    }
}

/// Handle `GET /v1/models`
async fn list_models(State(state): State<GatewayState>) -> Response {
    let models = catalog::aggregate_models(&state.registry).await;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let data: Vec<OpenAiModel> = models
        .into_iter()
        .map(|m| OpenAiModel {
            id: m.id,
            object: "model".to_owned(),
            created: m.created.unwrap_or(now),
            owned_by: m.owned_by,
        })
        .collect();

    Json(OpenAiModelList {
        object: "list".to_owned(),
        data,
    })
    .into_response()
}

// -- Streaming translation --

/// Translate a canonical event stream into `OpenAI` SSE data payloads
///
/// Guarantees the client protocol regardless of upstream behavior: every
/// clean stream ends with exactly one `[DONE]` sentinel, and a mid-stream
/// failure produces one error-shaped data event as the final frame with no
/// `[DONE]` after it.
pub fn sse_data_frames(upstream: EventStream, model: String) -> impl Stream<Item = String> + Send {
    let created = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let response_id = format!("chatcmpl-{}", uuid::Uuid::new_v4().simple());

    // Append a synthetic Done so upstreams that never signal completion
    // still terminate the client protocol correctly.
    upstream
        .chain(stream::iter([Ok(StreamEvent::Done)]))
        .scan(false, move |closed, result| {
            if *closed {
                return future::ready(None);
            }

            let frame = match result {
                Ok(StreamEvent::Delta(delta)) => {
                    let chunk = convert::openai::delta_to_openai_chunk(&delta, &response_id, &model, created);
                    serde_json::to_string(&chunk).unwrap_or_default()
                }
                Ok(StreamEvent::Usage(usage)) => {
                    let chunk = convert::openai::usage_to_openai_chunk(&usage, &response_id, &model, created);
                    serde_json::to_string(&chunk).unwrap_or_default()
                }
                Ok(StreamEvent::Done) => {
                    *closed = true;
                    "[DONE]".to_owned()
                }
                Err(e) => {
                    *closed = true;
                    serde_json::json!({
                        "error": {
                            "message": e.client_message(),
                            "type": e.error_type(),
                            "code": e.error_code(),
                        }
                    })
                    .to_string()
                }
            };

            future::ready(Some(frame))
        })
}

/// Build a streaming SSE response in `OpenAI` format
fn sse_response(upstream: EventStream, model: String) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let event_stream = sse_data_frames(upstream, model).map(|data| Ok(Event::default().data(data)));
    Sse::new(event_stream).keep_alive(KeepAlive::default())
}

// -- Error responses --

/// Convert a gateway error to an `OpenAI`-style JSON error response
fn error_response(error: &GatewayError) -> Response {
    let status = error.status_code();
    let body = serde_json::json!({
        "error": {
            "message": error.client_message(),
            "type": error.error_type(),
            "code": error.error_code(),
        }
    });

    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use indexmap::IndexMap;
    use prism_config::RouteRule;
    use tower::ServiceExt;

    use super::*;
    use crate::provider::{Provider, ProviderCapabilities};
    use crate::types::{
        ChatResponse, EmbeddingData, EmbeddingResponse, EmbeddingUsage, FinishReason, ModelDescriptor, StreamDelta,
        Usage,
    };

    fn upstream(events: Vec<Result<StreamEvent, GatewayError>>) -> EventStream {
        Box::pin(stream::iter(events))
    }

    struct EmbedOnly;

    #[async_trait]
    impl Provider for EmbedOnly {
        fn name(&self) -> &str {
            "stub"
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities {
                streaming: false,
                tool_calling: false,
                embeddings: true,
            }
        }

        async fn complete(&self, _: &ChatRequest, _: &RequestContext) -> Result<ChatResponse, GatewayError> {
            Err(GatewayError::Unsupported {
                provider: "stub".to_owned(),
                capability: "completions",
            })
        }

        async fn complete_stream(&self, _: &ChatRequest, _: &RequestContext) -> Result<EventStream, GatewayError> {
            Err(GatewayError::Unsupported {
                provider: "stub".to_owned(),
                capability: "streaming",
            })
        }

        async fn embed(&self, request: &EmbeddingRequest, _: &RequestContext) -> Result<EmbeddingResponse, GatewayError> {
            Ok(EmbeddingResponse {
                object: "list".to_owned(),
                data: vec![EmbeddingData {
                    object: "embedding".to_owned(),
                    embedding: vec![0.1, 0.2],
                    index: 0,
                }],
                model: request.model.clone(),
                usage: EmbeddingUsage {
                    prompt_tokens: 5,
                    total_tokens: 5,
                },
            })
        }

        async fn list_models(&self) -> Result<Vec<ModelDescriptor>, GatewayError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn embeddings_response_carries_dispatch_extension() {
        let mut providers: IndexMap<String, Arc<dyn Provider>> = IndexMap::new();
        providers.insert("stub".to_owned(), Arc::new(EmbedOnly));
        let routes = vec![RouteRule {
            prefix: "text-embedding-".to_owned(),
            provider: "stub".to_owned(),
        }];
        let registry = ProviderRegistry::from_parts(providers, routes);
        let app = gateway_router(GatewayState::new(registry));

        let mut request = http::Request::builder()
            .method("POST")
            .uri("/v1/embeddings")
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(
                r#"{"model": "text-embedding-3-small", "input": "hi"}"#,
            ))
            .unwrap();
        request.extensions_mut().insert(RequestContext::empty());

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);

        let dispatch = response.extensions().get::<Dispatch>().expect("dispatch recorded");
        assert_eq!(dispatch.provider, "stub");
        assert_eq!(dispatch.model, "text-embedding-3-small");
        assert!(!dispatch.is_streaming);
        assert_eq!(dispatch.usage.map(|u| u.total_tokens), Some(5));
        assert_eq!(dispatch.usage.and_then(|u| u.completion_tokens), None);
    }

    #[tokio::test]
    async fn content_stream_ends_with_single_done() {
        let events = upstream(vec![
            Ok(StreamEvent::Delta(StreamDelta::content("Hel"))),
            Ok(StreamEvent::Delta(StreamDelta::content("lo"))),
            Ok(StreamEvent::Delta(StreamDelta::finish(FinishReason::Stop))),
            Ok(StreamEvent::Done),
        ]);

        let frames: Vec<String> = sse_data_frames(events, "gpt-4".to_owned()).collect().await;
        assert_eq!(frames.len(), 4);
        assert_eq!(frames.last().map(String::as_str), Some("[DONE]"));

        let first: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(first["object"], "chat.completion.chunk");
        assert_eq!(first["choices"][0]["delta"]["content"], "Hel");
        assert_eq!(first["model"], "gpt-4");

        let third: serde_json::Value = serde_json::from_str(&frames[2]).unwrap();
        assert_eq!(third["choices"][0]["finish_reason"], "stop");
    }

    #[tokio::test]
    async fn done_appended_when_upstream_never_signals() {
        let events = upstream(vec![Ok(StreamEvent::Delta(StreamDelta::content("hi")))]);

        let frames: Vec<String> = sse_data_frames(events, "gpt-4".to_owned()).collect().await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], "[DONE]");
    }

    #[tokio::test]
    async fn error_terminates_stream_without_done() {
        let events = upstream(vec![
            Ok(StreamEvent::Delta(StreamDelta::content("partial"))),
            Err(GatewayError::Streaming("connection reset".to_owned())),
            // Anything after the error must not reach the client
            Ok(StreamEvent::Delta(StreamDelta::content("late"))),
        ]);

        let frames: Vec<String> = sse_data_frames(events, "gpt-4".to_owned()).collect().await;
        assert_eq!(frames.len(), 2);

        let last: serde_json::Value = serde_json::from_str(&frames[1]).unwrap();
        assert_eq!(last["error"]["type"], "streaming_error");
        assert!(last["error"]["message"].as_str().unwrap().contains("connection reset"));
        // Same shape as non-streaming error bodies, code included
        assert!(last["error"].get("code").is_some());
        assert!(!frames.iter().any(|f| f == "[DONE]"));
    }

    #[tokio::test]
    async fn usage_event_becomes_chunk_with_empty_choices() {
        let events = upstream(vec![
            Ok(StreamEvent::Usage(Usage::from_parts(7, 2))),
            Ok(StreamEvent::Done),
        ]);

        let frames: Vec<String> = sse_data_frames(events, "gpt-4".to_owned()).collect().await;
        let usage: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(usage["usage"]["total_tokens"], 9);
        assert!(usage["choices"].as_array().unwrap().is_empty());
    }
}
