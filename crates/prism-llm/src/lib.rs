//! Core provider-adapter and routing crate for Prism
//!
//! Provides a unified OpenAI-compatible interface over multiple AI providers
//! (OpenAI, Anthropic, Google, and OpenAI-compatible clones such as xAI) with
//! model-prefix routing, bidirectional format conversion, and streaming
//! translation.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod catalog;
pub mod convert;
pub mod error;
pub mod protocol;
pub mod provider;
pub mod registry;
pub mod router;
pub mod types;

pub use error::GatewayError;
pub use provider::{Provider, ProviderCapabilities};
pub use registry::ProviderRegistry;
pub use router::{GatewayState, gateway_router};
pub use types::{ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, StreamEvent};
