//! Canonical types shared by every adapter
//!
//! These are provider-agnostic and serve as the normalized internal
//! representation that all wire formats convert to and from. They are
//! per-request value objects; nothing here is persisted.

pub mod embedding;
pub mod message;
pub mod model;
pub mod request;
pub mod response;
pub mod stream;
pub mod tool;

pub use embedding::{EmbedInput, EmbeddingData, EmbeddingRequest, EmbeddingResponse, EmbeddingUsage};
pub use message::{FunctionCall, Message, Role, ToolCall};
pub use model::ModelDescriptor;
pub use request::{ChatRequest, SamplingParams};
pub use response::{ChatResponse, Choice, ChoiceMessage, FinishReason, Usage};
pub use stream::{StreamDelta, StreamEvent, StreamFunctionCall, StreamToolCall};
pub use tool::{FunctionDefinition, ToolChoice, ToolChoiceFunction, ToolChoiceFunctionName, ToolChoiceMode, ToolDefinition};
