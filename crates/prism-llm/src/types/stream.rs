use serde::{Deserialize, Serialize};

use super::response::{FinishReason, Usage};

/// Event emitted on a streaming completion
///
/// Adapters normalize their provider's stream format into this sequence:
/// zero or more `Delta` events, an optional `Usage` event, then exactly one
/// `Done`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental content delta
    Delta(StreamDelta),
    /// Final token usage, when the provider reports it
    Usage(Usage),
    /// Stream finished
    Done,
}

/// Incremental update to a streamed choice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Index of the choice being updated
    #[serde(default)]
    pub index: u32,
    /// Text appended to the content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool call fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<StreamToolCall>,
    /// Set on the final delta of the choice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl StreamDelta {
    /// Content-only delta for choice zero
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }

    /// Terminal delta carrying only a finish reason
    pub fn finish(reason: FinishReason) -> Self {
        Self {
            finish_reason: Some(reason),
            ..Self::default()
        }
    }
}

/// Incremental tool call data within a stream
///
/// The first fragment for a call carries `id` and the function name; later
/// fragments append to `arguments`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamToolCall {
    /// Position of this tool call within the message
    #[serde(default)]
    pub index: u32,
    /// Tool call identifier, present on the first fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Function fragment
    pub function: StreamFunctionCall,
}

/// Function fragment within a streamed tool call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamFunctionCall {
    /// Function name, present on the first fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Argument JSON fragment to append
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}
