use serde::{Deserialize, Serialize};

use super::message::Message;
use super::tool::{ToolChoice, ToolDefinition};

/// Parameters controlling text generation
///
/// Absent values are omitted from the upstream call so each provider applies
/// its own documented default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Sampling temperature (0.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold (0.0 to 1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Presence penalty (-2.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Frequency penalty (-2.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
}

/// Canonical chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages, in order
    pub messages: Vec<Message>,
    /// Generation parameters
    #[serde(default)]
    pub params: SamplingParams,
    /// Tool definitions available to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// How the model should select tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Opaque end-user identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
}

impl ChatRequest {
    /// Re-check request shape at the dispatch boundary
    ///
    /// Schema-level deserialization has already run; this enforces the
    /// semantic constraints: non-empty model and messages, parameter ranges.
    pub fn validate(&self) -> Result<(), String> {
        if self.model.is_empty() {
            return Err("model must not be empty".to_owned());
        }
        if self.messages.is_empty() {
            return Err("messages must not be empty".to_owned());
        }
        if let Some(t) = self.params.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(format!("temperature must be within [0, 2], got {t}"));
        }
        if let Some(p) = self.params.top_p
            && !(0.0..=1.0).contains(&p)
        {
            return Err(format!("top_p must be within [0, 1], got {p}"));
        }
        if let Some(p) = self.params.presence_penalty
            && !(-2.0..=2.0).contains(&p)
        {
            return Err(format!("presence_penalty must be within [-2, 2], got {p}"));
        }
        if let Some(p) = self.params.frequency_penalty
            && !(-2.0..=2.0).contains(&p)
        {
            return Err(format!("frequency_penalty must be within [-2, 2], got {p}"));
        }
        if let Some(0) = self.params.max_tokens {
            return Err("max_tokens must be a positive integer".to_owned());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn request() -> ChatRequest {
        ChatRequest {
            model: "gpt-4".to_owned(),
            messages: vec![Message::new(Role::User, "hi")],
            params: SamplingParams::default(),
            tools: None,
            tool_choice: None,
            user: None,
            stream: false,
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn empty_model_rejected() {
        let mut req = request();
        req.model.clear();
        assert!(req.validate().is_err());
    }

    #[test]
    fn empty_messages_rejected() {
        let mut req = request();
        req.messages.clear();
        assert!(req.validate().is_err());
    }

    #[test]
    fn out_of_range_temperature_rejected() {
        let mut req = request();
        req.params.temperature = Some(2.5);
        assert!(req.validate().is_err());
    }

    #[test]
    fn zero_max_tokens_rejected() {
        let mut req = request();
        req.params.max_tokens = Some(0);
        assert!(req.validate().is_err());
    }
}
